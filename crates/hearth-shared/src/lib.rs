//! # hearth-shared
//!
//! Types shared by every Hearth crate: entity identifiers, the validation
//! layer, request context, pagination and the small text helpers used to
//! build display values and URL parameters.

pub mod constants;
pub mod context;
pub mod error;
pub mod pagination;
pub mod params;
pub mod text;
pub mod types;
pub mod validation;

pub use context::RequestContext;
pub use error::{FieldError, RuleKind, ValidationErrors};
pub use pagination::{Page, Paginated};
pub use types::*;
