//! # hearth-services
//!
//! Collaborators the store relies on but does not implement: image
//! attachments, outgoing mail, third-party photo search and the profile
//! search index.  Each one is a trait plus a small in-process
//! implementation.

pub mod attachments;
pub mod error;
pub mod mail;
pub mod photo_search;
pub mod search_index;

pub use attachments::{AttachmentService, Geometry, MemoryAttachments, StyleSet, Upload};
pub use error::{Result, ServiceError};
pub use mail::{ContactMessage, LogMailer, MailSender, OutgoingMail};
pub use photo_search::{PhotoQuery, PhotoResult, PhotoSearch, StoredPhotos};
pub use search_index::{MemoryIndex, ProfileDocument, SearchIndexer};
