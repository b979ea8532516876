//! # hearth-store
//!
//! SQLite-backed entity store for Hearth.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, the relationship queries derived from friend edges, an explicit
//! per-relationship [`CascadePolicy`] for deletes, and ordered lifecycle
//! hooks around writes.

pub mod blogs;
pub mod cascade;
pub mod comments;
pub mod database;
pub mod feeds;
pub mod forums;
pub mod friends;
pub mod hooks;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod photos;
pub mod profiles;
pub mod relationships;
pub mod users;

mod error;
mod sql;

pub use cascade::{CascadePolicy, DeleteRule, Relation};
pub use database::Database;
pub use error::{Result, StoreError};
pub use hooks::{HookRegistry, Hooks, LifecycleHook};
pub use models::*;
