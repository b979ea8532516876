use hearth_shared::{EntityKind, FriendStatus, ValidationErrors};
use thiserror::Error;

use crate::cascade::Relation;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No record of `entity` with this id.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// One or more field rules failed.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// A delete was refused because a `Restrict` relation still has rows.
    #[error("Cannot delete: {dependents} dependent record(s) via {relation}")]
    CascadeBlocked { relation: Relation, dependents: u64 },

    /// Friend edges only move from pending to accepted.
    #[error("Invalid friendship transition from {from} to {to}")]
    InvalidTransition { from: FriendStatus, to: FriendStatus },

    /// The cascade policy asks for something the schema cannot do.
    #[error("Invalid cascade policy: {0}")]
    InvalidPolicy(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The field errors, when this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
