use hearth_shared::ValidationErrors;
use thiserror::Error;

/// Errors raised at the collaborator boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The input was rejected before the collaborator was called.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid style geometry: {0}")]
    Geometry(String),

    #[error("Attachment storage error: {0}")]
    Storage(String),

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Photo search failed: {0}")]
    Search(String),

    #[error("Store error: {0}")]
    Store(#[from] hearth_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
