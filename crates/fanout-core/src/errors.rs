//! Envelope error types.

use thiserror::Error;

/// Errors raised while decoding or encoding an [`crate::Envelope`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The payload was not a JSON document matching the envelope schema.
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
}
