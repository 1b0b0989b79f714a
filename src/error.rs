//! Typed domain errors.
//!
//! Persistence code returns `anyhow::Result` and wraps these with `.into()`;
//! the HTTP layer downcasts back to [`StudioError`] to choose a status code.

use thiserror::Error;

use crate::blocks::BlockError;
use crate::build::BuildError;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{doctype} {name} not found")]
    NotFound { doctype: &'static str, name: String },

    #[error("Insufficient permission: {0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl StudioError {
    pub fn not_found(doctype: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            doctype,
            name: name.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
