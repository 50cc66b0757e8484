//! Crate-wide error type.

use thiserror::Error;

use crate::api::{ApiError, StorageError};
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::services::{MessagingError, SessionError};

/// Any error raised by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
