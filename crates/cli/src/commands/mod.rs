//! Command implementations.

pub mod cart;
pub mod catalog;
pub mod messages;
pub mod session;

use renomarket_client::api::StorageError;
use renomarket_client::catalog::CatalogError;
use renomarket_client::services::{MessagingError, SessionError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] renomarket_client::Error),

    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The command needs a session and none could be restored.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The backend refused a cart change.
    #[error("Cart {0} failed")]
    Cart(&'static str),
}

impl CliError {
    /// Message printed to the terminal.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(e) => e.user_message(),
            Self::NotLoggedIn => "Veuillez vous connecter : rm-cli login -e <email>".to_string(),
            other => other.to_string(),
        }
    }
}
