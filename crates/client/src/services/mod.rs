//! Session-scoped services shared by every front end.
//!
//! Each service is a cheap `Clone` handle over shared state. Observable
//! state is published on a [`tokio::sync::watch`] channel so front ends can
//! `subscribe()` and re-render on change.

pub mod auth;
pub mod cart;
pub mod messaging;

pub use auth::{AuthService, AuthState};
pub use cart::{CartService, CartState};
pub use messaging::{MessagingError, MessagingService, MessagingSession};

use thiserror::Error;

use crate::api::{ApiError, StorageError};
use renomarket_core::EmailError;

/// Errors raised by session operations (login, registration, profile).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Professional accounts require company information")]
    MissingProfessionalInfo,

    /// Backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("Response carried no access token")]
    MissingToken,

    #[error("Response carried no user")]
    MissingUser,

    #[error("Not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Message suitable for an inline form error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::InvalidEmail(_) => "Adresse email invalide".to_string(),
            Self::MissingProfessionalInfo => {
                "Les informations de l'entreprise sont obligatoires".to_string()
            }
            Self::Rejected(message) => message.clone(),
            Self::NotAuthenticated => "Veuillez vous connecter".to_string(),
            _ => "Une erreur est survenue".to_string(),
        }
    }
}
