//! Marketplace REST API access.
//!
//! # Architecture
//!
//! - [`ApiClient`] wraps `reqwest` with bearer authentication and
//!   transparent, single-flight token refresh on `401 Unauthorized`
//! - [`TokenStore`] abstracts where the access/refresh pair is persisted
//!   (JSON file for the CLI, memory for embedding and tests)
//! - Every response body uses the backend's [`ApiResponse`] envelope
//!
//! # Example
//!
//! ```rust,ignore
//! use renomarket_client::api::{ApiClient, MemoryTokenStore, endpoints};
//!
//! let api = ApiClient::new(config, Arc::new(MemoryTokenStore::new()))?;
//! let products: ApiResponse<Vec<Product>> = api.get(endpoints::PRODUCTS).await?;
//! ```

mod client;
mod storage;

pub use client::ApiClient;
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenKey, TokenPair, TokenStore};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling the marketplace backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or invalid HTTP exchange.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend answered with a non-2xx status.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// `message` field of the error envelope, if any.
        message: Option<String>,
        /// Parsed error body for caller inspection.
        data: Option<serde_json::Value>,
    },

    /// Reading or writing the token pair failed.
    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),

    /// Successful envelope without the expected `data` payload.
    #[error("Response has no data: {0}")]
    MissingData(String),
}

impl ApiError {
    /// HTTP status for `Status` errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for `401 Unauthorized`.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// Returns `true` when the backend could not give a meaningful answer:
    /// transport failures, unreadable bodies and 5xx statuses.
    ///
    /// These are the failures that justify serving offline fixtures.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Storage(_) | Self::MissingData(_) => false,
        }
    }

    /// User-facing message suitable for inline form errors.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Status { status: 401, .. } => "Session expirée, veuillez vous reconnecter".to_string(),
            Self::Http(_) => "Impossible de joindre le serveur".to_string(),
            _ => "Une erreur est survenue".to_string(),
        }
    }
}

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the backend considers the call successful.
    #[serde(default)]
    pub success: bool,
    /// Human readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Access token (login, register, refresh).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Refresh token (login, register, refresh).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Pagination metadata for list endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Field-level validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T> ApiResponse<T> {
    /// Extract the payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::MissingData` when the envelope carries no `data`.
    pub fn into_data(self) -> Result<T, ApiError> {
        let message = self.message.unwrap_or_else(|| "no message".to_string());
        self.data.ok_or(ApiError::MissingData(message))
    }

    /// Access and refresh tokens carried by this envelope, if any.
    #[must_use]
    pub fn token_pair(&self) -> Option<TokenPair> {
        self.token.as_ref().map(|access| TokenPair {
            access: access.clone().into(),
            refresh: self.refresh_token.clone().map(Into::into),
        })
    }
}

/// Pagination metadata returned by list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// Current page (1-indexed).
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total number of matching documents.
    pub total: u64,
    /// Total number of pages.
    pub pages: u32,
}

impl Pagination {
    /// Whether another page follows this one.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }
}

/// A validation error attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as sent by the client (e.g. `email`).
    #[serde(default, alias = "param", alias = "path")]
    pub field: Option<String>,
    /// Error message.
    #[serde(alias = "msg")]
    pub message: String,
}

/// Backend endpoint paths, relative to the configured base URL.
pub mod endpoints {
    use renomarket_core::{ConversationId, ProductId};

    pub const LOGIN: &str = "/users/login";
    pub const REGISTER: &str = "/users/register";
    pub const PROFILE: &str = "/users/profile";
    pub const REFRESH_TOKEN: &str = "/users/refresh-token";
    pub const CART: &str = "/cart";
    pub const PRODUCTS: &str = "/products";
    pub const PROJECTS: &str = "/projects";
    pub const PROFESSIONALS: &str = "/professionals";
    pub const ARTICLES: &str = "/articles";
    pub const FORUM: &str = "/forum";
    pub const IDEABOOKS: &str = "/ideabooks";
    pub const CONVERSATIONS: &str = "/messages/conversations";
    pub const SEARCH_SUGGESTIONS: &str = "/search/suggestions";

    /// `/cart/items/:productId`
    #[must_use]
    pub fn cart_item(product_id: &ProductId) -> String {
        format!("/cart/items/{}", urlencoding::encode(product_id.as_str()))
    }

    /// `/messages/conversations/:id/messages`
    #[must_use]
    pub fn conversation_messages(id: &ConversationId) -> String {
        format!("{CONVERSATIONS}/{}/messages", urlencoding::encode(id.as_str()))
    }

    /// `/messages/conversations/:id/read`
    #[must_use]
    pub fn conversation_read(id: &ConversationId) -> String {
        format!("{CONVERSATIONS}/{}/read", urlencoding::encode(id.as_str()))
    }

    /// `<collection>/:id` for catalog detail pages.
    #[must_use]
    pub fn detail(collection: &str, id: &str) -> String {
        format!("{collection}/{}", urlencoding::encode(id))
    }

    /// Append URL-encoded query parameters, skipping empty values.
    #[must_use]
    pub fn with_query(endpoint: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        if query.is_empty() {
            endpoint.to_string()
        } else {
            format!("{endpoint}?{query}")
        }
    }

    /// Whether `endpoint` targets the token refresh route.
    #[must_use]
    pub fn is_refresh(endpoint: &str) -> bool {
        endpoint.contains(REFRESH_TOKEN)
    }
}
