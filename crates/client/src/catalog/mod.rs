//! Read-only marketplace catalog.
//!
//! Every catalog read goes through one [`CatalogSource`]. The
//! [`FallbackCatalog`] wraps the live backend and answers from built-in
//! demo fixtures when the backend cannot be reached, so pages stay
//! browsable offline.

mod fixtures;
mod remote;

pub use fixtures::FixtureCatalog;
pub use remote::RemoteCatalog;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use renomarket_core::{ArticleId, ProductId, ProjectId};

use crate::api::ApiError;
use crate::models::{
    Article, ForumTopic, Ideabook, ListQuery, Listing, Product, Professional, Project,
    SearchSuggestion,
};

/// Errors from catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),
}

impl CatalogError {
    /// Whether the failure means the backend is unreachable or broken,
    /// as opposed to a definitive answer such as "not found".
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_unavailable(),
            Self::NotFound { .. } | Self::Rejected(_) => false,
        }
    }
}

/// Source of catalog data.
#[async_trait]
pub trait CatalogSource: Send + Sync + std::fmt::Debug {
    async fn products(&self, query: &ListQuery) -> Result<Listing<Product>, CatalogError>;
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError>;
    async fn projects(&self, query: &ListQuery) -> Result<Listing<Project>, CatalogError>;
    async fn project(&self, id: &ProjectId) -> Result<Project, CatalogError>;
    async fn professionals(&self, query: &ListQuery) -> Result<Listing<Professional>, CatalogError>;
    async fn articles(&self, query: &ListQuery) -> Result<Listing<Article>, CatalogError>;
    async fn article(&self, id: &ArticleId) -> Result<Article, CatalogError>;
    async fn forum_topics(&self, query: &ListQuery) -> Result<Listing<ForumTopic>, CatalogError>;
    /// The logged-in user's ideabooks.
    async fn ideabooks(&self) -> Result<Vec<Ideabook>, CatalogError>;
    async fn search_suggestions(&self, text: &str) -> Result<Vec<SearchSuggestion>, CatalogError>;
}

/// Serves `primary`, switching to `fallback` for any read whose primary
/// failure is [`CatalogError::is_unavailable`].
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    primary: Arc<dyn CatalogSource>,
    fallback: Arc<dyn CatalogSource>,
}

impl FallbackCatalog {
    #[must_use]
    pub fn new(primary: Arc<dyn CatalogSource>, fallback: Arc<dyn CatalogSource>) -> Self {
        Self { primary, fallback }
    }

    fn falls_back(error: &CatalogError, operation: &'static str) -> bool {
        if error.is_unavailable() {
            warn!(operation, error = %error, "Backend unavailable, serving offline fixtures");
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl CatalogSource for FallbackCatalog {
    async fn products(&self, query: &ListQuery) -> Result<Listing<Product>, CatalogError> {
        match self.primary.products(query).await {
            Err(e) if Self::falls_back(&e, "products") => self.fallback.products(query).await,
            result => result,
        }
    }

    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        match self.primary.product(id).await {
            Err(e) if Self::falls_back(&e, "product") => self.fallback.product(id).await,
            result => result,
        }
    }

    async fn projects(&self, query: &ListQuery) -> Result<Listing<Project>, CatalogError> {
        match self.primary.projects(query).await {
            Err(e) if Self::falls_back(&e, "projects") => self.fallback.projects(query).await,
            result => result,
        }
    }

    async fn project(&self, id: &ProjectId) -> Result<Project, CatalogError> {
        match self.primary.project(id).await {
            Err(e) if Self::falls_back(&e, "project") => self.fallback.project(id).await,
            result => result,
        }
    }

    async fn professionals(&self, query: &ListQuery) -> Result<Listing<Professional>, CatalogError> {
        match self.primary.professionals(query).await {
            Err(e) if Self::falls_back(&e, "professionals") => {
                self.fallback.professionals(query).await
            }
            result => result,
        }
    }

    async fn articles(&self, query: &ListQuery) -> Result<Listing<Article>, CatalogError> {
        match self.primary.articles(query).await {
            Err(e) if Self::falls_back(&e, "articles") => self.fallback.articles(query).await,
            result => result,
        }
    }

    async fn article(&self, id: &ArticleId) -> Result<Article, CatalogError> {
        match self.primary.article(id).await {
            Err(e) if Self::falls_back(&e, "article") => self.fallback.article(id).await,
            result => result,
        }
    }

    async fn forum_topics(&self, query: &ListQuery) -> Result<Listing<ForumTopic>, CatalogError> {
        match self.primary.forum_topics(query).await {
            Err(e) if Self::falls_back(&e, "forum_topics") => {
                self.fallback.forum_topics(query).await
            }
            result => result,
        }
    }

    async fn ideabooks(&self) -> Result<Vec<Ideabook>, CatalogError> {
        match self.primary.ideabooks().await {
            Err(e) if Self::falls_back(&e, "ideabooks") => self.fallback.ideabooks().await,
            result => result,
        }
    }

    async fn search_suggestions(&self, text: &str) -> Result<Vec<SearchSuggestion>, CatalogError> {
        match self.primary.search_suggestions(text).await {
            Err(e) if Self::falls_back(&e, "search_suggestions") => {
                self.fallback.search_suggestions(text).await
            }
            result => result,
        }
    }
}
