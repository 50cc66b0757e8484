//! Catalog backed by the REST API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::instrument;

use renomarket_core::{ArticleId, ProductId, ProjectId};

use super::{CatalogError, CatalogSource};
use crate::api::{ApiClient, ApiError, ApiResponse, endpoints};
use crate::models::{
    Article, ForumTopic, Ideabook, ListQuery, Listing, Product, Professional, Project,
    SearchSuggestion,
};

/// Live catalog.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    api: ApiClient,
}

impl RemoteCatalog {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &ListQuery,
    ) -> Result<Listing<T>, CatalogError> {
        let endpoint = endpoints::with_query(collection, &query.to_params());
        let response: ApiResponse<Vec<T>> = self.api.get(&endpoint).await?;
        if !response.success {
            return Err(rejected(response.message));
        }

        let pagination = response.pagination;
        Ok(Listing {
            items: response.into_data()?,
            pagination,
        })
    }

    async fn detail<T: DeserializeOwned>(
        &self,
        collection: &str,
        kind: &'static str,
        id: &str,
    ) -> Result<T, CatalogError> {
        let response: ApiResponse<T> = match self.api.get(&endpoints::detail(collection, id)).await {
            Ok(response) => response,
            Err(ApiError::Status { status: 404, .. }) => {
                return Err(CatalogError::NotFound {
                    kind,
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !response.success {
            return Err(rejected(response.message));
        }
        response.data.ok_or_else(|| CatalogError::NotFound {
            kind,
            id: id.to_string(),
        })
    }
}

fn rejected(message: Option<String>) -> CatalogError {
    CatalogError::Rejected(message.unwrap_or_else(|| "Requête refusée".to_string()))
}

#[async_trait]
impl CatalogSource for RemoteCatalog {
    #[instrument(skip(self))]
    async fn products(&self, query: &ListQuery) -> Result<Listing<Product>, CatalogError> {
        self.list(endpoints::PRODUCTS, query).await
    }

    #[instrument(skip(self))]
    async fn product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.detail(endpoints::PRODUCTS, "product", id.as_str()).await
    }

    #[instrument(skip(self))]
    async fn projects(&self, query: &ListQuery) -> Result<Listing<Project>, CatalogError> {
        self.list(endpoints::PROJECTS, query).await
    }

    #[instrument(skip(self))]
    async fn project(&self, id: &ProjectId) -> Result<Project, CatalogError> {
        self.detail(endpoints::PROJECTS, "project", id.as_str()).await
    }

    #[instrument(skip(self))]
    async fn professionals(&self, query: &ListQuery) -> Result<Listing<Professional>, CatalogError> {
        self.list(endpoints::PROFESSIONALS, query).await
    }

    #[instrument(skip(self))]
    async fn articles(&self, query: &ListQuery) -> Result<Listing<Article>, CatalogError> {
        self.list(endpoints::ARTICLES, query).await
    }

    #[instrument(skip(self))]
    async fn article(&self, id: &ArticleId) -> Result<Article, CatalogError> {
        self.detail(endpoints::ARTICLES, "article", id.as_str()).await
    }

    #[instrument(skip(self))]
    async fn forum_topics(&self, query: &ListQuery) -> Result<Listing<ForumTopic>, CatalogError> {
        self.list(endpoints::FORUM, query).await
    }

    #[instrument(skip(self))]
    async fn ideabooks(&self) -> Result<Vec<Ideabook>, CatalogError> {
        Ok(self.list(endpoints::IDEABOOKS, &ListQuery::default()).await?.items)
    }

    #[instrument(skip(self))]
    async fn search_suggestions(&self, text: &str) -> Result<Vec<SearchSuggestion>, CatalogError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = endpoints::with_query(endpoints::SEARCH_SUGGESTIONS, &[("q", text.to_string())]);
        let response: ApiResponse<Vec<SearchSuggestion>> = self.api.get(&endpoint).await?;
        if !response.success {
            return Err(rejected(response.message));
        }
        Ok(response.data.unwrap_or_default())
    }
}
