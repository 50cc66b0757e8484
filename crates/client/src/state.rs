//! Marketplace session container.

use std::sync::Arc;

use tracing::info;

use crate::api::{ApiClient, FileTokenStore, TokenStore};
use crate::catalog::{CatalogSource, FallbackCatalog, FixtureCatalog, RemoteCatalog};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::guard::RouteGuard;
use crate::models::User;
use crate::services::{AuthService, CartService, MessagingService};

/// Every service a front end needs, wired to one [`ApiClient`].
///
/// This struct is cheaply cloneable via `Arc`. Construct it once at startup
/// and pass it to whatever needs it.
#[derive(Clone)]
pub struct Marketplace {
    inner: Arc<MarketplaceInner>,
}

struct MarketplaceInner {
    api: ApiClient,
    auth: AuthService,
    cart: CartService,
    messaging: MessagingService,
    catalog: Arc<dyn CatalogSource>,
    guard: RouteGuard,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("api", &self.inner.api)
            .field("catalog", &self.inner.catalog)
            .finish_non_exhaustive()
    }
}

impl Marketplace {
    /// Wire the services. The catalog serves offline fixtures when
    /// `config.offline_fallback` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let offline_fallback = config.offline_fallback;
        let api = ApiClient::new(config, tokens)?;

        let remote: Arc<dyn CatalogSource> = Arc::new(RemoteCatalog::new(api.clone()));
        let catalog: Arc<dyn CatalogSource> = if offline_fallback {
            Arc::new(FallbackCatalog::new(remote, Arc::new(FixtureCatalog::demo())))
        } else {
            remote
        };

        Ok(Self::with_catalog(api, catalog))
    }

    /// Load configuration from the environment and persist tokens in
    /// `RENOMARKET_TOKEN_FILE`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the token file
    /// cannot be read.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        let tokens = Arc::new(FileTokenStore::open(config.token_file.clone())?);
        Self::new(config, tokens)
    }

    /// Wire the services around an existing client and catalog.
    #[must_use]
    pub fn with_catalog(api: ApiClient, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            inner: Arc::new(MarketplaceInner {
                auth: AuthService::new(api.clone()),
                cart: CartService::new(api.clone()),
                messaging: MessagingService::new(api.clone()),
                api,
                catalog,
                guard: RouteGuard::default(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.inner.api.config()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn messaging(&self) -> &MessagingService {
        &self.inner.messaging
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogSource {
        self.inner.catalog.as_ref()
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.inner.guard
    }

    /// Restore the stored session, then load its cart.
    pub async fn start(&self) -> Option<User> {
        let user = self.inner.auth.initialize().await?;
        self.inner.cart.mount().await;
        info!(user_id = %user.id, "Session started");
        Some(user)
    }

    /// Log out and forget session-scoped state.
    pub fn logout(&self) {
        self.inner.auth.logout();
        self.inner.cart.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::MemoryTokenStore;
    use crate::services::AuthState;

    #[tokio::test]
    async fn test_start_without_session_stays_logged_out() {
        let config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        let market = Marketplace::new(config, Arc::new(MemoryTokenStore::new())).unwrap();

        assert!(market.start().await.is_none());
        assert_eq!(market.auth().state(), AuthState::Unauthenticated);
        assert!(market.cart().cart().is_none());
    }

    #[tokio::test]
    async fn test_offline_fallback_can_be_disabled() {
        let mut config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        config.offline_fallback = false;
        let market = Marketplace::new(config, Arc::new(MemoryTokenStore::new())).unwrap();

        let err = market
            .catalog()
            .products(&crate::models::ListQuery::default())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
