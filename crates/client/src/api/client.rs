//! REST client with transparent token refresh.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::storage::{TokenKey, TokenPair, TokenStore};
use super::{ApiError, ApiResponse, endpoints};
use crate::config::ClientConfig;

/// Client for the marketplace REST backend.
///
/// # Authentication
///
/// The access token is read from the [`TokenStore`] before every request and
/// sent as `Authorization: Bearer`. When a request comes back `401`, the
/// client exchanges the stored refresh token, persists the new pair and
/// replays the request exactly once. Refreshes are single-flight: requests
/// that fail concurrently wait for the refresh already in progress and replay
/// with its token instead of starting their own.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenStore>,
    /// Held for the duration of a refresh exchange
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config,
                tokens,
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Token store shared with the session services.
    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Whether an access token is currently stored.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner.tokens.get(TokenKey::Access).is_some()
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// `GET` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::GET, endpoint, None).await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// `PUT` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    /// `DELETE` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<ApiResponse<T>, ApiError> {
        self.request(Method::DELETE, endpoint, None).await
    }

    // =========================================================================
    // Request Execution
    // =========================================================================

    /// Execute a request, refreshing the token and replaying once on `401`.
    ///
    /// The replay's outcome is returned as-is, success or failure; it is
    /// never refreshed again.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` for non-2xx responses (including the
    /// original `401` when refresh fails), `ApiError::Http` on network
    /// failures and `ApiError::Parse` when the body is not a valid envelope.
    #[instrument(skip(self, body), fields(method = %method, endpoint = %endpoint))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let sent_token = self.inner.tokens.get(TokenKey::Access);
        let response = self
            .send(&method, endpoint, body.as_ref(), sent_token.as_ref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED && !endpoints::is_refresh(endpoint) {
            let original = status_error(response).await;

            let Some(token) = self.refresh_after_unauthorized(sent_token.as_ref()).await else {
                return Err(original);
            };

            debug!("Replaying request with refreshed token");
            let retry = self
                .send(&method, endpoint, body.as_ref(), Some(&token))
                .await?;
            return parse_response(retry).await;
        }

        parse_response(response).await
    }

    async fn send(
        &self,
        method: &Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
        token: Option<&SecretString>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.inner.config.endpoint_url(endpoint);
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut request = self
            .inner
            .client
            .request(method.clone(), &url)
            .header("Accept", "application/json")
            .header("X-Request-Id", &request_id);

        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        debug!(status = %response.status(), request_id = %request_id, "Backend responded");
        Ok(response)
    }

    /// Obtain a usable access token after a `401`.
    ///
    /// Returns `None` when the session cannot be recovered, in which case
    /// both stored tokens have been removed.
    async fn refresh_after_unauthorized(&self, sent: Option<&SecretString>) -> Option<SecretString> {
        let _guard = self.inner.refresh_lock.lock().await;

        // Another request rotated the token while this one waited for the lock.
        if let Some(current) = self.inner.tokens.get(TokenKey::Access)
            && sent.is_none_or(|sent| sent.expose_secret() != current.expose_secret())
        {
            debug!("Token already refreshed by a concurrent request");
            return Some(current);
        }

        let Some(refresh_token) = self.inner.tokens.get(TokenKey::Refresh) else {
            warn!("Unauthorized and no refresh token stored, clearing session");
            self.clear_tokens();
            return None;
        };

        match self.exchange_refresh_token(&refresh_token).await {
            Ok(pair) => {
                if let Err(e) = self.inner.tokens.store_pair(&pair) {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                }
                debug!("Access token refreshed");
                Some(pair.access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.clear_tokens();
                None
            }
        }
    }

    /// `POST` the refresh token. Never goes through [`ApiClient::request`],
    /// so a rejected refresh cannot recurse.
    #[instrument(skip_all)]
    async fn exchange_refresh_token(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshRequest<'a> {
            refresh_token: &'a str,
        }

        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        })?;

        let response = self
            .send(&Method::POST, endpoints::REFRESH_TOKEN, Some(&body), None)
            .await?;
        let envelope: ApiResponse<serde_json::Value> = parse_response(response).await?;

        if !envelope.success {
            return Err(ApiError::Status {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: envelope.message,
                data: None,
            });
        }

        envelope
            .token_pair()
            .ok_or_else(|| ApiError::MissingData("refresh response has no token".to_string()))
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }
}

// =============================================================================
// Response Handling
// =============================================================================

/// Turn a response into an envelope, or a `Status` error for non-2xx.
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<ApiResponse<T>, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(status_error(response).await);
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        // 204 No Content and friends
        return Ok(serde_json::from_str(r#"{"success": true}"#)?);
    }

    serde_json::from_str(&text).map_err(|e| {
        warn!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

/// Consume a non-2xx response into `ApiError::Status`.
async fn status_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let data = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());
    let message = data
        .as_ref()
        .and_then(|body| body.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    ApiError::Status {
        status,
        message,
        data,
    }
}
