//! Authentication session.
//!
//! ```text
//!                 login / register
//! Unauthenticated ─────────────────────────────┐
//!     │  ▲                                     ▼
//!     │  │ profile fetch fails          Authenticated(User)
//!     ▼  │                                     ▲
//!  Loading ────────────────────────────────────┘
//!   (token stored)      profile fetched
//! ```
//!
//! `logout` returns to `Unauthenticated` from any state.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use renomarket_core::{Email, UserType};

use super::SessionError;
use crate::api::{ApiClient, ApiResponse, endpoints};
use crate::models::{ProfessionalInfo, RegisterRequest, User, UserPatch};

/// Where the session stands.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// No stored token, or the stored token was rejected.
    #[default]
    Unauthenticated,
    /// A token is stored and the profile fetch has not completed.
    Loading,
    /// Profile loaded.
    Authenticated(Box<User>),
}

impl AuthState {
    /// The logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Authentication service.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    api: ApiClient,
    state: watch::Sender<AuthState>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

/// `data` of login, register and profile responses. Older backend routes
/// nest the user under `user`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserPayload {
    Nested { user: User },
    Flat(User),
}

impl UserPayload {
    fn into_user(self) -> User {
        match self {
            Self::Nested { user } | Self::Flat(user) => user,
        }
    }
}

impl AuthService {
    /// Create the service. Starts in `Loading` when a token is already
    /// stored, `Unauthenticated` otherwise. Performs no I/O.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let initial = if api.has_token() {
            AuthState::Loading
        } else {
            AuthState::Unauthenticated
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(AuthInner { api, state }),
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// The logged-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Cold start: load the profile for the stored token.
    ///
    /// Without a stored token this returns `None` immediately. A failed
    /// profile fetch clears the stored tokens.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Option<User> {
        if !self.inner.api.has_token() {
            self.inner.state.send_replace(AuthState::Unauthenticated);
            return None;
        }

        self.inner.state.send_replace(AuthState::Loading);

        match self.fetch_profile().await {
            Ok(user) => {
                debug!(user_id = %user.id, "Session restored");
                self.set_user(user.clone());
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Stored session is no longer valid");
                self.clear_tokens();
                self.inner.state.send_replace(AuthState::Unauthenticated);
                None
            }
        }
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` before any request when the
    /// email is malformed, `SessionError::Api` on transport or status
    /// failures, and `SessionError::Rejected` when the backend refuses the
    /// credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, SessionError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            email: &'a str,
            password: &'a str,
        }

        let email = Email::parse(email)?;
        let response: ApiResponse<UserPayload> = self
            .inner
            .api
            .post(
                endpoints::LOGIN,
                &LoginRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        let user = self.establish_session(response)?;
        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Create an account and log into it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingProfessionalInfo` for professional
    /// accounts without company details, otherwise as [`AuthService::login`].
    #[instrument(skip(self, request), fields(user_type = %request.user_type))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, SessionError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RegisterBody<'a> {
            first_name: &'a str,
            last_name: &'a str,
            email: &'a str,
            password: &'a str,
            user_type: UserType,
            #[serde(skip_serializing_if = "Option::is_none")]
            phone: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            professional_info: Option<&'a ProfessionalInfo>,
        }

        let email = Email::parse(&request.email)?;
        if request.user_type.is_professional() && request.professional_info.is_none() {
            return Err(SessionError::MissingProfessionalInfo);
        }

        let body = RegisterBody {
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
            email: email.as_str(),
            password: request.password.expose_secret(),
            user_type: request.user_type,
            phone: request.phone.as_deref(),
            professional_info: request
                .professional_info
                .as_ref()
                .filter(|_| request.user_type.is_professional()),
        };

        let response: ApiResponse<UserPayload> =
            self.inner.api.post(endpoints::REGISTER, &body).await?;

        let user = self.establish_session(response)?;
        info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Drop the session locally: both tokens are removed and the user is
    /// cleared before this returns. The backend is not contacted.
    pub fn logout(&self) {
        self.clear_tokens();
        self.inner.state.send_replace(AuthState::Unauthenticated);
        info!("Logged out");
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Patch the cached user without contacting the backend.
    ///
    /// Returns `false` when nobody is logged in.
    pub fn update_user(&self, patch: &UserPatch) -> bool {
        self.inner.state.send_if_modified(|state| match state {
            AuthState::Authenticated(user) => {
                user.apply(patch);
                true
            }
            _ => false,
        })
    }

    /// Save profile changes on the backend and adopt the returned user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when nobody is logged in,
    /// `SessionError::Api` when the request fails.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &UserPatch) -> Result<User, SessionError> {
        if !self.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }

        let response: ApiResponse<UserPayload> =
            self.inner.api.put(endpoints::PROFILE, patch).await?;
        if !response.success {
            return Err(rejected(response.message));
        }

        let user = response
            .data
            .map(UserPayload::into_user)
            .ok_or(SessionError::MissingUser)?;
        self.set_user(user.clone());
        Ok(user)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn fetch_profile(&self) -> Result<User, SessionError> {
        let response: ApiResponse<UserPayload> = self.inner.api.get(endpoints::PROFILE).await?;
        if !response.success {
            return Err(rejected(response.message));
        }
        response
            .data
            .map(UserPayload::into_user)
            .ok_or(SessionError::MissingUser)
    }

    /// Persist the token pair, then adopt the user from the same payload.
    fn establish_session(&self, response: ApiResponse<UserPayload>) -> Result<User, SessionError> {
        if !response.success {
            return Err(rejected(response.message));
        }

        let pair = response.token_pair().ok_or(SessionError::MissingToken)?;
        let user = response
            .data
            .map(UserPayload::into_user)
            .ok_or(SessionError::MissingUser)?;

        self.inner.api.tokens().store_pair(&pair)?;
        self.set_user(user.clone());
        Ok(user)
    }

    fn set_user(&self, user: User) {
        self.inner
            .state
            .send_replace(AuthState::Authenticated(Box::new(user)));
    }

    fn clear_tokens(&self) {
        if let Err(e) = self.inner.api.tokens().clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }
}

fn rejected(message: Option<String>) -> SessionError {
    SessionError::Rejected(message.unwrap_or_else(|| "Requête refusée".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::{MemoryTokenStore, TokenKey};
    use crate::config::ClientConfig;

    // Nothing listens on the discard port, so any request would fail fast.
    fn service(store: MemoryTokenStore) -> AuthService {
        let config = ClientConfig::for_api_url("http://127.0.0.1:9/api").unwrap();
        AuthService::new(ApiClient::new(config, Arc::new(store)).unwrap())
    }

    fn user() -> User {
        serde_json::from_value(serde_json::json!({
            "_id": "u1",
            "firstName": "Inès",
            "lastName": "Morel",
            "email": "ines@renov.fr"
        }))
        .unwrap()
    }

    #[test]
    fn test_no_token_starts_unauthenticated() {
        let auth = service(MemoryTokenStore::new());
        assert_eq!(auth.state(), AuthState::Unauthenticated);
        assert!(!auth.is_loading());
        assert!(auth.user().is_none());
    }

    #[test]
    fn test_stored_token_starts_loading() {
        let auth = service(MemoryTokenStore::with_tokens("access", Some("refresh")));
        assert!(auth.is_loading());
    }

    #[tokio::test]
    async fn test_initialize_without_token_makes_no_request() {
        let auth = service(MemoryTokenStore::new());
        assert!(auth.initialize().await.is_none());
        assert_eq!(auth.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_logout_is_synchronous() {
        let auth = service(MemoryTokenStore::with_tokens("access", Some("refresh")));
        auth.set_user(user());
        let mut rx = auth.subscribe();

        auth.logout();

        assert!(auth.user().is_none());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);
        let tokens = auth.inner.api.tokens();
        assert!(tokens.get(TokenKey::Access).is_none());
        assert!(tokens.get(TokenKey::Refresh).is_none());
    }

    #[test]
    fn test_update_user_patches_locally() {
        let auth = service(MemoryTokenStore::new());
        let patch = UserPatch {
            first_name: Some("Agnès".to_string()),
            ..UserPatch::default()
        };
        assert!(!auth.update_user(&patch));

        auth.set_user(user());
        assert!(auth.update_user(&patch));
        let updated = auth.user().unwrap();
        assert_eq!(updated.first_name, "Agnès");
        assert_eq!(updated.last_name, "Morel");
    }

    #[tokio::test]
    async fn test_login_rejects_malformed_email_locally() {
        let auth = service(MemoryTokenStore::new());
        let err = auth
            .login("not-an-email", &SecretString::from("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn test_professional_registration_requires_company() {
        let auth = service(MemoryTokenStore::new());
        let request = RegisterRequest {
            first_name: "Marc".to_string(),
            last_name: "Blanc".to_string(),
            email: "marc@blanc-renov.fr".to_string(),
            password: SecretString::from("motdepasse"),
            user_type: UserType::Professionnel,
            phone: None,
            professional_info: None,
        };
        let err = auth.register(&request).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingProfessionalInfo));
    }

    #[tokio::test]
    async fn test_update_profile_requires_session() {
        let auth = service(MemoryTokenStore::new());
        let err = auth.update_profile(&UserPatch::default()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));
    }

    #[test]
    fn test_user_payload_accepts_nested_and_flat() {
        let nested: UserPayload = serde_json::from_value(serde_json::json!({
            "user": {"_id": "u1", "firstName": "A", "lastName": "B", "email": "a@b.fr"}
        }))
        .unwrap();
        assert_eq!(nested.into_user().id.as_str(), "u1");

        let flat: UserPayload = serde_json::from_value(serde_json::json!({
            "_id": "u2", "firstName": "C", "lastName": "D", "email": "c@d.fr"
        }))
        .unwrap();
        assert_eq!(flat.into_user().id.as_str(), "u2");
    }
}
