//! Integration tests for the authentication session.

#![allow(clippy::unwrap_used)]

use renomarket_client::api::{MemoryTokenStore, TokenKey, TokenStore};
use renomarket_client::models::{ProfessionalInfo, RegisterRequest, UserPatch};
use renomarket_client::services::{AuthService, AuthState, SessionError};
use renomarket_core::UserType;
use renomarket_integration_tests::{INITIAL_ACCESS, MockBackend, PASSWORD, TAKEN_EMAIL};
use secrecy::{ExposeSecret, SecretString};

fn register_request(email: &str, user_type: UserType) -> RegisterRequest {
    RegisterRequest {
        first_name: "Hugo".to_string(),
        last_name: "Lefèvre".to_string(),
        email: email.to_string(),
        password: SecretString::from("motdepasse-solide"),
        user_type,
        phone: None,
        professional_info: None,
    }
}

// =============================================================================
// Cold Start
// =============================================================================

#[tokio::test]
async fn test_no_stored_token_means_no_network_call() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.client_with(MemoryTokenStore::new());
    let auth = AuthService::new(api);

    assert_eq!(auth.state(), AuthState::Unauthenticated);
    assert!(!auth.is_loading());
    assert!(auth.initialize().await.is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_stored_token_loads_profile() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.logged_in_client();
    let auth = AuthService::new(api);
    let mut rx = auth.subscribe();

    assert!(auth.is_loading());
    let user = auth.initialize().await.unwrap();

    assert_eq!(user.email.as_str(), "claire@renov.fr");
    assert!(auth.is_authenticated());
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().is_authenticated());
    assert_eq!(backend.calls_to("/users/profile").len(), 1);
}

#[tokio::test]
async fn test_rejected_stored_token_returns_to_unauthenticated() {
    let backend = MockBackend::start().await;
    let (api, store) = backend.client_with(MemoryTokenStore::with_tokens("revoked", None));
    let auth = AuthService::new(api);

    assert!(auth.initialize().await.is_none());
    assert_eq!(auth.state(), AuthState::Unauthenticated);
    assert!(store.get(TokenKey::Access).is_none());
}

// =============================================================================
// Login / Register / Logout
// =============================================================================

#[tokio::test]
async fn test_login_persists_tokens_and_sets_user_from_response() {
    let backend = MockBackend::start().await;
    let (api, store) = backend.client_with(MemoryTokenStore::new());
    let auth = AuthService::new(api);

    let user = auth
        .login("  Claire@Renov.fr ", &SecretString::from(PASSWORD))
        .await
        .unwrap();

    assert_eq!(user.display_name(), "Claire Martin");
    assert_eq!(auth.user().unwrap().id.as_str(), "u1");
    assert_eq!(store.get(TokenKey::Access).unwrap().expose_secret(), INITIAL_ACCESS);
    assert!(store.get(TokenKey::Refresh).is_some());
    // No separate profile fetch on login
    assert!(backend.calls_to("/users/profile").is_empty());
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let backend = MockBackend::start().await;
    let (api, store) = backend.client_with(MemoryTokenStore::new());
    let auth = AuthService::new(api);

    let err = auth
        .login("claire@renov.fr", &SecretString::from("nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Api(ref e) if e.is_unauthorized()));
    assert_eq!(err.user_message(), "Identifiants invalides");
    assert_eq!(auth.state(), AuthState::Unauthenticated);
    assert!(store.get(TokenKey::Access).is_none());
}

#[tokio::test]
async fn test_register_professional_account() {
    let backend = MockBackend::start().await;
    let (api, store) = backend.client_with(MemoryTokenStore::new());
    let auth = AuthService::new(api);

    let mut request = register_request("hugo@lefevre-bati.fr", UserType::Professionnel);
    request.professional_info = Some(ProfessionalInfo {
        company_name: "Lefèvre Bâtiment".to_string(),
        specialties: vec!["maçonnerie".to_string()],
        ..ProfessionalInfo::default()
    });

    let user = auth.register(&request).await.unwrap();

    assert!(user.is_professional());
    assert_eq!(user.professional_info.unwrap().company_name, "Lefèvre Bâtiment");
    assert!(auth.is_authenticated());
    assert!(store.get(TokenKey::Access).is_some());
}

#[tokio::test]
async fn test_register_with_taken_email_surfaces_backend_message() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.client_with(MemoryTokenStore::new());
    let auth = AuthService::new(api);

    let err = auth
        .register(&register_request(TAKEN_EMAIL, UserType::Particulier))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Cet email est déjà utilisé");
    assert!(!auth.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_tokens_and_user_synchronously() {
    let backend = MockBackend::start().await;
    let (api, store) = backend.logged_in_client();
    let auth = AuthService::new(api);
    auth.initialize().await.unwrap();
    let calls_before = backend.calls().len();

    auth.logout();

    assert!(auth.user().is_none());
    assert!(store.get(TokenKey::Access).is_none());
    assert!(store.get(TokenKey::Refresh).is_none());
    // Local only: the backend is not told
    assert_eq!(backend.calls().len(), calls_before);
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_update_profile_adopts_server_copy() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.logged_in_client();
    let auth = AuthService::new(api);
    auth.initialize().await.unwrap();

    let patch = UserPatch {
        phone: Some("0611223344".to_string()),
        ..UserPatch::default()
    };
    let user = auth.update_profile(&patch).await.unwrap();

    assert_eq!(user.phone.as_deref(), Some("0611223344"));
    assert_eq!(auth.user().unwrap().phone.as_deref(), Some("0611223344"));
    assert_eq!(backend.calls_to("/users/profile").len(), 2);
}

#[tokio::test]
async fn test_update_user_is_local_only() {
    let backend = MockBackend::start().await;
    let (api, _) = backend.logged_in_client();
    let auth = AuthService::new(api);
    auth.initialize().await.unwrap();
    let calls_before = backend.calls().len();

    assert!(auth.update_user(&UserPatch {
        last_name: Some("Martin-Roux".to_string()),
        ..UserPatch::default()
    }));

    assert_eq!(auth.user().unwrap().last_name, "Martin-Roux");
    assert_eq!(backend.calls().len(), calls_before);
}
