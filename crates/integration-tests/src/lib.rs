//! Integration tests for the Renomarket client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p renomarket-integration-tests
//! ```
//!
//! No external services are needed: every test starts a [`MockBackend`], an
//! in-process axum server on an ephemeral port that mimics the marketplace
//! REST API (envelopes, bearer auth, token rotation, cart, messaging and a
//! slice of the catalog).
//!
//! # Test Categories
//!
//! - `api_refresh` - Bearer auth and single-flight token refresh
//! - `auth_service` - Login, registration, cold start, logout
//! - `cart_service` - Cart mutations and derived state
//! - `messaging_poll` - Messaging calls and cancellable polling
//! - `catalog_fallback` - Remote catalog and offline fixtures

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use renomarket_client::ClientConfig;
use renomarket_client::api::{ApiClient, MemoryTokenStore, TokenStore};

/// Access token the backend accepts at startup.
pub const INITIAL_ACCESS: &str = "access-0";
/// Refresh token the backend accepts at startup.
pub const INITIAL_REFRESH: &str = "refresh-0";
/// Password accepted by the login endpoint.
pub const PASSWORD: &str = "correct-horse";
/// Email the register endpoint reports as taken.
pub const TAKEN_EMAIL: &str = "taken@renov.fr";

type Reply = (StatusCode, Json<Value>);

/// A request as seen by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: String,
    /// Path relative to `/api`.
    pub path: String,
    /// Bearer token, if one was sent.
    pub token: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Default)]
struct Backend {
    access: String,
    refresh: String,
    rotations: u32,
    refresh_disabled: bool,
    refresh_delay: Duration,
    calls: Vec<RecordedCall>,
    user: Value,
    cart: Vec<(String, u32)>,
    reject_cart: bool,
    cart_override: Option<Value>,
    catalog_down: bool,
    messages: HashMap<String, Vec<Value>>,
    message_seq: u32,
}

/// Shared state behind the mock routes.
pub struct MockState {
    backend: Mutex<Backend>,
    refresh_calls: AtomicU32,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| token == self.lock().access)
    }
}

/// Running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: std::net::SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    /// Start a backend on an ephemeral loopback port.
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            backend: Mutex::new(Backend {
                access: INITIAL_ACCESS.to_string(),
                refresh: INITIAL_REFRESH.to_string(),
                user: json!({
                    "_id": "u1",
                    "firstName": "Claire",
                    "lastName": "Martin",
                    "email": "claire@renov.fr",
                    "userType": "particulier"
                }),
                messages: HashMap::from([(
                    "c1".to_string(),
                    vec![message("m0", "pro1", "Bonjour, votre devis est prêt")],
                )]),
                ..Backend::default()
            }),
            refresh_calls: AtomicU32::new(0),
        });

        let api = Router::new()
            .route("/users/login", post(login))
            .route("/users/register", post(register))
            .route("/users/profile", get(profile).put(update_profile))
            .route("/users/refresh-token", post(refresh_token))
            .route("/cart", get(get_cart).post(add_to_cart).delete(clear_cart))
            .route("/cart/items/{id}", put(update_cart_item).delete(remove_cart_item))
            .route("/products", get(products))
            .route("/products/{id}", get(product))
            .route("/messages/conversations", get(conversations).post(start_conversation))
            .route(
                "/messages/conversations/{id}/messages",
                get(conversation_messages).post(send_message),
            )
            .route("/messages/conversations/{id}/read", put(mark_read));

        let app = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_api_url(&self.api_url()).unwrap()
    }

    /// Client whose store holds the tokens the backend currently accepts.
    #[must_use]
    pub fn logged_in_client(&self) -> (ApiClient, Arc<MemoryTokenStore>) {
        self.client_with(MemoryTokenStore::with_tokens(INITIAL_ACCESS, Some(INITIAL_REFRESH)))
    }

    #[must_use]
    pub fn client_with(&self, store: MemoryTokenStore) -> (ApiClient, Arc<MemoryTokenStore>) {
        let store = Arc::new(store);
        let tokens: Arc<dyn TokenStore> = store.clone();
        (ApiClient::new(self.config(), tokens).unwrap(), store)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of calls to the refresh endpoint.
    #[must_use]
    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Calls whose path is exactly `path`.
    #[must_use]
    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    /// Access token the backend currently accepts.
    #[must_use]
    pub fn access_token(&self) -> String {
        self.state.lock().access.clone()
    }

    // =========================================================================
    // Scenario Setup
    // =========================================================================

    /// Make the backend reject the current access token, as if it expired.
    pub fn expire_access_token(&self) {
        self.state.lock().access = "expired-on-server".to_string();
    }

    /// Make the refresh endpoint answer `401`.
    pub fn disable_refresh(&self) {
        self.state.lock().refresh_disabled = true;
    }

    /// Slow down the refresh endpoint so concurrent requests pile up.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().refresh_delay = delay;
    }

    /// Replace the cart with `(product_id, quantity)` lines.
    pub fn set_cart(&self, lines: &[(&str, u32)]) {
        self.state.lock().cart = lines
            .iter()
            .map(|(id, quantity)| ((*id).to_string(), *quantity))
            .collect();
    }

    /// Answer the next cart request with this exact cart body.
    pub fn respond_with_cart(&self, cart: Value) {
        self.state.lock().cart_override = Some(cart);
    }

    /// Answer cart mutations with `success: false`.
    pub fn reject_cart_mutations(&self) {
        self.state.lock().reject_cart = true;
    }

    /// Answer catalog reads with `503`.
    pub fn set_catalog_down(&self, down: bool) {
        self.state.lock().catalog_down = down;
    }

    /// Append a message from another participant.
    pub fn push_message(&self, conversation: &str, content: &str) {
        let mut backend = self.state.lock();
        backend.message_seq += 1;
        let id = format!("m{}", backend.message_seq);
        backend
            .messages
            .entry(conversation.to_string())
            .or_default()
            .push(message(&id, "pro1", content));
    }
}

/// Unit price in euros for mock products.
#[must_use]
pub fn unit_price(product_id: &str) -> u32 {
    match product_id {
        "p1" => 10,
        "p2" => 25,
        _ => 5,
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn message(id: &str, sender: &str, content: &str) -> Value {
    json!({
        "_id": id,
        "sender": sender,
        "content": content,
        "createdAt": "2024-03-01T10:00:00Z",
        "read": false
    })
}

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({"success": false, "message": message})))
}

fn unauthorized() -> Reply {
    fail(StatusCode::UNAUTHORIZED, "Token invalide ou expiré")
}

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let call = RecordedCall {
        method: request.method().to_string(),
        path: request
            .uri()
            .path()
            .trim_start_matches("/api")
            .to_string(),
        token: bearer(request.headers()),
        request_id: request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    state.lock().calls.push(call);
    next.run(request).await
}

// =============================================================================
// Users
// =============================================================================

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    if body["password"] != PASSWORD {
        return fail(StatusCode::UNAUTHORIZED, "Identifiants invalides");
    }
    let backend = state.lock();
    ok(json!({
        "success": true,
        "data": backend.user,
        "token": backend.access,
        "refreshToken": backend.refresh
    }))
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    if body["email"] == TAKEN_EMAIL {
        return fail(StatusCode::BAD_REQUEST, "Cet email est déjà utilisé");
    }

    let mut backend = state.lock();
    backend.user = json!({
        "_id": "u2",
        "firstName": body["firstName"],
        "lastName": body["lastName"],
        "email": body["email"],
        "userType": body["userType"],
        "professionalInfo": body.get("professionalInfo").cloned().unwrap_or(Value::Null)
    });
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {"user": backend.user},
            "token": backend.access,
            "refreshToken": backend.refresh
        })),
    )
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    ok(json!({"success": true, "data": state.lock().user}))
}

async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if let (Some(user), Some(patch)) = (backend.user.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            user.insert(key.clone(), value.clone());
        }
    }
    ok(json!({"success": true, "data": backend.user}))
}

async fn refresh_token(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.lock().refresh_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut backend = state.lock();
    if backend.refresh_disabled || body["refreshToken"] != backend.refresh.as_str() {
        return fail(StatusCode::UNAUTHORIZED, "Refresh token invalide");
    }

    backend.rotations += 1;
    backend.access = format!("access-{}", backend.rotations);
    backend.refresh = format!("refresh-{}", backend.rotations);
    ok(json!({
        "success": true,
        "token": backend.access,
        "refreshToken": backend.refresh
    }))
}

// =============================================================================
// Cart
// =============================================================================

fn cart_json(lines: &[(String, u32)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, quantity)| {
            let unit = unit_price(id);
            json!({
                "product": {"_id": id, "name": format!("Produit {id}"), "price": unit},
                "quantity": quantity,
                "price": unit * quantity
            })
        })
        .collect();
    let total: u32 = lines.iter().map(|(id, q)| unit_price(id) * q).sum();
    json!({"items": items, "totalAmount": total})
}

fn cart_reply(backend: &mut Backend) -> Reply {
    let cart = backend
        .cart_override
        .take()
        .unwrap_or_else(|| cart_json(&backend.cart));
    ok(json!({"success": true, "data": cart}))
}

async fn get_cart(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    cart_reply(&mut state.lock())
}

async fn add_to_cart(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if backend.reject_cart {
        return ok(json!({"success": false, "message": "Stock insuffisant"}));
    }

    let Some(product_id) = body["productId"].as_str() else {
        return fail(StatusCode::BAD_REQUEST, "productId requis");
    };
    let quantity = u32::try_from(body["quantity"].as_u64().unwrap_or(1)).unwrap();

    match backend.cart.iter_mut().find(|(id, _)| id == product_id) {
        Some(line) => line.1 += quantity,
        None => backend.cart.push((product_id.to_string(), quantity)),
    }
    cart_reply(&mut backend)
}

async fn update_cart_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if backend.reject_cart {
        return ok(json!({"success": false, "message": "Stock insuffisant"}));
    }

    let quantity = u32::try_from(body["quantity"].as_u64().unwrap_or(0)).unwrap();
    let Some(line) = backend.cart.iter_mut().find(|(id, _)| *id == product_id) else {
        return fail(StatusCode::NOT_FOUND, "Produit absent du panier");
    };
    line.1 = quantity;
    cart_reply(&mut backend)
}

async fn remove_cart_item(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if backend.reject_cart {
        return ok(json!({"success": false, "message": "Panier verrouillé"}));
    }

    let before = backend.cart.len();
    backend.cart.retain(|(id, _)| *id != product_id);
    if backend.cart.len() == before {
        return fail(StatusCode::NOT_FOUND, "Produit absent du panier");
    }
    cart_reply(&mut backend)
}

async fn clear_cart(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if backend.reject_cart {
        return ok(json!({"success": false, "message": "Panier verrouillé"}));
    }
    backend.cart.clear();
    cart_reply(&mut backend)
}

// =============================================================================
// Catalog
// =============================================================================

fn catalog_products() -> Value {
    json!([
        {"_id": "p1", "name": "Robinet mitigeur", "price": 10, "category": "salle-de-bain", "stock": 4},
        {"_id": "p2", "name": "Dalle vinyle", "price": 25, "category": "sols", "stock": 0}
    ])
}

async fn products(State(state): State<Arc<MockState>>) -> Reply {
    if state.lock().catalog_down {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Maintenance");
    }
    ok(json!({
        "success": true,
        "data": catalog_products(),
        "pagination": {"page": 1, "limit": 12, "total": 2, "pages": 1}
    }))
}

async fn product(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Reply {
    if state.lock().catalog_down {
        return fail(StatusCode::SERVICE_UNAVAILABLE, "Maintenance");
    }
    catalog_products()
        .as_array()
        .and_then(|items| items.iter().find(|p| p["_id"] == id.as_str()).cloned())
        .map_or_else(
            || fail(StatusCode::NOT_FOUND, "Produit introuvable"),
            |p| ok(json!({"success": true, "data": p})),
        )
}

// =============================================================================
// Messaging
// =============================================================================

async fn conversations(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let backend = state.lock();
    let mut ids: Vec<&String> = backend.messages.keys().collect();
    ids.sort();
    let list: Vec<Value> = ids
        .into_iter()
        .map(|id| {
            let messages = &backend.messages[id];
            let unread = messages.iter().filter(|m| m["read"] == false).count();
            json!({
                "_id": id,
                "participants": [
                    {"_id": "u1", "firstName": "Claire", "lastName": "Martin"},
                    {"_id": "pro1", "firstName": "Atelier", "lastName": "Bois"}
                ],
                "lastMessage": messages.last(),
                "unreadCount": unread
            })
        })
        .collect();
    ok(json!({"success": true, "data": list}))
}

async fn start_conversation(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    backend.message_seq += 1;
    let conversation_id = format!("c-new-{}", backend.message_seq);
    let first = message(
        &format!("m{}", backend.message_seq),
        "u1",
        body["content"].as_str().unwrap_or_default(),
    );
    backend
        .messages
        .insert(conversation_id.clone(), vec![first.clone()]);
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "_id": conversation_id,
                "participants": [
                    {"_id": "u1", "firstName": "Claire", "lastName": "Martin"},
                    {"_id": body["recipientId"], "firstName": "Pro"}
                ],
                "lastMessage": first,
                "unreadCount": 0
            }
        })),
    )
}

async fn conversation_messages(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.lock().messages.get(&id).map_or_else(
        || fail(StatusCode::NOT_FOUND, "Conversation introuvable"),
        |messages| ok(json!({"success": true, "data": messages})),
    )
}

async fn send_message(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    if !backend.messages.contains_key(&id) {
        return fail(StatusCode::NOT_FOUND, "Conversation introuvable");
    }
    backend.message_seq += 1;
    let sent = message(
        &format!("m{}", backend.message_seq),
        "u1",
        body["content"].as_str().unwrap_or_default(),
    );
    if let Some(messages) = backend.messages.get_mut(&id) {
        messages.push(sent.clone());
    }
    (StatusCode::CREATED, Json(json!({"success": true, "data": sent})))
}

async fn mark_read(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let mut backend = state.lock();
    let Some(messages) = backend.messages.get_mut(&id) else {
        return fail(StatusCode::NOT_FOUND, "Conversation introuvable");
    };
    for message in messages.iter_mut() {
        message["read"] = Value::Bool(true);
    }
    ok(json!({"success": true}))
}
