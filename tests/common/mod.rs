// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process mock of the marketplace backend for integration tests.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use marketplace_client::config::ClientConfig;
use marketplace_client::services::{MemoryTokenStore, SessionManager};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "Secret123!";

type Reply = (StatusCode, Json<Value>);

/// Mutable backend behavior shared with the test body.
#[derive(Default)]
pub struct BackendState {
    valid_access: Mutex<HashSet<String>>,
    valid_refresh: Mutex<HashSet<String>>,
    minted: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_delay_ms: AtomicU64,
    rotate_refresh: AtomicBool,
    unauthorized_hits: AtomicUsize,
    admin: AtomicBool,
    drop_refresh: AtomicBool,
    fail_identity: AtomicBool,
}

impl BackendState {
    fn mint(&self, kind: &str) -> String {
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", kind, n)
    }

    fn mint_access(&self) -> String {
        let token = self.mint("access");
        self.valid_access.lock().unwrap().insert(token.clone());
        token
    }

    fn mint_refresh(&self) -> String {
        let token = self.mint("refresh");
        self.valid_refresh.lock().unwrap().insert(token.clone());
        token
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.valid_access.lock().unwrap().contains(token))
    }
}

/// A running mock backend bound to an ephemeral port.
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

#[allow(dead_code)]
impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());

        let app = Router::new()
            .route("/auth/login/", post(login))
            .route("/auth/refresh/", post(refresh))
            .route("/auth/me/", get(me))
            .route("/auth/register/", post(register))
            .route("/auth/password/change/", post(change_password))
            .route("/services/", get(services))
            .route("/admin/analytics/", get(analytics))
            .route("/always-unauthorized/", get(always_unauthorized))
            .route("/broken/", get(broken))
            .route("/echo-auth/", get(echo_auth))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_base_url(&self.base_url)
    }

    /// Every access token issued so far stops being accepted.
    pub fn expire_access_tokens(&self) {
        self.state.valid_access.lock().unwrap().clear();
    }

    /// Every refresh token issued so far stops being accepted.
    pub fn revoke_refresh_tokens(&self) {
        self.state.valid_refresh.lock().unwrap().clear();
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn rotate_refresh_tokens(&self) {
        self.state.rotate_refresh.store(true, Ordering::SeqCst);
    }

    /// `/auth/refresh/` closes the connection without answering.
    pub fn drop_refresh_connections(&self) {
        self.state.drop_refresh.store(true, Ordering::SeqCst);
    }

    /// `/auth/me/` answers 500 even for valid tokens.
    pub fn fail_identity_fetch(&self) {
        self.state.fail_identity.store(true, Ordering::SeqCst);
    }

    pub fn make_admin(&self) {
        self.state.admin.store(true, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn unauthorized_hits(&self) -> usize {
        self.state.unauthorized_hits.load(Ordering::SeqCst)
    }

    /// Session manager against this backend with its own in-memory store.
    pub fn session(&self) -> SessionManager {
        SessionManager::new(self.config(), MemoryTokenStore::new()).expect("session")
    }

    /// Session manager sharing the given store, so tests can inspect it.
    pub fn session_with_store(&self, store: Arc<MemoryTokenStore>) -> SessionManager {
        SessionManager::new(self.config(), store).expect("session")
    }
}

/// Base URL nothing is listening on.
#[allow(dead_code)]
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })),
    )
}

fn user_json(state: &BackendState) -> Value {
    let role = if state.admin.load(Ordering::SeqCst) {
        "ADMIN"
    } else {
        "REGULAR"
    };
    json!({
        "id": 1,
        "email": EMAIL,
        "first_name": "Ada",
        "last_name": "Buyer",
        "role": role,
        "is_active": true,
        "created_at": "2026-01-15T10:00:00Z"
    })
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Reply {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let access = state.mint_access();
        let refresh = state.mint_refresh();
        (
            StatusCode::OK,
            Json(json!({ "tokens": { "access": access, "refresh": refresh } })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
    }
}

async fn refresh(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    if state.drop_refresh.load(Ordering::SeqCst) {
        // Aborts the connection task, so the client sees a closed socket.
        panic!("refresh connection dropped");
    }

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let token = body["refresh"].as_str().unwrap_or_default().to_string();
    let valid = state.valid_refresh.lock().unwrap().contains(&token);
    if !valid {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        );
    }

    let access = state.mint_access();
    if state.rotate_refresh.load(Ordering::SeqCst) {
        state.valid_refresh.lock().unwrap().remove(&token);
        let rotated = state.mint_refresh();
        (
            StatusCode::OK,
            Json(json!({ "access": access, "refresh": rotated })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "access": access })))
    }
}

async fn me(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if state.fail_identity.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "Profile service unavailable" } })),
        );
    }
    (StatusCode::OK, Json(user_json(&state)))
}

async fn register(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    // Like JWT authentication, a stale bearer token is refused even here.
    if headers.contains_key(header::AUTHORIZATION) && !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "id": 42,
            "email": body["email"],
            "first_name": body["first_name"],
            "last_name": body["last_name"],
            "role": body["role"],
            "is_active": true,
            "created_at": "2026-02-01T08:30:00Z"
        })),
    )
}

async fn change_password(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if body["current_password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Current password is incorrect" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "detail": "Password updated successfully" })),
    )
}

async fn services(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([
            { "id": 1, "title": "Pipe repair", "category": "plumbing" },
            { "id": 2, "title": "Lawn mowing", "category": "gardening" }
        ])),
    )
}

async fn analytics(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Reply {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if !state.admin.load(Ordering::SeqCst) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "Admin access required" })),
        );
    }
    (StatusCode::OK, Json(json!({ "total_users": 12 })))
}

async fn always_unauthorized(State(state): State<Arc<BackendState>>) -> Reply {
    state.unauthorized_hits.fetch_add(1, Ordering::SeqCst);
    unauthorized()
}

async fn broken() -> Reply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": { "message": "Database unavailable" } })),
    )
}

async fn echo_auth(headers: HeaderMap) -> Reply {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (StatusCode::OK, Json(json!({ "authorization": auth })))
}
