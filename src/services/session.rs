// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager for the marketplace API.
//!
//! Handles:
//! - Login and identity fetch
//! - Bearer injection on every dispatched request
//! - Single-flight token refresh when a request is rejected (401)
//! - One replay per request, then session teardown

use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::models::{
    ApiRequest, ApiResponse, AuthState, LoginCredentials, LoginResponse, RefreshResponse, User,
};
use crate::services::token_store::{StoredTokens, TokenStore};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/auth/login/";
pub const REFRESH_PATH: &str = "/auth/refresh/";
pub const ME_PATH: &str = "/auth/me/";

/// Live session state. `user` is only populated while `access_token` is.
#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
}

impl Session {
    fn from_stored(stored: StoredTokens) -> Self {
        Self {
            access_token: stored.access_token.filter(|t| !t.is_empty()),
            refresh_token: stored.refresh_token.filter(|t| !t.is_empty()),
            user: None,
        }
    }

    fn to_stored(&self) -> StoredTokens {
        StoredTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Why a refresh did not produce a new access token.
#[derive(Debug, Clone)]
enum RefreshFailure {
    /// No refresh token was held, or the backend refused it.
    Rejected,
    /// The refresh endpoint could not be reached.
    Transport(String),
}

/// The in-flight refresh every concurrent 401 attaches to.
type RefreshFlight = Shared<BoxFuture<'static, std::result::Result<String, RefreshFailure>>>;

struct SessionInner {
    http: reqwest::Client,
    config: ClientConfig,
    store: Box<dyn TokenStore>,
    session: RwLock<Session>,
    /// At most one refresh per session at a time.
    refresh_flight: Mutex<Option<RefreshFlight>>,
}

/// Mediates every authenticated call to the marketplace API.
///
/// Construct one per application and hand clones to collaborators; clones
/// share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Create a logged-out session manager. Call `initialize` to pick up a
    /// persisted session.
    pub fn new(config: ClientConfig, store: impl TokenStore + 'static) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                http,
                config,
                store: Box::new(store),
                session: RwLock::new(Session::default()),
                refresh_flight: Mutex::new(None),
            }),
        })
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Load the persisted token pair and, if an access token is present,
    /// fetch the identity record. A failed fetch clears the session.
    pub async fn initialize(&self) {
        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted tokens, starting logged out");
                StoredTokens::default()
            }
        };

        let needs_identity = {
            let mut session = self.inner.session.write();
            let loaded = Session::from_stored(stored);
            if loaded.access_token != session.access_token {
                session.user = None;
            }
            session.access_token = loaded.access_token;
            session.refresh_token = loaded.refresh_token;
            if session.access_token.is_none() {
                session.user = None;
            }
            session.access_token.is_some() && session.user.is_none()
        };

        if !needs_identity {
            tracing::debug!("No persisted session to restore");
            return;
        }

        match self.refresh_user().await {
            Ok(user) => tracing::info!(user_id = user.id, "Restored persisted session"),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted session is invalid, clearing");
                self.inner.clear_session();
            }
        }
    }

    /// Exchange credentials for a token pair, then fetch the identity record.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let credentials = LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = self
            .inner
            .http
            .post(self.inner.config.endpoint(LOGIN_PATH))
            .json(&credentials)
            .send()
            .await
            .map_err(|e| SessionError::Network(format!("Login request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::Network(format!("Login response failed: {}", e)))?;

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            tracing::info!(status = %status, "Login rejected");
            return Err(SessionError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(SessionError::from_status(status, &body));
        }

        let LoginResponse { tokens } = serde_json::from_slice(&body).map_err(|e| {
            SessionError::InvalidResponse(format!("Failed to parse login response: {}", e))
        })?;

        // The identity fetch goes through dispatch, so the new access token
        // must be in place first.
        {
            let mut session = self.inner.session.write();
            *session = Session {
                access_token: Some(tokens.access),
                refresh_token: Some(tokens.refresh),
                user: None,
            };
            if let Err(e) = self.inner.store.save(&session.to_stored()) {
                *session = Session::default();
                return Err(e);
            }
        }

        match self.refresh_user().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, role = ?user.role, "Logged in");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity fetch after login failed, clearing session");
                self.inner.clear_session();
                Err(e)
            }
        }
    }

    /// Drop tokens and identity. Safe to call when already logged out.
    pub fn logout(&self) {
        self.inner.clear_session();
        tracing::info!("Logged out");
    }

    /// Refetch the identity record from `/auth/me/`.
    pub async fn refresh_user(&self) -> Result<User> {
        let user: User = self.dispatch(ApiRequest::get(ME_PATH)).await?.json()?;

        let mut session = self.inner.session.write();
        if session.access_token.is_some() {
            session.user = Some(user.clone());
        }
        Ok(user)
    }

    /// Current authentication status. Does not contact the server.
    pub fn auth_state(&self) -> AuthState {
        let session = self.inner.session.read();
        let is_authenticated = session.access_token.is_some();
        AuthState {
            is_authenticated,
            user: if is_authenticated {
                session.user.clone()
            } else {
                None
            },
        }
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Send a request to a protected endpoint.
    ///
    /// A 401 triggers (or joins) a refresh and the request is replayed once
    /// with the new token. A second 401, or a failed refresh, ends the
    /// session with `SessionExpired`. Other failures pass through.
    pub async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        loop {
            let token = self.inner.access_token();
            let (status, body) = self.inner.send(&request, token.as_deref()).await?;

            if status.is_success() {
                return Ok(ApiResponse { status, body });
            }
            if status != StatusCode::UNAUTHORIZED {
                return Err(SessionError::from_status(status, &body));
            }

            if request.retried {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    "Request rejected again after refresh, ending session"
                );
                self.inner.expire_session(token.as_deref());
                return Err(SessionError::SessionExpired);
            }

            request.retried = true;
            SessionInner::await_refresh(&self.inner, token.as_deref()).await?;
        }
    }

    /// Send a request to a public endpoint without a bearer token.
    ///
    /// No refresh is attempted, so a 401 here never touches the session.
    pub async fn dispatch_anonymous(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (status, body) = self.inner.send(&request, None).await?;
        if status.is_success() {
            Ok(ApiResponse { status, body })
        } else {
            Err(SessionError::from_status(status, &body))
        }
    }

    /// GET a protected endpoint and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body to a protected endpoint and decode the JSON reply.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.dispatch(ApiRequest::post(path, body)?).await?.json()
    }
}

impl SessionInner {
    fn access_token(&self) -> Option<String> {
        self.session.read().access_token.clone()
    }

    /// Send one attempt of a request, returning status and body.
    async fn send(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);

        let mut builder = self
            .http
            .request(request.method.clone(), self.config.endpoint(&request.path))
            .headers(headers);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            retried = request.retried,
            "Dispatching request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    /// Wait for a refresh that replaces `rejected`, starting one if needed.
    async fn await_refresh(inner: &Arc<Self>, rejected: Option<&str>) -> Result<()> {
        let flight = {
            let mut slot = inner.refresh_flight.lock();

            // Another caller may already have refreshed while our request
            // was in flight.
            let current = inner.access_token();
            if current.is_some() && current.as_deref() != rejected {
                tracing::debug!("Access token already replaced, replaying");
                return Ok(());
            }

            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let flight = Self::start_refresh(Arc::clone(inner));
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        match flight.await {
            Ok(_) => Ok(()),
            Err(RefreshFailure::Rejected) => Err(SessionError::SessionExpired),
            Err(RefreshFailure::Transport(msg)) => Err(SessionError::Network(msg)),
        }
    }

    fn start_refresh(inner: Arc<Self>) -> RefreshFlight {
        async move {
            let used = inner.session.read().refresh_token.clone();
            let outcome = inner.exchange_refresh_token(used.as_deref()).await;

            match &outcome {
                Ok(_) => tracing::info!("Access token refreshed"),
                Err(RefreshFailure::Rejected) => {
                    let mut session = inner.session.write();
                    if session.refresh_token == used {
                        tracing::warn!("Refresh token rejected, ending session");
                        *session = Session::default();
                        inner.forget_stored();
                    }
                }
                Err(RefreshFailure::Transport(e)) => {
                    tracing::warn!(error = %e, "Token refresh could not reach the server");
                }
            }

            inner.refresh_flight.lock().take();
            outcome
        }
        .boxed()
        .shared()
    }

    /// Trade the refresh token for a new access token and commit it.
    async fn exchange_refresh_token(
        &self,
        refresh_token: Option<&str>,
    ) -> std::result::Result<String, RefreshFailure> {
        let Some(refresh_token) = refresh_token else {
            tracing::info!("Access token rejected and no refresh token held");
            return Err(RefreshFailure::Rejected);
        };

        tracing::info!("Access token rejected, refreshing");

        let response = self
            .http
            .post(self.config.endpoint(REFRESH_PATH))
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                RefreshFailure::Transport(format!("Token refresh request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Refresh endpoint refused the refresh token");
            return Err(RefreshFailure::Rejected);
        }

        let refreshed: RefreshResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unreadable refresh response");
            RefreshFailure::Rejected
        })?;

        let mut session = self.session.write();
        if session.refresh_token.as_deref() != Some(refresh_token) {
            // Logged out or logged in again while the refresh was running.
            tracing::debug!("Session changed during refresh, discarding new token");
            return Ok(refreshed.access);
        }

        session.access_token = Some(refreshed.access.clone());
        if let Some(rotated) = refreshed.refresh {
            session.refresh_token = Some(rotated);
        }
        if let Err(e) = self.store.save(&session.to_stored()) {
            tracing::warn!(error = %e, "Failed to persist refreshed token");
        }

        Ok(refreshed.access)
    }

    /// Tear down the session if it still holds the rejected access token.
    fn expire_session(&self, rejected: Option<&str>) {
        let mut session = self.session.write();
        if session.access_token.as_deref() == rejected {
            *session = Session::default();
            self.forget_stored();
        }
    }

    fn clear_session(&self) {
        *self.session.write() = Session::default();
        self.forget_stored();
    }

    fn forget_stored(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted tokens");
        }
    }
}
