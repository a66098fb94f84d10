// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session and API layer.

pub mod auth_api;
pub mod route_guard;
pub mod session;
pub mod token_store;

pub use auth_api::AuthApi;
pub use route_guard::{GuardDecision, RouteGuard};
pub use session::SessionManager;
pub use token_store::{FileTokenStore, MemoryTokenStore, StoredTokens, TokenStore};
