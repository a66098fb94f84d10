// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod request;
pub mod user;

pub use request::{ApiRequest, ApiResponse};
pub use user::{
    AuthState, AuthTokens, LoginCredentials, LoginResponse, PasswordChangeData, RefreshResponse,
    RegisterUserData, User, UserRole,
};
