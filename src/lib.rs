// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Marketplace client: authenticated access to the service marketplace API.
//!
//! This crate owns the access/refresh token lifecycle and routes every
//! protected call through a single dispatch path that refreshes expired
//! tokens transparently.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::ClientConfig;
pub use error::{Result, SessionError};
pub use services::{AuthApi, SessionManager};
