// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed wrappers for the account endpoints under `/auth/`.

use crate::error::Result;
use crate::models::{ApiRequest, PasswordChangeData, RegisterUserData, User};
use crate::services::session::SessionManager;

const REGISTER_PATH: &str = "/auth/register/";
const PASSWORD_CHANGE_PATH: &str = "/auth/password/change/";

/// Account operations routed through the session's dispatch path.
#[derive(Clone)]
pub struct AuthApi {
    session: SessionManager,
}

impl AuthApi {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// Create a new account. Does not log in, and never sends the held
    /// access token.
    pub async fn register(&self, data: &RegisterUserData) -> Result<User> {
        let user: User = self
            .session
            .dispatch_anonymous(ApiRequest::post(REGISTER_PATH, data)?)
            .await?
            .json()?;
        tracing::info!(user_id = user.id, role = ?user.role, "Registered account");
        Ok(user)
    }

    /// Fetch the identity record and update the session's cached copy.
    pub async fn current_user(&self) -> Result<User> {
        self.session.refresh_user().await
    }

    pub async fn change_password(&self, data: &PasswordChangeData) -> Result<()> {
        self.session
            .dispatch(ApiRequest::post(PASSWORD_CHANGE_PATH, data)?)
            .await?;
        tracing::info!("Password changed");
        Ok(())
    }
}
