//! Role-based route protection as a pure function of `AuthState`.

use crate::models::{AuthState, UserRole};

/// What a view should do with the current visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Not logged in: send to the login view.
    RedirectToLogin,
    /// Logged in with a role outside the allow-list: send to the default view.
    RedirectToDefault,
}

/// Static allow-list for one protected route.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    allowed_roles: Option<Vec<UserRole>>,
}

impl RouteGuard {
    /// Any authenticated user may enter.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn for_roles(roles: impl IntoIterator<Item = UserRole>) -> Self {
        Self {
            allowed_roles: Some(roles.into_iter().collect()),
        }
    }

    /// The role is only checked once the identity record is known.
    pub fn check(&self, state: &AuthState) -> GuardDecision {
        if !state.is_authenticated {
            return GuardDecision::RedirectToLogin;
        }

        match (&self.allowed_roles, state.role()) {
            (Some(allowed), Some(role)) if !allowed.contains(&role) => {
                GuardDecision::RedirectToDefault
            }
            _ => GuardDecision::Allow,
        }
    }
}
