use crate::models::AdminMe;
use iw_dashboard_common::{DashboardError, Result};

/// Who is signed in, resolved once at startup and shared by every view.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthContext {
    #[default]
    Unknown,
    Anonymous,
    Admin(AdminMe),
}

impl AuthContext {
    pub fn from_me(me: Option<AdminMe>) -> Self {
        me.map(AuthContext::Admin).unwrap_or(AuthContext::Anonymous)
    }

    pub fn user(&self) -> Option<&AdminMe> {
        match self {
            AuthContext::Admin(me) => Some(me),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthContext::Unknown)
    }

    /// Gate for protected views.
    pub fn require_user(&self) -> Result<&AdminMe> {
        self.user().ok_or(DashboardError::Unauthenticated)
    }

    /// Any 401 drops the session back to anonymous.
    pub fn observe<T>(&mut self, result: &Result<T>) {
        if matches!(result, Err(e) if e.is_unauthenticated()) {
            *self = AuthContext::Anonymous;
        }
    }
}

/// Browser sign-in page for the configured backend.
pub fn login_url(base_url: &str) -> String {
    format!("{}/admin/login/", base_url.trim_end_matches('/'))
}
