//! Observable authentication state.
//!
//! The session manager folds every `AuthEvent` into an `AuthState` and
//! publishes the result on a watch channel, so front ends can render
//! loading spinners and error banners without polling.

use serde::Serialize;
use serde_json::Value;

use crate::api::error::SESSION_EXPIRED;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthState {
    pub loading: bool,
    pub authenticated: bool,
    pub user: Option<Value>,
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Requested,
    Registered { message: Option<String> },
    OtpSent { message: Option<String> },
    OtpVerified { message: Option<String> },
    LoggedIn { user: Option<Value> },
    ProfileLoaded { user: Value },
    Refreshed,
    Failed { message: String },
    SessionExpired,
    LoggedOut,
}

impl AuthState {
    /// State for a manager that starts with stored credentials.
    pub fn restored() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    pub fn apply(&self, event: AuthEvent) -> AuthState {
        let mut next = self.clone();
        match event {
            AuthEvent::Requested => {
                next.loading = true;
                next.error = None;
                next.message = None;
            }
            AuthEvent::Registered { message } | AuthEvent::OtpSent { message } => {
                next.loading = false;
                next.message = message;
            }
            AuthEvent::OtpVerified { message } => {
                next.loading = false;
                next.authenticated = true;
                next.message = message;
            }
            AuthEvent::LoggedIn { user } => {
                next.loading = false;
                next.authenticated = true;
                next.user = user;
                next.error = None;
            }
            AuthEvent::ProfileLoaded { user } => {
                next.loading = false;
                next.user = Some(user);
            }
            AuthEvent::Refreshed => {
                next.authenticated = true;
            }
            AuthEvent::Failed { message } => {
                next.loading = false;
                next.error = Some(message);
            }
            AuthEvent::SessionExpired => {
                next.loading = false;
                next.authenticated = false;
                next.error = Some(SESSION_EXPIRED.to_string());
            }
            AuthEvent::LoggedOut => {
                next = AuthState::default();
            }
        }
        next
    }
}
