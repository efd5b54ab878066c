use thiserror::Error;

/// Message used when neither the server nor the transport supplied one.
pub const GENERIC_FAILURE: &str = "An error occurred. Please try again.";

/// Message returned once a refresh has failed and the user must log in again.
pub const SESSION_EXPIRED: &str = "Session expired, please log in again.";

/// Errors produced while talking to the Lorley API.
///
/// `Clone` is required because a single refresh outcome is shared between
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, timeout).
    #[error("{0}")]
    Transport(String),

    /// The server answered with `success: false` or a non-2xx status.
    #[error("{}", message.as_deref().unwrap_or(GENERIC_FAILURE))]
    Business { status: u16, message: Option<String> },

    /// HTTP 401 - the access token was rejected.
    #[error("{}", message.as_deref().unwrap_or("Unauthorized - token may be expired"))]
    AuthExpired { message: Option<String> },

    /// Refresh failed; the session cannot be recovered without a new login.
    #[error("{}", SESSION_EXPIRED)]
    SessionExpired,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Input rejected before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("Failed to store credentials: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build the error for a non-2xx response. `message` is the server's
    /// `message` field when the body was a JSON envelope.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let message = message
            .map(|m| Self::truncate_body(&m))
            .filter(|m| !m.trim().is_empty());
        match status {
            401 => ApiError::AuthExpired { message },
            _ => ApiError::Business { status, message },
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired { .. })
    }

    /// Human-readable message for an operation result. A business failure
    /// without a server message falls back to the operation's own text.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Business { message: None, .. } => fallback.to_string(),
            ApiError::Transport(m) if m.is_empty() => fallback.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_401_to_auth_expired() {
        let err = ApiError::from_status(401, Some("jwt expired".into()));
        assert!(err.is_auth_expired());
        assert_eq!(err.to_string(), "jwt expired");
    }

    #[test]
    fn test_from_status_keeps_server_message() {
        let err = ApiError::from_status(409, Some("User already exists".into()));
        assert_eq!(
            err,
            ApiError::Business {
                status: 409,
                message: Some("User already exists".into())
            }
        );
        assert_eq!(err.user_message("Registration failed."), "User already exists");
    }

    #[test]
    fn test_user_message_falls_back_without_server_text() {
        let err = ApiError::from_status(500, Some("   ".into()));
        assert_eq!(err.user_message("Login failed."), "Login failed.");
        assert_eq!(err.to_string(), GENERIC_FAILURE);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }

    #[test]
    fn test_session_expired_message() {
        assert_eq!(ApiError::SessionExpired.to_string(), SESSION_EXPIRED);
    }
}
