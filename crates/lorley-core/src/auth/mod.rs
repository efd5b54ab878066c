//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialPair`: the access/refresh token pair for one session
//! - `TokenStore`: persistence for the pair (memory, JSON file, OS keychain)
//! - `SessionManager`: credentialed requests with single-flight token refresh
//! - `AuthState`: observable login state published on every auth event
//!
//! Tokens are never logged.

pub mod credentials;
pub mod manager;
pub mod state;
pub mod store;

pub use credentials::{CredentialPair, KeyringTokenStore};
pub use manager::{SessionManager, SessionOptions};
pub use state::{AuthEvent, AuthState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
