//! Core library for the Lorley business-directory client.
//!
//! This crate provides:
//! - `api`: HTTP transport, response envelope, and typed account/category endpoints
//! - `auth`: credential storage and the refreshing `SessionManager`
//! - `mail`: OTP email composition for the transactional mail sender
//! - `config`: application configuration and cache locations
//!
//! Front ends (the `lorley` CLI, a future GUI) depend on this crate and
//! share one `SessionManager` per logical session.

pub mod api;
pub mod auth;
pub mod config;
pub mod mail;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AccountApi, AccountKind, ApiError, CategoryApi, OperationResult, ReqwestTransport, Transport};
pub use auth::{AuthState, CredentialPair, SessionManager, SessionOptions, TokenStore};
pub use config::Config;
