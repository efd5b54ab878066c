//! REST API client module for the Lorley backend.
//!
//! This module provides the `Transport` seam over HTTP, the response
//! envelope every endpoint answers with, and typed wrappers for the
//! account (user/business) and category endpoints.
//!
//! Authenticated endpoints accept the access token both as a bearer
//! header and as the `jwt` cookie.

pub mod accounts;
pub mod categories;
pub mod error;
pub mod models;
pub mod request;
pub mod response;
pub mod transport;
pub mod validate;

pub use accounts::{AccountApi, AccountKind};
pub use categories::CategoryApi;
pub use error::ApiError;
pub use models::{Category, ImageFile, UserProfile};
pub use request::{Method, RequestBody, SessionRequest};
pub use response::{Envelope, OperationResult};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
