//! HTTP transport for the Lorley REST API.
//!
//! `Transport` is the seam between the session manager and the network.
//! `ReqwestTransport` is the production implementation; tests swap in a
//! scripted transport.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use tracing::debug;

use super::request::{Method, RequestBody};
use super::ApiError;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cookie carrying the access token.
const ACCESS_COOKIE: &str = "jwt";

/// Cookie carrying the refresh token.
const REFRESH_COOKIE: &str = "refreshToken";

/// A request as it goes on the wire, with the credentials already chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the remote API.
///
/// Implementations return `Err(ApiError::Transport)` only when no response
/// was received; any HTTP status, including 4xx/5xx, is an `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credential_headers(request: &HttpRequest) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let mut cookies = Vec::new();

        if let Some(ref token) = request.access_token {
            headers.insert(header::AUTHORIZATION, Self::header_value(&format!("Bearer {}", token))?);
            cookies.push(format!("{}={}", ACCESS_COOKIE, token));
        }
        if let Some(ref token) = request.refresh_token {
            cookies.push(format!("{}={}", REFRESH_COOKIE, token));
        }
        if !cookies.is_empty() {
            headers.insert(header::COOKIE, Self::header_value(&cookies.join("; "))?);
        }
        Ok(headers)
    }

    fn header_value(value: &str) -> Result<header::HeaderValue, ApiError> {
        header::HeaderValue::from_str(value)
            .map_err(|_| ApiError::Validation("Stored token contains invalid characters".into()))
    }

    fn describe(err: &reqwest::Error) -> String {
        if err.is_timeout() {
            "Request timed out. Please try again.".to_string()
        } else if err.is_connect() {
            "Network error: unable to reach the server.".to_string()
        } else {
            format!("Network error: {}", err)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json")
            .headers(Self::credential_headers(&request)?);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(ref body) => builder.json(body),
            RequestBody::Multipart { field, file } => {
                let part = multipart::Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime_type)
                    .map_err(|e| ApiError::Validation(format!("Invalid file type: {}", e)))?;
                builder.multipart(multipart::Form::new().part(field, part))
            }
        };

        debug!(method = request.method.as_str(), url = %url, "Sending request");

        let response = builder.send().await.map_err(|e| {
            debug!(error = %e, url = %url, "Request failed before a response arrived");
            ApiError::Transport(Self::describe(&e))
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(Self::describe(&e)))?;

        debug!(status, url = %url, "Received response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(access: Option<&str>, refresh: Option<&str>) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            path: "/api/v1/users/profile/u1".into(),
            body: RequestBody::Empty,
            access_token: access.map(String::from),
            refresh_token: refresh.map(String::from),
        }
    }

    #[test]
    fn test_credential_headers_access_token() {
        let headers = ReqwestTransport::credential_headers(&request(Some("AT1"), None)).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer AT1");
        assert_eq!(headers[header::COOKIE], "jwt=AT1");
    }

    #[test]
    fn test_credential_headers_refresh_only() {
        let headers = ReqwestTransport::credential_headers(&request(None, Some("RT1"))).unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(headers[header::COOKIE], "refreshToken=RT1");
    }

    #[test]
    fn test_credential_headers_none() {
        let headers = ReqwestTransport::credential_headers(&request(None, None)).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_credential_headers_rejects_control_chars() {
        let err = ReqwestTransport::credential_headers(&request(Some("bad\ntoken"), None)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport =
            ReqwestTransport::new("http://localhost:5000/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
    }
}
