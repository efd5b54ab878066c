use serde_json::Value;

use super::models::ImageFile;
use super::transport::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Single-file multipart form, used for image uploads.
    Multipart { field: String, file: ImageFile },
}

/// Description of one API call. Created per call and dropped after the
/// response; the session manager decides which credentials to attach.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    pub requires_auth: bool,
}

impl SessionRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            requires_auth: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_json(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_file(mut self, field: impl Into<String>, file: ImageFile) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            file,
        };
        self
    }

    /// Mark the request as needing the stored access token.
    pub fn authed(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Lower to the wire request the transport sends.
    pub(crate) fn to_http(&self, access_token: Option<String>, refresh_token: Option<String>) -> HttpRequest {
        HttpRequest {
            method: self.method,
            path: self.path.clone(),
            body: self.body.clone(),
            access_token,
            refresh_token,
        }
    }
}
