use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use super::transport::HttpResponse;
use super::ApiError;

/// The `{success, message?, data?}` body every endpoint answers with.
///
/// A few endpoints put payload fields at the top level instead of under
/// `data` (`accessToken`, `profileImageUrl`, `categories`); those land in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Decode a transport response, classifying failures.
    ///
    /// - non-2xx: `AuthExpired` for 401, `Business` otherwise
    /// - 2xx with `success: false`: `Business`
    /// - empty 2xx body: an empty envelope
    pub fn from_response(response: HttpResponse) -> Result<Self, ApiError> {
        let parsed: Option<Envelope> = if response.body.trim().is_empty() {
            Some(Envelope::default())
        } else {
            serde_json::from_str(&response.body).ok()
        };

        if !response.is_success() {
            let message = parsed.and_then(|e| e.message);
            return Err(ApiError::from_status(response.status, message));
        }

        let envelope = parsed.ok_or_else(|| {
            ApiError::InvalidResponse(ApiError::truncate_body(&response.body))
        })?;

        if envelope.success == Some(false) {
            return Err(ApiError::Business {
                status: response.status,
                message: envelope.message.filter(|m| !m.trim().is_empty()),
            });
        }
        Ok(envelope)
    }

    /// Look a field up at the top level first, then inside `data`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra
            .get(name)
            .or_else(|| self.data.as_ref().and_then(|d| d.get(name)))
    }

    pub fn string_field(&self, name: &str) -> Option<String> {
        self.field(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Deserialize `data` into a typed payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| ApiError::InvalidResponse("response has no data".into()))?;
        serde_json::from_value(data).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Uniform outcome returned by every public operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct OperationResult<T = Value> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Convert an internal result, using `fallback` when a failure carries
    /// no message of its own.
    pub fn from_result(result: Result<T, ApiError>, fallback: &str) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(err.user_message(fallback)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        OperationResult {
            success: self.success,
            data: self.data.map(f),
            message: self.message,
        }
    }

    /// Replace the message only when the operation succeeded.
    pub fn with_success_message(self, message: &str) -> Self {
        if self.success {
            self.with_message(Some(message.to_string()))
        } else {
            self
        }
    }

    /// Drop the payload, keeping success and message.
    pub fn discard(self) -> OperationResult<()> {
        OperationResult {
            success: self.success,
            data: None,
            message: self.message,
        }
    }
}

impl<T> From<Result<T, ApiError>> for OperationResult<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        Self::from_result(result, super::error::GENERIC_FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_with_data() {
        let env = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":true,"data":{"accessToken":"AT1","user":{"id":"u1"}}}"#,
        ))
        .unwrap();
        assert_eq!(env.string_field("accessToken").as_deref(), Some("AT1"));
        assert_eq!(env.field("user"), Some(&json!({"id": "u1"})));
    }

    #[test]
    fn test_envelope_top_level_fields() {
        let env = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":true,"accessToken":"AT2"}"#,
        ))
        .unwrap();
        assert_eq!(env.string_field("accessToken").as_deref(), Some("AT2"));
        assert!(env.data.is_none());
    }

    #[test]
    fn test_envelope_success_false_is_business_error() {
        let err = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":false,"message":"Invalid OTP"}"#,
        ))
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::Business {
                status: 200,
                message: Some("Invalid OTP".into())
            }
        );
    }

    #[test]
    fn test_envelope_401() {
        let err = Envelope::from_response(HttpResponse::new(
            401,
            r#"{"success":false,"message":"Token expired"}"#,
        ))
        .unwrap_err();
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_envelope_non_json_error_body() {
        let err = Envelope::from_response(HttpResponse::new(502, "<html>Bad Gateway</html>"))
            .unwrap_err();
        assert_eq!(err, ApiError::Business { status: 502, message: None });
    }

    #[test]
    fn test_envelope_non_json_success_body() {
        let err = Envelope::from_response(HttpResponse::new(200, "OK")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_envelope_empty_body() {
        let env = Envelope::from_response(HttpResponse::new(204, "")).unwrap();
        assert_eq!(env, Envelope::default());
    }

    #[test]
    fn test_operation_result_serialization() {
        let ok = OperationResult::ok(json!({"id": "u1"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"success": true, "data": {"id": "u1"}})
        );

        let failed: OperationResult = OperationResult::failure("Login failed.");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"success": false, "message": "Login failed."})
        );
    }

    #[test]
    fn test_operation_result_from_result_uses_fallback() {
        let result: OperationResult<()> = OperationResult::from_result(
            Err(ApiError::Business { status: 400, message: None }),
            "Failed to send OTP.",
        );
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Failed to send OTP."));
    }
}
