//! Account endpoints shared by user and business accounts.
//!
//! Both account kinds expose the same register / OTP / login / profile
//! flow under their own path prefix. Every operation returns an
//! `OperationResult`; failures never escape as errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{AuthEvent, SessionManager};

use super::error::GENERIC_FAILURE;
use super::models::{ImageFile, UserProfile};
use super::{validate, ApiError, Envelope, Method, OperationResult, SessionRequest};

const REGISTRATION_FAILED: &str = "Registration failed.";
const SEND_OTP_FAILED: &str = "Failed to send OTP.";
const FORGOT_PASSWORD_SENT: &str = "OTP sent to your email for verification!";
const PASSWORD_RESET_DONE: &str = "Password reset successful!";
const UPLOAD_FAILED: &str = "Failed to upload image";

/// Multipart field the upload endpoint reads the image from.
const PROFILE_IMAGE_FIELD: &str = "profileImage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    User,
    Business,
}

impl AccountKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            AccountKind::User => "/api/v1/users",
            AccountKind::Business => "/api/v1/business",
        }
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.prefix(), name)
    }

    /// `endpoint(name)` followed by `id` percent-encoded as one segment.
    pub fn resource(&self, name: &str, id: &str) -> String {
        format!("{}/{}/{}", self.prefix(), name, urlencoding::encode(id))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::User => "user",
            AccountKind::Business => "business",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "users" => Ok(AccountKind::User),
            "business" | "businesses" => Ok(AccountKind::Business),
            other => Err(format!("Unknown account kind: {}", other)),
        }
    }
}

/// Account operations for the session's account kind.
#[derive(Clone)]
pub struct AccountApi {
    session: SessionManager,
}

impl AccountApi {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn endpoint(&self, name: &str) -> String {
        self.session.account().endpoint(name)
    }

    /// Publish a failure event and convert to an operation result.
    fn finish<T>(&self, result: Result<T, ApiError>, fallback: &str) -> OperationResult<T> {
        if let Err(ref e) = result {
            self.session.publish(AuthEvent::Failed {
                message: e.user_message(fallback),
            });
        }
        OperationResult::from_result(result, fallback)
    }

    /// Like `finish`, keeping the server's message on success.
    fn finish_envelope(&self, result: Result<Envelope, ApiError>, fallback: &str) -> OperationResult<Envelope> {
        if let Err(ref e) = result {
            self.session.publish(AuthEvent::Failed {
                message: e.user_message(fallback),
            });
        }
        SessionManager::envelope_result_or(result, fallback)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> OperationResult<Envelope> {
        self.session.publish(AuthEvent::Requested);
        let result = async {
            validate::name(name)?;
            validate::email(email)?;
            validate::password(password)?;
            let request = SessionRequest::post(
                self.endpoint("register"),
                json!({ "name": name, "email": email, "password": password }),
            );
            self.session.execute(&request).await
        }
        .await;

        if let Ok(ref envelope) = result {
            info!(account = %self.session.account(), "Account registered");
            self.session.publish(AuthEvent::Registered {
                message: envelope.message.clone(),
            });
        }
        self.finish_envelope(result, REGISTRATION_FAILED)
    }

    pub async fn send_otp(&self, email: &str) -> OperationResult<Envelope> {
        self.session.publish(AuthEvent::Requested);
        let result = async {
            validate::email(email)?;
            let request = SessionRequest::post(self.endpoint("send-otp"), json!({ "email": email }));
            self.session.execute(&request).await
        }
        .await;

        if let Ok(ref envelope) = result {
            self.session.publish(AuthEvent::OtpSent {
                message: envelope.message.clone(),
            });
        }
        self.finish_envelope(result, SEND_OTP_FAILED)
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> OperationResult<Envelope> {
        self.session.verify_otp(email, otp).await
    }

    pub async fn login(&self, email: &str, password: &str) -> OperationResult<Envelope> {
        self.session.login(email, password).await
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    /// Ask the server to email a password-reset OTP.
    pub async fn forgot_password(&self, email: &str) -> OperationResult<()> {
        let result = async {
            validate::email(email)?;
            let request = SessionRequest::post(self.endpoint("forgot-password"), json!({ "email": email }));
            self.session.execute(&request).await.map(|_| ())
        }
        .await;
        self.finish(result, GENERIC_FAILURE)
            .with_success_message(FORGOT_PASSWORD_SENT)
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> OperationResult<()> {
        let result = async {
            validate::email(email)?;
            validate::password(new_password)?;
            let request = SessionRequest::post(
                self.endpoint("reset-password"),
                json!({ "email": email, "newPassword": new_password }),
            );
            self.session.execute(&request).await.map(|_| ())
        }
        .await;
        self.finish(result, "Password reset failed.")
            .with_success_message(PASSWORD_RESET_DONE)
    }

    pub async fn fetch_profile(&self, id: &str) -> OperationResult<UserProfile> {
        let result = async {
            validate::account_id(id)?;
            let request = SessionRequest::get(self.session.account().resource("profile", id)).authed();
            let envelope = self.session.execute_with_refresh(&request).await?;
            let profile: UserProfile = envelope.data_as()?;
            if let Some(data) = envelope.data {
                self.session.publish(AuthEvent::ProfileLoaded { user: data });
            }
            Ok::<_, ApiError>(profile)
        }
        .await;
        self.finish(result, "Failed to load profile.")
    }

    pub async fn update_profile(&self, fields: Value) -> OperationResult<Envelope> {
        let request = SessionRequest::put(self.endpoint("update-profile"), fields).authed();
        let result = self.session.execute_with_refresh(&request).await;
        self.finish_envelope(result, "Failed to update profile.")
    }

    /// Delete the account; on success the local session is dropped too.
    pub async fn delete_account(&self, id: &str, password: &str) -> OperationResult<()> {
        let result = async {
            validate::account_id(id)?;
            let request = SessionRequest::delete(self.session.account().resource("profile", id))
                .with_json(json!({ "password": password }))
                .authed();
            self.session.execute_with_refresh(&request).await.map(|_| ())
        }
        .await;
        if result.is_ok() {
            info!(account = %self.session.account(), "Account deleted");
            self.session.logout();
        }
        self.finish(result, "Failed to delete account.")
    }

    /// Upload a profile image and point the profile at it. Returns the
    /// image URL.
    pub async fn upload_profile_image(&self, file: ImageFile) -> OperationResult<String> {
        let request = SessionRequest::new(Method::Post, self.endpoint("upload-profile-image"))
            .with_file(PROFILE_IMAGE_FIELD, file)
            .authed();
        let result = async {
            let envelope = self.session.execute_with_refresh(&request).await?;
            envelope
                .string_field("profileImageUrl")
                .ok_or_else(|| ApiError::InvalidResponse("upload response is missing profileImageUrl".into()))
        }
        .await;

        let url = match result {
            Ok(url) => url,
            Err(e) => return self.finish(Err(e), UPLOAD_FAILED),
        };

        let updated = self.update_profile(json!({ "profileImage": url })).await;
        if !updated.success {
            return OperationResult::failure(
                updated.message.unwrap_or_else(|| UPLOAD_FAILED.to_string()),
            );
        }
        OperationResult::ok(url).with_message(Some("Profile image updated successfully!".into()))
    }
}
