//! Transactional OTP email.
//!
//! Builds the verification email the backend sends after registration and
//! password-reset requests. Delivery goes through a `Mailer`; the SMTP
//! transport itself lives outside this crate.

pub mod config;
pub mod otp;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::OperationResult;

pub use config::MailConfig;
pub use otp::{OtpEmail, OutgoingMail};

const SEND_FAILED: &str = "Error sending OTP email";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MailError {
    #[error("Email configuration environment variables are missing")]
    MissingConfig,

    #[error("Invalid MAIL_PORT: {0}")]
    InvalidPort(String),

    #[error("No recipient email provided")]
    NoRecipient,

    #[error("Failed to render email: {0}")]
    Template(String),

    #[error("{0}")]
    Delivery(String),
}

/// Hands a composed message to a delivery mechanism.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, config: &MailConfig, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Logs messages instead of delivering them. For development setups
/// without an SMTP relay.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, config: &MailConfig, mail: &OutgoingMail) -> Result<(), MailError> {
        info!(
            host = %config.host,
            port = config.port,
            secure = config.secure,
            to = %mail.to,
            subject = %mail.subject,
            "Mail delivery skipped (log mailer)"
        );
        debug!(body = %mail.text, "Mail body");
        Ok(())
    }
}

/// Compose the OTP email for `recipient` and deliver it.
pub async fn send_otp_mail(
    mailer: &dyn Mailer,
    config: &MailConfig,
    recipient: &str,
    otp: &str,
) -> OperationResult<()> {
    debug!(to = %recipient, "Sending OTP email");
    let result = match OtpEmail::compose(config, recipient, otp) {
        Ok(mail) => mailer.deliver(config, &mail).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => OperationResult::ok(()).with_message(Some("OTP sent successfully".into())),
        Err(e) => {
            warn!(to = %recipient, error = %e, "Failed to send OTP email");
            let message = e.to_string();
            OperationResult::failure(if message.is_empty() { SEND_FAILED.to_string() } else { message })
        }
    }
}
