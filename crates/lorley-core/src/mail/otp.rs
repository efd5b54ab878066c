use askama::Template;

use super::config::PRODUCT_NAME;
use super::{MailConfig, MailError};

const SUBJECT: &str = "OTP for Verification";
const INTRO: &str = "Welcome to Lorley! We're very excited to have you on board.";

/// How long an emailed OTP stays valid, as stated in the email.
pub const OTP_VALID_MINUTES: u32 = 10;

/// A fully composed message, ready for a `Mailer`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub struct OtpEmail;

impl OtpEmail {
    pub fn outro(otp: &str) -> String {
        format!(
            "Your OTP for verification is {}. It will expire in {} minutes.",
            otp, OTP_VALID_MINUTES
        )
    }

    pub fn compose(config: &MailConfig, recipient: &str, otp: &str) -> Result<OutgoingMail, MailError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(MailError::NoRecipient);
        }

        let outro = Self::outro(otp);
        let text = format!("Hi {},\n\n{}\n\n{}\n\n{} - {}\n", recipient, INTRO, outro, PRODUCT_NAME, config.product_link);
        let html = Self::render_html(recipient, &outro, &config.product_link)?;

        Ok(OutgoingMail {
            from: config.user.clone(),
            to: recipient.to_string(),
            subject: SUBJECT.to_string(),
            html,
            text,
        })
    }

    fn render_html(name: &str, outro: &str, link: &str) -> Result<String, MailError> {
        OtpEmailTemplate {
            product: PRODUCT_NAME,
            link,
            name,
            intro: INTRO,
            outro,
        }
        .render()
        .map_err(|e| MailError::Template(e.to_string()))
    }
}

/// HTML body of the OTP email; every field is HTML-escaped on render.
#[derive(Template)]
#[template(path = "otp_email.html")]
struct OtpEmailTemplate<'a> {
    product: &'a str,
    link: &'a str,
    name: &'a str,
    intro: &'a str,
    outro: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailConfig {
        MailConfig::from_lookup(|key| match key {
            "MAIL_HOST" => Some("smtp.example.com".into()),
            "MAIL_PORT" => Some("587".into()),
            "MAIL_USER" => Some("no-reply@lorley.example".into()),
            "MAIL_PASSWORD" => Some("secret".into()),
            "MAIL_PRODUCT_LINK" => Some("https://lorley.example".into()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_compose_otp_email() {
        let mail = OtpEmail::compose(&config(), "a@b.com", "482913").unwrap();

        assert_eq!(mail.subject, "OTP for Verification");
        assert_eq!(mail.from, "no-reply@lorley.example");
        assert_eq!(mail.to, "a@b.com");
        assert!(mail.text.contains("Your OTP for verification is 482913. It will expire in 10 minutes."));
        assert!(mail.html.contains("Hi a@b.com,"));
        assert!(mail.html.contains("very excited to have you on board."));
        assert!(!mail.html.contains("We're"));
        assert!(mail.html.contains("lorley.example"));
    }

    #[test]
    fn test_compose_escapes_markup() {
        let mail = OtpEmail::compose(&config(), "<script>@b.com", "1<2").unwrap();
        assert!(!mail.html.contains("<script>"));
        assert!(!mail.html.contains("1<2"));
        assert!(mail.html.contains("script&"));
        assert!(mail.html.contains("@b.com,"));
    }

    #[test]
    fn test_compose_requires_recipient() {
        assert_eq!(
            OtpEmail::compose(&config(), "  ", "482913").unwrap_err(),
            MailError::NoRecipient
        );
    }
}
