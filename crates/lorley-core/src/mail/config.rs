use super::MailError;

/// Product name shown in the email header.
pub const PRODUCT_NAME: &str = "Lorley";

const DEFAULT_PRODUCT_LINK: &str = "http://localhost:3000";

/// SMTP settings read from the `MAIL_*` environment variables.
#[derive(Clone, PartialEq)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS; only port 465 uses it.
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub product_link: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("product_link", &self.product_link)
            .finish()
    }
}

impl MailConfig {
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; all four `MAIL_*` keys are required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MailError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (Some(host), Some(port), Some(user), Some(password)) = (
            get("MAIL_HOST"),
            get("MAIL_PORT"),
            get("MAIL_USER"),
            get("MAIL_PASSWORD"),
        ) else {
            return Err(MailError::MissingConfig);
        };

        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| MailError::InvalidPort(port.clone()))?;

        Ok(Self {
            host,
            port,
            secure: port == 465,
            user,
            password,
            product_link: get("MAIL_PRODUCT_LINK").unwrap_or_else(|| DEFAULT_PRODUCT_LINK.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const FULL: &[(&str, &str)] = &[
        ("MAIL_HOST", "smtp.example.com"),
        ("MAIL_PORT", "465"),
        ("MAIL_USER", "no-reply@lorley.example"),
        ("MAIL_PASSWORD", "secret"),
    ];

    #[test]
    fn test_secure_only_on_465() {
        let config = MailConfig::from_lookup(lookup(FULL)).unwrap();
        assert!(config.secure);
        assert_eq!(config.port, 465);
        assert_eq!(config.product_link, DEFAULT_PRODUCT_LINK);

        let mut plain = FULL.to_vec();
        plain[1] = ("MAIL_PORT", "587");
        assert!(!MailConfig::from_lookup(lookup(&plain)).unwrap().secure);
    }

    #[test]
    fn test_missing_variable() {
        let err = MailConfig::from_lookup(lookup(&FULL[..3])).unwrap_err();
        assert_eq!(err, MailError::MissingConfig);
        assert_eq!(err.to_string(), "Email configuration environment variables are missing");
    }

    #[test]
    fn test_blank_variable_counts_as_missing() {
        let mut blank = FULL.to_vec();
        blank[0] = ("MAIL_HOST", " ");
        assert_eq!(
            MailConfig::from_lookup(lookup(&blank)).unwrap_err(),
            MailError::MissingConfig
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut bad = FULL.to_vec();
        bad[1] = ("MAIL_PORT", "smtp");
        assert_eq!(
            MailConfig::from_lookup(lookup(&bad)).unwrap_err(),
            MailError::InvalidPort("smtp".into())
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let config = MailConfig::from_lookup(lookup(FULL)).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
