use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, Envelope};

use super::store::TokenStore;

const SERVICE_NAME: &str = "lorley";

/// Short-lived access token plus the refresh token that renews it.
/// Always replaced as a unit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Extract both tokens from a login or OTP verification response.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ApiError> {
        let access = envelope
            .string_field("accessToken")
            .ok_or_else(|| ApiError::InvalidResponse("response is missing accessToken".into()))?;
        let refresh = envelope
            .string_field("refreshToken")
            .ok_or_else(|| ApiError::InvalidResponse("response is missing refreshToken".into()))?;
        Ok(Self::new(access, refresh))
    }
}

/// Stores the two token slots in the OS keychain, one entry per slot.
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self, slot: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}:{}", self.account, slot))
            .context("Failed to create keyring entry")
    }

    fn read(&self, slot: &str) -> Result<Option<String>> {
        match self.entry(slot)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn remove(&self, slot: &str) -> Result<()> {
        match self.entry(slot)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let access = self.read("access")?;
        let refresh = self.read("refresh")?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        })
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.entry("access")?
            .set_password(&pair.access_token)
            .context("Failed to store access token in keychain")?;
        self.entry("refresh")?
            .set_password(&pair.refresh_token)
            .context("Failed to store refresh token in keychain")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let access = self.remove("access");
        let refresh = self.remove("refresh");
        access.and(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpResponse;

    #[test]
    fn test_from_envelope_login_shape() {
        let env = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":true,"data":{"accessToken":"AT1","refreshToken":"RT1","user":{"id":"u1"}}}"#,
        ))
        .unwrap();
        assert_eq!(CredentialPair::from_envelope(&env).unwrap(), CredentialPair::new("AT1", "RT1"));
    }

    #[test]
    fn test_from_envelope_otp_shape() {
        let env = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":true,"message":"Verified","accessToken":"AT1","refreshToken":"RT1"}"#,
        ))
        .unwrap();
        assert_eq!(CredentialPair::from_envelope(&env).unwrap(), CredentialPair::new("AT1", "RT1"));
    }

    #[test]
    fn test_from_envelope_requires_both_tokens() {
        let env = Envelope::from_response(HttpResponse::new(
            200,
            r#"{"success":true,"accessToken":"AT1"}"#,
        ))
        .unwrap();
        assert!(matches!(
            CredentialPair::from_envelope(&env),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", CredentialPair::new("secret-a", "secret-r"));
        assert!(!debug.contains("secret"));
    }
}
