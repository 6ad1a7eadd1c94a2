//! Shared access signatures for messaging endpoints.

use core::fmt::{self, Display};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ProvisioningError;

type HmacSha256 = Hmac<Sha256>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Seconds since the unix epoch.
    pub expires_at: i64,
}

impl Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// `SharedAccessSignature sr=<uri>&sig=<signature>&se=<expiry>&skn=<policy>`,
/// signed with HMAC-SHA256 over `<uri>\n<expiry>` using the key's bytes.
pub fn generate(
    resource_uri: &str,
    policy_name: &str,
    access_key: &str,
    expiry_days: u32,
    now: DateTime<Utc>,
) -> Result<AccessToken, ProvisioningError> {
    if access_key.is_empty() {
        return Err(ProvisioningError::InvalidKey(policy_name.to_owned()));
    }
    let expires_at = TimeDelta::try_days(i64::from(expiry_days))
        .and_then(|validity| now.checked_add_signed(validity))
        .ok_or(ProvisioningError::ExpiryOutOfRange(expiry_days))?
        .timestamp();

    let encoded_uri = urlencoding::encode(resource_uri);
    let string_to_sign = format!("{encoded_uri}\n{expires_at}");
    let mut mac = HmacSha256::new_from_slice(access_key.as_bytes())
        .map_err(|_| ProvisioningError::InvalidKey(policy_name.to_owned()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    let encoded_signature = urlencoding::encode(&signature);

    Ok(AccessToken {
        token: format!(
            "SharedAccessSignature \
             sr={encoded_uri}&sig={encoded_signature}&se={expires_at}&skn={policy_name}"
        ),
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn parameter<'a>(token: &'a str, name: &str) -> &'a str {
        token
            .trim_start_matches("SharedAccessSignature ")
            .split('&')
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
            .unwrap()
    }

    #[test]
    fn signs_encoded_uri_and_expiry() {
        let token = generate("https://ns.example.net/hub", "lab-access", "abc123", 1, new_year())
            .unwrap();
        assert_eq!(token.expires_at, 1_704_153_600);
        assert_eq!(parameter(&token.token, "se"), "1704153600");
        assert_eq!(
            parameter(&token.token, "sr"),
            "https%3A%2F%2Fns.example.net%2Fhub"
        );
        assert_eq!(parameter(&token.token, "skn"), "lab-access");

        let mut mac = HmacSha256::new_from_slice(b"abc123").unwrap();
        mac.update(b"https%3A%2F%2Fns.example.net%2Fhub\n1704153600");
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(parameter(&token.token, "sig"), urlencoding::encode(&expected));
        assert!(token.token.starts_with("SharedAccessSignature sr="));
    }

    #[test]
    fn same_inputs_give_same_token() {
        let first = generate("https://ns.example.net/hub", "p", "k", 7, new_year()).unwrap();
        let second = generate("https://ns.example.net/hub", "p", "k", 7, new_year()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_key_is_rejected() {
        let error = generate("https://ns.example.net/hub", "p", "", 1, new_year()).unwrap_err();
        assert!(matches!(error, ProvisioningError::InvalidKey(_)));
    }

    #[test]
    fn absurd_expiry_is_rejected() {
        let error =
            generate("https://ns.example.net/hub", "p", "k", u32::MAX, new_year()).unwrap_err();
        assert!(matches!(error, ProvisioningError::ExpiryOutOfRange(_)));
    }
}
