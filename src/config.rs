//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default time a notification stays visible.
pub const DEFAULT_NOTIFY_DURATION: Duration = Duration::from_millis(3000);

/// OTP bypass settings.
///
/// The bypass phone skips the remote "send code" call and yields a fixed
/// code. Verification of that code still goes to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpBypass {
    pub phone: String,
    pub code: String,
}

impl Default for OtpBypass {
    fn default() -> Self {
        Self {
            phone: "9999999999".to_string(),
            code: "123456".to_string(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct LandifyConfig {
    /// Base address of the REST backend, without trailing slash.
    pub api_base_url: String,
    /// Value sent in the `X-Api-Key` header on every request.
    pub api_key: SecretString,
    /// File holding the persisted session keys.
    pub session_path: PathBuf,
    /// Object-storage upload endpoint. Officer document uploads are
    /// unavailable without it.
    pub upload_url: Option<String>,
    pub otp_bypass: OtpBypass,
    /// How long notifications stay visible.
    pub notify_duration: Duration,
}

impl LandifyConfig {
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: trim_base_url(api_base_url.into()),
            api_key: SecretString::from(api_key.into()),
            session_path: default_session_path(),
            upload_url: None,
            otp_bypass: OtpBypass::default(),
            notify_duration: DEFAULT_NOTIFY_DURATION,
        }
    }

    /// Load configuration from `LANDIFY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("LANDIFY_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("LANDIFY_API_BASE_URL".into()))?;
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "LANDIFY_API_BASE_URL".into(),
                message: format!("expected an http(s) URL, got {api_base_url:?}"),
            });
        }

        let api_key = std::env::var("LANDIFY_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("LANDIFY_API_KEY".into()))?;

        let session_path = std::env::var("LANDIFY_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_session_path());

        let upload_url = std::env::var("LANDIFY_UPLOAD_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let defaults = OtpBypass::default();
        let otp_bypass = OtpBypass {
            phone: std::env::var("LANDIFY_OTP_BYPASS_PHONE").unwrap_or(defaults.phone),
            code: std::env::var("LANDIFY_OTP_BYPASS_CODE").unwrap_or(defaults.code),
        };

        let notify_duration = match std::env::var("LANDIFY_NOTIFY_DURATION_MS") {
            Ok(raw) => {
                let ms: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "LANDIFY_NOTIFY_DURATION_MS".into(),
                    message: format!("expected milliseconds, got {raw:?}"),
                })?;
                Duration::from_millis(ms)
            }
            Err(_) => DEFAULT_NOTIFY_DURATION,
        };

        Ok(Self {
            api_base_url: trim_base_url(api_base_url),
            api_key: SecretString::from(api_key),
            session_path,
            upload_url,
            otp_bypass,
            notify_duration,
        })
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn default_session_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".landify").join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn new_trims_trailing_slash() {
        let config = LandifyConfig::new("https://api.landify.in/v1/", "key");
        assert_eq!(config.api_base_url, "https://api.landify.in/v1");
        assert_eq!(config.api_key.expose_secret(), "key");
        assert_eq!(config.notify_duration, Duration::from_millis(3000));
        assert!(config.upload_url.is_none());
    }

    #[test]
    fn default_bypass_is_fixed() {
        let bypass = OtpBypass::default();
        assert_eq!(bypass.phone.len(), 10);
        assert_eq!(bypass.code, "123456");
    }

    #[test]
    fn from_env_requires_base_url() {
        // SAFETY: This test runs in isolation; no other thread reads LANDIFY_API_BASE_URL concurrently.
        unsafe { std::env::remove_var("LANDIFY_API_BASE_URL") };
        let err = LandifyConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "LANDIFY_API_BASE_URL"));
    }
}
