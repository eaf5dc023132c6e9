//! Error types for Landify.

use std::fmt;

/// Top-level error type for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the outbound HTTP gateway.
///
/// Status failures carry the response body verbatim; the gateway never
/// interprets status codes beyond success/failure.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request to {path} failed: {reason}")]
    Transport { path: String, reason: String },

    #[error("Request to {path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {path}: {reason}")]
    InvalidResponse { path: String, reason: String },

    #[error("Upload of {file_name} failed: {reason}")]
    Upload { file_name: String, reason: String },
}

impl GatewayError {
    /// Human-readable detail supplied by the server, if any.
    ///
    /// Looks for `detail`, `message` or `error` string fields in a JSON
    /// error body. Transport failures never carry server detail.
    pub fn server_detail(&self) -> Option<String> {
        let GatewayError::Status { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ["detail", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Server detail, or the given fallback when none is present.
    pub fn detail_or(&self, fallback: &str) -> String {
        self.server_detail().unwrap_or_else(|| fallback.to_string())
    }
}

/// Session persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session data under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("No authenticated session")]
    NotAuthenticated,
}

/// OTP authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Backend detail is intentionally dropped to avoid account enumeration.
    #[error("Could not send the verification code. Please try again.")]
    SendCodeFailed,

    #[error("Verification failed: {0}")]
    VerifyFailed(String),

    #[error("Could not load profile: {0}")]
    ProfileFetchFailed(String),

    #[error("Cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Profile editor errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Profile has no user id")]
    MissingUserId,

    #[error("Profile update failed: {detail}")]
    Remote {
        detail: String,
        #[source]
        source: GatewayError,
    },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Step-wizard errors.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("{kind} wizard: step {requested} is not reachable from step {current}")]
    StepUnreachable {
        kind: String,
        requested: usize,
        current: usize,
    },

    #[error("{kind} wizard: step {step} is already being submitted")]
    InFlight { kind: String, step: usize },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{kind} wizard: step {step} failed: {detail}")]
    Remote {
        kind: String,
        step: usize,
        detail: String,
        #[source]
        source: GatewayError,
    },

    #[error("{kind} wizard: step 1 response carried no entity id")]
    MissingEntityId { kind: String },

    #[error("{kind} wizard: {reason}")]
    Prepare { kind: String, reason: String },
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Client-side validation failures, reported per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Message attached to a field, if it failed.
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Result type alias for the client.
pub type Result<T> = std::result::Result<T, Error>;
