//! Login phase tracking for the phone/OTP flow.

use serde::{Deserialize, Serialize};

/// Phases of the phone/OTP login.
///
/// Progresses linearly: AwaitingPhone → AwaitingOtp → Authenticated.
/// The only backward edges are "edit phone number" (AwaitingOtp →
/// AwaitingPhone) and logout (Authenticated → AwaitingPhone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AuthPhase {
    AwaitingPhone,
    AwaitingOtp { phone: String },
    Authenticated { phone: String },
}

impl AuthPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &AuthPhase) -> bool {
        use AuthPhase::*;
        matches!(
            (self, target),
            (AwaitingPhone, AwaitingOtp { .. })
                | (AwaitingOtp { .. }, AwaitingOtp { .. })
                | (AwaitingOtp { .. }, Authenticated { .. })
                | (AwaitingOtp { .. }, AwaitingPhone)
                | (Authenticated { .. }, AwaitingPhone)
        )
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Phone number the phase is bound to, if any.
    pub fn phone(&self) -> Option<&str> {
        match self {
            Self::AwaitingPhone => None,
            Self::AwaitingOtp { phone } | Self::Authenticated { phone } => Some(phone),
        }
    }
}

impl Default for AuthPhase {
    fn default() -> Self {
        Self::AwaitingPhone
    }
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingPhone => "awaiting_phone",
            Self::AwaitingOtp { .. } => "awaiting_otp",
            Self::Authenticated { .. } => "authenticated",
        };
        write!(f, "{s}")
    }
}
