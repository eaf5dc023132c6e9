//! Phone/OTP authentication.
//!
//! `OtpAuthenticator` drives the [`AuthPhase`] state machine against the
//! backend and owns the login side of the session lifecycle: the phone
//! number is persisted once the code verifies, and removed again if the
//! profile cannot be loaded, so the client never stays half-authenticated.

pub mod state;

pub use state::AuthPhase;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::OtpBypass;
use crate::error::{AuthError, SessionError, ValidationErrors};
use crate::gateway::{Api, ApiRequest, endpoints};
use crate::notify::{NotificationRelay, Severity};
use crate::profile::{Profile, fetch_profile};
use crate::session::{SessionContext, mask_phone};
use crate::validation::strip_invisible;

const VERIFY_FALLBACK: &str = "Invalid or expired code. Please try again.";
const PROFILE_FALLBACK: &str = "Could not load your profile. Please try again.";

/// How a code was dispatched by [`OtpAuthenticator::request_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeDispatch {
    /// The backend sent the code by SMS.
    Sent,
    /// Bypass phone: no SMS was sent; this fixed code is expected.
    Bypassed { code: String },
}

/// Strip invisible characters and surrounding whitespace from typed input.
pub fn normalize_phone(input: &str) -> String {
    strip_invisible(input)
}

fn validate_phone(phone: &str) -> Result<(), ValidationErrors> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationErrors::single(
            "phone_number",
            "Phone number must be exactly 10 digits",
        ))
    }
}

fn validate_code(code: &str) -> Result<(), ValidationErrors> {
    if (4..=6).contains(&code.len()) && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationErrors::single("otp", "Code must be 4 to 6 digits"))
    }
}

pub struct OtpAuthenticator {
    api: Arc<dyn Api>,
    session: Arc<SessionContext>,
    relay: Arc<NotificationRelay>,
    bypass: OtpBypass,
    phase: RwLock<AuthPhase>,
}

impl OtpAuthenticator {
    /// Create an authenticator. Starts `Authenticated` when the session
    /// was hydrated with a complete login.
    pub async fn new(
        api: Arc<dyn Api>,
        session: Arc<SessionContext>,
        relay: Arc<NotificationRelay>,
        bypass: OtpBypass,
    ) -> Self {
        let snapshot = session.snapshot().await;
        let phase = match snapshot.phone_number {
            Some(phone) if snapshot.is_authenticated => AuthPhase::Authenticated { phone },
            _ => AuthPhase::AwaitingPhone,
        };
        Self {
            api,
            session,
            relay,
            bypass,
            phase: RwLock::new(phase),
        }
    }

    pub async fn phase(&self) -> AuthPhase {
        self.phase.read().await.clone()
    }

    async fn transition(&self, target: AuthPhase) {
        let mut phase = self.phase.write().await;
        let from = phase.to_string();
        if phase.can_transition_to(&target) {
            info!(%from, to = %target, "Auth phase changed");
            *phase = target;
        } else {
            warn!(%from, to = %target, "Ignoring invalid auth transition");
        }
    }

    fn invalid_state(action: &str, phase: &AuthPhase) -> AuthError {
        AuthError::InvalidState {
            action: action.to_string(),
            state: phase.to_string(),
        }
    }

    /// Ask the backend to send a verification code.
    ///
    /// The bypass phone never reaches the backend here; the fixed bypass
    /// code is handed back instead. Failures keep the phase unchanged and
    /// report a generic message only.
    pub async fn request_code(&self, raw_phone: &str) -> Result<CodeDispatch, AuthError> {
        let current = self.phase().await;
        if current.is_authenticated() {
            return Err(Self::invalid_state("request a code", &current));
        }

        let phone = normalize_phone(raw_phone);
        if let Err(e) = validate_phone(&phone) {
            self.relay.show(e.to_string(), Severity::Error).await;
            return Err(e.into());
        }

        if phone == self.bypass.phone {
            info!(phone = %mask_phone(&phone), "Bypass phone; skipping send-otp");
            self.transition(AuthPhase::AwaitingOtp { phone }).await;
            return Ok(CodeDispatch::Bypassed {
                code: self.bypass.code.clone(),
            });
        }

        let request = ApiRequest::post(endpoints::SEND_OTP, json!({ "mobile": phone }));
        match self.api.send(request).await {
            Ok(_) => {
                info!(phone = %mask_phone(&phone), "Verification code sent");
                self.relay.show("Verification code sent", Severity::Success).await;
                self.transition(AuthPhase::AwaitingOtp { phone }).await;
                Ok(CodeDispatch::Sent)
            }
            Err(e) => {
                // Backend detail stays out of user-facing text.
                debug!(error = %e, "send-otp failed");
                let err = AuthError::SendCodeFailed;
                self.relay.show(err.to_string(), Severity::Error).await;
                Err(err)
            }
        }
    }

    /// Verify the code for the phone captured by `request_code`, then load
    /// the profile. Both must succeed to authenticate.
    ///
    /// The bypass phone is not special-cased: its fixed code goes to the
    /// backend like any other.
    pub async fn verify_code(&self, raw_code: &str) -> Result<Profile, AuthError> {
        let current = self.phase().await;
        let phone = match &current {
            AuthPhase::AwaitingOtp { phone } => phone.clone(),
            other => return Err(Self::invalid_state("verify a code", other)),
        };

        let code = normalize_phone(raw_code);
        if let Err(e) = validate_code(&code) {
            self.relay.show(e.to_string(), Severity::Error).await;
            return Err(e.into());
        }

        let request = ApiRequest::post(
            endpoints::VERIFY_OTP,
            json!({ "mobile": phone, "otp": code }),
        );
        if let Err(e) = self.api.send(request).await {
            let detail = e.detail_or(VERIFY_FALLBACK);
            warn!(phone = %mask_phone(&phone), error = %e, "verify-otp failed");
            self.relay.show(detail.clone(), Severity::Error).await;
            return Err(AuthError::VerifyFailed(detail));
        }

        // The profile request must carry X-User-Phone.
        self.session.set_phone(&phone).await?;

        let profile = match fetch_profile(self.api.as_ref(), &phone).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(phone = %mask_phone(&phone), error = %e, "Profile fetch failed; rolling back phone");
                if let Err(rollback) = self.session.remove_phone().await {
                    warn!(error = %rollback, "Failed to remove persisted phone during rollback");
                }
                let detail = e.detail_or(PROFILE_FALLBACK);
                self.relay.show(detail.clone(), Severity::Error).await;
                return Err(AuthError::ProfileFetchFailed(detail));
            }
        };

        if let Err(e) = self.session.set_profile(profile.clone()).await {
            warn!(phone = %mask_phone(&phone), error = %e, "Persisting profile failed; rolling back phone");
            if let Err(rollback) = self.session.remove_phone().await {
                warn!(error = %rollback, "Failed to remove persisted phone during rollback");
            }
            return Err(e.into());
        }

        info!(
            phone = %mask_phone(&phone),
            role = profile.display_role().unwrap_or("unknown"),
            "Signed in"
        );
        self.transition(AuthPhase::Authenticated { phone }).await;
        self.relay.show("Signed in", Severity::Success).await;
        Ok(profile)
    }

    /// Go back to phone entry from the code screen.
    pub async fn edit_phone(&self) -> Result<(), AuthError> {
        let current = self.phase().await;
        if !matches!(current, AuthPhase::AwaitingOtp { .. }) {
            return Err(Self::invalid_state("edit the phone number", &current));
        }
        self.transition(AuthPhase::AwaitingPhone).await;
        Ok(())
    }

    /// Refetch the profile and replace the session copy wholesale.
    pub async fn refresh_profile(&self) -> Result<Profile, AuthError> {
        let phone = self
            .session
            .phone_number()
            .await
            .ok_or(SessionError::NotAuthenticated)?;
        if !self.session.is_authenticated().await {
            return Err(SessionError::NotAuthenticated.into());
        }

        let profile = fetch_profile(self.api.as_ref(), &phone)
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.detail_or(PROFILE_FALLBACK)))?;
        self.session.set_profile(profile.clone()).await?;
        debug!(phone = %mask_phone(&phone), "Profile refreshed");
        Ok(profile)
    }

    /// Clear the session and return to phone entry.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.session.clear().await?;
        let mut phase = self.phase.write().await;
        *phase = AuthPhase::AwaitingPhone;
        info!("Signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::StubApi;
    use crate::session::{KeyValueStore, MemoryStore, keys};
    use serde_json::json;

    struct Harness {
        api: Arc<StubApi>,
        store: Arc<MemoryStore>,
        session: Arc<SessionContext>,
        relay: Arc<NotificationRelay>,
        auth: OtpAuthenticator,
    }

    async fn harness() -> Harness {
        let api = Arc::new(StubApi::new());
        let store = Arc::new(MemoryStore::new());
        let session = SessionContext::new(store.clone());
        let relay = NotificationRelay::new();
        let auth = OtpAuthenticator::new(
            api.clone(),
            Arc::clone(&session),
            Arc::clone(&relay),
            OtpBypass::default(),
        )
        .await;
        Harness {
            api,
            store,
            session,
            relay,
            auth,
        }
    }

    fn officer_profile() -> serde_json::Value {
        json!({
            "name": "Lakshmi",
            "phoneNumber": "9876543210",
            "userId": "u-7",
            "role": "FIELD_OFFICER"
        })
    }

    #[test]
    fn normalize_strips_invisible_characters() {
        assert_eq!(normalize_phone(" \u{200B}9876543210\u{200C}\n"), "9876543210");
        assert_eq!(normalize_phone("\u{FEFF}98765\u{2060}43210"), "9876543210");
    }

    #[tokio::test]
    async fn bypass_phone_skips_send_and_yields_fixed_code() {
        let h = harness().await;
        for _ in 0..3 {
            let dispatch = h.auth.request_code("9999999999").await.unwrap();
            assert_eq!(
                dispatch,
                CodeDispatch::Bypassed {
                    code: "123456".into()
                }
            );
        }
        assert_eq!(h.api.call_count(), 0);
        assert_eq!(
            h.auth.phase().await,
            AuthPhase::AwaitingOtp {
                phone: "9999999999".into()
            }
        );
    }

    #[tokio::test]
    async fn bypass_phone_verification_still_hits_backend() {
        let h = harness().await;
        h.auth.request_code("9999999999").await.unwrap();
        h.api.respond("/users/mobile/", Ok(officer_profile()));

        h.auth.verify_code("123456").await.unwrap();

        let calls = h.api.calls();
        assert_eq!(calls[0].path, "/users/verify-otp");
        assert_eq!(
            calls[0].body.as_ref().unwrap(),
            &json!({"mobile": "9999999999", "otp": "123456"})
        );
    }

    #[tokio::test]
    async fn send_failure_stays_awaiting_phone_with_generic_error() {
        let h = harness().await;
        h.api.fail("/users/send-otp", 404, r#"{"detail": "No user with this mobile"}"#);

        let err = h.auth.request_code("9876543210").await.unwrap_err();
        assert!(matches!(err, AuthError::SendCodeFailed));
        assert_eq!(h.auth.phase().await, AuthPhase::AwaitingPhone);
        assert!(h.store.get(keys::PHONE).await.unwrap().is_none());

        let shown = h.relay.current().await.unwrap();
        assert!(!shown.message.contains("No user"));
        assert_eq!(shown.severity, Severity::Error);
    }

    #[tokio::test]
    async fn malformed_phone_is_rejected_without_call() {
        let h = harness().await;
        let err = h.auth.request_code("98765").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(h.api.call_count(), 0);
    }

    #[tokio::test]
    async fn verify_then_profile_failure_rolls_back_phone() {
        let h = harness().await;
        h.auth.request_code("9876543210").await.unwrap();
        h.api.fail("/users/mobile/", 500, "boom");

        let err = h.auth.verify_code("445566").await.unwrap_err();
        assert!(matches!(err, AuthError::ProfileFetchFailed(_)));
        assert!(h.store.get(keys::PHONE).await.unwrap().is_none());
        assert!(h.session.phone_number().await.is_none());
        assert!(!h.session.is_authenticated().await);
        assert!(!h.auth.phase().await.is_authenticated());
    }

    /// Accepts the phone but refuses to persist the profile or remove anything.
    struct ProfileWriteFails(MemoryStore);

    #[async_trait::async_trait]
    impl KeyValueStore for ProfileWriteFails {
        async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
            if key == keys::PROFILE {
                return Err(std::io::Error::other("disk full").into());
            }
            self.0.set(key, value).await
        }

        async fn remove(&self, _keys: &[&str]) -> Result<(), SessionError> {
            Err(std::io::Error::other("read-only").into())
        }
    }

    #[tokio::test]
    async fn profile_persist_failure_rolls_back_even_when_removal_fails() {
        let api = Arc::new(StubApi::new());
        let session = SessionContext::new(Arc::new(ProfileWriteFails(MemoryStore::new())));
        let auth = OtpAuthenticator::new(
            api.clone(),
            Arc::clone(&session),
            NotificationRelay::new(),
            OtpBypass::default(),
        )
        .await;
        auth.request_code("9876543210").await.unwrap();
        api.respond("/users/mobile/9876543210", Ok(officer_profile()));

        let err = auth.verify_code("445566").await.unwrap_err();
        assert!(matches!(err, AuthError::Session(SessionError::Io(_))));
        assert!(session.phone_number().await.is_none());
        assert!(!session.is_authenticated().await);
        assert!(!auth.phase().await.is_authenticated());
    }

    #[tokio::test]
    async fn verify_failure_surfaces_server_detail() {
        let h = harness().await;
        h.auth.request_code("9876543210").await.unwrap();
        h.api.fail("/users/verify-otp", 400, r#"{"detail": "OTP expired"}"#);

        let err = h.auth.verify_code("445566").await.unwrap_err();
        assert!(matches!(err, AuthError::VerifyFailed(ref d) if d == "OTP expired"));
        assert_eq!(h.relay.current().await.unwrap().message, "OTP expired");
        assert!(matches!(h.auth.phase().await, AuthPhase::AwaitingOtp { .. }));
        assert!(h.session.phone_number().await.is_none());
    }

    #[tokio::test]
    async fn full_login_maps_field_officer_role() {
        let h = harness().await;
        assert_eq!(h.auth.request_code("9876543210").await.unwrap(), CodeDispatch::Sent);
        assert!(matches!(h.auth.phase().await, AuthPhase::AwaitingOtp { .. }));

        h.api.respond("/users/mobile/9876543210", Ok(officer_profile()));
        let profile = h.auth.verify_code("445566").await.unwrap();

        assert_eq!(profile.display_role(), Some("AGRICULTURE_OFFICER"));
        assert!(h.session.is_authenticated().await);
        assert_eq!(h.store.get(keys::PHONE).await.unwrap().as_deref(), Some("9876543210"));
        assert!(h.store.get(keys::PROFILE).await.unwrap().is_some());
        assert!(h.auth.phase().await.is_authenticated());

        let paths: Vec<String> = h.api.calls().into_iter().map(|c| c.path).collect();
        assert_eq!(
            paths,
            vec!["/users/send-otp", "/users/verify-otp", "/users/mobile/9876543210"]
        );
    }

    #[tokio::test]
    async fn verify_requires_awaiting_otp() {
        let h = harness().await;
        let err = h.auth.verify_code("445566").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn edit_phone_returns_to_phone_entry() {
        let h = harness().await;
        h.auth.request_code("9876543210").await.unwrap();
        h.auth.edit_phone().await.unwrap();
        assert_eq!(h.auth.phase().await, AuthPhase::AwaitingPhone);
        assert!(h.auth.edit_phone().await.is_err());
    }

    #[tokio::test]
    async fn logout_clears_session_and_store() {
        let h = harness().await;
        h.auth.request_code("9876543210").await.unwrap();
        h.api.respond("/users/mobile/", Ok(officer_profile()));
        h.auth.verify_code("445566").await.unwrap();

        h.auth.logout().await.unwrap();
        assert_eq!(h.auth.phase().await, AuthPhase::AwaitingPhone);
        assert!(h.store.get(keys::PHONE).await.unwrap().is_none());
        assert!(h.store.get(keys::PROFILE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hydrated_session_starts_authenticated_and_refreshes() {
        let h = harness().await;
        h.session.set_phone("9876543210").await.unwrap();
        h.session
            .set_profile(Profile {
                name: "Old".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let auth = OtpAuthenticator::new(
            h.api.clone(),
            Arc::clone(&h.session),
            Arc::clone(&h.relay),
            OtpBypass::default(),
        )
        .await;
        assert!(auth.phase().await.is_authenticated());

        h.api.respond("/users/mobile/", Ok(officer_profile()));
        let profile = auth.refresh_profile().await.unwrap();
        assert_eq!(profile.name, "Lakshmi");
        assert_eq!(h.session.profile().await.unwrap().name, "Lakshmi");
    }
}
