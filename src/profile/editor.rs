//! Profile editing for the signed-in user.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{Profile, fetch_profile};
use crate::error::{ProfileError, SessionError};
use crate::gateway::{Api, ApiRequest, endpoints};
use crate::notify::{NotificationRelay, Severity};
use crate::session::SessionContext;
use crate::validation::{FieldRule, Pattern, RuleSet};
use crate::wizard::fields;

const UPDATE_FALLBACK: &str = "Could not update profile. Please try again.";

fn rules() -> RuleSet {
    RuleSet::new(vec![
        fields::name("name", "Name"),
        FieldRule::optional("email", "Email").pattern(Pattern::email()),
        FieldRule::optional("pincode", "Pincode").digits(6),
    ])
}

/// Whether an update response holds a profile record rather than a bare
/// acknowledgement.
fn carries_profile(body: &Value) -> bool {
    let looks_like_profile =
        |v: &Value| ["name", "phoneNumber", "phone_number"].iter().any(|k| v.get(*k).is_some());
    looks_like_profile(body)
        || ["data", "user"]
            .iter()
            .filter_map(|k| body.get(*k))
            .any(looks_like_profile)
}

pub struct ProfileEditor {
    api: Arc<dyn Api>,
    session: Arc<SessionContext>,
    relay: Arc<NotificationRelay>,
}

impl ProfileEditor {
    pub fn new(api: Arc<dyn Api>, session: Arc<SessionContext>, relay: Arc<NotificationRelay>) -> Self {
        Self {
            api,
            session,
            relay,
        }
    }

    /// Validate and save profile changes, then replace the session profile
    /// with the server's copy.
    pub async fn update(&self, mut changes: Map<String, Value>) -> Result<Profile, ProfileError> {
        let snapshot = self.session.snapshot().await;
        let (Some(phone), Some(current)) = (snapshot.phone_number, snapshot.profile) else {
            return Err(SessionError::NotAuthenticated.into());
        };
        let user_id = current.id().ok_or(ProfileError::MissingUserId)?;

        if let Err(errors) = rules().apply(&mut changes) {
            self.relay.show(errors.to_string(), Severity::Error).await;
            return Err(errors.into());
        }

        let path = endpoints::user(&user_id);
        let result = self
            .api
            .send(ApiRequest::patch(&path, Value::Object(changes)))
            .await;

        let updated = match result {
            Ok(body) if carries_profile(&body) => Profile::from_response(&path, body),
            Ok(_) => fetch_profile(self.api.as_ref(), &phone).await,
            Err(e) => Err(e),
        };

        let profile = match updated {
            Ok(profile) => profile,
            Err(source) => {
                let detail = source.detail_or(UPDATE_FALLBACK);
                warn!(user_id = %user_id, error = %source, "Profile update failed");
                self.relay.show(detail.clone(), Severity::Error).await;
                return Err(ProfileError::Remote { detail, source });
            }
        };

        self.session.set_profile(profile.clone()).await?;
        info!(user_id = %user_id, "Profile updated");
        self.relay
            .show("Profile updated successfully", Severity::Success)
            .await;
        Ok(profile)
    }
}
