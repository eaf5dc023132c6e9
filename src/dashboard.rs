//! Dashboard metrics computed on the client.
//!
//! The backend reports aggregate counters on the profile itself; land
//! summaries are computed from whatever land records a screen has loaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::gateway::Api;
use crate::profile::{Profile, decimal_from, fetch_profile};
use crate::session::SessionContext;
use crate::wizard::OwnershipType;

/// Counters shown on the dashboard cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub role: Option<String>,
    pub farmers: u64,
    pub agents: u64,
    pub officers: u64,
    pub lands: u64,
    pub acres: Decimal,
}

impl DashboardMetrics {
    /// Read the role-specific counters off a profile. Missing counters are zero.
    pub fn from_profile(profile: &Profile) -> Self {
        let acres = profile
            .no_of_acres
            .or_else(|| profile.extra_details.get("no_of_acres").and_then(decimal_from))
            .unwrap_or_default();

        Self {
            role: profile.display_role().map(str::to_string),
            farmers: profile.counter("no_of_farmers"),
            agents: profile.counter("no_of_agents"),
            officers: profile.counter("no_of_officers"),
            lands: profile
                .no_of_lands
                .unwrap_or_else(|| profile.counter("no_of_lands")),
            acres,
        }
    }
}

/// Totals over a list of land records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LandSummary {
    pub parcels: usize,
    pub acres: Decimal,
    pub by_ownership: BTreeMap<OwnershipType, usize>,
    /// Records with a missing or unknown ownership type.
    pub unclassified: usize,
}

/// Summarize land records as returned by the backend.
///
/// Areas are read from `area_acres` (or `area`) as numbers or numeric
/// strings; anything unparseable counts as zero acres but still counts as
/// a parcel.
pub fn summarize_lands(records: &[Value]) -> LandSummary {
    let mut summary = LandSummary::default();
    for record in records {
        summary.parcels += 1;

        let area = ["area_acres", "area"]
            .iter()
            .find_map(|k| record.get(*k))
            .and_then(decimal_from)
            .unwrap_or_default();
        match summary.acres.checked_add(area) {
            Some(total) => summary.acres = total,
            None => warn!(area = %area, "Land area overflows the total; skipped"),
        }

        let ownership = record
            .get("ownership_type")
            .and_then(Value::as_str)
            .and_then(OwnershipType::parse);
        match ownership {
            Some(o) => *summary.by_ownership.entry(o).or_default() += 1,
            None => summary.unclassified += 1,
        }
    }
    debug!(parcels = summary.parcels, acres = %summary.acres, "Summarized lands");
    summary
}

/// Loads dashboard metrics for the signed-in user.
pub struct Dashboard {
    api: Arc<dyn Api>,
    session: Arc<SessionContext>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn Api>, session: Arc<SessionContext>) -> Self {
        Self { api, session }
    }

    /// Refetch the profile, replace the session copy and read its counters.
    pub async fn load(&self) -> Result<DashboardMetrics> {
        let phone = self
            .session
            .phone_number()
            .await
            .ok_or(SessionError::NotAuthenticated)?;
        // A phone without a profile has not finished signing in.
        if !self.session.is_authenticated().await {
            return Err(SessionError::NotAuthenticated.into());
        }
        let profile = fetch_profile(self.api.as_ref(), &phone).await?;
        let metrics = DashboardMetrics::from_profile(&profile);
        self.session.set_profile(profile).await?;
        info!(
            farmers = metrics.farmers,
            agents = metrics.agents,
            lands = metrics.lands,
            "Dashboard loaded"
        );
        Ok(metrics)
    }
}
