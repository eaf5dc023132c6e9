//! Multi-step entity onboarding.
//!
//! Officers, agents, farmers and land parcels are registered through the
//! same step-wizard contract. Each step is its own unit of work on the
//! backend: step 1 creates the entity and yields its id, later steps patch
//! it. A [`WizardFlow`] describes one entity kind (steps, field rules,
//! completion flags); [`Wizard`] drives any flow.

pub mod agent;
pub mod controller;
pub mod farmer;
pub mod fields;
pub mod land;
pub mod officer;
pub mod state;

pub use agent::AgentFlow;
pub use controller::{StepOutcome, Wizard};
pub use farmer::FarmerFlow;
pub use land::{LandFlow, OwnershipType};
pub use officer::OfficerFlow;
pub use state::WizardState;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WizardError;
use crate::validation::RuleSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Officer,
    Agent,
    Farmer,
    Land,
}

impl EntityKind {
    /// Collection path used to create and patch entities of this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Officer => "/officers",
            Self::Agent => "/agents",
            Self::Farmer => "/farmers",
            Self::Land => "/lands",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Officer => "Officer",
            Self::Agent => "Agent",
            Self::Farmer => "Farmer",
            Self::Land => "Land",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Officer => "officer",
            Self::Agent => "agent",
            Self::Farmer => "farmer",
            Self::Land => "land",
        };
        write!(f, "{s}")
    }
}

/// One entity kind's onboarding steps.
#[async_trait]
pub trait WizardFlow: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Server-held completion flag per step, in step order. The length is
    /// the number of steps.
    fn completion_flags(&self) -> &'static [&'static str];

    fn step_count(&self) -> usize {
        self.completion_flags().len()
    }

    /// Rules for `step`, given the payload being submitted and the payloads
    /// already accepted for earlier steps (index 0 is step 1).
    fn rules(&self, step: usize, payload: &Map<String, Value>, accepted: &[Map<String, Value>]) -> RuleSet;

    /// Fields to copy from an existing record when resuming `step`.
    fn prefill_fields(&self, step: usize) -> Vec<&'static str> {
        self.rules(step, &Map::new(), &[]).fields().collect()
    }

    /// Final touch before dispatch, after validation passed.
    async fn prepare(
        &self,
        _step: usize,
        payload: Map<String, Value>,
    ) -> Result<Map<String, Value>, WizardError> {
        Ok(payload)
    }
}
