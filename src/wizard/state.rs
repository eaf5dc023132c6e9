//! Wizard state: which step the user is on and what has been accepted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// In-memory state of one wizard.
///
/// Never persisted: a fresh wizard starts at step 1 with empty payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    /// 1-based step currently shown.
    pub current_step: usize,
    /// Server-issued identifier, captured when step 1 succeeds.
    pub entity_id: Option<String>,
    /// One field map per step, in step order.
    pub step_payloads: Vec<Map<String, Value>>,
}

impl WizardState {
    pub fn new(step_count: usize) -> Self {
        Self {
            current_step: 1,
            entity_id: None,
            step_payloads: vec![Map::new(); step_count],
        }
    }

    pub fn step_count(&self) -> usize {
        self.step_payloads.len()
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step == self.step_count()
    }

    /// Whether `step` may be shown without submitting anything.
    ///
    /// Only the current step is, plus step 1 while nothing has been created.
    pub fn is_reachable(&self, step: usize) -> bool {
        step == self.current_step || (step == 1 && self.entity_id.is_none())
    }

    /// Move to the next step. Returns an error at the final step.
    pub fn advance(&mut self) -> Result<usize, String> {
        if self.is_final_step() {
            return Err(format!("Already at final step {}", self.current_step));
        }
        self.current_step += 1;
        Ok(self.current_step)
    }

    /// Payload held for `step`, if the step exists.
    pub fn payload(&self, step: usize) -> Option<&Map<String, Value>> {
        step.checked_sub(1).and_then(|i| self.step_payloads.get(i))
    }

    pub fn set_payload(&mut self, step: usize, payload: Map<String, Value>) {
        if let Some(slot) = step.checked_sub(1).and_then(|i| self.step_payloads.get_mut(i)) {
            *slot = payload;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.step_count());
    }
}
