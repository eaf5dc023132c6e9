//! Wizard controller: validates, dispatches and sequences wizard steps.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::state::WizardState;
use super::WizardFlow;
use crate::error::{GatewayError, WizardError};
use crate::gateway::{Api, ApiRequest, endpoints};
use crate::notify::{NotificationRelay, Severity};

const STEP_FALLBACK: &str = "Something went wrong. Please try again.";

/// Result of a step submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was accepted and the wizard moved on.
    Advanced { next_step: usize, entity_id: String },
    /// The final step was accepted; the wizard is back at step 1.
    Completed { entity_id: String },
    /// The wizard was closed while the step was in flight. The backend may
    /// have accepted it, but the result no longer belongs to any view.
    Detached,
}

/// Pull the server-issued id out of a create response.
fn entity_id_from(response: &Value) -> Option<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let from = |v: &Value| {
        ["unique_id", "id"]
            .iter()
            .find_map(|k| v.get(*k).and_then(scalar))
    };
    from(response).or_else(|| response.get("data").and_then(from))
}

/// Releases the in-flight slot when a submission ends, however it ends.
struct InFlightGuard<'a> {
    slot: &'a AtomicU64,
    token: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // Only release our own claim; `close` may have moved on already.
        let _ = self
            .slot
            .compare_exchange(self.token, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Drives one [`WizardFlow`].
///
/// Each controller corresponds to one open wizard; `close` detaches any
/// in-flight submission and starts over.
pub struct Wizard<F: WizardFlow> {
    flow: F,
    api: Arc<dyn Api>,
    relay: Arc<NotificationRelay>,
    state: RwLock<WizardState>,
    /// Bumped by `close`; results from an older generation are discarded.
    generation: AtomicU64,
    /// `generation + 1` of the submission in flight, or 0.
    in_flight: AtomicU64,
}

impl<F: WizardFlow> Wizard<F> {
    pub fn new(flow: F, api: Arc<dyn Api>, relay: Arc<NotificationRelay>) -> Self {
        let state = WizardState::new(flow.step_count());
        Self {
            flow,
            api,
            relay,
            state: RwLock::new(state),
            generation: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub async fn state(&self) -> WizardState {
        self.state.read().await.clone()
    }

    pub async fn current_step(&self) -> usize {
        self.state.read().await.current_step
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) == self.generation.load(Ordering::Acquire) + 1
    }

    /// Claim the in-flight slot for the current generation.
    fn try_claim(&self, generation: u64) -> Option<InFlightGuard<'_>> {
        let token = generation + 1;
        loop {
            let current = self.in_flight.load(Ordering::Acquire);
            if current == token {
                return None;
            }
            match self
                .in_flight
                .compare_exchange_weak(current, token, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    return Some(InFlightGuard {
                        slot: &self.in_flight,
                        token,
                    });
                }
                Err(_) => continue,
            }
        }
    }

    fn unreachable(&self, requested: usize, current: usize) -> WizardError {
        WizardError::StepUnreachable {
            kind: self.flow.kind().to_string(),
            requested,
            current,
        }
    }

    /// Show `step` without submitting anything.
    ///
    /// Only the current step is reachable, plus step 1 while no entity has
    /// been created. There is no free jumping and no going back.
    pub async fn go_to_step(&self, step: usize) -> Result<usize, WizardError> {
        let mut state = self.state.write().await;
        if !state.is_reachable(step) {
            return Err(self.unreachable(step, state.current_step));
        }
        state.current_step = step;
        Ok(step)
    }

    /// Continue editing an existing, possibly partially onboarded entity.
    ///
    /// Each step is pre-filled from the record, and the wizard starts at
    /// the first step whose completion flag is not set. If every flag is
    /// set it starts at step 1 for a full review pass.
    pub async fn resume(&self, record: &Value) -> usize {
        let mut state = WizardState::new(self.flow.step_count());
        state.entity_id = entity_id_from(record);

        for step in 1..=self.flow.step_count() {
            let prefill: Map<String, Value> = self
                .flow
                .prefill_fields(step)
                .into_iter()
                .filter_map(|field| {
                    record
                        .get(field)
                        .filter(|v| !v.is_null())
                        .map(|v| (field.to_string(), v.clone()))
                })
                .collect();
            state.set_payload(step, prefill);
        }

        let first_incomplete = self
            .flow
            .completion_flags()
            .iter()
            .position(|flag| record.get(*flag).and_then(Value::as_bool) != Some(true));
        state.current_step = match (first_incomplete, &state.entity_id) {
            // Later steps need an id to patch.
            (Some(i), Some(_)) => i + 1,
            _ => 1,
        };

        let step = state.current_step;
        info!(
            kind = %self.flow.kind(),
            entity_id = ?state.entity_id,
            step,
            "Wizard resumed"
        );
        // Resuming is a new view: detach anything still in flight.
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.state.write().await = state;
        step
    }

    /// Close the wizard: reset to step 1 with empty fields and detach any
    /// submission still in flight.
    pub async fn close(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.write().await.reset();
        debug!(kind = %self.flow.kind(), "Wizard closed");
    }

    /// Validate and submit `step`.
    ///
    /// Step 1 creates the entity unless one is already known; every other
    /// submission patches it. Nothing is rolled back on failure: earlier
    /// steps stay committed on the backend.
    pub async fn submit_step(
        &self,
        step: usize,
        payload: Map<String, Value>,
    ) -> Result<StepOutcome, WizardError> {
        let kind = self.flow.kind();
        let generation = self.generation.load(Ordering::Acquire);
        let Some(_guard) = self.try_claim(generation) else {
            debug!(%kind, step, "Submission already in flight");
            return Err(WizardError::InFlight {
                kind: kind.to_string(),
                step,
            });
        };

        let (current_step, entity_id, accepted) = {
            let state = self.state.read().await;
            (state.current_step, state.entity_id.clone(), state.step_payloads.clone())
        };
        if step != current_step {
            return Err(self.unreachable(step, current_step));
        }

        let mut payload = payload;
        self.flow
            .rules(step, &payload, &accepted)
            .apply(&mut payload)?;
        let payload = match self.flow.prepare(step, payload).await {
            Ok(payload) => payload,
            // Missing fields stay inline like any other validation error.
            Err(e @ WizardError::Validation(_)) => return Err(e),
            Err(e) => {
                if self.generation.load(Ordering::Acquire) != generation {
                    return Ok(StepOutcome::Detached);
                }
                warn!(%kind, step, error = %e, "Step preparation failed");
                let message = match &e {
                    WizardError::Prepare { reason, .. } => reason.clone(),
                    _ => STEP_FALLBACK.to_string(),
                };
                self.relay.show(message, Severity::Error).await;
                return Err(e);
            }
        };

        let request = match entity_id {
            None => ApiRequest::post(kind.collection(), Value::Object(payload.clone())),
            Some(ref id) => {
                let mut body = payload.clone();
                body.insert("step".into(), Value::from(step));
                ApiRequest::patch(endpoints::entity(kind.collection(), id), Value::Object(body))
            }
        };

        let result = self.api.send(request).await;

        // `close` bumps the generation before taking the lock.
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(%kind, step, "Wizard closed while step was in flight; discarding result");
            return Ok(StepOutcome::Detached);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                drop(state);
                return Err(self.report_failure(step, e).await);
            }
        };

        let entity_id = match entity_id.or_else(|| entity_id_from(&response)) {
            Some(id) => id,
            None => {
                drop(state);
                warn!(%kind, "Create response carried no entity id");
                self.relay.show(STEP_FALLBACK, Severity::Error).await;
                return Err(WizardError::MissingEntityId {
                    kind: kind.to_string(),
                });
            }
        };

        state.entity_id = Some(entity_id.clone());
        state.set_payload(step, payload);

        if state.is_final_step() {
            state.reset();
            drop(state);
            info!(%kind, entity_id = %entity_id, "Onboarding complete");
            self.relay
                .show(format!("{} onboarded successfully", kind.label()), Severity::Success)
                .await;
            return Ok(StepOutcome::Completed { entity_id });
        }

        let next_step = state
            .advance()
            .map_err(|reason| WizardError::Prepare {
                kind: kind.to_string(),
                reason,
            })?;
        drop(state);
        info!(%kind, entity_id = %entity_id, step, next_step, "Step accepted");
        self.relay
            .show(format!("{} step {step} saved", kind.label()), Severity::Success)
            .await;
        Ok(StepOutcome::Advanced {
            next_step,
            entity_id,
        })
    }

    async fn report_failure(&self, step: usize, source: GatewayError) -> WizardError {
        let kind = self.flow.kind();
        let detail = source.detail_or(STEP_FALLBACK);
        warn!(%kind, step, error = %source, "Step submission failed");
        self.relay.show(detail.clone(), Severity::Error).await;
        WizardError::Remote {
            kind: kind.to_string(),
            step,
            detail,
            source,
        }
    }
}
