//! Agent onboarding: personal details, then bank details.

use serde_json::{Map, Value};

use super::{EntityKind, WizardFlow, fields};
use crate::validation::{FieldRule, Pattern, RuleSet};

pub struct AgentFlow;

impl WizardFlow for AgentFlow {
    fn kind(&self) -> EntityKind {
        EntityKind::Agent
    }

    fn completion_flags(&self) -> &'static [&'static str] {
        &["is_personal_details_completed", "is_bank_details_completed"]
    }

    fn rules(&self, step: usize, _payload: &Map<String, Value>, _accepted: &[Map<String, Value>]) -> RuleSet {
        match step {
            1 => {
                let mut rules = RuleSet::new(vec![
                    fields::name("name", "Name"),
                    fields::phone_number(),
                    fields::aadhar("aadhar_number", "Aadhaar number"),
                    FieldRule::optional("email", "Email").pattern(Pattern::email()),
                ]);
                rules.extend(fields::location());
                rules
            }
            2 => RuleSet::new(fields::bank()),
            _ => RuleSet::default(),
        }
    }
}
