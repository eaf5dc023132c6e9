//! Farmer onboarding: personal details, address, bank details.

use serde_json::{Map, Value};

use super::{EntityKind, WizardFlow, fields};
use crate::validation::{FieldRule, Pattern, RuleSet, Transform};

const GENDERS: &[&str] = &["MALE", "FEMALE", "OTHER"];

pub struct FarmerFlow;

impl WizardFlow for FarmerFlow {
    fn kind(&self) -> EntityKind {
        EntityKind::Farmer
    }

    fn completion_flags(&self) -> &'static [&'static str] {
        &[
            "is_personal_details_completed",
            "is_address_completed",
            "is_bank_details_completed",
        ]
    }

    fn rules(&self, step: usize, _payload: &Map<String, Value>, _accepted: &[Map<String, Value>]) -> RuleSet {
        match step {
            1 => RuleSet::new(vec![
                fields::name("name", "Name"),
                fields::name("father_name", "Father's name"),
                fields::phone_number(),
                fields::aadhar("aadhar_number", "Aadhaar number"),
                FieldRule::required("gender", "Gender")
                    .pattern(Pattern::OneOf(GENDERS))
                    .transform(Transform::Uppercase),
                FieldRule::optional("date_of_birth", "Date of birth"),
            ]),
            2 => {
                let mut rules = RuleSet::new(vec![FieldRule::required("address_line", "Address")]);
                rules.extend(fields::location());
                rules
            }
            3 => RuleSet::new(fields::bank()),
            _ => RuleSet::default(),
        }
    }
}
