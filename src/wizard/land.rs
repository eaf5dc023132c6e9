//! Land parcel onboarding: parcel details, then proof documents.
//!
//! The ownership type chosen in step 1 selects which extra fields are
//! required: a leased parcel names its owner in step 1, and every ownership
//! type needs its own proof document in step 2.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{EntityKind, WizardFlow, fields};
use crate::validation::{FieldRule, Pattern, RuleSet, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipType {
    Owner,
    Lease,
    Assigned,
}

impl OwnershipType {
    pub const VALUES: &'static [&'static str] = &["OWNER", "LEASE", "ASSIGNED"];

    pub fn parse(raw: &str) -> Option<Self> {
        match Transform::Uppercase.apply(raw).as_str() {
            "OWNER" => Some(Self::Owner),
            "LEASE" => Some(Self::Lease),
            "ASSIGNED" => Some(Self::Assigned),
            _ => None,
        }
    }

    /// Read the ownership type from a payload, if present and valid.
    pub fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        payload
            .get("ownership_type")
            .and_then(Value::as_str)
            .and_then(Self::parse)
    }

    /// Extra step-1 fields this ownership type requires.
    fn parcel_rules(&self) -> Vec<FieldRule> {
        match self {
            Self::Lease => vec![
                fields::name("owner_name", "Owner name"),
                fields::aadhar("owner_aadhar_number", "Owner Aadhaar number"),
            ],
            Self::Owner | Self::Assigned => Vec::new(),
        }
    }

    /// Proof-document fields step 2 requires.
    fn document_rules(&self) -> Vec<FieldRule> {
        match self {
            Self::Owner => vec![FieldRule::required("pattadar_passbook_url", "Pattadar passbook")],
            Self::Lease => vec![FieldRule::required("lease_agreement_url", "Lease agreement")],
            Self::Assigned => vec![FieldRule::required("assignment_order_url", "Assignment order")],
        }
    }
}

impl std::fmt::Display for OwnershipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Owner => "OWNER",
            Self::Lease => "LEASE",
            Self::Assigned => "ASSIGNED",
        };
        write!(f, "{s}")
    }
}

pub struct LandFlow;

impl WizardFlow for LandFlow {
    fn kind(&self) -> EntityKind {
        EntityKind::Land
    }

    fn completion_flags(&self) -> &'static [&'static str] {
        &["is_land_details_completed", "is_documents_completed"]
    }

    fn rules(&self, step: usize, payload: &Map<String, Value>, accepted: &[Map<String, Value>]) -> RuleSet {
        match step {
            1 => {
                let mut rules = RuleSet::new(vec![
                    FieldRule::required("farmer_id", "Farmer"),
                    FieldRule::required("survey_number", "Survey number"),
                    FieldRule::required("area_acres", "Area (acres)").pattern(Pattern::PositiveNumber),
                    FieldRule::required("ownership_type", "Ownership type")
                        .pattern(Pattern::OneOf(OwnershipType::VALUES))
                        .transform(Transform::Uppercase),
                ]);
                rules.extend(fields::location());
                if let Some(ownership) = OwnershipType::from_payload(payload) {
                    rules.extend(ownership.parcel_rules());
                }
                rules
            }
            2 => {
                let ownership = OwnershipType::from_payload(payload)
                    .or_else(|| accepted.first().and_then(OwnershipType::from_payload));
                match ownership {
                    Some(ownership) => RuleSet::new(ownership.document_rules()),
                    // Without a known ownership type no proof can be checked.
                    None => RuleSet::new(vec![
                        FieldRule::required("ownership_type", "Ownership type")
                            .pattern(Pattern::OneOf(OwnershipType::VALUES))
                            .transform(Transform::Uppercase),
                    ]),
                }
            }
            _ => RuleSet::default(),
        }
    }

    fn prefill_fields(&self, step: usize) -> Vec<&'static str> {
        match step {
            1 => {
                let mut fields: Vec<&'static str> = self.rules(1, &Map::new(), &[]).fields().collect();
                fields.extend(["owner_name", "owner_aadhar_number"]);
                fields
            }
            2 => vec![
                "pattadar_passbook_url",
                "lease_agreement_url",
                "assignment_order_url",
            ],
            _ => Vec::new(),
        }
    }
}
