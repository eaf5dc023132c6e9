//! Field rules shared across onboarding flows.

use crate::validation::{FieldRule, Pattern, Transform};

pub fn name(field: &'static str, label: &'static str) -> FieldRule {
    FieldRule::required(field, label).pattern(Pattern::person_name())
}

pub fn phone_number() -> FieldRule {
    FieldRule::required("phone_number", "Phone number").digits(10)
}

pub fn aadhar(field: &'static str, label: &'static str) -> FieldRule {
    FieldRule::required(field, label).digits(12)
}

pub fn pincode() -> FieldRule {
    FieldRule::required("pincode", "Pincode").digits(6)
}

/// State, district, mandal and village selections plus pincode.
pub fn location() -> Vec<FieldRule> {
    vec![
        FieldRule::required("state_id", "State"),
        FieldRule::required("district_id", "District"),
        FieldRule::required("mandal_id", "Mandal"),
        FieldRule::required("village", "Village"),
        pincode(),
    ]
}

/// Bank account details used by agents and farmers.
pub fn bank() -> Vec<FieldRule> {
    vec![
        name("account_holder_name", "Account holder name"),
        FieldRule::required("account_number", "Account number")
            .pattern(Pattern::DigitsBetween(9, 18))
            .transform(Transform::Compact),
        FieldRule::required("ifsc_code", "IFSC code")
            .pattern(Pattern::ifsc())
            .transform(Transform::Uppercase),
        FieldRule::required("bank_name", "Bank name"),
    ]
}
