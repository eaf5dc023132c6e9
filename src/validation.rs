//! Declarative field rules shared by every wizard step and the profile editor.
//!
//! A `RuleSet` is a table of `field → {required, pattern, transform}`. Applying
//! it to a payload normalizes values in place and collects one error per
//! offending field, so callers can report them inline before any network call.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationErrors;

static IFSC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").expect("valid IFSC pattern"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

static PERSON_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z .'-]*$").expect("valid name pattern")
});

/// Characters that render as nothing but survive copy/paste from
/// messaging apps and break digit-count checks.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
    )
}

/// Remove zero-width and other invisible characters, then trim.
pub fn strip_invisible(input: &str) -> String {
    input
        .chars()
        .filter(|c| !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// How a raw value is normalized before checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Strip invisible characters and surrounding whitespace.
    Trim,
    /// `Trim`, then drop interior spaces and hyphens (phone, Aadhaar, account numbers).
    Compact,
    /// `Trim`, then uppercase (IFSC codes, enum values).
    Uppercase,
}

impl Transform {
    pub fn apply(&self, raw: &str) -> String {
        let trimmed = strip_invisible(raw);
        match self {
            Self::Trim => trimmed,
            Self::Compact => trimmed
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect(),
            Self::Uppercase => trimmed.to_uppercase(),
        }
    }
}

/// Format constraint checked after the transform.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exactly `n` ASCII digits.
    Digits(usize),
    /// Between `min` and `max` ASCII digits, inclusive.
    DigitsBetween(usize, usize),
    /// A positive decimal number (acreage).
    PositiveNumber,
    /// One of a fixed set of values.
    OneOf(&'static [&'static str]),
    Regex {
        regex: &'static LazyLock<Regex>,
        message: &'static str,
    },
}

impl Pattern {
    pub fn ifsc() -> Self {
        Self::Regex {
            regex: &IFSC,
            message: "must be a valid IFSC code",
        }
    }

    pub fn email() -> Self {
        Self::Regex {
            regex: &EMAIL,
            message: "must be a valid email address",
        }
    }

    pub fn person_name() -> Self {
        Self::Regex {
            regex: &PERSON_NAME,
            message: "may only contain letters, spaces, dots, hyphens and apostrophes",
        }
    }

    /// Check a normalized value. Returns the error message on failure.
    fn check(&self, value: &str) -> Option<String> {
        let all_digits = !value.is_empty() && value.chars().all(|c| c.is_ascii_digit());
        match self {
            Self::Digits(n) => {
                (!all_digits || value.len() != *n).then(|| format!("must be exactly {n} digits"))
            }
            Self::DigitsBetween(min, max) => (!all_digits
                || value.len() < *min
                || value.len() > *max)
                .then(|| format!("must be {min} to {max} digits")),
            Self::PositiveNumber => match value.parse::<rust_decimal::Decimal>() {
                Ok(d) if d > rust_decimal::Decimal::ZERO => None,
                _ => Some("must be a positive number".to_string()),
            },
            Self::OneOf(allowed) => (!allowed.contains(&value))
                .then(|| format!("must be one of {}", allowed.join(", "))),
            Self::Regex { regex, message } => {
                (!regex.is_match(value)).then(|| message.to_string())
            }
        }
    }
}

/// Rule for a single field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub pattern: Option<Pattern>,
    pub transform: Transform,
}

impl FieldRule {
    pub fn required(field: &'static str, label: &'static str) -> Self {
        Self {
            field,
            label,
            required: true,
            pattern: None,
            transform: Transform::Trim,
        }
    }

    pub fn optional(field: &'static str, label: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(field, label)
        }
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Exact digit count with compacting, the shape of phone/pincode/Aadhaar fields.
    pub fn digits(self, n: usize) -> Self {
        self.pattern(Pattern::Digits(n)).transform(Transform::Compact)
    }
}

/// An ordered table of field rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = FieldRule>) {
        self.rules.extend(rules);
    }

    /// Field names covered by this table, in order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.field)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Normalize and check `payload` in place.
    ///
    /// String values are rewritten with their transformed form. Numbers are
    /// checked through their decimal rendering and left untouched. Booleans,
    /// lists and objects satisfy presence-only rules and fail any rule with a
    /// pattern. Empty optional fields are removed so they are not sent as blanks.
    pub fn apply(&self, payload: &mut Map<String, Value>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for rule in &self.rules {
            let normalized = match payload.get(rule.field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => {
                    let value = rule.transform.apply(s);
                    if value.is_empty() { None } else { Some(value) }
                }
                Some(Value::Number(n)) => Some(n.to_string()),
                // Booleans, lists and objects have no text form to check.
                Some(_) => {
                    if rule.pattern.is_some() {
                        errors.push(rule.field, format!("{} has an invalid value", rule.label));
                    }
                    continue;
                }
            };

            let Some(value) = normalized else {
                if rule.required {
                    errors.push(rule.field, format!("{} is required", rule.label));
                } else {
                    payload.remove(rule.field);
                }
                continue;
            };

            if let Some(message) = rule.pattern.as_ref().and_then(|p| p.check(&value)) {
                errors.push(rule.field, format!("{} {}", rule.label, message));
                continue;
            }

            if let Some(Value::String(s)) = payload.get_mut(rule.field) {
                *s = value;
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn strip_invisible_removes_zero_width_and_whitespace() {
        assert_eq!(strip_invisible("\u{200B} 98765\u{200D}43210\u{FEFF} "), "9876543210");
        assert_eq!(strip_invisible("\u{2060}"), "");
    }

    #[test]
    fn compact_drops_spaces_and_hyphens() {
        assert_eq!(Transform::Compact.apply(" 1234-5678 9012 "), "123456789012");
        assert_eq!(Transform::Uppercase.apply(" sbin0001234 "), "SBIN0001234");
    }

    #[test]
    fn required_field_missing_or_blank() {
        let rules = RuleSet::new(vec![FieldRule::required("name", "Name")]);
        let err = rules.apply(&mut payload(json!({}))).unwrap_err();
        assert_eq!(err.for_field("name"), Some("Name is required"));

        let err = rules.apply(&mut payload(json!({"name": " \u{200B} "}))).unwrap_err();
        assert_eq!(err.for_field("name"), Some("Name is required"));
    }

    #[test]
    fn digit_rules_count_exactly() {
        let rules = RuleSet::new(vec![FieldRule::required("phone_number", "Phone number").digits(10)]);

        let err = rules
            .apply(&mut payload(json!({"phone_number": "987654321"})))
            .unwrap_err();
        assert_eq!(
            err.for_field("phone_number"),
            Some("Phone number must be exactly 10 digits")
        );

        let err = rules
            .apply(&mut payload(json!({"phone_number": "98765abc10"})))
            .unwrap_err();
        assert!(err.for_field("phone_number").is_some());

        let mut ok = payload(json!({"phone_number": "98765 43210"}));
        rules.apply(&mut ok).unwrap();
        assert_eq!(ok["phone_number"], "9876543210");
    }

    #[test]
    fn numeric_values_are_checked_but_kept() {
        let rules = RuleSet::new(vec![FieldRule::required("pincode", "Pincode").digits(6)]);
        let mut p = payload(json!({"pincode": 500001}));
        rules.apply(&mut p).unwrap();
        assert_eq!(p["pincode"], 500001);

        assert!(rules.apply(&mut payload(json!({"pincode": 5000}))).is_err());
    }

    #[test]
    fn optional_blank_fields_are_dropped() {
        let rules = RuleSet::new(vec![FieldRule::optional("email", "Email").pattern(Pattern::email())]);
        let mut p = payload(json!({"email": "  "}));
        rules.apply(&mut p).unwrap();
        assert!(!p.contains_key("email"));

        let err = rules.apply(&mut payload(json!({"email": "not-an-email"}))).unwrap_err();
        assert_eq!(err.for_field("email"), Some("Email must be a valid email address"));
    }

    #[test]
    fn all_failures_are_collected() {
        let rules = RuleSet::new(vec![
            FieldRule::required("name", "Name"),
            FieldRule::required("ifsc_code", "IFSC code")
                .pattern(Pattern::ifsc())
                .transform(Transform::Uppercase),
            FieldRule::required("area_acres", "Area").pattern(Pattern::PositiveNumber),
        ]);
        let err = rules
            .apply(&mut payload(json!({"ifsc_code": "bad", "area_acres": "0"})))
            .unwrap_err();
        assert_eq!(err.fields.len(), 3);
    }

    #[test]
    fn one_of_after_uppercase() {
        let rules = RuleSet::new(vec![
            FieldRule::required("ownership_type", "Ownership type")
                .pattern(Pattern::OneOf(&["OWNER", "LEASE", "ASSIGNED"]))
                .transform(Transform::Uppercase),
        ]);
        let mut p = payload(json!({"ownership_type": "lease"}));
        rules.apply(&mut p).unwrap();
        assert_eq!(p["ownership_type"], "LEASE");
        assert!(rules.apply(&mut payload(json!({"ownership_type": "rent"}))).is_err());
    }

    #[test]
    fn non_scalar_values_satisfy_presence_only_rules() {
        let rules = RuleSet::new(vec![
            FieldRule::required("crops", "Crops"),
            FieldRule::required("has_bank_account", "Bank account"),
        ]);
        rules
            .apply(&mut payload(json!({"crops": ["paddy"], "has_bank_account": true})))
            .unwrap();
    }

    #[test]
    fn non_scalar_values_fail_patterned_rules() {
        let rules = RuleSet::new(vec![
            FieldRule::required("phone_number", "Phone number").digits(10),
            FieldRule::required("aadhar_number", "Aadhaar number").digits(12),
            FieldRule::optional("pincode", "Pincode").digits(6),
        ]);
        let err = rules
            .apply(&mut payload(json!({
                "phone_number": true,
                "aadhar_number": ["x"],
                "pincode": {"a": 1}
            })))
            .unwrap_err();
        assert_eq!(err.fields.len(), 3);
        assert_eq!(
            err.for_field("phone_number"),
            Some("Phone number has an invalid value")
        );
        assert!(err.for_field("pincode").is_some());
    }
}
