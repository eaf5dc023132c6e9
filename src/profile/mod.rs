//! User profile model and the profile editor.
//!
//! Profiles are loosely typed: the shape depends on the role, and any
//! field the client does not model is kept in `other` so it survives a
//! persist/hydrate round trip.

pub mod editor;

pub use editor::ProfileEditor;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::GatewayError;
use crate::gateway::{Api, ApiRequest, endpoints};

/// Role of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    FieldOfficer,
    Agent,
    Farmer,
    Other(String),
}

impl Role {
    /// Parse a backend role value. Display values are accepted too.
    pub fn from_backend(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            "FIELD_OFFICER" | "AGRICULTURE_OFFICER" => Self::FieldOfficer,
            "AGENT" => Self::Agent,
            "FARMER" => Self::Farmer,
            _ => Self::Other(value.to_string()),
        }
    }

    /// Value the backend uses for this role.
    pub fn backend_value(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::FieldOfficer => "FIELD_OFFICER",
            Self::Agent => "AGENT",
            Self::Farmer => "FARMER",
            Self::Other(v) => v,
        }
    }

    /// Value shown in the dashboard.
    pub fn display_value(&self) -> &str {
        match self {
            Self::FieldOfficer => "AGRICULTURE_OFFICER",
            other => other.backend_value(),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_value())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.backend_value())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_backend(&raw))
    }
}

/// Accept ids and pincodes sent either as strings or as numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A string field that may arrive as `null` or as a number.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(string_or_number(deserializer)?.unwrap_or_default())
}

/// An object field that may arrive as `null`.
fn lenient_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Map<String, Value>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

/// A count sent as a number or a numeric string. Anything else reads as absent.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(decimal_from))
}

/// Read an exact decimal from a JSON number or numeric string.
pub(crate) fn decimal_from(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, alias = "address_line", skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub village: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub pincode: Option<String>,
}

/// Profile of the signed-in user as returned by `GET /users/mobile/{phone}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(
        rename = "phoneNumber",
        alias = "phone_number",
        default,
        deserialize_with = "lenient_string"
    )]
    pub phone_number: String,
    #[serde(
        rename = "userId",
        alias = "user_id",
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "Map::is_empty")]
    pub extra_details: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub no_of_lands: Option<u64>,
    #[serde(default, deserialize_with = "lenient_decimal", skip_serializing_if = "Option::is_none")]
    pub no_of_acres: Option<Decimal>,
    /// Role-specific fields not modelled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Profile {
    /// Identifier used by `PATCH /users/{id}`. Falls back to a bare `id`.
    pub fn id(&self) -> Option<String> {
        self.user_id.clone().or_else(|| match self.other.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Role as shown in the dashboard, e.g. `AGRICULTURE_OFFICER`.
    pub fn display_role(&self) -> Option<&str> {
        self.role.as_ref().map(Role::display_value)
    }

    /// Read a numeric aggregate counter such as `no_of_farmers`.
    ///
    /// Counters live at the top level or under `extra_details`, as numbers
    /// or numeric strings. Missing counters read as zero.
    pub fn counter(&self, key: &str) -> u64 {
        let raw = self.other.get(key).or_else(|| self.extra_details.get(key));
        match raw {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Decode a profile from a response body. Bodies wrapped as
    /// `{ "data": {...} }` or `{ "user": {...} }` are unwrapped.
    pub fn from_response(path: &str, body: Value) -> Result<Self, GatewayError> {
        let inner = match body {
            Value::Object(mut map) => {
                let wrapped = ["data", "user"]
                    .iter()
                    .find(|k| map.get(**k).is_some_and(Value::is_object))
                    .copied();
                match wrapped.and_then(|k| map.remove(k)) {
                    Some(inner) => inner,
                    None => Value::Object(map),
                }
            }
            other => {
                return Err(GatewayError::InvalidResponse {
                    path: path.to_string(),
                    reason: format!("expected a profile object, got {other}"),
                });
            }
        };
        serde_json::from_value(inner).map_err(|e| GatewayError::InvalidResponse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Fetch the profile for a phone number.
pub async fn fetch_profile(api: &dyn Api, phone: &str) -> Result<Profile, GatewayError> {
    let path = endpoints::profile_by_phone(phone);
    let body = api.send(ApiRequest::get(&path)).await?;
    Profile::from_response(&path, body)
}
