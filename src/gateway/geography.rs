//! Geography lookups and response normalization.
//!
//! `GET /geography` answers with several envelope shapes depending on the
//! level asked for. [`normalize_places`] is the single place that turns any
//! of them into a canonical list of [`Place`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Api, ApiRequest, endpoints};
use crate::error::GatewayError;

/// A selectable geography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
}

/// Which level of the hierarchy to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeoLevel {
    States,
    Districts { state_id: String },
    Mandals { district_id: String },
    Villages { mandal_id: String },
}

impl GeoLevel {
    fn request(&self) -> ApiRequest {
        let req = ApiRequest::get(endpoints::GEOGRAPHY);
        match self {
            Self::States => req,
            Self::Districts { state_id } => req.with_query("state_id", state_id.as_str()),
            Self::Mandals { district_id } => req.with_query("district_id", district_id.as_str()),
            Self::Villages { mandal_id } => req.with_query("mandal_id", mandal_id.as_str()),
        }
    }
}

/// Envelope keys that may hold the list.
const LIST_KEYS: &[&str] = &[
    "data", "results", "items", "states", "districts", "mandals", "villages",
];

/// Level prefixes for `<level>_id` / `<level>_name` item keys.
const LEVEL_PREFIXES: &[&str] = &["state", "district", "mandal", "village"];

fn find_list(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|inner| match inner {
                Value::Array(items) => Some(items),
                // One level of nesting, e.g. `{ data: { districts: [...] } }`.
                Value::Object(_) => find_list(inner),
                _ => None,
            }),
        _ => None,
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn place(item: &Value) -> Option<Place> {
    let map = item.as_object()?;
    let id = scalar(map.get("id")).or_else(|| {
        LEVEL_PREFIXES
            .iter()
            .find_map(|p| scalar(map.get(&format!("{p}_id"))))
    })?;
    let name = scalar(map.get("name")).or_else(|| {
        LEVEL_PREFIXES
            .iter()
            .find_map(|p| scalar(map.get(&format!("{p}_name"))))
    })?;
    Some(Place { id, name })
}

/// Normalize any known geography response into `Vec<Place>`.
///
/// Items missing either an id or a name are dropped.
pub fn normalize_places(body: &Value) -> Vec<Place> {
    find_list(body)
        .map(|items| items.iter().filter_map(place).collect())
        .unwrap_or_default()
}

/// Fetch and normalize one level of the geography hierarchy.
pub async fn fetch_places(api: &dyn Api, level: &GeoLevel) -> Result<Vec<Place>, GatewayError> {
    let body = api.send(level.request()).await?;
    Ok(normalize_places(&body))
}
