//! Officer onboarding: a single step with document uploads.
//!
//! Documents are given as local file paths under `<doc>_file`. Before the
//! step is submitted each file is uploaded through [`ObjectStorage`] and
//! replaced by `<doc>_url`. A document that already has a URL (pre-filled
//! from an existing officer) is kept as is.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use super::{EntityKind, WizardFlow, fields};
use crate::error::{ValidationErrors, WizardError};
use crate::gateway::{FileAttachment, ObjectStorage};
use crate::validation::{FieldRule, Pattern, RuleSet};

/// Documents every officer must supply: (payload stem, label).
const DOCUMENTS: &[(&str, &str)] = &[("photo", "Photo"), ("id_proof", "ID proof")];

pub struct OfficerFlow {
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl OfficerFlow {
    pub fn new(storage: Option<Arc<dyn ObjectStorage>>) -> Self {
        Self { storage }
    }

    fn has_value(payload: &Map<String, Value>, key: &str) -> bool {
        payload
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty())
    }
}

#[async_trait]
impl WizardFlow for OfficerFlow {
    fn kind(&self) -> EntityKind {
        EntityKind::Officer
    }

    fn completion_flags(&self) -> &'static [&'static str] {
        &["is_profile_completed"]
    }

    fn rules(&self, step: usize, _payload: &Map<String, Value>, _accepted: &[Map<String, Value>]) -> RuleSet {
        match step {
            1 => {
                let mut rules = RuleSet::new(vec![
                    fields::name("name", "Name"),
                    fields::phone_number(),
                    FieldRule::required("email", "Email").pattern(Pattern::email()),
                    FieldRule::required("designation", "Designation"),
                    FieldRule::required("employee_id", "Employee ID"),
                ]);
                rules.extend(fields::location());
                rules
            }
            _ => RuleSet::default(),
        }
    }

    fn prefill_fields(&self, step: usize) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = self.rules(step, &Map::new(), &[]).fields().collect();
        if step == 1 {
            fields.extend(["photo_url", "id_proof_url"]);
        }
        fields
    }

    async fn prepare(
        &self,
        _step: usize,
        mut payload: Map<String, Value>,
    ) -> Result<Map<String, Value>, WizardError> {
        let mut missing = ValidationErrors::default();
        let mut uploads = Vec::new();

        for (stem, label) in DOCUMENTS {
            let file_key = format!("{stem}_file");
            let url_key = format!("{stem}_url");
            if Self::has_value(&payload, &file_key) {
                uploads.push((file_key, url_key));
            } else if !Self::has_value(&payload, &url_key) {
                missing.push(&file_key, format!("{label} is required"));
            }
        }
        if !missing.is_empty() {
            return Err(missing.into());
        }
        if uploads.is_empty() {
            return Ok(payload);
        }

        let storage = self.storage.as_ref().ok_or_else(|| WizardError::Prepare {
            kind: self.kind().to_string(),
            reason: "document uploads are not configured".into(),
        })?;

        for (file_key, url_key) in uploads {
            let path = payload
                .remove(&file_key)
                .and_then(|v| v.as_str().map(PathBuf::from))
                .unwrap_or_default();
            let file = FileAttachment::from_path(&path)
                .await
                .map_err(|e| WizardError::Prepare {
                    kind: self.kind().to_string(),
                    reason: format!("cannot read {}: {e}", path.display()),
                })?;
            let url = storage
                .upload(self.kind().collection().trim_start_matches('/'), file)
                .await
                .map_err(|e| WizardError::Prepare {
                    kind: self.kind().to_string(),
                    reason: e.to_string(),
                })?;
            info!(field = %url_key, "Officer document uploaded");
            payload.insert(url_key, Value::String(url));
        }

        Ok(payload)
    }
}
