//! Canonical ProForma form model and normalization.
//!
//! Jira exposes forms through two incompatible API generations: the legacy
//! entity-properties API (`i`-prefixed form ids, explicit `state` object, flat
//! field list) and the new Forms REST API (UUID ids, boolean `submitted` flag,
//! ADF layout document). Both are normalized into one `Form` type here so the
//! rest of the codebase never has to care which generation a payload came from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

/// Which Jira Forms API generation produced a raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    /// Entity-properties API: `i`-prefixed ids, nested `state` object
    Legacy,
    /// Forms REST API: UUID ids, boolean `submitted`, ADF `design` document
    New,
}

/// Lifecycle status of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Open,
    Submitted,
}

/// State of a form, including submission metadata when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormState {
    pub status: FormStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

/// A single field in a legacy-API form.
///
/// New-API forms carry their layout as an opaque ADF document in
/// [`Form::design`] instead; their `fields` list stays empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
}

/// Canonical form representation, independent of the source API generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Identifier as returned by the API (UUID for new, `form_...` for legacy)
    pub id: String,
    /// Identifier used in subsequent API calls (`i`-prefixed for legacy,
    /// equal to `id` for new)
    pub form_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: FormState,
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default)]
    pub locked: bool,
    /// Raw ADF layout document (new API only). Carried opaquely for the
    /// caller; never parsed into `fields`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<Value>,
}

impl Form {
    /// Whether the form is open for editing.
    pub fn is_open(&self) -> bool {
        self.state.status == FormStatus::Open
    }

    /// Whether the form has been submitted.
    pub fn is_submitted(&self) -> bool {
        self.state.status == FormStatus::Submitted
    }
}

/// Normalize a raw form payload from either API generation.
///
/// Missing optional keys default to `None`/empty/false; the only failure mode
/// is a payload that is not a JSON object where one was required.
pub fn normalize_form(raw: &Value, issue_key: &str, generation: ApiGeneration) -> Result<Form> {
    let obj = raw.as_object().ok_or_else(|| {
        Error::Validation(format!(
            "Expected a JSON object for form payload, got {}",
            json_type_name(raw)
        ))
    })?;

    let form = match generation {
        ApiGeneration::New => {
            let id = get_string(obj, "id").unwrap_or_default();
            let submitted = obj
                .get("submitted")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let status = if submitted {
                FormStatus::Submitted
            } else {
                FormStatus::Open
            };

            Form {
                form_id: id.clone(),
                id,
                name: get_string(obj, "name"),
                // Not present in new-API list/detail payloads
                description: None,
                state: FormState {
                    status,
                    version: None,
                    submitted_at: None,
                    submitted_by: None,
                },
                // ADF layout is not parsed into flat fields; see `design`
                fields: Vec::new(),
                issue_key: Some(issue_key.to_string()),
                updated: get_string(obj, "updated"),
                internal: obj
                    .get("internal")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                submitted,
                locked: obj
                    .get("locked")
                    .or_else(|| obj.get("lock"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                design: obj.get("design").cloned(),
            }
        }
        ApiGeneration::Legacy => {
            let id = get_string(obj, "id").unwrap_or_default();
            let state_obj = obj.get("state").and_then(Value::as_object);
            let status = match state_obj
                .and_then(|s| s.get("status"))
                .and_then(Value::as_str)
            {
                Some("s") => FormStatus::Submitted,
                // "o" or anything else is treated as open
                _ => FormStatus::Open,
            };

            let fields = obj
                .get("fields")
                .and_then(Value::as_array)
                .map(|entries| entries.iter().map(normalize_field).collect())
                .unwrap_or_default();

            Form {
                form_id: get_string(obj, "formId").unwrap_or_else(|| id.clone()),
                id,
                name: get_string(obj, "name"),
                description: get_string(obj, "description"),
                state: FormState {
                    status,
                    version: state_obj.and_then(|s| get_string(s, "version")),
                    submitted_at: state_obj.and_then(|s| get_string(s, "submittedAt")),
                    submitted_by: state_obj.and_then(|s| get_string(s, "submittedBy")),
                },
                fields,
                issue_key: Some(issue_key.to_string()),
                updated: get_string(obj, "updated"),
                internal: false,
                submitted: status == FormStatus::Submitted,
                locked: false,
                design: None,
            }
        }
    };

    Ok(form)
}

/// Normalize every entry of a bulk listing, skipping malformed ones.
///
/// One bad form must not fail the whole listing; skipped entries are logged.
pub fn normalize_forms(
    entries: &[Value],
    issue_key: &str,
    generation: ApiGeneration,
) -> Vec<Form> {
    let mut forms = Vec::with_capacity(entries.len());
    for entry in entries {
        match normalize_form(entry, issue_key, generation) {
            Ok(form) => forms.push(form),
            Err(e) => {
                warn!(issue = issue_key, error = %e, "Skipping malformed form entry");
            }
        }
    }
    forms
}

fn normalize_field(raw: &Value) -> FormField {
    let obj = raw.as_object();
    let get = |key: &str| obj.and_then(|o| get_string(o, key));
    FormField {
        id: get("id").unwrap_or_default(),
        name: get("name").unwrap_or_default(),
        field_type: get("type").unwrap_or_else(|| "text".to_string()),
        value: obj
            .and_then(|o| o.get("value"))
            .cloned()
            .unwrap_or(Value::Null),
        required: obj
            .and_then(|o| o.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        read_only: obj
            .and_then(|o| o.get("readOnly"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn get_string(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_open_form() -> Value {
        json!({
            "id": "form_12345",
            "formId": "i12345",
            "name": "Service Request Form",
            "description": "Form for service requests and incidents",
            "state": {
                "status": "o",
                "version": "1.0",
                "submittedAt": null,
                "submittedBy": null
            },
            "fields": [
                {
                    "id": "customfield_10001",
                    "name": "Text Field",
                    "type": "text",
                    "value": "Sample text value",
                    "required": true,
                    "readOnly": false
                },
                {
                    "id": "customfield_10003",
                    "name": "Urgent Priority",
                    "type": "checkbox",
                    "value": false
                }
            ],
            "updated": "2025-01-01T09:30:00Z"
        })
    }

    fn new_api_form(submitted: bool) -> Value {
        json!({
            "id": "1946b8b7-8f03-4dc0-ac2d-5fac0d960c6a",
            "name": "Change Request",
            "internal": true,
            "submitted": submitted,
            "lock": false,
            "updated": "2025-02-10T12:00:00Z",
            "design": {"layout": [{"type": "doc", "version": 1, "content": []}]}
        })
    }

    // =========================================================================
    // Legacy generation
    // =========================================================================

    #[test]
    fn test_legacy_open_form() {
        let form = normalize_form(&legacy_open_form(), "PROJ-123", ApiGeneration::Legacy).unwrap();

        assert_eq!(form.id, "form_12345");
        assert_eq!(form.form_id, "i12345");
        assert_eq!(form.name.as_deref(), Some("Service Request Form"));
        assert_eq!(
            form.description.as_deref(),
            Some("Form for service requests and incidents")
        );
        assert_eq!(form.issue_key.as_deref(), Some("PROJ-123"));
        assert_eq!(form.state.version.as_deref(), Some("1.0"));
        assert!(form.is_open());
        assert!(!form.is_submitted());
        assert!(!form.submitted);
        assert!(form.design.is_none());
    }

    #[test]
    fn test_legacy_submitted_form() {
        let raw = json!({
            "id": "form_67890",
            "state": {
                "status": "s",
                "version": "1.0",
                "submittedAt": "2025-01-01T10:00:00Z",
                "submittedBy": "test-user@example.com"
            }
        });
        let form = normalize_form(&raw, "PROJ-456", ApiGeneration::Legacy).unwrap();

        assert!(form.is_submitted());
        assert!(!form.is_open());
        assert!(form.submitted);
        assert_eq!(
            form.state.submitted_at.as_deref(),
            Some("2025-01-01T10:00:00Z")
        );
        assert_eq!(
            form.state.submitted_by.as_deref(),
            Some("test-user@example.com")
        );
    }

    #[test]
    fn test_legacy_form_id_falls_back_to_id() {
        let raw = json!({"id": "form_1", "state": {"status": "o"}});
        let form = normalize_form(&raw, "PROJ-1", ApiGeneration::Legacy).unwrap();
        assert_eq!(form.form_id, "form_1");
    }

    #[test]
    fn test_legacy_fields_mapped_with_defaults() {
        let form = normalize_form(&legacy_open_form(), "PROJ-123", ApiGeneration::Legacy).unwrap();
        assert_eq!(form.fields.len(), 2);

        let text = &form.fields[0];
        assert_eq!(text.id, "customfield_10001");
        assert_eq!(text.field_type, "text");
        assert_eq!(text.value, json!("Sample text value"));
        assert!(text.required);
        assert!(!text.read_only);

        // required/readOnly absent -> false
        let checkbox = &form.fields[1];
        assert!(!checkbox.required);
        assert!(!checkbox.read_only);
        assert_eq!(checkbox.value, json!(false));
    }

    #[test]
    fn test_legacy_missing_state_defaults_open() {
        let raw = json!({"id": "form_1"});
        let form = normalize_form(&raw, "PROJ-1", ApiGeneration::Legacy).unwrap();
        assert!(form.is_open());
        assert!(form.state.version.is_none());
        assert!(form.fields.is_empty());
    }

    // =========================================================================
    // New generation
    // =========================================================================

    #[test]
    fn test_new_api_submitted_flag() {
        let form = normalize_form(&new_api_form(true), "PROJ-9", ApiGeneration::New).unwrap();
        assert!(form.is_submitted());
        assert!(!form.is_open());
        assert!(form.submitted);

        let form = normalize_form(&new_api_form(false), "PROJ-9", ApiGeneration::New).unwrap();
        assert!(form.is_open());
        assert!(!form.is_submitted());
        assert!(!form.submitted);
    }

    #[test]
    fn test_new_api_form_id_equals_id() {
        let form = normalize_form(&new_api_form(false), "PROJ-9", ApiGeneration::New).unwrap();
        assert_eq!(form.id, "1946b8b7-8f03-4dc0-ac2d-5fac0d960c6a");
        assert_eq!(form.form_id, form.id);
    }

    #[test]
    fn test_new_api_fields_empty_design_preserved() {
        let form = normalize_form(&new_api_form(false), "PROJ-9", ApiGeneration::New).unwrap();
        assert!(form.fields.is_empty());
        assert!(form.description.is_none());
        assert!(form.design.is_some());
        assert_eq!(form.updated.as_deref(), Some("2025-02-10T12:00:00Z"));
        assert!(form.internal);
        assert!(!form.locked);
    }

    #[test]
    fn test_new_api_missing_keys_default() {
        let raw = json!({"id": "abc"});
        let form = normalize_form(&raw, "PROJ-1", ApiGeneration::New).unwrap();
        assert!(form.is_open());
        assert!(!form.internal);
        assert!(!form.locked);
        assert!(form.design.is_none());
        assert!(form.name.is_none());
    }

    // =========================================================================
    // Shape errors and bulk handling
    // =========================================================================

    #[test]
    fn test_non_object_payload_is_validation_error() {
        let err = normalize_form(&json!(["not", "a", "form"]), "PROJ-1", ApiGeneration::New)
            .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("array")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bulk_skips_malformed_entries() {
        let entries = vec![new_api_form(false), json!("garbage"), json!(42)];
        let forms = normalize_forms(&entries, "PROJ-1", ApiGeneration::New);
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].id, "1946b8b7-8f03-4dc0-ac2d-5fac0d960c6a");
    }

    #[test]
    fn test_form_serializes_without_empty_options() {
        let form = normalize_form(&json!({"id": "abc"}), "PROJ-1", ApiGeneration::New).unwrap();
        let out = serde_json::to_value(&form).unwrap();
        assert!(out.get("description").is_none());
        assert!(out.get("design").is_none());
        assert_eq!(out["state"]["status"], "open");
    }
}
