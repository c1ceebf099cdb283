//! Client for the legacy entity-properties Forms API.
//!
//! Before the Forms REST API existed, ProForma stored forms as issue entity
//! properties under `proforma.forms`. Form identifiers are `i`-prefixed
//! strings and the property value nests each form under its own key. This
//! client also covers the operations the new API never offered a direct
//! replacement for on old deployments: reopening, submitting, and updating a
//! linked Jira custom field.

use std::time::Duration;

use proforma_core::{normalize_form, ApiGeneration, Error, Form, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Timeout for entity-property operations.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the legacy entity-properties Forms API.
pub struct LegacyFormsClient {
    base_url: String,
    email: String,
    token: String,
    client: reqwest::Client,
}

impl LegacyFormsClient {
    /// Create a client for a Jira instance URL.
    pub fn new(
        url: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            token: token.into(),
            client: reqwest::Client::builder()
                .user_agent("proforma-tools")
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Issue a JSON request against the Jira REST API and map the status.
    async fn send_json(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        debug!(method = %method, endpoint = endpoint, "Legacy forms request");

        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, endpoint))
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| Error::Http(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let text = response.text().await.unwrap_or_default();
            warn!(
                status = status_code,
                endpoint = endpoint,
                "Legacy forms API error response"
            );
            return Err(match status_code {
                403 => Error::Authorization(format!("Insufficient permissions: {endpoint}")),
                404 => Error::NotFound(format!("Resource not found: {endpoint}")),
                _ => Error::transport(endpoint, status_code, &text),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(json!({}));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Validation(format!("Failed to parse response: {e}")))
    }

    /// Get all forms stored on an issue.
    ///
    /// The property value maps `i`-prefixed form keys to form payloads; only
    /// those keys are forms. A 404 means no forms and yields an empty list.
    pub async fn list_forms(&self, issue_key: &str) -> Result<Vec<Form>> {
        let endpoint = format!("/rest/api/3/issue/{issue_key}/properties/proforma.forms");
        let response = match self.send_json(reqwest::Method::GET, &endpoint, None).await {
            Ok(value) => value,
            Err(Error::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let forms_data = response
            .get("value")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut forms = Vec::new();
        for (form_key, form_data) in &forms_data {
            if !form_key.starts_with('i') {
                continue;
            }
            match normalize_form(form_data, issue_key, ApiGeneration::Legacy) {
                Ok(mut form) => {
                    // The property key is the authoritative form id
                    form.form_id = form_key.clone();
                    forms.push(form);
                }
                Err(e) => {
                    warn!(issue = issue_key, form = %form_key, error = %e, "Skipping malformed form entry");
                }
            }
        }

        Ok(forms)
    }

    /// Get a single form by its `i`-prefixed id. A 404 or an empty property
    /// value yields `None`.
    pub async fn get_form(&self, issue_key: &str, form_id: &str) -> Result<Option<Form>> {
        let endpoint =
            format!("/rest/api/3/issue/{issue_key}/properties/proforma.forms.{form_id}");
        let response = match self.send_json(reqwest::Method::GET, &endpoint, None).await {
            Ok(value) => value,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let form_data = match response.get("value") {
            Some(value) if value.as_object().is_some_and(|o| !o.is_empty()) => value,
            _ => return Ok(None),
        };

        let mut form = normalize_form(form_data, issue_key, ApiGeneration::Legacy)?;
        form.form_id = form_id.to_string();
        Ok(Some(form))
    }

    /// Reopen a submitted form so it can be edited again.
    pub async fn reopen_form(&self, issue_key: &str, form_id: &str) -> Result<Value> {
        let endpoint =
            format!("/rest/api/3/issue/{issue_key}/properties/proforma.forms.{form_id}");
        let body = json!({"value": {"state": {"status": "o"}}});

        let response = self
            .send_json(reqwest::Method::PUT, &endpoint, Some(&body))
            .await
            .map_err(|e| contextualize_form_error(e, issue_key, form_id, "reopen"))?;

        info!(issue = issue_key, form = form_id, "Reopened form");
        Ok(response)
    }

    /// Submit a form after changes are made.
    pub async fn submit_form(&self, issue_key: &str, form_id: &str) -> Result<Value> {
        let endpoint =
            format!("/rest/api/3/issue/{issue_key}/properties/proforma.forms.{form_id}/submit");

        let response = self
            .send_json(reqwest::Method::POST, &endpoint, None)
            .await
            .map_err(|e| contextualize_form_error(e, issue_key, form_id, "submit"))?;

        info!(issue = issue_key, form = form_id, "Submitted form");
        Ok(response)
    }

    /// Update a form field indirectly via its linked Jira custom field.
    ///
    /// Often more reliable than mutating the property blob directly.
    pub async fn update_form_field(
        &self,
        issue_key: &str,
        field_id: &str,
        field_value: Value,
    ) -> Result<Value> {
        let endpoint = format!("/rest/api/3/issue/{issue_key}");
        let body = json!({"fields": {field_id: field_value}});

        let response = self
            .send_json(reqwest::Method::PUT, &endpoint, Some(&body))
            .await
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!("Issue {issue_key} not found")),
                Error::Authorization(_) => Error::Authorization(format!(
                    "Insufficient permissions to update field {field_id}"
                )),
                other => other,
            })?;

        info!(issue = issue_key, field = field_id, "Updated form field");
        Ok(response)
    }
}

/// Rewrite generic 403/404 errors with form-operation context.
fn contextualize_form_error(error: Error, issue_key: &str, form_id: &str, action: &str) -> Error {
    match error {
        Error::NotFound(_) => {
            Error::NotFound(format!("Form {form_id} not found for issue {issue_key}"))
        }
        Error::Authorization(_) => {
            Error::Authorization(format!("Insufficient permissions to {action} form {form_id}"))
        }
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================
