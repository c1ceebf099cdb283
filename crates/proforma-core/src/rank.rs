//! Rank request and outcome types for the Jira Agile rank endpoint.
//!
//! The rank endpoint is semantically ambiguous across Jira deployments: Cloud
//! returns 204 No Content, some Server/DC versions return 207 Multi-Status
//! with a per-issue breakdown, and others return arbitrary JSON bodies. The
//! outcome is modeled as a tagged union so callers pattern-match exhaustively
//! instead of probing optional keys.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Where the ranked issues are placed relative to an anchor issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankAnchor {
    Before(String),
    After(String),
}

impl RankAnchor {
    /// Build an anchor from the two optional caller inputs.
    ///
    /// Exactly one of `before`/`after` must be supplied; anything else is a
    /// caller error surfaced before any network call.
    pub fn from_options(before: Option<String>, after: Option<String>) -> Result<Self> {
        match (before, after) {
            (Some(key), None) => Ok(RankAnchor::Before(key)),
            (None, Some(key)) => Ok(RankAnchor::After(key)),
            _ => Err(Error::Validation(
                "Exactly one of rank_before or rank_after must be provided".to_string(),
            )),
        }
    }

    /// Human-readable position, e.g. `"before PROJ-3"`.
    pub fn position(&self) -> String {
        match self {
            RankAnchor::Before(key) => format!("before {key}"),
            RankAnchor::After(key) => format!("after {key}"),
        }
    }
}

/// A validated request against the Agile rank endpoint.
#[derive(Debug, Clone)]
pub struct RankRequest {
    pub issues: Vec<String>,
    pub anchor: RankAnchor,
    /// Rank custom field id, only needed on Server/DC instances with
    /// non-standard rank fields
    pub custom_field_id: Option<String>,
}

impl RankRequest {
    /// Validate caller inputs and build a request.
    pub fn new(
        issues: Vec<String>,
        before: Option<String>,
        after: Option<String>,
        custom_field_id: Option<String>,
    ) -> Result<Self> {
        if issues.is_empty() {
            return Err(Error::Validation(
                "At least one issue key must be provided".to_string(),
            ));
        }
        let anchor = RankAnchor::from_options(before, after)?;
        Ok(Self {
            issues,
            anchor,
            custom_field_id,
        })
    }

    /// Wire payload for `POST /rest/agile/1.0/issue/rank`.
    pub fn payload(&self) -> Value {
        let mut body = json!({ "issues": self.issues });
        match &self.anchor {
            RankAnchor::Before(key) => body["rankBeforeIssue"] = json!(key),
            RankAnchor::After(key) => body["rankAfterIssue"] = json!(key),
        }
        if let Some(field_id) = &self.custom_field_id {
            body["rankCustomFieldId"] = json!(field_id);
        }
        body
    }
}

/// One issue that failed to rank in a 207 Multi-Status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankFailure {
    pub issue_key: String,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Normalized outcome of a rank call.
#[derive(Debug, Clone)]
pub enum RankOutcome {
    /// 204 No Content: every issue was ranked
    FullSuccess {
        issues: Vec<String>,
        rank_position: String,
    },
    /// 207 Multi-Status with a parseable body: some issues failed
    PartialSuccess {
        successful_issues: Vec<String>,
        failed_issues: Vec<RankFailure>,
        rank_position: String,
        /// Parsed response body, preserved for callers that want the raw shape
        raw: Value,
    },
    /// 207 Multi-Status whose body could not be parsed as JSON
    UnparseableMultiStatus { status_code: u16 },
    /// Any other 2xx with a JSON body: passed through unchanged
    Opaque(Value),
    /// Any other 2xx without a JSON body
    OpaqueSuccess {
        issues: Vec<String>,
        status_code: u16,
    },
}

impl RankOutcome {
    /// Build a partial-success outcome from a parsed 207 body.
    pub fn from_multi_status(raw: Value, rank_position: String) -> Self {
        let successful_issues = raw
            .get("successfulIssues")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        // Entries that don't match the documented shape still count as
        // failures; the raw entry is kept as the error detail.
        let failed_issues = raw
            .get("failedIssues")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        serde_json::from_value(entry.clone()).unwrap_or_else(|_| RankFailure {
                            issue_key: String::new(),
                            errors: vec![entry.clone()],
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        RankOutcome::PartialSuccess {
            successful_issues,
            failed_issues,
            rank_position,
            raw,
        }
    }

    /// Whether every issue in the request ended up ranked.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RankOutcome::FullSuccess { .. }
                | RankOutcome::Opaque(_)
                | RankOutcome::OpaqueSuccess { .. }
        )
    }

    /// Render the outcome as the JSON dictionary callers consume.
    pub fn to_json(&self) -> Value {
        match self {
            RankOutcome::FullSuccess {
                issues,
                rank_position,
            } => json!({
                "success": true,
                "message": format!("Successfully ranked issues: {}", issues.join(", ")),
                "issues": issues,
                "rank_position": rank_position,
            }),
            RankOutcome::PartialSuccess {
                successful_issues,
                failed_issues,
                rank_position,
                raw,
            } => {
                let mut out = raw.clone();
                if !out.is_object() {
                    out = json!({});
                }
                out["success"] = json!(false);
                out["partial_success"] = json!(true);
                out["message"] = json!(format!(
                    "Partially successful: {} issues ranked, {} issues failed",
                    successful_issues.len(),
                    failed_issues.len()
                ));
                out["rank_position"] = json!(rank_position);
                out
            }
            RankOutcome::UnparseableMultiStatus { status_code } => json!({
                "success": false,
                "message": "Received 207 Multi-Status but could not parse JSON response",
                "status_code": status_code,
            }),
            RankOutcome::Opaque(raw) => raw.clone(),
            RankOutcome::OpaqueSuccess {
                issues,
                status_code,
            } => json!({
                "success": true,
                "message": format!("Successfully ranked issues: {}", issues.join(", ")),
                "status_code": status_code,
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
