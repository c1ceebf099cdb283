//! Tool handlers for the MCP server.
//!
//! This module implements the actual tool execution logic, calling the Forms
//! and Rank clients and rendering every result as a JSON text document. Both
//! successes and failures are JSON objects; failures always take the shape
//! `{"success": false, "error": "..."}`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use proforma_core::RankRequest;
use proforma_forms::{Answer, FormsClient, LegacyFormsClient};
use proforma_rank::RankClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::{ToolCallResult, ToolDefinition};

/// Tool handler that executes tools using the configured clients.
///
/// Each client is optional; tools whose client is missing fail with a
/// configuration error instead of panicking, so a rank-only or forms-only
/// deployment still serves the tools it can.
#[derive(Default)]
pub struct ToolHandler {
    forms: Option<Arc<FormsClient>>,
    legacy: Option<Arc<LegacyFormsClient>>,
    rank: Option<Arc<RankClient>>,
}

impl ToolHandler {
    /// Create a handler with no clients configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the new-generation Forms API client.
    pub fn with_forms_client(mut self, client: Arc<FormsClient>) -> Self {
        self.forms = Some(client);
        self
    }

    /// Attach the legacy entity-properties forms client.
    pub fn with_legacy_client(mut self, client: Arc<LegacyFormsClient>) -> Self {
        self.legacy = Some(client);
        self
    }

    /// Attach the Agile rank client.
    pub fn with_rank_client(mut self, client: Arc<RankClient>) -> Self {
        self.rank = Some(client);
        self
    }

    /// Get available tool definitions.
    pub fn available_tools(&self) -> Vec<ToolDefinition> {
        let issue_only = json!({
            "type": "object",
            "properties": {
                "issue_key": {
                    "type": "string",
                    "description": "Jira issue key, e.g. PROJ-123"
                }
            },
            "required": ["issue_key"]
        });
        let issue_and_form = json!({
            "type": "object",
            "properties": {
                "issue_key": {
                    "type": "string",
                    "description": "Jira issue key, e.g. PROJ-123"
                },
                "form_id": {
                    "type": "string",
                    "description": "Form identifier on the issue"
                }
            },
            "required": ["issue_key", "form_id"]
        });

        vec![
            ToolDefinition {
                name: "get_issue_forms".to_string(),
                description: "List all ProForma forms attached to a Jira issue".to_string(),
                input_schema: issue_only.clone(),
            },
            ToolDefinition {
                name: "get_form_details".to_string(),
                description: "Get a single ProForma form from an issue".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "update_form_answers".to_string(),
                description: "Save answers on a ProForma form".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "issue_key": {
                            "type": "string",
                            "description": "Jira issue key, e.g. PROJ-123"
                        },
                        "form_id": {
                            "type": "string",
                            "description": "Form identifier on the issue"
                        },
                        "answers": {
                            "type": "array",
                            "description": "Answer objects with questionId, type and value",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "questionId": { "type": "string" },
                                    "type": { "type": "string" },
                                    "value": {}
                                },
                                "required": ["questionId", "type", "value"]
                            }
                        }
                    },
                    "required": ["issue_key", "form_id", "answers"]
                }),
            },
            ToolDefinition {
                name: "add_form_template".to_string(),
                description: "Attach a form template to a Jira issue".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "issue_key": {
                            "type": "string",
                            "description": "Jira issue key, e.g. PROJ-123"
                        },
                        "template_id": {
                            "type": "string",
                            "description": "Project form template identifier"
                        }
                    },
                    "required": ["issue_key", "template_id"]
                }),
            },
            ToolDefinition {
                name: "delete_form".to_string(),
                description: "Delete a ProForma form from an issue".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "get_form_attachments".to_string(),
                description: "List attachment metadata for a ProForma form".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "export_form_pdf".to_string(),
                description: "Export a ProForma form as PDF (base64-encoded)".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "export_form_xlsx".to_string(),
                description: "Export a ProForma form as XLSX (base64-encoded)".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "reopen_form".to_string(),
                description: "Reopen a submitted ProForma form for editing".to_string(),
                input_schema: issue_and_form.clone(),
            },
            ToolDefinition {
                name: "submit_form".to_string(),
                description: "Submit a ProForma form on an issue".to_string(),
                input_schema: issue_and_form,
            },
            ToolDefinition {
                name: "update_form_field".to_string(),
                description: "Update a Jira issue field linked to a form question".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "issue_key": {
                            "type": "string",
                            "description": "Jira issue key, e.g. PROJ-123"
                        },
                        "field_id": {
                            "type": "string",
                            "description": "Jira field id, e.g. customfield_10042"
                        },
                        "value": {
                            "description": "New field value, passed to Jira unchanged"
                        }
                    },
                    "required": ["issue_key", "field_id", "value"]
                }),
            },
            ToolDefinition {
                name: "rank_issues".to_string(),
                description: "Rank Jira issues before or after an anchor issue on the board"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "issues": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Issue keys to rank, in the desired order"
                        },
                        "rank_before": {
                            "type": "string",
                            "description": "Anchor issue the ranked issues land above"
                        },
                        "rank_after": {
                            "type": "string",
                            "description": "Anchor issue the ranked issues land below"
                        },
                        "rank_custom_field_id": {
                            "type": "string",
                            "description": "Rank custom field id, for boards with several rank fields"
                        }
                    },
                    "required": ["issues"]
                }),
            },
        ]
    }

    /// Execute a tool by name with arguments.
    pub async fn execute(&self, name: &str, arguments: Option<Value>) -> ToolCallResult {
        match name {
            "get_issue_forms" => self.handle_get_issue_forms(arguments).await,
            "get_form_details" => self.handle_get_form_details(arguments).await,
            "update_form_answers" => self.handle_update_form_answers(arguments).await,
            "add_form_template" => self.handle_add_form_template(arguments).await,
            "delete_form" => self.handle_delete_form(arguments).await,
            "get_form_attachments" => self.handle_get_form_attachments(arguments).await,
            "export_form_pdf" => self.handle_export(arguments, "pdf").await,
            "export_form_xlsx" => self.handle_export(arguments, "xlsx").await,
            "reopen_form" => self.handle_reopen_form(arguments).await,
            "submit_form" => self.handle_submit_form(arguments).await,
            "update_form_field" => self.handle_update_form_field(arguments).await,
            "rank_issues" => self.handle_rank_issues(arguments).await,
            _ => ToolCallResult::error(format!("Unknown tool: {}", name)),
        }
    }

    fn forms_client(&self) -> Result<&Arc<FormsClient>, ToolCallResult> {
        self.forms.as_ref().ok_or_else(|| {
            ToolCallResult::error(
                "Forms API is not configured (set forms.cloud_id)".to_string(),
            )
        })
    }

    fn legacy_client(&self) -> Result<&Arc<LegacyFormsClient>, ToolCallResult> {
        self.legacy.as_ref().ok_or_else(|| {
            ToolCallResult::error("Jira is not configured (set jira.url)".to_string())
        })
    }

    fn rank_client(&self) -> Result<&Arc<RankClient>, ToolCallResult> {
        self.rank.as_ref().ok_or_else(|| {
            ToolCallResult::error("Jira is not configured (set jira.url)".to_string())
        })
    }

    async fn handle_get_issue_forms(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: IssueParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client.list_forms(&params.issue_key).await {
            Ok(forms) => ToolCallResult::json(&json!({
                "success": true,
                "issue_key": params.issue_key,
                "count": forms.len(),
                "forms": forms,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_get_form_details(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client.get_form(&params.issue_key, &params.form_id).await {
            // An absent form is an ordinary outcome, not an error.
            Ok(form) => ToolCallResult::json(&json!({
                "success": true,
                "form": form,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_update_form_answers(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: UpdateAnswersParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client
            .update_answers(&params.issue_key, &params.form_id, &params.answers)
            .await
        {
            Ok(result) => ToolCallResult::json(&json!({
                "success": true,
                "result": result,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_add_form_template(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: AddTemplateParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client
            .add_template(&params.issue_key, &params.template_id)
            .await
        {
            Ok(result) => ToolCallResult::json(&json!({
                "success": true,
                "result": result,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_delete_form(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client.delete_form(&params.issue_key, &params.form_id).await {
            Ok(()) => ToolCallResult::json(&json!({
                "success": true,
                "message": format!(
                    "Form {} deleted from issue {}",
                    params.form_id, params.issue_key
                ),
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_get_form_attachments(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client
            .list_attachments(&params.issue_key, &params.form_id)
            .await
        {
            Ok(attachments) => ToolCallResult::json(&json!({
                "success": true,
                "count": attachments.len(),
                "attachments": attachments,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_export(&self, arguments: Option<Value>, format: &str) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.forms_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        let result = match format {
            "pdf" => client.export_pdf(&params.issue_key, &params.form_id).await,
            _ => client.export_xlsx(&params.issue_key, &params.form_id).await,
        };

        match result {
            Ok(bytes) => ToolCallResult::json(&json!({
                "success": true,
                "format": format,
                "size": bytes.len(),
                "content": BASE64.encode(&bytes),
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_reopen_form(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.legacy_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client.reopen_form(&params.issue_key, &params.form_id).await {
            Ok(result) => ToolCallResult::json(&json!({
                "success": true,
                "result": result,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_submit_form(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: FormParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.legacy_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client.submit_form(&params.issue_key, &params.form_id).await {
            Ok(result) => ToolCallResult::json(&json!({
                "success": true,
                "result": result,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_update_form_field(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: UpdateFieldParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.legacy_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        match client
            .update_form_field(&params.issue_key, &params.field_id, params.value)
            .await
        {
            Ok(result) => ToolCallResult::json(&json!({
                "success": true,
                "result": result,
            })),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }

    async fn handle_rank_issues(&self, arguments: Option<Value>) -> ToolCallResult {
        let params: RankParams = match parse_args(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let client = match self.rank_client() {
            Ok(c) => c,
            Err(e) => return e,
        };

        let request = match RankRequest::new(
            params.issues,
            params.rank_before,
            params.rank_after,
            params.rank_custom_field_id,
        ) {
            Ok(r) => r,
            Err(e) => return ToolCallResult::error(e.to_string()),
        };

        // Partial success is reported in the JSON body, not as a tool error.
        match client.rank(&request).await {
            Ok(outcome) => ToolCallResult::json(&outcome.to_json()),
            Err(e) => ToolCallResult::error(e.to_string()),
        }
    }
}

/// Deserialize tool arguments, turning missing or mistyped fields into an
/// error result instead of a protocol failure.
fn parse_args<T: DeserializeOwned>(arguments: Option<Value>) -> Result<T, ToolCallResult> {
    let value = arguments.unwrap_or_else(|| json!({}));
    serde_json::from_value(value)
        .map_err(|e| ToolCallResult::error(format!("Invalid arguments: {}", e)))
}

#[derive(Debug, Deserialize)]
struct IssueParams {
    issue_key: String,
}

#[derive(Debug, Deserialize)]
struct FormParams {
    issue_key: String,
    form_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateAnswersParams {
    issue_key: String,
    form_id: String,
    answers: Vec<Answer>,
}

#[derive(Debug, Deserialize)]
struct AddTemplateParams {
    issue_key: String,
    template_id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateFieldParams {
    issue_key: String,
    field_id: String,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct RankParams {
    issues: Vec<String>,
    #[serde(default)]
    rank_before: Option<String>,
    #[serde(default)]
    rank_after: Option<String>,
    #[serde(default)]
    rank_custom_field_id: Option<String>,
}
