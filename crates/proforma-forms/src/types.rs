//! Wire types for the Forms REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One answer in a `PUT /issue/{key}/form/{formId}` request.
///
/// No local validation is performed on the answer shape; the remote service
/// is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    #[serde(rename = "type")]
    pub answer_type: String,
    pub value: Value,
}

/// Attachment metadata returned by `GET /issue/{key}/form/{formId}/attachment`.
///
/// The Forms API does not document this shape precisely, so unknown keys are
/// preserved in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(default, rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}
