//! Client for the Jira Agile rank endpoint.

use std::time::Duration;

use proforma_core::{Error, RankOutcome, RankRequest, Result};
use serde_json::Value;
use tracing::{debug, warn};

/// Timeout for rank operations.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for `POST {jira_base_url}/rest/agile/1.0/issue/rank`.
pub struct RankClient {
    base_url: String,
    email: String,
    token: String,
    client: reqwest::Client,
}

impl RankClient {
    /// Create a rank client for a Jira instance URL.
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

    /// Rank issues before or after an anchor issue.
    ///
    /// Preconditions (non-empty issue list, exactly one anchor) are enforced
    /// by [`RankRequest::new`] before any network call. The response is
    /// normalized by status code: 204 is full success, 207 is per-issue
    /// partial success, any other 2xx is passed through, and non-2xx statuses
    /// raise with deployment-specific context for 400/403/404.
    pub async fn rank(&self, request: &RankRequest) -> Result<RankOutcome> {
        let url = format!("{}/rest/agile/1.0/issue/rank", self.base_url);
        let payload = request.payload();

        debug!(url = %url, issues = request.issues.len(), "Rank request");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.token))
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        let status_code = status.as_u16();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status_code, body = %text, "Rank API error response");
            return Err(rank_error(status_code, &text));
        }

        // 204 No Content: every issue was ranked.
        if status_code == 204 {
            return Ok(RankOutcome::FullSuccess {
                issues: request.issues.clone(),
                rank_position: request.anchor.position(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        // 207 Multi-Status: some issues were ranked, others failed.
        if status_code == 207 {
            return match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => Ok(RankOutcome::from_multi_status(
                    body,
                    request.anchor.position(),
                )),
                Err(_) => {
                    warn!("Received 207 Multi-Status but could not parse JSON response");
                    Ok(RankOutcome::UnparseableMultiStatus { status_code })
                }
            };
        }

        // Other 2xx: pass a JSON body through unchanged, otherwise report the
        // bare status.
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => Ok(RankOutcome::Opaque(body)),
            Err(_) => Ok(RankOutcome::OpaqueSuccess {
                issues: request.issues.clone(),
                status_code,
            }),
        }
    }
}

/// Map a non-2xx rank response to an error with deployment context.
fn rank_error(status_code: u16, body: &str) -> Error {
    match status_code {
        400 => Error::transport(
            "/rest/agile/1.0/issue/rank",
            status_code,
            &format!("{body} - This may be due to invalid issue keys or rank position"),
        ),
        403 => Error::Authorization(
            "Failed to rank issues - You may not have permission to rank issues".to_string(),
        ),
        404 => Error::transport(
            "/rest/agile/1.0/issue/rank",
            status_code,
            &format!("{body} - The rank endpoint may not be available in your Jira instance"),
        ),
        _ => Error::transport("/rest/agile/1.0/issue/rank", status_code, body),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn create_client(server: &MockServer) -> RankClient {
        RankClient::new(server.base_url(), "user@example.com", "api-token")
    }

    fn before_request(issues: &[&str], anchor: &str) -> RankRequest {
        RankRequest::new(
            issues.iter().map(|s| s.to_string()).collect(),
            Some(anchor.to_string()),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rank_204_full_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/agile/1.0/issue/rank")
                .json_body(json!({
                    "issues": ["PROJ-1", "PROJ-2"],
                    "rankBeforeIssue": "PROJ-3"
                }));
            then.status(204);
        });

        let client = create_client(&server);
        let outcome = client
            .rank(&before_request(&["PROJ-1", "PROJ-2"], "PROJ-3"))
            .await
            .unwrap();

        mock.assert();
        let out = outcome.to_json();
        assert_eq!(out["success"], true);
        assert_eq!(out["issues"], json!(["PROJ-1", "PROJ-2"]));
        assert_eq!(out["rank_position"], "before PROJ-3");
    }

    #[tokio::test]
    async fn test_rank_after_anchor() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/rest/agile/1.0/issue/rank")
                .json_body(json!({
                    "issues": ["PROJ-1"],
                    "rankAfterIssue": "PROJ-9"
                }));
            then.status(204);
        });

        let client = create_client(&server);
        let request =
            RankRequest::new(vec!["PROJ-1".into()], None, Some("PROJ-9".into()), None).unwrap();
        let outcome = client.rank(&request).await.unwrap();
        assert_eq!(outcome.to_json()["rank_position"], "after PROJ-9");
    }

    #[tokio::test]
    async fn test_rank_custom_field_forwarded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/rest/agile/1.0/issue/rank")
                .json_body(json!({
                    "issues": ["PROJ-1"],
                    "rankBeforeIssue": "PROJ-3",
                    "rankCustomFieldId": "customfield_10019"
                }));
            then.status(204);
        });

        let client = create_client(&server);
        let request = RankRequest::new(
            vec!["PROJ-1".into()],
            Some("PROJ-3".into()),
            None,
            Some("customfield_10019".into()),
        )
        .unwrap();
        client.rank(&request).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_rank_207_partial_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(207).json_body(json!({
                "successfulIssues": ["PROJ-1"],
                "failedIssues": [
                    {"issueKey": "PROJ-2", "errors": ["issue does not exist"]}
                ]
            }));
        });

        let client = create_client(&server);
        let outcome = client
            .rank(&before_request(&["PROJ-1", "PROJ-2"], "PROJ-3"))
            .await
            .unwrap();

        let out = outcome.to_json();
        assert_eq!(out["success"], false);
        assert_eq!(out["partial_success"], true);
        assert_eq!(
            out["message"],
            "Partially successful: 1 issues ranked, 1 issues failed"
        );
        assert_eq!(out["rank_position"], "before PROJ-3");
    }

    #[tokio::test]
    async fn test_rank_207_unparseable_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(207).body("not json at all");
        });

        let client = create_client(&server);
        let outcome = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap();

        let out = outcome.to_json();
        assert_eq!(out["success"], false);
        assert_eq!(out["status_code"], 207);
        assert!(out["message"].as_str().unwrap().contains("could not parse"));
    }

    #[tokio::test]
    async fn test_rank_200_json_body_passed_through() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(200).json_body(json!({"entries": [1, 2, 3]}));
        });

        let client = create_client(&server);
        let outcome = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap();

        assert_eq!(outcome.to_json(), json!({"entries": [1, 2, 3]}));
    }

    #[tokio::test]
    async fn test_rank_200_without_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(200);
        });

        let client = create_client(&server);
        let outcome = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap();

        let out = outcome.to_json();
        assert_eq!(out["success"], true);
        assert_eq!(out["status_code"], 200);
    }

    #[tokio::test]
    async fn test_rank_400_contextual_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(400).body("Bad Request");
        });

        let client = create_client(&server);
        let err = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid issue keys or rank position"));
    }

    #[tokio::test]
    async fn test_rank_403_is_authorization_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(403);
        });

        let client = create_client(&server);
        let err = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap_err();
        match err {
            Error::Authorization(msg) => {
                assert!(msg.contains("may not have permission to rank issues"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rank_404_contextual_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/rest/agile/1.0/issue/rank");
            then.status(404);
        });

        let client = create_client(&server);
        let err = client
            .rank(&before_request(&["PROJ-1"], "PROJ-3"))
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("rank endpoint may not be available"));
    }

    #[tokio::test]
    async fn test_validation_fails_before_network() {
        // No mock server mounted at all: validation must reject the request
        // before any connection is attempted.
        let err = RankRequest::new(vec![], Some("PROJ-3".into()), None, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = RankRequest::new(
            vec!["PROJ-1".into()],
            Some("X".into()),
            Some("Y".into()),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
