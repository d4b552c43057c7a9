//! GitHub issue creation.

use approval_gateway_core::ExecutorError;
use async_trait::async_trait;
use serde_json::{Value, json};

use super::{backend_error, http_error, read_json, str_param};
use crate::registry::{ActionContext, ActionHandler};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// `github_create_issue`: `{owner, repo, title, body?}` -> `{html_url, number}`.
#[derive(Debug, Default, Clone)]
pub struct GithubCreateIssue;

#[async_trait]
impl ActionHandler for GithubCreateIssue {
    fn name(&self) -> &'static str {
        "github_create_issue"
    }

    async fn run(&self, params: &Value, ctx: &ActionContext) -> Result<Value, ExecutorError> {
        let (Some(owner), Some(repo), Some(title)) = (
            str_param(params, "owner"),
            str_param(params, "repo"),
            str_param(params, "title"),
        ) else {
            return Err(ExecutorError::InvalidParams(
                "Missing required params: owner, repo, title".to_string(),
            ));
        };
        for (field, value) in [("owner", owner), ("repo", repo)] {
            if !is_path_segment(value) {
                return Err(ExecutorError::InvalidParams(format!(
                    "Invalid {field}: {value:?}"
                )));
            }
        }
        let body = params.get("body").and_then(Value::as_str).unwrap_or_default();

        let token = ctx
            .secrets
            .get("GITHUB_TOKEN")
            .ok_or_else(|| ExecutorError::MissingSecret("GITHUB_TOKEN".to_string()))?;

        let res = ctx
            .http
            .post(format!("{}/repos/{owner}/{repo}/issues", ctx.endpoints.github))
            .bearer_auth(&token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", GITHUB_API_VERSION)
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await
            .map_err(|e| http_error(&e))?;

        let status = res.status();
        let data = read_json(res).await;
        if !status.is_success() {
            return Err(backend_error(status, &data));
        }

        Ok(json!({
            "html_url": data.get("html_url").cloned().unwrap_or(Value::Null),
            "number": data.get("number").cloned().unwrap_or(Value::Null),
        }))
    }
}

/// A GitHub owner or repository name usable as one URL path segment.
fn is_path_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{Endpoints, StaticSecrets};

    fn ctx(server: &MockServer, secrets: StaticSecrets) -> ActionContext {
        ActionContext::new(Arc::new(secrets), Endpoints::all(&server.uri()))
    }

    #[tokio::test]
    async fn test_creates_issue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/demo/issues"))
            .and(header("authorization", "Bearer ghp-test"))
            .and(body_json(json!({"title": "Bug", "body": ""})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "html_url": "https://github.com/octo/demo/issues/7",
                "number": 7,
                "state": "open"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("GITHUB_TOKEN", "ghp-test"));
        let out = GithubCreateIssue
            .run(&json!({"owner": "octo", "repo": "demo", "title": "Bug"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({"html_url": "https://github.com/octo/demo/issues/7", "number": 7})
        );
    }

    #[tokio::test]
    async fn test_requires_params_before_secret() {
        let server = MockServer::start().await;
        let ctx = ctx(&server, StaticSecrets::new());

        let err = GithubCreateIssue
            .run(&json!({"owner": "octo"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required params: owner, repo, title");

        let err = GithubCreateIssue
            .run(&json!({"owner": "octo", "repo": "demo", "title": "Bug"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GITHUB_TOKEN not found in vault");
    }

    #[tokio::test]
    async fn test_rejects_names_that_escape_the_repo_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("GITHUB_TOKEN", "ghp-test"));
        for (owner, repo) in [
            ("octo", "../../user/repos"),
            ("octo/demo", "x"),
            ("..", "demo"),
            ("octo", "demo?x=1"),
            ("octo", "demo#frag"),
        ] {
            let err = GithubCreateIssue
                .run(&json!({"owner": owner, "repo": repo, "title": "Bug"}), &ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, ExecutorError::InvalidParams(_)), "{owner}/{repo}: {err}");
        }
    }

    #[test]
    fn test_path_segment_names() {
        assert!(is_path_segment("rust-lang"));
        assert!(is_path_segment("my_repo.rs"));
        assert!(!is_path_segment(""));
        assert!(!is_path_segment("."));
        assert!(!is_path_segment("a/b"));
        assert!(!is_path_segment("a b"));
    }

    #[tokio::test]
    async fn test_backend_message_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let ctx = ctx(&server, StaticSecrets::new().with("GITHUB_TOKEN", "ghp-test"));
        let err = GithubCreateIssue
            .run(&json!({"owner": "octo", "repo": "gone", "title": "Bug"}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not Found");
    }
}
