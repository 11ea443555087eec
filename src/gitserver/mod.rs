//! # In-cluster Git Server Client
//!
//! A thin client over the in-cluster Git server's repository-admin REST API
//! (Gitea-compatible: `POST /api/v1/orgs/{org}/repos`). Used by the `GitRepository`
//! reconciler to idempotently ensure a repository exists before it clones a
//! scratch worktree and pushes content into it.

use serde::Deserialize;

use crate::git::credentials::GitCredentials;
use crate::git::error::GitOpsError;

/// Client for the admin surface of the in-cluster Git server.
#[derive(Debug, Clone)]
pub struct GitServerClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitServerClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create `repo_name` under `organisation` if it does not already exist.
    /// Idempotent: an existing repository of the same name is treated as success.
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::AuthFailed`] on a 401/403 response, or
    /// [`GitOpsError::CommandFailed`] wrapping any other non-2xx response.
    pub async fn ensure_repository(
        &self,
        organisation: &str,
        repo_name: &str,
        credentials: Option<&GitCredentials>,
    ) -> Result<(), GitOpsError> {
        let exists_url = format!("{}/api/v1/repos/{organisation}/{repo_name}", self.base_url);
        let mut get_request = self.http.get(&exists_url);
        get_request = apply_basic_auth(get_request, credentials);
        let existing = get_request.send().await.map_err(|e| GitOpsError::CommandFailed {
            command: "GET repo".to_string(),
            status: "request-error".to_string(),
            stderr: e.to_string(),
        })?;

        if existing.status().is_success() {
            return Ok(());
        }
        if existing.status() == reqwest::StatusCode::UNAUTHORIZED
            || existing.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(GitOpsError::AuthFailed {
                url: exists_url,
                detail: existing.status().to_string(),
            });
        }

        let create_url = format!("{}/api/v1/orgs/{organisation}/repos", self.base_url);
        let mut create_request = self
            .http
            .post(&create_url)
            .json(&serde_json::json!({ "name": repo_name, "auto_init": false, "private": false }));
        create_request = apply_basic_auth(create_request, credentials);

        let response = create_request.send().await.map_err(|e| GitOpsError::CommandFailed {
            command: "POST repo".to_string(),
            status: "request-error".to_string(),
            stderr: e.to_string(),
        })?;

        if response.status().is_success() {
            return Ok(());
        }
        // A 409 means another reconcile won the race to create it first.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(GitOpsError::AuthFailed {
                url: create_url,
                detail: response.status().to_string(),
            });
        }

        let status = response.status().to_string();
        let body: String = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_else(|_| "unreadable error body".to_string());
        Err(GitOpsError::CommandFailed {
            command: "POST repo".to_string(),
            status,
            stderr: body,
        })
    }
}

fn apply_basic_auth(
    request: reqwest::RequestBuilder,
    credentials: Option<&GitCredentials>,
) -> reqwest::RequestBuilder {
    match credentials {
        Some(GitCredentials::UserPass { username, password }) => {
            request.basic_auth(username, Some(password))
        }
        Some(GitCredentials::Token { token }) => request.bearer_auth(token),
        Some(GitCredentials::Ssh { .. }) | None => request,
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn ensure_repository_is_a_no_op_when_the_repo_already_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/gitea_admin/sample"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = GitServerClient::new(server.uri());
        client.ensure_repository("gitea_admin", "sample", None).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_repository_creates_the_repo_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/gitea_admin/sample"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/orgs/gitea_admin/repos"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = GitServerClient::new(server.uri());
        client.ensure_repository("gitea_admin", "sample", None).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_repository_treats_a_create_conflict_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/gitea_admin/sample"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/orgs/gitea_admin/repos"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client = GitServerClient::new(server.uri());
        client.ensure_repository("gitea_admin", "sample", None).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_repository_surfaces_unauthorized_as_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/gitea_admin/sample"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = GitServerClient::new(server.uri());
        let error = client.ensure_repository("gitea_admin", "sample", None).await.unwrap_err();
        assert!(matches!(error, GitOpsError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn ensure_repository_surfaces_other_create_failures_as_command_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/repos/gitea_admin/sample"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/orgs/gitea_admin/repos"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({ "message": "internal error" })))
            .mount(&server)
            .await;

        let client = GitServerClient::new(server.uri());
        let error = client.ensure_repository("gitea_admin", "sample", None).await.unwrap_err();
        assert!(matches!(error, GitOpsError::CommandFailed { .. }));
    }
}
