use crate::config::GitHubConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = "auto-maintainer";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub head: BranchRef,
    pub base: BranchRef,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// Tree entry for a commit under construction; always a regular file blob.
#[derive(Debug, Clone)]
pub struct NewTreeEntry {
    pub path: String,
    pub blob_sha: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API request failed: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed GitHub response: {0}")]
    MalformedResponse(String),
}

impl GitHubError {
    /// A ref update rejected because the base SHA went stale underneath us.
    pub fn is_conflict(&self) -> bool {
        matches!(self, GitHubError::Api { status: 409 | 422, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Api { status: 404, .. })
    }
}

/// The GitHub REST surface the pipeline consumes.
///
/// A trait seam so agent logic can run against an in-memory double in tests;
/// [`GitHubClient`] is the real implementation.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn default_branch(&self) -> Result<String, GitHubError>;

    async fn get_issue(&self, number: u64) -> Result<Issue, GitHubError>;
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, GitHubError>;
    /// Labels apply to both issues and pull requests; GitHub shares the numbering.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), GitHubError>;
    /// Removing a label that is not present is not an error.
    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError>;

    async fn get_pull(&self, number: u64) -> Result<PullRequest, GitHubError>;
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, GitHubError>;
    async fn get_pull_diff(&self, number: u64) -> Result<String, GitHubError>;
    async fn list_reviews(&self, number: u64) -> Result<Vec<Review>, GitHubError>;
    async fn create_review_comment(&self, number: u64, body: &str) -> Result<(), GitHubError>;
    async fn create_pull(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError>;

    async fn get_ref_sha(&self, branch: &str) -> Result<String, GitHubError>;
    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError>;
    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError>;
    async fn create_blob(&self, content: &str) -> Result<String, GitHubError>;
    async fn create_tree(
        &self,
        base_tree_sha: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String, GitHubError>;
    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GitHubError>;
}

/// Thin reqwest client over the GitHub REST v3 API, scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: config.token.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{API_ROOT}/repos/{}/{}/{path}", self.owner, self.repo)
    }

    fn authed(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT_JSON)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GitHubError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| GitHubError::MalformedResponse(e.to_string()))
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<(), GitHubError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRefResponse {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn default_branch(&self) -> Result<String, GitHubError> {
        let url = format!("{API_ROOT}/repos/{}/{}", self.owner, self.repo);
        let info: RepoInfo = self.send_json(self.authed(Method::GET, &url)).await?;
        Ok(info.default_branch)
    }

    async fn get_issue(&self, number: u64) -> Result<Issue, GitHubError> {
        let url = self.repo_url(&format!("issues/{number}"));
        self.send_json(self.authed(Method::GET, &url)).await
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, GitHubError> {
        let url = self.repo_url("issues");
        let payload = json!({ "title": title, "body": body, "labels": labels });
        self.send_json(self.authed(Method::POST, &url).json(&payload))
            .await
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), GitHubError> {
        let url = self.repo_url(&format!("issues/{number}/labels"));
        let payload = json!({ "labels": labels });
        self.send_unit(self.authed(Method::POST, &url).json(&payload))
            .await
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let url = self.repo_url(&format!("issues/{number}/labels/{label}"));
        match self.send_unit(self.authed(Method::DELETE, &url)).await {
            Err(ref err) if err.is_not_found() => {
                debug!(number, label, "label was not present, nothing to remove");
                Ok(())
            }
            other => other,
        }
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest, GitHubError> {
        let url = self.repo_url(&format!("pulls/{number}"));
        self.send_json(self.authed(Method::GET, &url)).await
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, GitHubError> {
        let url = self.repo_url("pulls?state=open&per_page=100");
        self.send_json(self.authed(Method::GET, &url)).await
    }

    async fn get_pull_diff(&self, number: u64) -> Result<String, GitHubError> {
        let url = self.repo_url(&format!("pulls/{number}"));
        let response = self
            .authed(Method::GET, &url)
            .header("Accept", ACCEPT_DIFF)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .text()
            .await
            .map_err(|e| GitHubError::MalformedResponse(e.to_string()))
    }

    async fn list_reviews(&self, number: u64) -> Result<Vec<Review>, GitHubError> {
        let url = self.repo_url(&format!("pulls/{number}/reviews"));
        self.send_json(self.authed(Method::GET, &url)).await
    }

    async fn create_review_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        let url = self.repo_url(&format!("pulls/{number}/reviews"));
        // COMMENT rather than APPROVE/REQUEST_CHANGES: the pipeline identity
        // cannot approve its own pull requests, labels carry the state.
        let payload = json!({ "event": "COMMENT", "body": body });
        self.send_unit(self.authed(Method::POST, &url).json(&payload))
            .await
    }

    async fn create_pull(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        debug!("Creating PR: {} -> {}", head, base);
        let url = self.repo_url("pulls");
        let payload = json!({ "title": title, "body": body, "head": head, "base": base });
        self.send_json(self.authed(Method::POST, &url).json(&payload))
            .await
    }

    async fn get_ref_sha(&self, branch: &str) -> Result<String, GitHubError> {
        let url = self.repo_url(&format!("git/ref/heads/{branch}"));
        let reference: GitRefResponse = self.send_json(self.authed(Method::GET, &url)).await?;
        Ok(reference.object.sha)
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError> {
        debug!("Creating branch ref '{}' at {}", branch, sha);
        let url = self.repo_url("git/refs");
        let payload = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        self.send_unit(self.authed(Method::POST, &url).json(&payload))
            .await
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError> {
        debug!("Updating branch ref '{}' to {}", branch, sha);
        let url = self.repo_url(&format!("git/refs/heads/{branch}"));
        // force is left false so GitHub rejects the update if the base moved.
        let payload = json!({ "sha": sha, "force": false });
        self.send_unit(self.authed(Method::PATCH, &url).json(&payload))
            .await
    }

    async fn create_blob(&self, content: &str) -> Result<String, GitHubError> {
        let url = self.repo_url("git/blobs");
        let payload = json!({ "content": content, "encoding": "utf-8" });
        let blob: ShaResponse = self
            .send_json(self.authed(Method::POST, &url).json(&payload))
            .await?;
        Ok(blob.sha)
    }

    async fn create_tree(
        &self,
        base_tree_sha: &str,
        entries: &[NewTreeEntry],
    ) -> Result<String, GitHubError> {
        let url = self.repo_url("git/trees");
        let tree: Vec<_> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": "100644",
                    "type": "blob",
                    "sha": entry.blob_sha,
                })
            })
            .collect();
        let payload = json!({ "base_tree": base_tree_sha, "tree": tree });
        let created: ShaResponse = self
            .send_json(self.authed(Method::POST, &url).json(&payload))
            .await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GitHubError> {
        let url = self.repo_url("git/commits");
        let payload = json!({
            "message": message,
            "tree": tree_sha,
            "parents": [parent_sha],
        });
        let commit: ShaResponse = self
            .send_json(self.authed(Method::POST, &url).json(&payload))
            .await?;
        Ok(commit.sha)
    }
}
