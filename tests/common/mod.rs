#![allow(dead_code)]

use async_trait::async_trait;
use auto_maintainer::github::{
    BranchRef, GitHubApi, GitHubError, Issue, NewTreeEntry, PullRequest, Review,
};
use auto_maintainer::providers::{FailoverPolicy, Provider, ProviderError, Route, Router};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CommitRecord {
    pub tree: String,
    pub parent: String,
    pub message: String,
}

/// In-memory double of the GitHub REST surface the pipeline consumes.
#[derive(Debug, Default)]
pub struct RepoState {
    pub default_branch: String,
    /// branch name -> tip sha
    pub refs: HashMap<String, String>,
    pub issues: HashMap<u64, Issue>,
    pub pulls: Vec<PullRequest>,
    /// issue/PR number -> labels (GitHub shares the numbering)
    pub labels: HashMap<u64, Vec<String>>,
    pub reviews: HashMap<u64, Vec<Review>>,
    pub review_comments: Vec<(u64, String)>,
    pub diffs: HashMap<u64, String>,
    /// commit sha -> record, for asserting parentage
    pub commits: HashMap<String, CommitRecord>,
    pub blob_count: u64,
    pub tree_count: u64,
    pub commit_count: u64,
    pub next_issue_number: u64,
    pub next_pr_number: u64,
    /// Simulates a ref update losing the race once (stale base SHA).
    pub fail_next_update_ref: bool,
}

pub struct FakeGitHub {
    pub state: Mutex<RepoState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        let mut state = RepoState {
            default_branch: "main".to_string(),
            next_issue_number: 1,
            next_pr_number: 100,
            ..Default::default()
        };
        state.refs.insert("main".to_string(), "sha-main-0".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn seed_issue(&self, number: u64, title: &str, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.issues.insert(
            number,
            Issue {
                number,
                title: title.to_string(),
                body: Some(body.to_string()),
                labels: Vec::new(),
                html_url: format!("https://github.com/test/test/issues/{number}"),
            },
        );
    }

    pub fn seed_pull(&self, number: u64, head_branch: &str, head_sha: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .refs
            .insert(head_branch.to_string(), head_sha.to_string());
        state.pulls.push(PullRequest {
            number,
            title: format!("PR {number}"),
            body: Some(String::new()),
            head: BranchRef {
                ref_name: head_branch.to_string(),
                sha: head_sha.to_string(),
            },
            base: BranchRef {
                ref_name: "main".to_string(),
                sha: "sha-main-0".to_string(),
            },
            html_url: format!("https://github.com/test/test/pull/{number}"),
        });
    }

    pub fn seed_labels(&self, number: u64, labels: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .labels
            .insert(number, labels.iter().map(|l| l.to_string()).collect());
    }

    pub fn seed_review(&self, number: u64, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.reviews.entry(number).or_default().push(Review {
            body: body.to_string(),
            submitted_at: None,
        });
    }

    pub fn seed_diff(&self, number: u64, diff: &str) {
        let mut state = self.state.lock().unwrap();
        state.diffs.insert(number, diff.to_string());
    }

    pub fn labels_of(&self, number: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }
}

fn not_found() -> GitHubError {
    GitHubError::Api {
        status: 404,
        body: "Not Found".to_string(),
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn default_branch(&self) -> Result<String, GitHubError> {
        Ok(self.state.lock().unwrap().default_branch.clone())
    }

    async fn get_issue(&self, number: u64) -> Result<Issue, GitHubError> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&number)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, GitHubError> {
        let mut state = self.state.lock().unwrap();
        let number = state.next_issue_number;
        state.next_issue_number += 1;
        let issue = Issue {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            labels: Vec::new(),
            html_url: format!("https://github.com/test/test/issues/{number}"),
        };
        state.issues.insert(number, issue.clone());
        state.labels.insert(number, labels.to_vec());
        Ok(issue)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.labels.entry(number).or_default();
        for label in labels {
            if !entry.contains(label) {
                entry.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.labels.get_mut(&number) {
            entry.retain(|l| l != label);
        }
        Ok(())
    }

    async fn get_pull(&self, number: u64) -> Result<PullRequest, GitHubError> {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, GitHubError> {
        Ok(self.state.lock().unwrap().pulls.clone())
    }

    async fn get_pull_diff(&self, number: u64) -> Result<String, GitHubError> {
        self.state
            .lock()
            .unwrap()
            .diffs
            .get(&number)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_reviews(&self, number: u64) -> Result<Vec<Review>, GitHubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .reviews
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_review_comment(&self, number: u64, body: &str) -> Result<(), GitHubError> {
        self.state
            .lock()
            .unwrap()
            .review_comments
            .push((number, body.to_string()));
        Ok(())
    }

    async fn create_pull(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest, GitHubError> {
        let mut state = self.state.lock().unwrap();
        let head_sha = state.refs.get(head).cloned().ok_or_else(not_found)?;
        let base_sha = state.refs.get(base).cloned().ok_or_else(not_found)?;
        let number = state.next_pr_number;
        state.next_pr_number += 1;
        let pull = PullRequest {
            number,
            title: title.to_string(),
            body: Some(body.to_string()),
            head: BranchRef {
                ref_name: head.to_string(),
                sha: head_sha,
            },
            base: BranchRef {
                ref_name: base.to_string(),
                sha: base_sha,
            },
            html_url: format!("https://github.com/test/test/pull/{number}"),
        };
        state.pulls.push(pull.clone());
        Ok(pull)
    }

    async fn get_ref_sha(&self, branch: &str) -> Result<String, GitHubError> {
        self.state
            .lock()
            .unwrap()
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        if state.refs.contains_key(branch) {
            return Err(GitHubError::Api {
                status: 422,
                body: "Reference already exists".to_string(),
            });
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_update_ref {
            state.fail_next_update_ref = false;
            return Err(GitHubError::Api {
                status: 422,
                body: "Update is not a fast forward".to_string(),
            });
        }
        if !state.refs.contains_key(branch) {
            return Err(not_found());
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn create_blob(&self, _content: &str) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.blob_count += 1;
        Ok(format!("blob-{}", state.blob_count))
    }

    async fn create_tree(
        &self,
        _base_tree_sha: &str,
        _entries: &[NewTreeEntry],
    ) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.tree_count += 1;
        Ok(format!("tree-{}", state.tree_count))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.commit_count += 1;
        let sha = format!("commit-{}", state.commit_count);
        state.commits.insert(
            sha.clone(),
            CommitRecord {
                tree: tree_sha.to_string(),
                parent: parent_sha.to_string(),
                message: message.to_string(),
            },
        );
        Ok(sha)
    }
}

/// Provider replaying a scripted sequence of responses.
struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn call(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }
}

/// Single-provider router that replays the given responses in order.
pub fn scripted_router(responses: Vec<&str>) -> Router {
    Router::new(vec![Route {
        provider: Box::new(ScriptedProvider {
            outcomes: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
        }),
        policy: FailoverPolicy::FallbackOnly,
    }])
}
