use super::manager::{TARGET_FILE_HEADING, TARGET_FILE_META_OPEN};
use super::{branch_prefix_for, LABEL_REJECTED};
use crate::context::{self, MapOptions};
use crate::error::PipelineError;
use crate::github::{GitHubApi, Issue, NewTreeEntry, PullRequest};
use crate::providers::Router;
use futures::future::try_join_all;
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = r#"You are 'The Senior Developer' AI.
Your job is to read an issue and write the precise code required to solve it.

Return EXACTLY a JSON structure with an array of files to change or create:
{
  "files": [
    {
      "path": "path/to/file.js",
      "content": "Full new content of the file"
    }
  ]
}"#;

const FALLBACK_FEEDBACK: &str =
    "No specific review feedback was recorded. Improve the change based on repository conventions.";

/// One whole-file replacement produced by the model. Ephemeral: consumed to
/// build blobs, never stored.
#[derive(Debug, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FileChangeSet {
    pub files: Vec<FileChange>,
}

/// What the coder resolved its numeric input to.
enum WorkItem {
    /// A fresh issue with no in-flight branch.
    NewIssue(Issue),
    /// An open PR to push another commit to, with the latest review feedback.
    Iterating {
        pull: PullRequest,
        feedback: String,
    },
}

#[derive(Debug)]
pub struct CoderOutcome {
    pub pr_number: u64,
    pub branch: String,
    pub commit_sha: String,
    /// False when an existing PR was updated instead of a new one opened.
    pub opened_pr: bool,
}

/// Extract the target file path from an issue or PR body.
///
/// The metadata comment is authoritative; the `Target File` heading is the
/// fallback for bodies written by hand. `Unknown` means the architect could
/// not guess a path and resolves to `None`.
pub fn parse_target_file(body: &str) -> Option<String> {
    if let Some(start) = body.find(TARGET_FILE_META_OPEN) {
        let rest = &body[start + TARGET_FILE_META_OPEN.len()..];
        if let Some(end) = rest.find("-->") {
            return normalize_target(&rest[..end]);
        }
    }

    let mut lines = body.lines();
    while let Some(line) = lines.next() {
        let heading = line.trim().trim_start_matches('#').trim();
        if heading != TARGET_FILE_HEADING {
            continue;
        }
        for candidate in lines.by_ref() {
            let candidate = candidate.trim();
            if !candidate.is_empty() {
                return normalize_target(candidate);
            }
        }
    }
    None
}

fn normalize_target(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('`').trim();
    if cleaned.is_empty() || cleaned == "Unknown" {
        return None;
    }
    Some(cleaned.to_string())
}

/// One coder pass: resolve the input number, generate a patch, commit it and
/// reconcile the branch/PR. Ref mutation is the last step, so a failure
/// anywhere earlier leaves nothing externally visible.
pub async fn run(
    github: &dyn GitHubApi,
    router: &Router,
    number: u64,
    repo_root: &Path,
    output_path: Option<&Path>,
) -> Result<CoderOutcome, PipelineError> {
    info!(number, "The Senior Developer picked up work item");

    let work = resolve_work_item(github, number).await?;
    let map = context::build_map(repo_root, &MapOptions::default())?;

    let (body_for_target, user_prompt) = match &work {
        WorkItem::NewIssue(issue) => {
            let body = issue.body.clone().unwrap_or_default();
            let prompt = format!(
                "Issue Title: {}\nIssue Body: {}\n\nCodebase Map (where things live):\n{}",
                issue.title, body, map
            );
            (body, prompt)
        }
        WorkItem::Iterating { pull, feedback } => {
            let body = pull.body.clone().unwrap_or_default();
            let prompt = format!(
                "Your previous pull request was rejected in review.\nPR Title: {}\nPR Body: {}\n\nReview Feedback:\n{}\n\nCodebase Map (where things live):\n{}",
                pull.title, body, feedback, map
            );
            (body, prompt)
        }
    };

    let user_prompt = match parse_target_file(&body_for_target) {
        Some(target) => {
            let on_disk = repo_root.join(&target);
            if on_disk.is_file() {
                let current = std::fs::read_to_string(&on_disk)?;
                format!(
                    "{user_prompt}\n\nCurrent content of target file {target}:\n{current}"
                )
            } else {
                format!("{user_prompt}\n\nTarget file {target} does not exist yet and is to be created.")
            }
        }
        None => user_prompt,
    };

    let payload = router.call(SYSTEM_PROMPT, &user_prompt).await?;
    let change_set: FileChangeSet = serde_json::from_value(payload)
        .map_err(|err| PipelineError::Validation(format!("file change set: {err}")))?;
    if change_set.files.is_empty() {
        return Err(PipelineError::Validation(
            "model returned an empty file change set, nothing to commit".to_string(),
        ));
    }

    let outcome = match work {
        WorkItem::NewIssue(issue) => commit_new(github, &issue, &change_set).await?,
        WorkItem::Iterating { pull, .. } => commit_iteration(github, &pull, &change_set).await?,
    };

    if let Some(path) = output_path {
        export_pr_number(path, outcome.pr_number)?;
    }

    info!(
        pr = outcome.pr_number,
        branch = %outcome.branch,
        commit = %outcome.commit_sha,
        "coder pass committed"
    );
    Ok(outcome)
}

async fn resolve_work_item(
    github: &dyn GitHubApi,
    number: u64,
) -> Result<WorkItem, PipelineError> {
    match github.get_pull(number).await {
        Ok(pull) => {
            info!(pr = pull.number, "input resolves to an open pull request, iterating");
            let feedback = latest_feedback(github, pull.number).await?;
            return Ok(WorkItem::Iterating { pull, feedback });
        }
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }

    let issue = github.get_issue(number).await?;

    // An earlier run may already have opened a PR for this issue. The branch
    // prefix is the idempotency key: never open a second PR for the same issue.
    let prefix = branch_prefix_for(number);
    let existing = github
        .list_open_pulls()
        .await?
        .into_iter()
        .find(|pull| pull.head.ref_name.starts_with(&prefix));

    if let Some(pull) = existing {
        info!(
            pr = pull.number,
            branch = %pull.head.ref_name,
            "issue already has an open pull request, iterating on it"
        );
        let feedback = latest_feedback(github, pull.number).await?;
        return Ok(WorkItem::Iterating { pull, feedback });
    }

    Ok(WorkItem::NewIssue(issue))
}

async fn latest_feedback(github: &dyn GitHubApi, pr_number: u64) -> Result<String, PipelineError> {
    let reviews = github.list_reviews(pr_number).await?;
    Ok(reviews
        .into_iter()
        .rev()
        .map(|review| review.body)
        .find(|body| !body.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_FEEDBACK.to_string()))
}

/// Create blobs (in parallel, they are independent), a tree on the base SHA
/// and a single-parent commit. Nothing here touches a ref.
async fn build_commit(
    github: &dyn GitHubApi,
    base_sha: &str,
    change_set: &FileChangeSet,
    message: &str,
) -> Result<String, PipelineError> {
    let blob_shas = try_join_all(
        change_set
            .files
            .iter()
            .map(|file| github.create_blob(&file.content)),
    )
    .await?;

    let entries: Vec<NewTreeEntry> = change_set
        .files
        .iter()
        .zip(blob_shas)
        .map(|(file, blob_sha)| NewTreeEntry {
            path: file.path.clone(),
            blob_sha,
        })
        .collect();

    let tree_sha = github.create_tree(base_sha, &entries).await?;
    Ok(github.create_commit(message, &tree_sha, base_sha).await?)
}

async fn commit_new(
    github: &dyn GitHubApi,
    issue: &Issue,
    change_set: &FileChangeSet,
) -> Result<CoderOutcome, PipelineError> {
    let base_branch = github.default_branch().await?;
    let base_sha = github.get_ref_sha(&base_branch).await?;

    let message = format!("fix: automated patch for issue #{}", issue.number);
    let commit_sha = build_commit(github, &base_sha, change_set, &message).await?;

    let branch = format!("{}{}", branch_prefix_for(issue.number), branch_suffix());
    github.create_ref(&branch, &commit_sha).await?;

    let body = format!(
        "Closes #{number}\n\n🤖 *Automated patch written by The Senior Developer for issue #{number}.*",
        number = issue.number
    );
    let pull = github
        .create_pull(&issue.title, &body, &branch, &base_branch)
        .await?;

    Ok(CoderOutcome {
        pr_number: pull.number,
        branch,
        commit_sha,
        opened_pr: true,
    })
}

async fn commit_iteration(
    github: &dyn GitHubApi,
    pull: &PullRequest,
    change_set: &FileChangeSet,
) -> Result<CoderOutcome, PipelineError> {
    let branch = pull.head.ref_name.clone();
    let message = format!("fix: address review feedback on PR #{}", pull.number);

    let base_sha = github.get_ref_sha(&branch).await?;
    let commit_sha = build_commit(github, &base_sha, change_set, &message).await?;

    let commit_sha = match github.update_ref(&branch, &commit_sha).await {
        Ok(()) => commit_sha,
        Err(err) if err.is_conflict() => {
            // The branch tip moved between resolving the base and updating the
            // ref. Re-resolve and rebuild once; a second rejection aborts.
            warn!(branch = %branch, "branch tip moved, rebuilding commit on the fresh base");
            let fresh_sha = github.get_ref_sha(&branch).await?;
            let retry_sha = build_commit(github, &fresh_sha, change_set, &message).await?;
            github.update_ref(&branch, &retry_sha).await?;
            retry_sha
        }
        Err(err) => return Err(err.into()),
    };

    // Back into the review queue.
    github.remove_label(pull.number, LABEL_REJECTED).await?;

    Ok(CoderOutcome {
        pr_number: pull.number,
        branch,
        commit_sha,
        opened_pr: false,
    })
}

fn branch_suffix() -> String {
    format!("{:04}", chrono::Utc::now().timestamp_millis() % 10_000)
}

/// Expose the PR number to downstream CI steps via the well-known
/// environment-file append.
fn export_pr_number(path: &Path, pr_number: u64) -> Result<(), PipelineError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "AI_PR_NUMBER={pr_number}")?;
    Ok(())
}
