use super::architect::Proposal;
use super::LABEL_AI_GENERATED;
use crate::error::PipelineError;
use crate::github::{GitHubApi, Issue};
use tracing::info;

/// Human-readable rendering of the target file inside the issue body. Kept
/// for people reading the issue and as a parse fallback for issues written
/// by hand.
pub const TARGET_FILE_HEADING: &str = "Target File";

/// Machine-readable target-file marker. The coder parses this first, so the
/// contract no longer depends on prose formatting.
pub const TARGET_FILE_META_OPEN: &str = "<!-- ai-maintainer: target-file=";
pub const TARGET_FILE_META_CLOSE: &str = " -->";

pub fn render_issue_body(proposal: &Proposal) -> String {
    let target = proposal.target_file.as_deref().unwrap_or("Unknown");
    format!(
        "### Description\n{description}\n\n### {TARGET_FILE_HEADING}\n`{target}`\n\n{TARGET_FILE_META_OPEN}{target}{TARGET_FILE_META_CLOSE}\n\n---\n\
         🤖 *This issue was autonomously formulated by The Architect and filed by The Project Manager.*",
        description = proposal.description,
    )
}

/// Turn an Architect proposal into a tracked GitHub issue, labelled with the
/// proposal kind plus `ai-generated`.
pub async fn file_issue(
    github: &dyn GitHubApi,
    proposal: &Proposal,
) -> Result<Issue, PipelineError> {
    let title = format!("[AI {}] {}", proposal.kind.label(), proposal.title);
    let labels = vec![
        proposal.kind.label().to_string(),
        LABEL_AI_GENERATED.to_string(),
    ];

    let issue = github
        .create_issue(&title, &render_issue_body(proposal), &labels)
        .await?;

    info!(
        number = issue.number,
        url = %issue.html_url,
        "issue filed, trigger the coder with this number"
    );
    Ok(issue)
}
