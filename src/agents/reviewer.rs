use super::{LABEL_APPROVED, LABEL_REJECTED};
use crate::error::PipelineError;
use crate::github::GitHubApi;
use crate::providers::Router;
use serde::Deserialize;
use tracing::info;

const SYSTEM_PROMPT: &str = r#"You are 'The QA Lead' AI persona.
Your job is to read a PR diff against the repository context map and determine if the code safely and accurately targets a problem without causing regressions.

CRITICAL RULES: You MUST REJECT (approved: false) if you see:
1. 'next/router' used instead of 'next/navigation' (this is an App Router project!)
2. Missing Tailwind CSS classes where styling is visibly needed.
3. Syntax errors, markdown fences inside code strings, or hallucinated imports.

Respond strictly with JSON:
{
  "approved": true | false,
  "comment": "Concise technical feedback. If rejecting, state exactly what must be fixed."
}"#;

/// The QA verdict for one pull request.
#[derive(Debug, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub comment: String,
}

/// Review one PR: fetch the diff, ask the router for a verdict, post it as a
/// neutral comment and flip the workflow labels.
///
/// The review is submitted as a COMMENT rather than APPROVE/REQUEST_CHANGES
/// because the pipeline identity cannot approve its own pull requests; the
/// `ai-approved`/`ai-rejected` labels are the authoritative workflow state.
pub async fn run(
    github: &dyn GitHubApi,
    router: &Router,
    pr_number: u64,
    map: &str,
) -> Result<ReviewVerdict, PipelineError> {
    info!(pr = pr_number, "The QA Lead is reviewing the pull request");

    let diff = github.get_pull_diff(pr_number).await?;
    let user_prompt = format!("Codebase Map:\n{map}\n\nPR Diff:\n{diff}");

    let payload = router.call(SYSTEM_PROMPT, &user_prompt).await?;
    let verdict: ReviewVerdict = serde_json::from_value(payload)
        .map_err(|err| PipelineError::Validation(format!("review verdict: {err}")))?;

    let prefix = if verdict.approved {
        "✅ **Quality Assurance Passed.**\n\n"
    } else {
        "❌ **Quality Assurance Failed.**\n\n"
    };
    let body = format!(
        "{prefix}{comment}\n\n🤖 *Review performed autonomously by the AI maintainer.*",
        comment = verdict.comment
    );
    github.create_review_comment(pr_number, &body).await?;

    // Exactly one of the two workflow labels survives.
    if verdict.approved {
        github
            .add_labels(pr_number, &[LABEL_APPROVED.to_string()])
            .await?;
        github.remove_label(pr_number, LABEL_REJECTED).await?;
    } else {
        github
            .add_labels(pr_number, &[LABEL_REJECTED.to_string()])
            .await?;
        github.remove_label(pr_number, LABEL_APPROVED).await?;
    }

    info!(
        pr = pr_number,
        approved = verdict.approved,
        "review submitted"
    );
    Ok(verdict)
}
