use crate::providers::Router;
use serde::Deserialize;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = r#"You are 'The Architect', an autonomous AI maintainer reading this repository's filesystem map.
Your sole job is to proactively identify a single missing feature, structural flaw, or likely edge-case bug.
Focus on standard conventions for the stack you see in the map.

Output exactly ONE proposal in strict JSON format:
{
  "type": "bug" | "feature",
  "title": "A short, actionable title for the GitHub Issue",
  "description": "Clear explanation of what's missing or wrong, and what the fix should look like.",
  "targetFile": "The most likely file path to edit (if you can guess from the map)"
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalKind {
    Bug,
    Feature,
}

impl ProposalKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProposalKind::Bug => "bug",
            ProposalKind::Feature => "feature",
        }
    }
}

/// One improvement proposal. Lives only long enough to become an issue.
#[derive(Debug, Deserialize)]
pub struct Proposal {
    #[serde(rename = "type")]
    pub kind: ProposalKind,
    pub title: String,
    pub description: String,
    #[serde(rename = "targetFile", default)]
    pub target_file: Option<String>,
}

/// Ask the router for exactly one proposal. `None` means the router failed,
/// the payload failed validation, or the model had nothing actionable — all
/// equivalent outcomes for the caller.
pub async fn propose(router: &Router, map: &str) -> Option<Proposal> {
    info!("The Architect is proactively analyzing the codebase");

    let payload = match router
        .call(SYSTEM_PROMPT, &format!("Codebase Map:\n{map}"))
        .await
    {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "architect call failed");
            return None;
        }
    };

    match serde_json::from_value::<Proposal>(payload) {
        Ok(proposal) if !proposal.title.trim().is_empty() => {
            info!(
                kind = proposal.kind.label(),
                title = %proposal.title,
                "architect produced a proposal"
            );
            Some(proposal)
        }
        Ok(_) => {
            info!("architect returned no actionable proposal");
            None
        }
        Err(err) => {
            warn!(error = %err, "proposal failed schema validation");
            None
        }
    }
}
