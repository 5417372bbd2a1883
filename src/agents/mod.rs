pub mod architect;
pub mod coder;
pub mod manager;
pub mod reviewer;

/// Workflow labels readable by CI triggers.
pub const LABEL_AI_GENERATED: &str = "ai-generated";
pub const LABEL_APPROVED: &str = "ai-approved";
pub const LABEL_REJECTED: &str = "ai-rejected";

/// Deterministic prefix for work branches. Used both to create a branch for
/// an issue and to rediscover in-flight work for it, so the same issue never
/// gets two open pull requests.
pub const BRANCH_PREFIX: &str = "fix/ai-issue-";

pub fn branch_prefix_for(issue_number: u64) -> String {
    format!("{BRANCH_PREFIX}{issue_number}-")
}
