//! Autonomous AI maintainer pipeline.
//!
//! Four cooperating agents keep a repository moving without a human in the
//! loop: the Architect proposes one improvement, the Manager files it as a
//! GitHub issue, the Coder turns the issue (or review feedback) into a commit
//! on a work branch with an open pull request, and the Reviewer approves or
//! rejects that PR. Labels (`ai-approved` / `ai-rejected`) drive the workflow;
//! GitHub is the only system of record and each agent runs as a short-lived,
//! single-pass process triggered by CI.

pub mod agents;
pub mod config;
pub mod context;
pub mod error;
pub mod github;
pub mod providers;
