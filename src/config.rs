use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

/// Repository-scoped GitHub access.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
}

/// API keys for the provider failover chain. At least one must be set for
/// any agent that talks to the router.
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub gemini: Option<String>,
    pub groq: Option<String>,
}

/// Everything one agent invocation needs, read from the environment once and
/// passed down explicitly. No component reaches for `env::var` on its own.
#[derive(Debug, Clone)]
pub struct Config {
    pub github: GitHubConfig,
    pub providers: ProviderKeys,
    /// CI output file (`GITHUB_OUTPUT`) for exporting the resulting PR number.
    pub output_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set")?;
        let repository = env::var("GITHUB_REPOSITORY").context("GITHUB_REPOSITORY is not set")?;
        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .ok_or_else(|| {
                anyhow!("invalid GITHUB_REPOSITORY '{repository}', expected 'owner/repo'")
            })?;

        Ok(Self {
            github: GitHubConfig {
                token,
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
            providers: ProviderKeys {
                gemini: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
                groq: env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()),
            },
            output_path: env::var("GITHUB_OUTPUT").ok().map(PathBuf::from),
        })
    }
}
