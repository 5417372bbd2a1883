use anyhow::Result;
use auto_maintainer::agents::{architect, manager};
use auto_maintainer::config::Config;
use auto_maintainer::context::{self, MapOptions};
use auto_maintainer::github::GitHubClient;
use auto_maintainer::providers::Router;
use std::path::Path;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::from_env()?;
    let router = Router::from_keys(&config.providers)?;
    let github = GitHubClient::new(&config.github);

    let map = context::build_map(Path::new("."), &MapOptions::default())?;

    let Some(proposal) = architect::propose(&router, &map).await else {
        info!("The Architect found no high-priority action items today");
        return Ok(());
    };

    let issue = manager::file_issue(&github, &proposal).await?;
    info!(number = issue.number, "trigger the coder with this issue number");
    Ok(())
}
