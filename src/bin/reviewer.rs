use anyhow::Result;
use auto_maintainer::agents::reviewer;
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

    let Some(number) = std::env::args().nth(1) else {
        info!("The Reviewer needs a pull request number; nothing to do");
        return Ok(());
    };
    let number: u64 = number.parse()?;

    let config = Config::from_env()?;
    let router = Router::from_keys(&config.providers)?;
    let github = GitHubClient::new(&config.github);

    let map = context::build_map(Path::new("."), &MapOptions::default())?;
    let verdict = reviewer::run(&github, &router, number, &map).await?;

    info!(
        pr = number,
        approved = verdict.approved,
        "reviewer pass complete"
    );
    Ok(())
}
