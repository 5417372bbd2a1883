use anyhow::Result;
use auto_maintainer::agents::coder;
use auto_maintainer::config::Config;
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
        info!("The Coder needs an issue or pull request number; nothing to do");
        return Ok(());
    };
    let number: u64 = number.parse()?;

    let config = Config::from_env()?;
    let router = Router::from_keys(&config.providers)?;
    let github = GitHubClient::new(&config.github);

    let outcome = coder::run(
        &github,
        &router,
        number,
        Path::new("."),
        config.output_path.as_deref(),
    )
    .await?;

    info!(
        pr = outcome.pr_number,
        branch = %outcome.branch,
        opened_pr = outcome.opened_pr,
        "coder pass complete"
    );
    Ok(())
}
