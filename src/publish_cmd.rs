use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{FileConfig, ReleaseConfig};
use crate::github::{GitHubClient, RetryPolicy};
use crate::reconcile;

pub async fn run_publish(file: &FileConfig, dry_run: bool, retries: Option<usize>) -> Result<()> {
    let config = ReleaseConfig::from_env();
    tracing::info!(
        "publish: repo={}/{} branch={} commit={}",
        config.repository_owner.as_deref().unwrap_or("<none>"),
        config.repository_name,
        config.branch.as_deref().unwrap_or("<none>"),
        config.commit_sha
    );

    let policy = RetryPolicy {
        attempts: retries.unwrap_or(file.retries),
        backoff: Duration::from_millis(file.retry_backoff_ms),
    };
    let client = GitHubClient::connect(&config, policy)
        .await
        .context("failed to connect to GitHub")?;

    let outcome = reconcile::publish(&config, &client, dry_run)
        .await
        .with_context(|| format!("failed to publish {}", reconcile::tag_name(&config)))?;

    println!(
        "publish: tag={} ({}) release={} ({})",
        outcome.tag_name, outcome.tag, outcome.tag_name, outcome.release
    );
    Ok(())
}
