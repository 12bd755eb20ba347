//! Portfolio sync command handler.

use std::sync::Arc;

use anyhow::{Context, Result};
use foliosync_core::portfolio::{PortfolioCache, PortfolioView, SyncOrchestrator, SyncOutcome};

use super::build_stack;

pub async fn run() -> Result<()> {
    let stack = build_stack()?;
    let cache = Arc::new(PortfolioCache::new(Arc::clone(&stack.client)));
    let sync = SyncOrchestrator::new(
        Arc::clone(&stack.client),
        Arc::clone(&cache),
        stack.config.settle_delay(),
    );

    println!("Refreshing portfolio...");
    let outcome = sync
        .trigger_refresh()
        .await
        .context("Portfolio refresh failed")?;

    if outcome == SyncOutcome::AlreadyRunning {
        println!("A refresh is already in flight.");
        return Ok(());
    }

    let summary = cache
        .fetch(PortfolioView::Summary)
        .await
        .context("Failed to fetch portfolio summary")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
