//! `demo` command: the repeated-transaction walkthrough

use super::process::PoolArgs;
use crate::config::settings::AppConfig;
use anyhow::Result;
use clap::Args;
use tracing::info;

#[derive(Debug, Args)]
pub struct DemoArgs {
    #[command(flatten)]
    pub pool: PoolArgs,
}

impl DemoArgs {
    /// Process two transactions, then repeat the first to show it come from cache
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        let manager = self.pool.build_manager(config)?;

        let first = manager.process("Transaction1").await?;
        info!("Result for Transaction1: {}", first);

        let second = manager.process("Transaction2").await?;
        info!("Result for Transaction2: {}", second);

        let acquisitions = manager.pool().stats().acquisitions;
        let again = manager.process("Transaction1").await?;
        let from_cache = manager.pool().stats().acquisitions == acquisitions;
        info!(
            "Result for Transaction1 (again, {}): {}",
            if from_cache { "from cache" } else { "recomputed" },
            again
        );

        let stats = manager.pool().stats();
        info!("📊 Pool Statistics:");
        info!("   Connections opened: {}", stats.connections_created);
        info!("   Acquisitions: {} ({:.1}% reused)", stats.acquisitions, stats.reuse_rate() * 100.0);
        info!("   Average wait: {:.1} ms", stats.avg_wait_time_ms());
        info!("   {}", manager.cache().cache_info());

        manager.shutdown().await;
        Ok(())
    }
}
