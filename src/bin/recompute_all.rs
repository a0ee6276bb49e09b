// Recount comment_count for every post and exit.
// Repairs counts left stale by lost hook invocations, e.g. a restart between
// the before-delete capture and the after-delete recount.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use comment_counter::{
    config::Config,
    infrastructure::{BackendAccessors, SqliteBackend},
    services::CommentCountService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let backend: Arc<dyn BackendAccessors> =
        Arc::new(SqliteBackend::connect(&config.database.url, config.database.max_connections).await?);

    let report = CommentCountService::new(backend).recompute_all().await?;
    tracing::info!(
        "Reconciliation finished: {} posts scanned, {} updated, {} vanished, {} failed",
        report.posts_scanned,
        report.posts_updated,
        report.posts_vanished,
        report.failed.len()
    );

    if !report.is_clean() {
        anyhow::bail!("comment count recompute failed for posts: {:?}", report.failed);
    }
    Ok(())
}
