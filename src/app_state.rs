use std::sync::Arc;

use crate::{
    config::{CaptureConfig, Config},
    error::AppResult,
    hooks::{register_comment_count_hooks, HookRegistry},
    infrastructure::{capture_store::CaptureStore, collections::ItemsService, database::BackendAccessors, sqlite_database::SqliteBackend},
    services::{comment_count_service::CommentCountService, comment_event_router::CommentEventRouter},
};

#[derive(Clone)]
pub struct AppState {
    pub items: ItemsService,
    pub comment_counts: CommentCountService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let db = SqliteBackend::connect(&config.database.url, config.database.max_connections).await?;
        Ok(Self::with_backend(Arc::new(db), config)?)
    }

    pub fn with_backend(db: Arc<SqliteBackend>, config: Config) -> AppResult<Self> {
        let (items, comment_counts) = build_items_service(db, &config.capture)?;
        Ok(Self {
            items,
            comment_counts,
            config,
        })
    }
}

/// Wire the comment count hooks onto a fresh registry and build the collection write path
pub fn build_items_service(
    db: Arc<SqliteBackend>,
    capture: &CaptureConfig,
) -> AppResult<(ItemsService, CommentCountService)> {
    let accessors: Arc<dyn BackendAccessors> = db.clone();
    let comment_counts = CommentCountService::new(accessors.clone());
    let capture_store = Arc::new(CaptureStore::new(accessors, capture)?);
    let router = Arc::new(CommentEventRouter::new(capture_store, comment_counts.clone()));

    let mut registry = HookRegistry::new();
    register_comment_count_hooks(&mut registry, router);

    Ok((ItemsService::new(db, Arc::new(registry)), comment_counts))
}
