// CommentCountService - recomputes the denormalized posts.comment_count aggregate
// Always a full recount, never a +1/-1 delta, so replaying it can only repair a stale value

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::core::PostId;
use crate::error::AppResult;
use crate::infrastructure::database::BackendAccessors;

/// Outcome of a full reconciliation sweep
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RecomputeReport {
    pub posts_scanned: usize,
    pub posts_updated: usize,
    /// Posts deleted while the sweep was running
    pub posts_vanished: usize,
    pub failed: Vec<PostId>,
}

impl RecomputeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct CommentCountService {
    backend: Arc<dyn BackendAccessors>,
}

impl CommentCountService {
    pub fn new(backend: Arc<dyn BackendAccessors>) -> Self {
        Self { backend }
    }

    /// Count the post's comments and store the result on the post.
    ///
    /// A post that disappeared in the meantime is logged and treated as done.
    /// Read or write failures are returned without retrying; nothing is written
    /// unless the count read succeeded.
    #[instrument(skip(self))]
    pub async fn recompute_comment_count(&self, post_id: PostId) -> AppResult<u64> {
        self.recount(post_id).await.map(|(count, _)| count)
    }

    /// Returns the fresh count and whether it was stored
    async fn recount(&self, post_id: PostId) -> AppResult<(u64, bool)> {
        let count = self.backend.count_comments(post_id).await?;

        let stored = self.backend.update_post_comment_count(post_id, count).await?;
        if stored {
            info!("Updated post {} comment count to {}", post_id, count);
        } else {
            warn!("Post {} no longer exists, comment count {} not stored", post_id, count);
        }

        Ok((count, stored))
    }

    /// Recount every post. Failures are logged and reported, they do not stop the sweep.
    pub async fn recompute_all(&self) -> AppResult<RecomputeReport> {
        let post_ids = self.backend.list_post_ids().await?;
        let mut report = RecomputeReport {
            posts_scanned: post_ids.len(),
            ..Default::default()
        };

        for post_id in post_ids {
            match self.recount(post_id).await {
                Ok((_, true)) => report.posts_updated += 1,
                Ok((_, false)) => report.posts_vanished += 1,
                Err(e) => {
                    error!("Failed to recompute comment count for post {}: {}", post_id, e);
                    report.failed.push(post_id);
                }
            }
        }

        info!(
            "Recomputed comment counts: {} scanned, {} updated, {} vanished, {} failed",
            report.posts_scanned,
            report.posts_updated,
            report.posts_vanished,
            report.failed.len()
        );
        Ok(report)
    }
}
