// Pre-Delete Capture Store
// Remembers which post each comment belonged to between the before-delete and after-delete hooks,
// because the after-delete event only carries the deleted keys.

use lru::LruCache;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::CaptureConfig;
use crate::core::{CommentId, PostId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::BackendAccessors;

/// A captured `comment -> post` mapping
#[derive(Debug, Clone, Copy)]
pub struct CaptureEntry {
    pub post_id: PostId,
    pub captured_at: Instant,
}

impl CaptureEntry {
    pub fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            captured_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.captured_at.elapsed() > ttl
    }
}

/// Process-wide store keyed by comment id.
///
/// Entries are removed as soon as they are drained. Entries that are never
/// drained (the delete failed, or the process lost the after hook) expire after
/// `ttl` and are evicted oldest-first once `capacity` is reached. A single batch
/// larger than `capacity` is kept whole; the cache shrinks back once drained.
pub struct CaptureStore {
    backend: Arc<dyn BackendAccessors>,
    entries: Mutex<LruCache<CommentId, CaptureEntry>>,
    capacity: NonZeroUsize,
    ttl: Duration,
}

impl CaptureStore {
    pub fn new(backend: Arc<dyn BackendAccessors>, config: &CaptureConfig) -> AppResult<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            AppError::ConfigurationError("Capture store capacity must be greater than zero".to_string())
        })?;
        Ok(Self {
            backend,
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl: config.ttl(),
        })
    }

    /// Record the owning post of every comment about to be deleted.
    ///
    /// Issues a single batched read. Ids that no longer exist are simply not
    /// captured. Returns the number of entries stored.
    #[instrument(skip(self, comment_ids), fields(batch = comment_ids.len()))]
    pub async fn capture(&self, comment_ids: &[CommentId]) -> AppResult<usize> {
        if comment_ids.is_empty() {
            return Ok(0);
        }

        // No lock is held while the backend read is in flight
        let refs = self.backend.get_comments_by_ids(comment_ids).await?;

        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, self.ttl);

        // Room is made from older entries only, never from this batch
        let limit = refs.len().max(self.capacity.get());
        while !entries.is_empty() && entries.len() + refs.len() > limit {
            if let Some((evicted, entry)) = entries.pop_lru() {
                warn!(
                    "Capture store full, evicted undrained entry for comment {} (post {})",
                    evicted, entry.post_id
                );
            }
        }
        if let Some(limit) = NonZeroUsize::new(limit) {
            if limit > self.capacity {
                warn!(
                    "Delete batch of {} exceeds capture capacity {}, growing until drained",
                    refs.len(),
                    self.capacity
                );
            }
            entries.resize(limit);
        }

        for comment in &refs {
            entries.put(comment.id, CaptureEntry::new(comment.post));
        }

        debug!("Captured {} of {} comments before delete", refs.len(), comment_ids.len());
        Ok(refs.len())
    }

    /// Consume the entries for `comment_ids` and return the distinct posts they belonged to.
    ///
    /// Ids without a live entry are skipped with a warning.
    pub async fn drain_posts_for(&self, comment_ids: &[CommentId]) -> BTreeSet<PostId> {
        let mut posts = BTreeSet::new();
        let mut entries = self.entries.lock().await;

        for comment_id in comment_ids {
            match entries.pop(comment_id) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    posts.insert(entry.post_id);
                }
                Some(entry) => {
                    warn!(
                        "Capture entry for comment {} expired, post {} will not be recounted",
                        comment_id, entry.post_id
                    );
                }
                None => {
                    warn!("No captured post for deleted comment {}, skipping", comment_id);
                }
            }
        }

        if entries.cap() > self.capacity && entries.len() <= self.capacity.get() {
            entries.resize(self.capacity);
        }

        posts
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn purge_expired(entries: &mut LruCache<CommentId, CaptureEntry>, ttl: Duration) {
    // Least recently inserted entries sit at the tail, so stop at the first live one
    while let Some((_, entry)) = entries.peek_lru() {
        if !entry.is_expired(ttl) {
            break;
        }
        if let Some((comment_id, entry)) = entries.pop_lru() {
            warn!(
                "Dropping stale capture for comment {} (post {})",
                comment_id, entry.post_id
            );
        }
    }
}
