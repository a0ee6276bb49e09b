// In-process BackendAccessors double for unit tests: scriptable failures and a write log

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::{CommentId, PostId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::BackendAccessors;
use crate::models::CommentRef;

#[derive(Default)]
pub struct FakeBackend {
    posts: Mutex<HashMap<PostId, u64>>,
    comments: Mutex<HashMap<CommentId, PostId>>,
    writes: Mutex<Vec<(PostId, u64)>>,
    failing_counts: Mutex<HashSet<PostId>>,
    failing_updates: Mutex<HashSet<PostId>>,
    vanishing: Mutex<HashSet<PostId>>,
    fail_batch_reads: AtomicBool,
    batch_reads: AtomicUsize,
    count_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self) -> PostId {
        let id = PostId::new();
        self.posts.lock().unwrap().insert(id, 0);
        id
    }

    pub fn add_comment(&self, post: PostId) -> CommentId {
        let id = CommentId::new();
        self.comments.lock().unwrap().insert(id, post);
        id
    }

    pub fn remove_comments(&self, ids: &[CommentId]) {
        let mut comments = self.comments.lock().unwrap();
        for id in ids {
            comments.remove(id);
        }
    }

    pub fn remove_post(&self, id: PostId) {
        self.posts.lock().unwrap().remove(&id);
    }

    /// Overwrite a stored count without touching comments, to simulate drift
    pub fn set_stored_count(&self, id: PostId, count: u64) {
        self.posts.lock().unwrap().insert(id, count);
    }

    pub fn stored_count(&self, id: PostId) -> Option<u64> {
        self.posts.lock().unwrap().get(&id).copied()
    }

    pub fn writes(&self) -> Vec<(PostId, u64)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_for(&self, id: PostId) -> usize {
        self.writes.lock().unwrap().iter().filter(|(p, _)| *p == id).count()
    }

    pub fn fail_counts_for(&self, id: PostId) {
        self.failing_counts.lock().unwrap().insert(id);
    }

    pub fn fail_updates_for(&self, id: PostId) {
        self.failing_updates.lock().unwrap().insert(id);
    }

    /// Remove the post once its comments have been counted, before the count is stored
    pub fn vanish_after_count(&self, id: PostId) {
        self.vanishing.lock().unwrap().insert(id);
    }

    pub fn fail_batch_reads(&self) {
        self.fail_batch_reads.store(true, Ordering::SeqCst);
    }

    pub fn batch_reads(&self) -> usize {
        self.batch_reads.load(Ordering::SeqCst)
    }

    pub fn delay_counts(&self, delay: Duration) {
        *self.count_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl BackendAccessors for FakeBackend {
    async fn count_comments(&self, post_id: PostId) -> AppResult<u64> {
        let delay = *self.count_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_counts.lock().unwrap().contains(&post_id) {
            return Err(AppError::DatabaseError(format!("count failed for {}", post_id)));
        }
        let count = self.comments.lock().unwrap().values().filter(|p| **p == post_id).count() as u64;
        if self.vanishing.lock().unwrap().remove(&post_id) {
            self.remove_post(post_id);
        }
        Ok(count)
    }

    async fn update_post_comment_count(&self, post_id: PostId, count: u64) -> AppResult<bool> {
        if self.failing_updates.lock().unwrap().contains(&post_id) {
            return Err(AppError::DatabaseError(format!("update failed for {}", post_id)));
        }
        self.writes.lock().unwrap().push((post_id, count));
        let mut posts = self.posts.lock().unwrap();
        match posts.get_mut(&post_id) {
            Some(stored) => {
                *stored = count;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_comments_by_ids(&self, ids: &[CommentId]) -> AppResult<Vec<CommentRef>> {
        self.batch_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_batch_reads.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("batch read failed".to_string()));
        }
        let comments = self.comments.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| comments.get(id).map(|post| CommentRef { id: *id, post: *post }))
            .collect())
    }

    async fn list_post_ids(&self) -> AppResult<Vec<PostId>> {
        let mut ids: Vec<PostId> = self.posts.lock().unwrap().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
