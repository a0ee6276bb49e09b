// Backend Accessors - the narrow slice of the data-access API used by comment count maintenance
// Implementations must make each call atomic on its own; callers never assume atomicity across calls

use async_trait::async_trait;

use crate::core::{CommentId, PostId};
use crate::error::AppResult;
use crate::models::CommentRef;

#[async_trait]
pub trait BackendAccessors: Send + Sync {
    /// Count comment rows whose `post` equals `post_id`, read at call time
    async fn count_comments(&self, post_id: PostId) -> AppResult<u64>;

    /// Write `comment_count` onto a post.
    /// Returns `false` when no post row matched (e.g. it was deleted concurrently).
    async fn update_post_comment_count(&self, post_id: PostId, count: u64) -> AppResult<bool>;

    /// Batched `(id, post)` read for the given comment ids.
    /// Ids that do not exist are absent from the result.
    async fn get_comments_by_ids(&self, ids: &[CommentId]) -> AppResult<Vec<CommentRef>>;

    /// Every post id, used by the full reconciliation sweep
    async fn list_post_ids(&self) -> AppResult<Vec<PostId>>;
}
