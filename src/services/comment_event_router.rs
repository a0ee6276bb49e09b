// CommentEventRouter - turns comments lifecycle events into comment count recomputes
//
//   create        -> recompute the comment's post
//   before delete -> capture comment -> post for the batch
//   after delete  -> drain the batch into distinct posts, recompute each once
//
// Nothing here returns an error to the caller: a failed recompute must never block
// or undo the comment write that triggered it.

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::{CommentId, PostId};
use crate::infrastructure::capture_store::CaptureStore;
use crate::services::comment_count_service::CommentCountService;

pub struct CommentEventRouter {
    capture_store: Arc<CaptureStore>,
    counter: CommentCountService,
}

impl CommentEventRouter {
    pub fn new(capture_store: Arc<CaptureStore>, counter: CommentCountService) -> Self {
        Self {
            capture_store,
            counter,
        }
    }

    pub fn capture_store(&self) -> &Arc<CaptureStore> {
        &self.capture_store
    }

    /// A comment was created. Returns the post that was recounted, if any.
    pub async fn on_create(&self, payload: &Value) -> Option<PostId> {
        let Some(post_id) = post_id_from_payload(payload) else {
            info!("Created comment carries no post reference, skipping comment count update");
            return None;
        };

        match self.counter.recompute_comment_count(post_id).await {
            Ok(_) => Some(post_id),
            Err(e) => {
                error!("Failed to update comment count for post {} on create: {}", post_id, e);
                None
            }
        }
    }

    /// Comments are about to be deleted. Always hands `ids` back untouched.
    pub async fn on_before_delete(&self, ids: Vec<CommentId>) -> Vec<CommentId> {
        debug!("Capturing posts for {} comments before delete", ids.len());
        if let Err(e) = self.capture_store.capture(&ids).await {
            error!("Failed to capture comment data before deletion: {}", e);
        }
        ids
    }

    /// Comments were deleted. Returns the posts that were recounted successfully.
    pub async fn on_after_delete(&self, ids: &[CommentId]) -> Vec<PostId> {
        let affected = self.capture_store.drain_posts_for(ids).await;
        debug!("Deleted {} comments touching {} posts", ids.len(), affected.len());

        let results = join_all(affected.into_iter().map(|post_id| async move {
            (post_id, self.counter.recompute_comment_count(post_id).await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(post_id, result)| match result {
                Ok(_) => Some(post_id),
                Err(e) => {
                    error!("Failed to update comment count for post {} on delete: {}", post_id, e);
                    None
                }
            })
            .collect()
    }
}

/// Post reference of a created comment: `post_id` first, then `post`,
/// which may be a bare key or an expanded `{ "id": ... }` object.
pub fn post_id_from_payload(payload: &Value) -> Option<PostId> {
    let raw = ["post_id", "post"]
        .iter()
        .filter_map(|field| payload.get(*field))
        .find(|value| !value.is_null())?;

    let key = match raw {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("id")?.as_str()?,
        _ => return None,
    };

    match PostId::parse(key) {
        Ok(post_id) => Some(post_id),
        Err(e) => {
            info!("Ignoring unusable post reference on created comment: {}", e);
            None
        }
    }
}
