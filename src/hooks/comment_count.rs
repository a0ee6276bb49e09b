// Comment count hooks - bind the CommentEventRouter to the comments collection
// All three hooks return Ok unconditionally; failures are logged inside the router.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::core::CommentId;
use crate::error::AppResult;
use crate::hooks::registry::{CollectionHook, HookContext, HookOperation, HookRegistry, HookTiming};
use crate::models::Collection;
use crate::services::comment_event_router::CommentEventRouter;

/// Recounts the post of a freshly created comment
pub struct CommentCreatedHook {
    router: Arc<CommentEventRouter>,
}

#[async_trait]
impl CollectionHook for CommentCreatedHook {
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()> {
        let payload = ctx.payload.clone().unwrap_or(Value::Null);
        self.router.on_create(&payload).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "comment_count_on_create"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Create]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::After
    }
}

/// Captures comment -> post before the rows disappear
pub struct CommentCaptureHook {
    router: Arc<CommentEventRouter>,
}

#[async_trait]
impl CollectionHook for CommentCaptureHook {
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()> {
        let ids = ctx.keys.iter().copied().map(CommentId::from).collect();
        // Observe only: the keys are left exactly as requested
        self.router.on_before_delete(ids).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "comment_count_capture"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Delete]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

/// Recounts every post touched by a delete batch
pub struct CommentDeletedHook {
    router: Arc<CommentEventRouter>,
}

#[async_trait]
impl CollectionHook for CommentDeletedHook {
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()> {
        let ids: Vec<CommentId> = ctx.keys.iter().copied().map(CommentId::from).collect();
        self.router.on_after_delete(&ids).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "comment_count_on_delete"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Delete]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::After
    }
}

/// Register the create, before-delete and after-delete hooks on `comments`
pub fn register_comment_count_hooks(registry: &mut HookRegistry, router: Arc<CommentEventRouter>) {
    registry.register_hook(
        Collection::Comments,
        Arc::new(CommentCreatedHook {
            router: router.clone(),
        }),
    );
    registry.register_hook(
        Collection::Comments,
        Arc::new(CommentCaptureHook {
            router: router.clone(),
        }),
    );
    registry.register_hook(Collection::Comments, Arc::new(CommentDeletedHook { router }));
}
