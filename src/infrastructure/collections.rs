// ItemsService - the write path for the posts and comments collections
// Every mutation runs the registered before hooks, performs the write, then runs the after hooks.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::core::{CommentId, PostId, UserId};
use crate::error::{AppError, AppResult};
use crate::hooks::{HookContext, HookOperation, HookRegistry, HookTiming};
use crate::infrastructure::sqlite_database::SqliteBackend;
use crate::models::{
    organize_comments, Collection, Comment, CommentNode, NewComment, NewPost, Post, UpdatePost,
};

const MAX_CONTENT_LEN: usize = 10_000;

#[derive(Clone)]
pub struct ItemsService {
    db: Arc<SqliteBackend>,
    hooks: Arc<HookRegistry>,
}

impl ItemsService {
    pub fn new(db: Arc<SqliteBackend>, hooks: Arc<HookRegistry>) -> Self {
        Self { db, hooks }
    }

    // Posts

    pub async fn create_post(&self, new_post: NewPost) -> AppResult<Post> {
        validate_text("title", &new_post.title)?;
        validate_text("content", &new_post.content)?;

        let mut ctx = HookContext::new(Collection::Posts, HookOperation::Create);
        self.run(&mut ctx, HookTiming::Before).await?;

        let now = Utc::now();
        let post = Post {
            id: PostId::new(),
            title: new_post.title,
            content: new_post.content,
            user_created: new_post.user_created,
            date_created: now,
            date_updated: now,
            comment_count: 0,
        };
        self.db.insert_post(&post).await?;

        let mut ctx = ctx.with_keys(vec![post.id.value()]).with_payload(to_payload(&post)?);
        self.run(&mut ctx, HookTiming::After).await?;
        Ok(post)
    }

    pub async fn get_post(&self, id: PostId) -> AppResult<Post> {
        self.db
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    pub async fn list_posts(&self) -> AppResult<Vec<Post>> {
        self.db.list_posts().await
    }

    pub async fn user_posts(&self, user: UserId) -> AppResult<Vec<Post>> {
        self.db.posts_by_user(user).await
    }

    /// Edit a post's title and/or content. The stored `comment_count` is left alone.
    pub async fn update_post(&self, id: PostId, changes: UpdatePost) -> AppResult<Post> {
        if changes.is_empty() {
            return Err(AppError::Validation("nothing to update, expected title or content".to_string()));
        }
        if let Some(title) = &changes.title {
            validate_text("title", title)?;
        }
        if let Some(content) = &changes.content {
            validate_text("content", content)?;
        }

        let current = self.get_post(id).await?;

        let mut ctx = HookContext::new(Collection::Posts, HookOperation::Update).with_keys(vec![id.value()]);
        self.run(&mut ctx, HookTiming::Before).await?;

        let title = changes.title.unwrap_or(current.title);
        let content = changes.content.unwrap_or(current.content);
        if !self.db.update_post_fields(id, &title, &content, Utc::now()).await? {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }
        let post = self.get_post(id).await?;

        let mut ctx = ctx.with_payload(to_payload(&post)?);
        self.run(&mut ctx, HookTiming::After).await?;
        Ok(post)
    }

    /// Delete a post and, first, all of its comments.
    ///
    /// The comments go through the regular comment delete path so their hooks
    /// fire; the recount they trigger then finds the post gone.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: PostId) -> AppResult<()> {
        self.get_post(id).await?;

        let mut ctx = HookContext::new(Collection::Posts, HookOperation::Delete).with_keys(vec![id.value()]);
        self.run(&mut ctx, HookTiming::Before).await?;

        let comment_ids = self.db.comment_ids_for_post(id).await?;
        if !comment_ids.is_empty() {
            let removed = self.delete_comments(comment_ids).await?;
            info!("Cascaded delete of post {} to {} comments", id, removed.len());
        }

        if !self.db.delete_post_row(id).await? {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        self.run(&mut ctx, HookTiming::After).await?;
        Ok(())
    }

    // Comments

    pub async fn create_comment(&self, new_comment: NewComment) -> AppResult<Comment> {
        validate_text("content", &new_comment.content)?;
        self.get_post(new_comment.post).await?;

        if let Some(parent_id) = new_comment.parent_comment {
            let parent = self
                .db
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| AppError::Validation(format!("Parent comment {} not found", parent_id)))?;
            if parent.post != new_comment.post {
                return Err(AppError::Validation(format!(
                    "Parent comment {} belongs to a different post",
                    parent_id
                )));
            }
        }

        let mut ctx = HookContext::new(Collection::Comments, HookOperation::Create);
        self.run(&mut ctx, HookTiming::Before).await?;

        let now = Utc::now();
        let comment = Comment {
            id: CommentId::new(),
            content: new_comment.content,
            post: new_comment.post,
            user_created: new_comment.user_created,
            parent_comment: new_comment.parent_comment,
            date_created: now,
            date_updated: now,
        };
        self.db.insert_comment(&comment).await?;

        let mut ctx = ctx.with_keys(vec![comment.id.value()]).with_payload(to_payload(&comment)?);
        self.run(&mut ctx, HookTiming::After).await?;
        Ok(comment)
    }

    pub async fn get_comment(&self, id: CommentId) -> AppResult<Comment> {
        self.db
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    pub async fn update_comment(&self, id: CommentId, content: String) -> AppResult<Comment> {
        validate_text("content", &content)?;

        let mut ctx = HookContext::new(Collection::Comments, HookOperation::Update).with_keys(vec![id.value()]);
        self.run(&mut ctx, HookTiming::Before).await?;

        if !self.db.update_comment_content(id, &content, Utc::now()).await? {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }
        let comment = self.get_comment(id).await?;

        let mut ctx = ctx.with_payload(to_payload(&comment)?);
        self.run(&mut ctx, HookTiming::After).await?;
        Ok(comment)
    }

    /// Delete a batch of comments, returning the keys that were actually removed
    #[instrument(skip(self, ids), fields(batch = ids.len()))]
    pub async fn delete_comments(&self, ids: Vec<CommentId>) -> AppResult<Vec<CommentId>> {
        let mut ctx = HookContext::new(Collection::Comments, HookOperation::Delete)
            .with_keys(ids.into_iter().map(Uuid::from).collect());
        self.run(&mut ctx, HookTiming::Before).await?;

        // Before hooks may have narrowed or rewritten the batch
        let requested: Vec<CommentId> = ctx.keys.iter().copied().map(CommentId::from).collect();
        let deleted = self.db.delete_comment_rows(&requested).await?;

        let mut ctx = ctx.with_keys(deleted.iter().copied().map(Uuid::from).collect());
        self.run(&mut ctx, HookTiming::After).await?;
        Ok(deleted)
    }

    pub async fn delete_comment(&self, id: CommentId) -> AppResult<()> {
        if self.delete_comments(vec![id]).await?.is_empty() {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }
        Ok(())
    }

    pub async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<Comment>> {
        self.db.comments_for_post(post_id).await
    }

    pub async fn user_comments(&self, user: UserId) -> AppResult<Vec<Comment>> {
        self.db.comments_by_user(user).await
    }

    /// Direct replies to a comment
    pub async fn comment_replies(&self, id: CommentId) -> AppResult<Vec<Comment>> {
        self.get_comment(id).await?;
        self.db.replies_to(id).await
    }

    /// Comments of a post arranged into reply threads
    pub async fn comment_thread(&self, post_id: PostId) -> AppResult<Vec<CommentNode>> {
        self.get_post(post_id).await?;
        let comments = self.db.comments_for_post(post_id).await?;
        Ok(organize_comments(comments))
    }

    async fn run(&self, ctx: &mut HookContext, timing: HookTiming) -> AppResult<()> {
        self.hooks
            .execute_hooks(ctx.collection, ctx.operation, timing, ctx)
            .await
    }
}

fn validate_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    if value.len() > MAX_CONTENT_LEN {
        return Err(AppError::Validation(format!("{} too long", field)));
    }
    Ok(())
}

fn to_payload<T: serde::Serialize>(item: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(item).map_err(|e| AppError::Internal(format!("Failed to serialize hook payload: {}", e)))
}
