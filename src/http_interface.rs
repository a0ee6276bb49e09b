// HTTP Interface - posts and comments collections plus comment count maintenance

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    core::{CommentId, PostId, UserId},
    error::{AppError, AppResult},
    models::{NewComment, NewPost, UpdateComment, UpdatePost},
};

#[derive(Deserialize)]
pub struct DeleteCommentsRequest {
    pub keys: Vec<CommentId>,
}

fn data<T: serde::Serialize>(item: T) -> AppResult<Json<Value>> {
    let value = serde_json::to_value(item)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))?;
    Ok(Json(json!({ "data": value })))
}

// HTTP Handlers

pub async fn create_post_handler(
    State(state): State<AppState>,
    Json(req): Json<NewPost>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let post = state.items.create_post(req).await?;
    Ok((StatusCode::CREATED, data(post)?))
}

pub async fn list_posts_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    data(state.items.list_posts().await?)
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    let id = PostId::parse(&id)?;
    data(state.items.get_post(id).await?)
}

pub async fn update_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdatePost>,
) -> Result<Json<Value>, AppError> {
    let id = PostId::parse(&id)?;
    data(state.items.update_post(id, req).await?)
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, AppError> {
    let id = PostId::parse(&id)?;
    state.items.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_comments_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    let id = PostId::parse(&id)?;
    data(state.items.comment_thread(id).await?)
}

pub async fn comment_replies_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    let id = CommentId::parse(&id)?;
    data(state.items.comment_replies(id).await?)
}

pub async fn user_posts_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    let user = UserId::parse(&id)?;
    data(state.items.user_posts(user).await?)
}

pub async fn user_comments_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, AppError> {
    let user = UserId::parse(&id)?;
    data(state.items.user_comments(user).await?)
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    Json(req): Json<NewComment>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let comment = state.items.create_comment(req).await?;
    Ok((StatusCode::CREATED, data(comment)?))
}

pub async fn update_comment_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateComment>,
) -> Result<Json<Value>, AppError> {
    let id = CommentId::parse(&id)?;
    data(state.items.update_comment(id, req.content).await?)
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, AppError> {
    let id = CommentId::parse(&id)?;
    state.items.delete_comment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_comments_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteCommentsRequest>,
) -> Result<Json<Value>, AppError> {
    if req.keys.is_empty() {
        return Err(AppError::BadRequest("keys cannot be empty".to_string()));
    }
    let deleted = state.items.delete_comments(req.keys).await?;
    data(json!({ "keys": deleted }))
}

pub async fn recompute_all_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    data(state.comment_counts.recompute_all().await?)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Posts
        .route("/posts", post(create_post_handler).get(list_posts_handler))
        .route(
            "/posts/{id}",
            get(get_post_handler).patch(update_post_handler).delete(delete_post_handler),
        )
        .route("/posts/{id}/comments", get(post_comments_handler))

        // Comments
        .route("/comments", post(create_comment_handler).delete(delete_comments_handler))
        .route("/comments/{id}", patch(update_comment_handler).delete(delete_comment_handler))
        .route("/comments/{id}/replies", get(comment_replies_handler))

        // Users
        .route("/users/{id}/posts", get(user_posts_handler))
        .route("/users/{id}/comments", get(user_comments_handler))

        // Maintenance
        .route("/maintenance/recompute-all", post(recompute_all_handler))

        .with_state(state)
}
