use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    QueryBuilder, Row,
};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::core::{CommentId, PostId, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::BackendAccessors;
use crate::models::{Comment, CommentRef, Post};

/// Keys bound per `IN (...)` statement, well under SQLite's host parameter limit
const MAX_KEYS_PER_STATEMENT: usize = 500;

/// SQLite-backed storage for the posts and comments collections
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the database at `url` and make sure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::ConfigurationError(format!("Invalid database url '{}': {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:");
        let pool_options = if in_memory {
            // An in-memory database lives exactly as long as its connection
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            if let Some(parent) = database_file(url).and_then(|p| p.parent()) {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::ConfigurationError(format!(
                            "Failed to create database directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to SQLite at {}: {}", url, e))
        })?;

        let backend = Self { pool };
        backend.initialize().await?;
        info!("SQLite backend ready at {}", url);
        Ok(backend)
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Create the posts and comments tables if they do not exist yet
    pub async fn initialize(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                user_created TEXT,
                date_created TEXT NOT NULL,
                date_updated TEXT NOT NULL,
                comment_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create posts table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                post TEXT NOT NULL REFERENCES posts(id),
                user_created TEXT,
                parent_comment TEXT REFERENCES comments(id) ON DELETE SET NULL,
                date_created TEXT NOT NULL,
                date_updated TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comments table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create comments post index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create comments parent index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_created)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create comments user index: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_created)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to create posts user index: {}", e)))?;

        Ok(())
    }

    // Posts

    pub async fn insert_post(&self, post: &Post) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO posts (id, title, content, user_created, date_created, date_updated, comment_count) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id.to_string())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.user_created.map(|u| u.to_string()))
        .bind(post.date_created)
        .bind(post.date_updated)
        .bind(post.comment_count as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create post {}: {}", post.id, e)))?;
        Ok(())
    }

    pub async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, title, content, user_created, date_created, date_updated, comment_count FROM posts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get post {}: {}", id, e)))?;

        row.map(|row| post_from_row(&row)).transpose()
    }

    pub async fn list_posts(&self) -> AppResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, title, content, user_created, date_created, date_updated, comment_count FROM posts ORDER BY date_created DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list posts: {}", e)))?;

        rows.iter().map(post_from_row).collect()
    }

    /// Overwrite a post's title and content. `comment_count` is never part of this write.
    pub async fn update_post_fields(
        &self,
        id: PostId,
        title: &str,
        content: &str,
        date_updated: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE posts SET title = ?, content = ?, date_updated = ? WHERE id = ?")
            .bind(title)
            .bind(content)
            .bind(date_updated)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update post {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    /// Posts authored by a user, newest first
    pub async fn posts_by_user(&self, user: UserId) -> AppResult<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, title, content, user_created, date_created, date_updated, comment_count FROM posts WHERE user_created = ? ORDER BY date_created DESC, rowid DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list posts of user {}: {}", user, e)))?;

        rows.iter().map(post_from_row).collect()
    }

    pub async fn delete_post_row(&self, id: PostId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete post {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    // Comments

    pub async fn insert_comment(&self, comment: &Comment) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO comments (id, content, post, user_created, parent_comment, date_created, date_updated) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.id.to_string())
        .bind(&comment.content)
        .bind(comment.post.to_string())
        .bind(comment.user_created.map(|u| u.to_string()))
        .bind(comment.parent_comment.map(|c| c.to_string()))
        .bind(comment.date_created)
        .bind(comment.date_updated)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create comment {}: {}", comment.id, e)))?;
        Ok(())
    }

    pub async fn get_comment(&self, id: CommentId) -> AppResult<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, content, post, user_created, parent_comment, date_created, date_updated FROM comments WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to get comment {}: {}", id, e)))?;

        row.map(|row| comment_from_row(&row)).transpose()
    }

    pub async fn update_comment_content(
        &self,
        id: CommentId,
        content: &str,
        date_updated: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query("UPDATE comments SET content = ?, date_updated = ? WHERE id = ?")
            .bind(content)
            .bind(date_updated)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update comment {}: {}", id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    /// All comments of a post, oldest first
    pub async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, content, post, user_created, parent_comment, date_created, date_updated FROM comments WHERE post = ? ORDER BY date_created ASC, rowid ASC",
        )
        .bind(post_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list comments of post {}: {}", post_id, e)))?;

        rows.iter().map(comment_from_row).collect()
    }

    /// Comments written by a user across all posts, newest first
    pub async fn comments_by_user(&self, user: UserId) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, content, post, user_created, parent_comment, date_created, date_updated FROM comments WHERE user_created = ? ORDER BY date_created DESC, rowid DESC",
        )
        .bind(user.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list comments of user {}: {}", user, e)))?;

        rows.iter().map(comment_from_row).collect()
    }

    /// Direct replies to a comment, oldest first
    pub async fn replies_to(&self, parent: CommentId) -> AppResult<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, content, post, user_created, parent_comment, date_created, date_updated FROM comments WHERE parent_comment = ? ORDER BY date_created ASC, rowid ASC",
        )
        .bind(parent.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list replies to comment {}: {}", parent, e)))?;

        rows.iter().map(comment_from_row).collect()
    }

    pub async fn comment_ids_for_post(&self, post_id: PostId) -> AppResult<Vec<CommentId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM comments WHERE post = ?")
            .bind(post_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list comment ids of post {}: {}", post_id, e)))?;

        ids.iter().map(|id| parse_key(id)).collect()
    }

    /// Delete the given comments and return the keys that were actually removed.
    ///
    /// Large batches are split into several statements inside one transaction.
    pub async fn delete_comment_rows(&self, ids: &[CommentId]) -> AppResult<Vec<CommentId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let mut deleted = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_KEYS_PER_STATEMENT) {
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM comments WHERE id IN (");
            let mut separated = qb.separated(",");
            for id in chunk {
                separated.push_bind(id.to_string());
            }
            qb.push(") RETURNING id");

            let rows = qb
                .build()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to delete comments: {}", e)))?;

            for row in &rows {
                deleted.push(parse_key::<CommentId>(&get_column::<String>(row, "id")?)?);
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit comment delete: {}", e)))?;

        debug!("Deleted {} of {} requested comments", deleted.len(), ids.len());
        Ok(deleted)
    }
}

#[async_trait]
impl BackendAccessors for SqliteBackend {
    async fn count_comments(&self, post_id: PostId) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post = ?")
            .bind(post_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count comments of post {}: {}", post_id, e)))?;
        Ok(count as u64)
    }

    async fn update_post_comment_count(&self, post_id: PostId, count: u64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE posts SET comment_count = ? WHERE id = ?")
            .bind(count as i64)
            .bind(post_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update comment count of post {}: {}", post_id, e)))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_comments_by_ids(&self, ids: &[CommentId]) -> AppResult<Vec<CommentRef>> {
        let mut refs = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_KEYS_PER_STATEMENT) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, post FROM comments WHERE id IN (");
            let mut separated = qb.separated(",");
            for id in chunk {
                separated.push_bind(id.to_string());
            }
            qb.push(")");

            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to read comments by id: {}", e)))?;

            for row in &rows {
                refs.push(CommentRef {
                    id: parse_key(&get_column::<String>(row, "id")?)?,
                    post: parse_key(&get_column::<String>(row, "post")?)?,
                });
            }
        }

        Ok(refs)
    }

    async fn list_post_ids(&self) -> AppResult<Vec<PostId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM posts ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to list post ids: {}", e)))?;

        ids.iter().map(|id| parse_key(id)).collect()
    }
}

/// File path of a `sqlite:` url, if it names one
fn database_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        None
    } else {
        Some(Path::new(path))
    }
}

fn get_column<T>(row: &SqliteRow, column: &str) -> AppResult<T>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| AppError::DatabaseError(format!("Failed to read column {}: {}", column, e)))
}

fn parse_key<K: FromStr<Err = AppError>>(raw: &str) -> AppResult<K> {
    raw.parse()
        .map_err(|e| AppError::DatabaseError(format!("Corrupt key in database: {}", e)))
}

fn parse_optional_key<K: FromStr<Err = AppError>>(raw: Option<String>) -> AppResult<Option<K>> {
    raw.as_deref().map(parse_key).transpose()
}

fn post_from_row(row: &SqliteRow) -> AppResult<Post> {
    Ok(Post {
        id: parse_key(&get_column::<String>(row, "id")?)?,
        title: get_column(row, "title")?,
        content: get_column(row, "content")?,
        user_created: parse_optional_key::<UserId>(get_column(row, "user_created")?)?,
        date_created: get_column(row, "date_created")?,
        date_updated: get_column(row, "date_updated")?,
        comment_count: get_column::<i64>(row, "comment_count")? as u64,
    })
}

fn comment_from_row(row: &SqliteRow) -> AppResult<Comment> {
    Ok(Comment {
        id: parse_key(&get_column::<String>(row, "id")?)?,
        content: get_column(row, "content")?,
        post: parse_key(&get_column::<String>(row, "post")?)?,
        user_created: parse_optional_key::<UserId>(get_column(row, "user_created")?)?,
        parent_comment: parse_optional_key::<CommentId>(get_column(row, "parent_comment")?)?,
        date_created: get_column(row, "date_created")?,
        date_updated: get_column(row, "date_updated")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        let now = Utc::now();
        Post {
            id: PostId::new(),
            title: "Hello".to_string(),
            content: "World".to_string(),
            user_created: Some(UserId::new()),
            date_created: now,
            date_updated: now,
            comment_count: 0,
        }
    }

    fn comment_on(post: PostId, parent: Option<CommentId>) -> Comment {
        let now = Utc::now();
        Comment {
            id: CommentId::new(),
            content: "nice".to_string(),
            post,
            user_created: None,
            parent_comment: parent,
            date_created: now,
            date_updated: now,
        }
    }

    #[tokio::test]
    async fn test_count_and_update() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        db.insert_comment(&comment_on(p.id, None)).await.unwrap();
        db.insert_comment(&comment_on(p.id, None)).await.unwrap();

        assert_eq!(db.count_comments(p.id).await.unwrap(), 2);
        assert!(db.update_post_comment_count(p.id, 2).await.unwrap());
        assert_eq!(db.get_post(p.id).await.unwrap().unwrap().comment_count, 2);
    }

    #[tokio::test]
    async fn test_update_missing_post_reports_no_row() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        assert!(!db.update_post_comment_count(PostId::new(), 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_comments_by_ids_skips_unknown() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        let c = comment_on(p.id, None);
        db.insert_comment(&c).await.unwrap();

        let refs = db.get_comments_by_ids(&[c.id, CommentId::new()]).await.unwrap();
        assert_eq!(refs, vec![CommentRef { id: c.id, post: p.id }]);
        assert!(db.get_comments_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_returns_actual_keys_and_orphans_replies() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        let root = comment_on(p.id, None);
        db.insert_comment(&root).await.unwrap();
        let reply = comment_on(p.id, Some(root.id));
        db.insert_comment(&reply).await.unwrap();

        let missing = CommentId::new();
        let deleted = db.delete_comment_rows(&[root.id, missing]).await.unwrap();
        assert_eq!(deleted, vec![root.id]);

        let reply = db.get_comment(reply.id).await.unwrap().unwrap();
        assert_eq!(reply.parent_comment, None);
    }

    #[tokio::test]
    async fn test_batches_larger_than_one_statement() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        let mut ids = Vec::new();
        for _ in 0..(MAX_KEYS_PER_STATEMENT * 2 + 7) {
            let c = comment_on(p.id, None);
            db.insert_comment(&c).await.unwrap();
            ids.push(c.id);
        }

        let refs = db.get_comments_by_ids(&ids).await.unwrap();
        assert_eq!(refs.len(), ids.len());
        assert!(refs.iter().all(|r| r.post == p.id));

        let mut deleted = db.delete_comment_rows(&ids).await.unwrap();
        deleted.sort();
        ids.sort();
        assert_eq!(deleted, ids);
        assert_eq!(db.count_comments(p.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_round_trips_rows() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        let c = comment_on(p.id, None);
        db.insert_comment(&c).await.unwrap();

        let stored = db.get_post(p.id).await.unwrap().unwrap();
        assert_eq!(stored.title, p.title);
        assert_eq!(stored.user_created, p.user_created);
        assert_eq!(stored.comment_count, 0);

        let comments = db.comments_for_post(p.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, c.id);
        assert_eq!(comments[0].post, p.id);
        assert_eq!(db.list_post_ids().await.unwrap(), vec![p.id]);
        assert_eq!(db.comment_ids_for_post(p.id).await.unwrap(), vec![c.id]);
    }

    #[tokio::test]
    async fn test_update_post_fields_keeps_count() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        db.insert_post(&p).await.unwrap();
        db.update_post_comment_count(p.id, 4).await.unwrap();

        assert!(db.update_post_fields(p.id, "New", "Text", Utc::now()).await.unwrap());
        let stored = db.get_post(p.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.content, "Text");
        assert_eq!(stored.comment_count, 4);
        assert!(!db.update_post_fields(PostId::new(), "x", "y", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_and_reply_reads() {
        let db = SqliteBackend::new_in_memory().await.unwrap();
        let p = post();
        let author = p.user_created.unwrap();
        db.insert_post(&p).await.unwrap();
        db.insert_post(&Post { user_created: None, ..post() }).await.unwrap();

        let root = comment_on(p.id, None);
        db.insert_comment(&root).await.unwrap();
        let reply = Comment { user_created: Some(author), ..comment_on(p.id, Some(root.id)) };
        db.insert_comment(&reply).await.unwrap();

        let posts: Vec<PostId> = db.posts_by_user(author).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(posts, vec![p.id]);
        let comments: Vec<CommentId> = db.comments_by_user(author).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(comments, vec![reply.id]);
        let replies: Vec<CommentId> = db.replies_to(root.id).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(replies, vec![reply.id]);
        assert!(db.replies_to(reply.id).await.unwrap().is_empty());
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(database_file("sqlite:data/app.db"), Some(Path::new("data/app.db")));
        assert_eq!(database_file("sqlite://tmp/app.db?mode=rwc"), Some(Path::new("tmp/app.db")));
        assert_eq!(database_file("postgres://localhost"), None);
    }
}
