use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{PostId, UserId};

/// A row of the `posts` collection.
///
/// `comment_count` is denormalized from the `comments` collection and is only
/// ever written by the comment count maintenance hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub user_created: Option<UserId>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub comment_count: u64,
}

/// Payload for creating a post. Any `comment_count` sent by a client is dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub user_created: Option<UserId>,
}

/// Partial edit of a post. Only `title` and `content` can change;
/// any other field in the request body, `comment_count` included, is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl UpdatePost {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}
