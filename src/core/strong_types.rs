// Strong Types - item keys for the posts and comments collections
// Each collection gets its own newtype so a comment id can never be passed where a post id is expected

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Primary key of a row in the `posts` collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub Uuid);

/// Primary key of a row in the `comments` collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub Uuid);

/// Reference to the user that created an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

macro_rules! item_key {
    ($name:ident, $label:literal) => {
        impl $name {
            /// Generate a fresh random key
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the raw UUID value
            pub fn value(self) -> Uuid {
                self.0
            }

            pub fn parse(raw: &str) -> Result<Self, AppError> {
                raw.parse()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| AppError::BadRequest(format!("Invalid {} '{}': {}", $label, s, e)))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

item_key!(PostId, "post id");
item_key!(CommentId, "comment id");
item_key!(UserId, "user id");
