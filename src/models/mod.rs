// Collection models - rows of the posts and comments collections

pub mod comment;
pub mod post;

pub use comment::{organize_comments, Comment, CommentNode, CommentRef, NewComment, UpdateComment};
pub use post::{NewPost, Post, UpdatePost};

/// Collections known to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Posts,
    Comments,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
