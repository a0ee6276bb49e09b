use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::{CommentId, PostId, UserId};

/// A row of the `comments` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub post: PostId,
    pub user_created: Option<UserId>,
    pub parent_comment: Option<CommentId>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// The `(id, post)` projection read before a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentRef {
    pub id: CommentId,
    pub post: PostId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub content: String,
    #[serde(alias = "post_id")]
    pub post: PostId,
    #[serde(default)]
    pub parent_comment: Option<CommentId>,
    #[serde(default)]
    pub user_created: Option<UserId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateComment {
    pub content: String,
}

/// A comment together with its direct and nested replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Deepest nesting level returned in a thread; deeper replies are listed flat at this level
pub const MAX_THREAD_DEPTH: usize = 32;

/// Arrange a flat list of comments into reply threads.
///
/// Input order is preserved among siblings. A reply whose parent is not part
/// of `comments` is promoted to a root. Replies nested deeper than
/// `MAX_THREAD_DEPTH` are attached to their ancestor at the last allowed level,
/// in thread order.
pub fn organize_comments(comments: Vec<Comment>) -> Vec<CommentNode> {
    let known: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
    let mut by_id: HashMap<CommentId, Comment> = HashMap::with_capacity(comments.len());
    for comment in comments {
        match comment.parent_comment {
            Some(parent) if known.contains(&parent) => children.entry(parent).or_default().push(comment.id),
            _ => roots.push(comment.id),
        }
        by_id.insert(comment.id, comment);
    }

    // Pre-order walk deciding which node each comment hangs under
    let mut placement: Vec<(CommentId, Option<CommentId>)> = Vec::with_capacity(by_id.len());
    let mut stack: Vec<(CommentId, Option<CommentId>, usize)> =
        roots.iter().rev().map(|id| (*id, None, 0)).collect();
    while let Some((id, attach_to, depth)) = stack.pop() {
        placement.push((id, attach_to));
        let (child_attach, child_depth) = if depth + 1 < MAX_THREAD_DEPTH {
            (Some(id), depth + 1)
        } else {
            (attach_to, depth)
        };
        if let Some(kids) = children.remove(&id) {
            stack.extend(kids.into_iter().rev().map(|kid| (kid, child_attach, child_depth)));
        }
    }

    // Every node comes after the node it hangs under, so build in reverse
    let mut replies_of: HashMap<CommentId, Vec<CommentNode>> = HashMap::new();
    let mut threads = Vec::with_capacity(roots.len());
    for (id, attach_to) in placement.into_iter().rev() {
        let Some(comment) = by_id.remove(&id) else {
            continue;
        };
        let mut replies = replies_of.remove(&id).unwrap_or_default();
        replies.reverse();
        let node = CommentNode { comment, replies };
        match attach_to {
            Some(parent) => replies_of.entry(parent).or_default().push(node),
            None => threads.push(node),
        }
    }
    threads.reverse();
    threads
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(post: PostId, parent: Option<CommentId>, content: &str) -> Comment {
        let now = Utc::now();
        Comment {
            id: CommentId::new(),
            content: content.to_string(),
            post,
            user_created: None,
            parent_comment: parent,
            date_created: now,
            date_updated: now,
        }
    }

    #[test]
    fn test_organize_builds_nested_threads() {
        let post = PostId::new();
        let root = comment(post, None, "root");
        let reply = comment(post, Some(root.id), "reply");
        let nested = comment(post, Some(reply.id), "nested");
        let other_root = comment(post, None, "other");

        let threads = organize_comments(vec![
            root.clone(),
            reply.clone(),
            other_root.clone(),
            nested.clone(),
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, root.id);
        assert_eq!(threads[1].comment.id, other_root.id);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].comment.id, reply.id);
        assert_eq!(threads[0].replies[0].replies[0].comment.id, nested.id);
        assert!(threads[1].replies.is_empty());
    }

    #[test]
    fn test_orphaned_reply_becomes_root() {
        let post = PostId::new();
        let orphan = comment(post, Some(CommentId::new()), "orphan");

        let threads = organize_comments(vec![orphan.clone()]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, orphan.id);
    }

    #[test]
    fn test_very_deep_reply_chain_is_capped() {
        let post = PostId::new();
        let mut chain = vec![comment(post, None, "root")];
        for i in 0..10_000 {
            let parent = chain[i].id;
            chain.push(comment(post, Some(parent), "reply"));
        }
        let last = chain[chain.len() - 1].id;

        let threads = organize_comments(chain);
        assert_eq!(threads.len(), 1);

        // Walk down the first reply of each level
        let mut depth = 0;
        let mut node = &threads[0];
        while let Some(first) = node.replies.first() {
            depth += 1;
            node = first;
        }
        assert_eq!(depth, MAX_THREAD_DEPTH - 1);

        let mut total = 0;
        let mut pending: Vec<&CommentNode> = threads.iter().collect();
        let mut flattened_tail = None;
        while let Some(node) = pending.pop() {
            total += 1;
            if let Some(tail) = node.replies.last() {
                if tail.comment.id == last {
                    flattened_tail = Some(node.replies.len());
                }
            }
            pending.extend(node.replies.iter());
        }
        assert_eq!(total, 10_001);
        assert_eq!(flattened_tail, Some(10_001 - (MAX_THREAD_DEPTH - 1)));
    }

    #[test]
    fn test_sibling_order_is_preserved() {
        let post = PostId::new();
        let root = comment(post, None, "root");
        let first = comment(post, Some(root.id), "first");
        let second = comment(post, Some(root.id), "second");

        let threads = organize_comments(vec![root, first.clone(), second.clone()]);
        let replies: Vec<CommentId> = threads[0].replies.iter().map(|n| n.comment.id).collect();
        assert_eq!(replies, vec![first.id, second.id]);
    }
}
