// Comment count maintenance services

pub mod comment_count_service;
pub mod comment_event_router;

pub use comment_count_service::{CommentCountService, RecomputeReport};
pub use comment_event_router::CommentEventRouter;
