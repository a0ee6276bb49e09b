// Comment Counter - posts/comments backend keeping posts.comment_count in sync with the comments collection

// Core types and primitives
pub mod core;

// Collection models - posts, comments, reply threads
pub mod models;

// Storage, capture store and the collection write path
pub mod infrastructure;

// Lifecycle hooks around collection mutations
pub mod hooks;

// Comment count recomputation and event routing
pub mod services;

// HTTP surface and application wiring
pub mod http_interface;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
