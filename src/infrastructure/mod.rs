// Core infrastructure modules
pub mod database;              // Backend accessor interface
pub mod sqlite_database;       // SQLite storage for posts and comments
pub mod capture_store;         // Pre-delete comment -> post capture
pub mod collections;           // Collection write path with hooks

#[cfg(test)]
pub(crate) mod fake_backend;   // Scriptable accessor double for unit tests

// Re-export core infrastructure components
pub use database::BackendAccessors;
pub use sqlite_database::SqliteBackend;
pub use capture_store::{CaptureEntry, CaptureStore};
pub use collections::ItemsService;
