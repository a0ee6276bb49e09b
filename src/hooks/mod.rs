// Collection lifecycle hooks

pub mod comment_count;
pub mod registry;

pub use comment_count::register_comment_count_hooks;
pub use registry::{CollectionHook, HookContext, HookOperation, HookRegistry, HookTiming};
