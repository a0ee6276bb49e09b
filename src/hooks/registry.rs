// Hook Registry - lifecycle hooks around collection mutations
// Before hooks act as filters (may rewrite the keys or payload, may veto the mutation);
// after hooks observe the committed result and can never undo it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Collection;

/// Hook context containing mutation information
#[derive(Debug, Clone)]
pub struct HookContext {
    pub collection: Collection,
    pub operation: HookOperation,
    /// Keys of the affected items. For a before-delete these are the keys
    /// requested; for an after-delete, the keys actually removed.
    pub keys: Vec<Uuid>,
    /// The written item, for create and update
    pub payload: Option<Value>,
}

impl HookContext {
    pub fn new(collection: Collection, operation: HookOperation) -> Self {
        Self {
            collection,
            operation,
            keys: Vec::new(),
            payload: None,
        }
    }

    pub fn with_keys(mut self, keys: Vec<Uuid>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Types of operations that can trigger hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOperation {
    Create,
    Update,
    Delete,
}

/// Hook execution timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    /// Runs before the mutation and must finish before it proceeds
    Before,
    /// Runs after the mutation has been committed
    After,
}

/// Trait for implementing collection hooks
#[async_trait]
pub trait CollectionHook: Send + Sync {
    /// Execute the hook logic
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()>;

    /// Get hook name for debugging
    fn name(&self) -> &str;

    /// Get supported operations
    fn operations(&self) -> Vec<HookOperation>;

    /// Get hook timing
    fn timing(&self) -> HookTiming;
}

/// Hook registry for managing collection hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<Collection, Vec<Arc<dyn CollectionHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for a collection
    pub fn register_hook(&mut self, collection: Collection, hook: Arc<dyn CollectionHook>) {
        debug!("Registered hook '{}' on {}", hook.name(), collection);
        self.hooks.entry(collection).or_default().push(hook);
    }

    pub fn hook_count(&self, collection: Collection) -> usize {
        self.hooks.get(&collection).map_or(0, Vec::len)
    }

    /// Execute all applicable hooks for an operation, in registration order.
    ///
    /// A failing before hook aborts the mutation. A failing after hook is
    /// logged and the remaining hooks still run.
    pub async fn execute_hooks(
        &self,
        collection: Collection,
        operation: HookOperation,
        timing: HookTiming,
        ctx: &mut HookContext,
    ) -> AppResult<()> {
        let Some(hooks) = self.hooks.get(&collection) else {
            return Ok(());
        };

        for hook in hooks {
            if !hook.operations().contains(&operation) || hook.timing() != timing {
                continue;
            }
            match (hook.execute(ctx).await, timing) {
                (Ok(()), _) => {}
                (Err(e), HookTiming::Before) => {
                    return Err(AppError::Validation(format!("Hook '{}' failed: {}", hook.name(), e)));
                }
                (Err(e), HookTiming::After) => {
                    error!("Hook '{}' failed after {:?} on {}: {}", hook.name(), operation, collection, e);
                }
            }
        }
        Ok(())
    }
}
