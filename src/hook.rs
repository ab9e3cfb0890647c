//! Instrumentation hook invoked around command execution.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::resp::RespValue;

/// What a hook sees about the command being dispatched.
#[derive(Debug)]
pub struct HookContext<'a> {
    /// Resolved command name, e.g. `get` or `client|setinfo`.
    pub command: &'a str,
    /// Every word of the request, the command name included.
    pub request: &'a [Bytes],
    pub client_id: u64,
    pub database: usize,
}

/// Observes or short-circuits command execution.
///
/// `before` runs after name and arity validation; returning `Some` skips
/// the handler and sends that reply instead. `after` sees every reply that
/// reaches the client, bypass replies included.
pub trait DispatchHook: Send + Sync {
    fn before(&self, _context: &HookContext<'_>) -> Option<RespValue> {
        None
    }

    fn after(&self, _context: &HookContext<'_>, _reply: &RespValue) {}
}

/// Shared, replaceable slot holding the active hook.
#[derive(Clone, Default)]
pub struct HookSlot(Arc<RwLock<Option<Arc<dyn DispatchHook>>>>);

impl HookSlot {
    pub async fn set(&self, hook: Arc<dyn DispatchHook>) {
        *self.0.write().await = Some(hook);
    }

    pub async fn clear(&self) {
        *self.0.write().await = None;
    }

    pub async fn current(&self) -> Option<Arc<dyn DispatchHook>> {
        self.0.read().await.clone()
    }
}

impl std::fmt::Debug for HookSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSlot").finish_non_exhaustive()
    }
}
