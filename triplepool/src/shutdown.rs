// Copyright (c) 2025 TriplePool Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Shutdown hooks
//!
//! A pool built with `register_shutdown_hook` registers a callback that
//! closes it, and removes that callback again when it is closed. The
//! registry is injectable; by default pools use the process-wide
//! [`HookRegistry::global`], whose hooks the application runs once at exit:
//!
//! ```rust,ignore
//! fn main() {
//!     let pool = ConnectionPool::create(connector, config, tuning)?;
//!     // ...
//!     triplepool::run_shutdown_hooks();
//! }
//! ```

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback run once at shutdown
pub type ShutdownHook = Box<dyn FnOnce() + Send>;

/// Token identifying a registered hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Somewhere to park callbacks that must run at shutdown
pub trait ShutdownRegistry: Send + Sync {
    /// Register a hook
    ///
    /// # Returns
    /// Token to pass to [`unregister`](ShutdownRegistry::unregister)
    fn register(&self, hook: ShutdownHook) -> HookId;

    /// Remove a hook without running it
    ///
    /// # Returns
    /// `true` if the hook was still registered
    fn unregister(&self, id: HookId) -> bool;
}

/// Process-wide registry
static GLOBAL_REGISTRY: Lazy<Arc<HookRegistry>> = Lazy::new(|| Arc::new(HookRegistry::new()));

/// In-memory hook registry
#[derive(Default)]
pub struct HookRegistry {
    hooks: Mutex<Vec<(HookId, ShutdownHook)>>,
    next_id: AtomicU64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry pools use unless another one is injected
    pub fn global() -> Arc<HookRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }

    /// Run and remove every registered hook, in registration order
    ///
    /// Hooks run without the registry lock held, so a hook may unregister
    /// itself or others.
    ///
    /// # Returns
    /// Number of hooks run
    pub fn run(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let count = hooks.len();
        for (id, hook) in hooks {
            log::debug!("Running shutdown hook {:?}", id);
            hook();
        }
        count
    }
}

impl ShutdownRegistry for HookRegistry {
    fn register(&self, hook: ShutdownHook) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().push((id, hook));
        id
    }

    fn unregister(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }
}

/// Run the hooks of the process-wide registry
pub fn run_shutdown_hooks() -> usize {
    let count = GLOBAL_REGISTRY.run();
    if count > 0 {
        log::info!("Ran {} shutdown hook(s)", count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_and_run() {
        let registry = HookRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let calls = calls.clone();
            registry.register(Box::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.run(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.run(), 0);
    }

    #[test]
    fn test_unregister() {
        let registry = HookRegistry::new();
        let id = registry.register(Box::new(|| panic!("must not run")));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.run(), 0);
    }

    #[test]
    fn test_hook_may_unregister_during_run() {
        let registry = Arc::new(HookRegistry::new());
        let other = registry.register(Box::new(|| {}));
        let inner = registry.clone();
        registry.register(Box::new(move || {
            inner.unregister(other);
        }));

        assert_eq!(registry.run(), 2);
    }
}
