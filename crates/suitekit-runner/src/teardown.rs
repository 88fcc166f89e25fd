//! One-shot teardown shared between the suite-end path and the interrupt hook

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cleanup::{CleanupStack, CleanupState, TeardownFailure, run_action};

#[derive(Default)]
struct Shared {
    stack: Mutex<CleanupStack>,
    // Held for the whole drain so a concurrent caller waits for completion.
    draining: Mutex<()>,
    started: AtomicBool,
}

/// Cloneable handle to a suite's cleanup stack that drains at most once
#[derive(Clone, Default)]
pub struct Teardown {
    shared: Arc<Shared>,
}

impl Teardown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action
    ///
    /// Once the teardown has started, the action runs immediately instead, so
    /// a resource acquired while an interrupt is being handled is still released.
    pub fn push<F>(&self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let label = label.into();
        {
            let mut stack = self.stack();
            if !self.shared.started.load(Ordering::SeqCst) {
                stack.push(label, action);
                return;
            }
        }
        tracing::warn!(label = %label, "teardown already started, running cleanup now");
        // Failure is logged by run_action.
        let _ = run_action(label, Box::new(action));
    }

    /// Drain the stack in reverse registration order
    ///
    /// Only the first call does any work; every later call, including one
    /// racing the first from another thread, waits for it and returns nothing.
    pub fn run(&self) -> Vec<TeardownFailure> {
        let _drain = self.shared.draining.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = {
            let mut stack = self.stack();
            if self.shared.started.swap(true, Ordering::SeqCst) {
                return Vec::new();
            }
            stack.take()
        };

        tracing::info!(actions = entries.len(), "running teardown");
        let failures: Vec<TeardownFailure> = entries
            .into_iter()
            .rev()
            .filter_map(|(label, action)| run_action(label, action))
            .collect();
        if !failures.is_empty() {
            tracing::warn!(failed = failures.len(), "teardown finished with failures");
        }
        failures
    }

    #[must_use]
    pub fn has_run(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack().is_empty()
    }

    #[must_use]
    pub fn state(&self) -> CleanupState {
        if self.has_run() && self.shared.draining.try_lock().is_err() {
            return CleanupState::Draining;
        }
        self.stack().state()
    }

    #[cfg(test)]
    pub(crate) fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn stack(&self) -> MutexGuard<'_, CleanupStack> {
        self.shared.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("pending", &self.len())
            .field("has_run", &self.has_run())
            .finish()
    }
}
