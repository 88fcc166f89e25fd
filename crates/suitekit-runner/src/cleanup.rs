//! LIFO cleanup stack
//!
//! Resources are registered as they are acquired and released in reverse.
//! A failing action never prevents the ones registered before it from running.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// A deferred release action
pub type CleanupAction = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupState {
    Empty,
    Accumulating,
    Draining,
}

/// A cleanup action that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub label: String,
    pub message: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.message)
    }
}

impl std::error::Error for TeardownFailure {}

#[derive(Default)]
pub struct CleanupStack {
    entries: Vec<(String, CleanupAction)>,
    draining: bool,
}

impl CleanupStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let label = label.into();
        tracing::debug!(label = %label, depth = self.entries.len() + 1, "registered cleanup");
        self.entries.push((label, Box::new(action)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> CleanupState {
        if self.draining {
            CleanupState::Draining
        } else if self.entries.is_empty() {
            CleanupState::Empty
        } else {
            CleanupState::Accumulating
        }
    }

    /// Run every registered action, most recent first
    ///
    /// Always completes. Failures are logged and returned; the stack is empty
    /// afterwards, so a second call is a no-op.
    pub fn run_all(&mut self) -> Vec<TeardownFailure> {
        self.draining = true;
        let mut failures = Vec::new();
        while let Some((label, action)) = self.entries.pop() {
            if let Some(failure) = run_action(label, action) {
                failures.push(failure);
            }
        }
        self.draining = false;
        failures
    }

    pub(crate) fn take(&mut self) -> Vec<(String, CleanupAction)> {
        std::mem::take(&mut self.entries)
    }
}

impl fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupStack")
            .field("labels", &self.entries.iter().map(|(l, _)| l).collect::<Vec<_>>())
            .field("draining", &self.draining)
            .finish()
    }
}

pub(crate) fn run_action(label: String, action: CleanupAction) -> Option<TeardownFailure> {
    let message = match panic::catch_unwind(AssertUnwindSafe(action)) {
        Ok(Ok(())) => {
            tracing::debug!(label = %label, "cleanup done");
            return None;
        }
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    tracing::error!(label = %label, error = %message, "cleanup failed");
    Some(TeardownFailure { label, message })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
