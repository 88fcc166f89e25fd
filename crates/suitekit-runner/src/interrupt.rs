//! Ctrl-C hook routing process interruption through registered teardowns
//!
//! A single listener thread serves the whole process. Each suite that wants
//! interrupt handling registers its [`Teardown`] with an [`InterruptGuard`];
//! on SIGINT every registered teardown is drained and the process exits.

use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use once_cell::sync::Lazy;
use suitekit_core::{HarnessError, Result};

use crate::cleanup::TeardownFailure;
use crate::teardown::Teardown;

/// Conventional status for a process terminated by SIGINT
pub const INTERRUPT_EXIT_CODE: i32 = 130;

#[derive(Default)]
struct Registry {
    next_id: u64,
    teardowns: Vec<(u64, Teardown)>,
    listening: bool,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::default()));

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a teardown registered with the interrupt hook until dropped
#[derive(Debug)]
#[must_use = "dropping the guard unregisters the teardown"]
pub struct InterruptGuard {
    id: u64,
}

impl InterruptGuard {
    /// Register `teardown` to run if the process receives Ctrl-C
    ///
    /// Starts the listener on first use and returns once the signal handler is
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if the listener thread or its runtime cannot
    /// be started
    pub fn install(teardown: &Teardown) -> Result<Self> {
        let mut registry = registry();
        if !registry.listening {
            start_listener()?;
            registry.listening = true;
        }
        let id = registry.next_id;
        registry.next_id += 1;
        registry.teardowns.push((id, teardown.clone()));
        tracing::debug!(id, "interrupt hook armed");
        Ok(Self { id })
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        registry().teardowns.retain(|(id, _)| *id != self.id);
        tracing::debug!(id = self.id, "interrupt hook disarmed");
    }
}

fn start_listener() -> Result<()> {
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::Builder::new()
        .name("suitekit-interrupt".to_string())
        .spawn(move || listen(ready_tx))?;
    ready_rx
        .recv()
        .map_err(|_| HarnessError::Config("interrupt listener failed to start".to_string()))?
}

fn listen(ready: mpsc::Sender<Result<()>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    let outcome = runtime.block_on(async move {
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);
        // The first poll installs the process-wide handler.
        tokio::select! {
            biased;
            result = &mut interrupted => return result,
            () = std::future::ready(()) => {}
        }
        let _ = ready.send(Ok(()));
        interrupted.await
    });

    match outcome {
        Ok(()) => {
            tracing::warn!("interrupt received, tearing down");
            run_registered();
            std::process::exit(INTERRUPT_EXIT_CODE);
        }
        Err(e) => tracing::error!(error = %e, "interrupt listener stopped"),
    }
}

/// Drain every registered teardown, most recently registered first
pub(crate) fn run_registered() -> Vec<TeardownFailure> {
    let teardowns: Vec<Teardown> = {
        let mut registry = registry();
        registry.teardowns.drain(..).rev().map(|(_, t)| t).collect()
    };
    teardowns.iter().flat_map(Teardown::run).collect()
}

#[cfg(test)]
pub(crate) fn is_registered(teardown: &Teardown) -> bool {
    registry().teardowns.iter().any(|(_, t)| t.same_as(teardown))
}
