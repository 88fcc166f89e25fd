//! Sequential scenario runner with explicit fail-fast or independent mode

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::cleanup::{TeardownFailure, panic_message};
use crate::interrupt::InterruptGuard;
use crate::teardown::Teardown;

type SetupFn<C> = Box<dyn FnOnce(&Teardown) -> anyhow::Result<C>>;
type StepFn<C> = Box<dyn FnMut(&mut C) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteMode {
    /// Skip every remaining test after the first failure
    FailFast,
    /// Run every test regardless of earlier failures
    Independent,
}

impl fmt::Display for SuiteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Independent => write!(f, "independent"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub name: String,
    pub mode: SuiteMode,
    /// Route Ctrl-C through this suite's teardown
    pub handle_interrupt: bool,
}

impl SuiteConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, mode: SuiteMode) -> Self {
        Self {
            name: name.into(),
            mode,
            handle_interrupt: true,
        }
    }

    #[must_use]
    pub const fn handle_interrupt(mut self, enabled: bool) -> Self {
        self.handle_interrupt = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped,
}

impl Outcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub name: String,
    pub outcomes: Vec<(String, Outcome)>,
    /// Set when the suite's setup failed and no test ran
    pub setup_failure: Option<String>,
    /// Logged and reported, never turned into a test failure
    pub teardown_failures: Vec<TeardownFailure>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failed)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.setup_failure.is_none() && self.failed() == 0
    }

    #[must_use]
    pub fn outcome(&self, test: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|(name, _)| name == test).map(|(_, o)| o)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// A suite: one setup producing the context, ordered tests over it, one teardown
pub struct Suite<C> {
    config: SuiteConfig,
    setup: Option<SetupFn<C>>,
    tests: Vec<(String, StepFn<C>)>,
    after_each: Option<StepFn<C>>,
}

impl<C> Suite<C> {
    #[must_use]
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            setup: None,
            tests: Vec::new(),
            after_each: None,
        }
    }

    /// Build the suite context; resources acquired here register their
    /// release on the provided teardown
    #[must_use]
    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&Teardown) -> anyhow::Result<C> + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    #[must_use]
    pub fn test<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&mut C) -> anyhow::Result<()> + 'static,
    {
        self.tests.push((name.into(), Box::new(body)));
        self
    }

    /// Runs after every executed test; an error fails that test
    #[must_use]
    pub fn after_each<F>(mut self, step: F) -> Self
    where
        F: FnMut(&mut C) -> anyhow::Result<()> + 'static,
    {
        self.after_each = Some(Box::new(step));
        self
    }

    pub fn run(self) -> SuiteReport {
        let Self {
            config,
            setup,
            tests,
            mut after_each,
        } = self;
        tracing::info!(suite = %config.name, mode = %config.mode, tests = tests.len(), "suite starting");

        let teardown = Teardown::new();
        let guard = if config.handle_interrupt {
            InterruptGuard::install(&teardown)
                .map_err(|e| tracing::warn!(suite = %config.name, error = %e, "interrupt hook unavailable"))
                .ok()
        } else {
            None
        };

        let context = match setup {
            Some(setup) => guarded(|| setup(&teardown)),
            None => Err("suite has no setup".to_string()),
        };

        let mut outcomes = Vec::with_capacity(tests.len());
        let setup_failure = match context {
            Err(reason) => {
                tracing::error!(suite = %config.name, error = %reason, "suite setup failed");
                let failed = Outcome::Failed(format!("setup failed: {reason}"));
                for (i, (name, _)) in tests.into_iter().enumerate() {
                    outcomes.push((name, if i == 0 { failed.clone() } else { Outcome::Skipped }));
                }
                Some(reason)
            }
            Ok(mut context) => {
                let mut failed_any = false;
                for (name, mut body) in tests {
                    if failed_any && config.mode == SuiteMode::FailFast {
                        tracing::info!(suite = %config.name, test = %name, "skipped");
                        outcomes.push((name, Outcome::Skipped));
                        continue;
                    }
                    let mut result = guarded(|| body(&mut context));
                    if let Some(step) = after_each.as_mut() {
                        if let Err(reason) = guarded(|| step(&mut context)) {
                            if result.is_ok() {
                                result = Err(format!("after each: {reason}"));
                            }
                        }
                    }
                    let outcome = match result {
                        Ok(()) => {
                            tracing::info!(suite = %config.name, test = %name, "passed");
                            Outcome::Passed
                        }
                        Err(reason) => {
                            tracing::warn!(suite = %config.name, test = %name, error = %reason, "failed");
                            failed_any = true;
                            Outcome::Failed(reason)
                        }
                    };
                    outcomes.push((name, outcome));
                }
                drop(context);
                None
            }
        };

        let teardown_failures = teardown.run();
        drop(guard);

        let report = SuiteReport {
            name: config.name,
            outcomes,
            setup_failure,
            teardown_failures,
        };
        tracing::info!(
            suite = %report.name,
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            teardown_failures = report.teardown_failures.len(),
            "suite finished"
        );
        report
    }
}

/// Run a step, turning both `Err` and panics into a failure reason
fn guarded<T>(step: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}
