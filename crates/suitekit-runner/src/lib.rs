//! Suite lifecycle: cleanup stack, one-shot teardown, interrupt hook and the
//! scenario runner that ties them together.

pub mod cleanup;
pub mod interrupt;
pub mod suite;
pub mod teardown;

pub use cleanup::{CleanupAction, CleanupStack, CleanupState, TeardownFailure};
pub use interrupt::{INTERRUPT_EXIT_CODE, InterruptGuard};
pub use suite::{Outcome, Suite, SuiteConfig, SuiteMode, SuiteReport};
pub use teardown::Teardown;
