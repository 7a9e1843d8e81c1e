//! One-shot listener teardown.

use crate::observability::{events, fields};
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

const COMPONENT: &str = "teardown";

/// Closes one established live listener.
///
/// Wraps a `FnOnce`, so the close can only ever run once.
pub struct Teardown {
    close: Box<dyn FnOnce() + Send + 'static>,
}

impl Teardown {
    pub fn new(close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            close: Box::new(close),
        }
    }

    /// Teardown for listeners that own nothing to close.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Runs `self` and then `next`.
    pub fn chain(self, next: Teardown) -> Teardown {
        Teardown::new(move || {
            self.run();
            next.run();
        })
    }

    pub fn run(self) {
        (self.close)()
    }

    /// Runs the teardown, containing a panic so registry cleanup paths never unwind.
    pub(crate) fn run_isolated(self, key: &str, generation: u64) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.run())) {
            let err = fields::format_panic_payload(payload.as_ref());
            warn!(
                event = events::SUBSCRIPTION_TEARDOWN_PANICKED,
                component = COMPONENT,
                key,
                generation,
                err = %err,
                "listener teardown panicked"
            );
        }
    }
}

impl Debug for Teardown {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown").finish_non_exhaustive()
    }
}
