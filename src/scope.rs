//! Task-scoped abort and scope outcomes
//!
//! With `allow_exit` enabled, `fail_now` and `skip_now` unwind the calling
//! thread with a private [`Abort`] payload. The unwind is raised through
//! `resume_unwind`, so the panic hook does not fire. It stops at the first
//! boundary that catches it: [`Harness::run`], a `std::thread` join, or a
//! tokio task. Sibling threads, tasks and the process keep running.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::control::TestControl;
use crate::harness::Harness;

/// Unwind payload used for cooperative aborts
#[derive(Debug)]
pub struct Abort;

/// Unwind the current thread or task.
pub(crate) fn abort() -> ! {
    panic::resume_unwind(Box::new(Abort))
}

/// Whether a panic payload is a harness abort
pub fn is_abort(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Abort>()
}

/// How a scope ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    /// Derive the outcome from the harness flags. Failure wins over skip.
    pub fn of(harness: &Harness) -> Self {
        if harness.failed() {
            Outcome::Failed
        } else if harness.skipped() {
            Outcome::Skipped
        } else {
            Outcome::Passed
        }
    }

    /// Classify the payload of a thread or task that unwound.
    ///
    /// Harness aborts yield the harness outcome. Any other panic is handed
    /// back so the caller can resume it.
    pub fn from_panic(
        payload: Box<dyn Any + Send>,
        harness: &Harness,
    ) -> Result<Self, Box<dyn Any + Send>> {
        if is_abort(payload.as_ref()) {
            Ok(Outcome::of(harness))
        } else {
            Err(payload)
        }
    }
}

/// Turn the unwinds of a scope body and of its finalization into an outcome.
///
/// Aborts are absorbed, so a cleanup that calls `fatal` cannot escape the
/// scope. The first other panic is resumed.
fn settle(harness: &Harness, payloads: [Option<Box<dyn Any + Send>>; 2]) -> Outcome {
    for payload in payloads.into_iter().flatten() {
        if let Err(payload) = Outcome::from_panic(payload, harness) {
            panic::resume_unwind(payload);
        }
    }
    let outcome = Outcome::of(harness);
    debug!("Scope ended: {:?}", outcome);
    outcome
}

impl Harness {
    /// Run `f` as one scope: catch an abort, finalize, report the outcome.
    ///
    /// Aborts raised by `f` or by a cleanup during finalization stop here.
    /// Other panics are resumed after finalization.
    pub fn run<F>(&self, f: F) -> Outcome
    where
        F: FnOnce(&Harness),
    {
        let body = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        let finalized = panic::catch_unwind(AssertUnwindSafe(|| self.finalize()));
        settle(self, [body.err(), finalized.err()])
    }
}

/// Run an async scope in its own tokio task.
///
/// An abort ends only that task. The harness is finalized once the task is
/// done; an abort from a cleanup at that point is absorbed as well, and a
/// non-abort panic from either is resumed on the caller.
pub async fn spawn_task<F, Fut>(harness: Arc<Harness>, f: F) -> Outcome
where
    F: FnOnce(Arc<Harness>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let joined = tokio::spawn(f(harness.clone())).await;
    let finalized = panic::catch_unwind(AssertUnwindSafe(|| harness.finalize()));
    let body = match joined {
        Ok(()) => None,
        Err(e) if e.is_panic() => Some(e.into_panic()),
        Err(e) => {
            debug!("Scope task cancelled: {}", e);
            None
        }
    };
    settle(&harness, [body, finalized.err()])
}
