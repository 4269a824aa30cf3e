//! The per-test control capability set
//!
//! Helpers that need to report failures, register teardown work, override
//! environment variables or allocate scratch directories should take a
//! `&dyn TestControl` (or a generic `T: TestControl`). Any conforming
//! implementation can then be passed in, whether that is a [`Harness`]
//! inside a demo program or a test-side control object.
//!
//! [`Harness`]: crate::Harness

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Deferred teardown action
pub type CleanupFn = Box<dyn FnOnce() + Send + 'static>;

/// Operations a helper may perform on its control object.
///
/// None of these return errors: failure is recorded and polled through
/// [`failed`](TestControl::failed) and [`skipped`](TestControl::skipped).
pub trait TestControl: Send + Sync {
    /// Register an action to run when the scope finishes.
    ///
    /// Actions run in reverse registration order.
    fn cleanup(&self, f: CleanupFn);

    /// Log at error severity and mark the scope failed. Execution continues.
    fn error(&self, message: &str);

    fn error_fmt(&self, args: fmt::Arguments<'_>) {
        self.error(&args.to_string());
    }

    /// Mark the scope failed without logging.
    fn fail(&self);

    /// Mark the scope failed and finished, then finalize.
    fn fail_now(&self);

    fn failed(&self) -> bool;

    /// Log at error severity, then [`fail_now`](TestControl::fail_now).
    fn fatal(&self, message: &str);

    fn fatal_fmt(&self, args: fmt::Arguments<'_>) {
        self.fatal(&args.to_string());
    }

    /// Mark the calling function as a helper. Informational only.
    fn helper(&self) {}

    /// Log at info severity.
    fn log(&self, message: &str);

    fn log_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(&args.to_string());
    }

    fn name(&self) -> &str;

    /// Override an environment variable until the scope finishes.
    fn set_env(&self, key: &str, value: &str);

    /// Log at info severity, then [`skip_now`](TestControl::skip_now).
    fn skip(&self, message: &str);

    fn skip_fmt(&self, args: fmt::Arguments<'_>) {
        self.skip(&args.to_string());
    }

    /// Mark the scope skipped and finished, then finalize.
    fn skip_now(&self);

    fn skipped(&self) -> bool;

    /// Create an empty directory that is removed when the scope finishes.
    fn temp_dir(&self) -> PathBuf;
}

macro_rules! forward_test_control {
    ($($ty:ty),*) => {$(
        impl<T: TestControl + ?Sized> TestControl for $ty {
            fn cleanup(&self, f: CleanupFn) {
                (**self).cleanup(f)
            }
            fn error(&self, message: &str) {
                (**self).error(message)
            }
            fn error_fmt(&self, args: fmt::Arguments<'_>) {
                (**self).error_fmt(args)
            }
            fn fail(&self) {
                (**self).fail()
            }
            fn fail_now(&self) {
                (**self).fail_now()
            }
            fn failed(&self) -> bool {
                (**self).failed()
            }
            fn fatal(&self, message: &str) {
                (**self).fatal(message)
            }
            fn fatal_fmt(&self, args: fmt::Arguments<'_>) {
                (**self).fatal_fmt(args)
            }
            fn helper(&self) {
                (**self).helper()
            }
            fn log(&self, message: &str) {
                (**self).log(message)
            }
            fn log_fmt(&self, args: fmt::Arguments<'_>) {
                (**self).log_fmt(args)
            }
            fn name(&self) -> &str {
                (**self).name()
            }
            fn set_env(&self, key: &str, value: &str) {
                (**self).set_env(key, value)
            }
            fn skip(&self, message: &str) {
                (**self).skip(message)
            }
            fn skip_fmt(&self, args: fmt::Arguments<'_>) {
                (**self).skip_fmt(args)
            }
            fn skip_now(&self) {
                (**self).skip_now()
            }
            fn skipped(&self) -> bool {
                (**self).skipped()
            }
            fn temp_dir(&self) -> PathBuf {
                (**self).temp_dir()
            }
        }
    )*};
}

forward_test_control!(&T, Box<T>, Arc<T>);
