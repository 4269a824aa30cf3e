//! nontest: a per-test control object for code that runs outside a test runner
//!
//! Helpers written against the [`TestControl`] capability set (report a
//! failure, skip, log, override an environment variable, allocate a scratch
//! directory, register teardown work) can be reused from demos, example
//! programs and tooling by handing them a [`Harness`].
//!
//! # Architecture
//!
//! - **TestControl**: the object-safe trait helpers depend on.
//! - **Harness**: thread-safe implementation that records cleanups,
//!   environment overrides and temp dirs, and reverses them on finalize.
//! - **Logger**: structured sink for harness messages. Defaults to JSON lines
//!   on stdout with `level` and `msg` fields.
//! - **Scopes**: optional cooperative abort of the calling thread or task on
//!   `fail_now`/`skip_now`, with [`Outcome`] reporting.
//!
//! # Example
//!
//! ```no_run
//! use nontest::{Harness, TestControl};
//!
//! fn setup(t: &dyn TestControl) -> std::path::PathBuf {
//!     t.helper();
//!     t.set_env("APP_MODE", "demo");
//!     let dir = t.temp_dir();
//!     t.log("workspace ready");
//!     dir
//! }
//!
//! let harness = Harness::new();
//! let dir = setup(&harness);
//! // ... use dir ...
//! harness.finalize();
//! assert!(!dir.exists());
//! ```

pub mod config;
pub mod control;
pub mod env;
pub mod error;
pub mod harness;
pub mod logger;
pub mod scope;

pub use config::{ConfigError, HarnessConfig, LogFormat, LoggingConfig};
pub use control::{CleanupFn, TestControl};
pub use error::{HarnessError, Result};
pub use harness::{Harness, HarnessBuilder, Pending};
pub use logger::{
    default_logger, init_tracing, JsonLogger, Logger, MemoryLogger, TracingLogger,
};
pub use scope::{spawn_task, Outcome};
