//! The harness: a control object for code running outside a test runner

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, warn, Level};

use crate::config::HarnessConfig;
use crate::control::{CleanupFn, TestControl};
use crate::env::EnvSnapshots;
use crate::error::{HarnessError, Result};
use crate::logger::{default_logger, Logger};
use crate::scope;

/// Everything the lock guards
#[derive(Default)]
struct State {
    failed: bool,
    skipped: bool,
    finished: bool,
    env: EnvSnapshots,
    temp_dirs: Vec<PathBuf>,
    cleanups: Vec<CleanupFn>,
}

/// Sizes of the registries awaiting finalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pending {
    pub cleanups: usize,
    pub env_overrides: usize,
    pub temp_dirs: usize,
}

impl Pending {
    pub fn is_empty(&self) -> bool {
        self.cleanups == 0 && self.env_overrides == 0 && self.temp_dirs == 0
    }
}

/// Stand-in per-test control object.
///
/// Tracks cleanup actions, environment overrides and temporary directories,
/// and reverses all three on [`finalize`](Harness::finalize). Safe to share
/// between threads.
///
/// The lock is reentrant so cleanup actions may call back into the harness
/// while finalization is running on their thread. Other threads block until
/// finalization is done.
pub struct Harness {
    logger: Arc<dyn Logger>,
    allow_exit: bool,
    state: ReentrantMutex<RefCell<State>>,
}

/// Builder for [`Harness`]
#[derive(Default)]
pub struct HarnessBuilder {
    logger: Option<Arc<dyn Logger>>,
    allow_exit: bool,
}

impl HarnessBuilder {
    /// Send log entries here instead of the shared stdout JSON logger
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Abort the calling thread or task on `fail_now`/`skip_now`.
    ///
    /// Only enable this when the harness is driven inside [`Harness::run`],
    /// a spawned thread, or a tokio task, since the abort unwinds to the
    /// nearest such boundary.
    pub fn allow_exit(mut self, allow: bool) -> Self {
        self.allow_exit = allow;
        self
    }

    pub fn build(self) -> Harness {
        Harness {
            logger: self.logger.unwrap_or_else(default_logger),
            allow_exit: self.allow_exit,
            state: ReentrantMutex::new(RefCell::new(State::default())),
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Harness logging JSON to stdout, with abort disabled
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        config.validate()?;
        let logger = config.logging.build_logger()?;
        Ok(Self::builder()
            .logger(logger)
            .allow_exit(config.allow_exit)
            .build())
    }

    pub fn allows_exit(&self) -> bool {
        self.allow_exit
    }

    /// True once `fail_now`, `fatal`, `skip` or `skip_now` has run
    pub fn finished(&self) -> bool {
        self.with_state(|s| s.finished)
    }

    /// What finalization would currently reverse
    pub fn pending(&self) -> Pending {
        self.with_state(|s| Pending {
            cleanups: s.cleanups.len(),
            env_overrides: s.env.len(),
            temp_dirs: s.temp_dirs.len(),
        })
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    fn emit(&self, level: Level, message: &str) {
        self.logger.log(level, message.trim_end_matches(['\n', '\r']));
    }

    /// Override an environment variable, reporting invalid names or values.
    ///
    /// The value before the first override of `key` is restored on
    /// finalization; repeated overrides only change the live value.
    pub fn try_set_env(&self, key: &str, value: &str) -> Result<()> {
        self.with_state(|s| s.env.apply(key, value))
    }

    /// Create a fresh empty directory under the system temp root and record
    /// it for removal.
    pub fn try_temp_dir(&self) -> Result<PathBuf> {
        self.with_state(|s| -> Result<PathBuf> {
            let dir = tempfile::Builder::new()
                .prefix("nontest-")
                .tempdir()
                .map_err(HarnessError::TempDir)?;
            let path = dir.keep();
            debug!("Created temp dir {:?}", path);
            s.temp_dirs.push(path.clone());
            Ok(path)
        })
    }

    /// Run cleanups in reverse registration order, restore overridden
    /// environment variables, then remove temporary directories.
    ///
    /// Each registry is drained, so a second call only reverses what was
    /// registered in between. A panicking cleanup does not stop the others
    /// or the restore steps; the first panic is resumed once everything
    /// else has run.
    pub fn finalize(&self) {
        let guard = self.state.lock();

        let cleanups = mem::take(&mut guard.borrow_mut().cleanups);
        let ran = cleanups.len();
        let panicked = self.run_cleanups(cleanups);

        let (mut env, temp_dirs) = {
            let mut state = guard.borrow_mut();
            (mem::take(&mut state.env), mem::take(&mut state.temp_dirs))
        };
        let restored = env.restore_all();
        for dir in &temp_dirs {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                debug!("Failed to remove temp dir {:?}: {}", dir, e);
            }
        }

        debug!(
            "Finalized: {} cleanups, {} env vars restored, {} temp dirs removed",
            ran,
            restored,
            temp_dirs.len()
        );
        drop(guard);

        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
    }

    fn run_cleanups(&self, cleanups: Vec<CleanupFn>) -> Option<Box<dyn Any + Send>> {
        let mut first = None;
        for f in cleanups.into_iter().rev() {
            let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) else {
                continue;
            };
            if !scope::is_abort(payload.as_ref()) {
                warn!("Cleanup action panicked");
                self.with_state(|s| s.failed = true);
            }
            if first.is_none() {
                first = Some(payload);
            }
        }
        first
    }

    fn exit_if_allowed(&self) {
        if self.allow_exit {
            debug!("Aborting current task");
            scope::abort();
        }
    }
}

impl TestControl for Harness {
    fn cleanup(&self, f: CleanupFn) {
        self.with_state(|s| s.cleanups.push(f));
    }

    fn error(&self, message: &str) {
        self.emit(Level::ERROR, message);
        self.fail();
    }

    fn fail(&self) {
        self.with_state(|s| s.failed = true);
    }

    fn fail_now(&self) {
        self.with_state(|s| {
            s.failed = true;
            s.finished = true;
        });
        self.finalize();
        self.exit_if_allowed();
    }

    fn failed(&self) -> bool {
        self.with_state(|s| s.failed)
    }

    fn fatal(&self, message: &str) {
        self.emit(Level::ERROR, message);
        self.fail_now();
    }

    fn log(&self, message: &str) {
        self.emit(Level::INFO, message);
    }

    fn name(&self) -> &str {
        ""
    }

    fn set_env(&self, key: &str, value: &str) {
        if let Err(e) = self.try_set_env(key, value) {
            self.fatal(&e.to_string());
        }
    }

    fn skip(&self, message: &str) {
        self.emit(Level::INFO, message);
        self.skip_now();
    }

    fn skip_now(&self) {
        self.with_state(|s| {
            s.skipped = true;
            s.finished = true;
        });
        self.finalize();
        self.exit_if_allowed();
    }

    fn skipped(&self) -> bool {
        self.with_state(|s| s.skipped)
    }

    /// Returns an empty path if the directory could not be created; the
    /// failure is reported through [`fatal`](TestControl::fatal).
    fn temp_dir(&self) -> PathBuf {
        match self.try_temp_dir() {
            Ok(path) => path,
            Err(e) => {
                self.fatal(&e.to_string());
                PathBuf::new()
            }
        }
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        f.debug_struct("Harness")
            .field("allow_exit", &self.allow_exit)
            .field("failed", &state.failed)
            .field("skipped", &state.skipped)
            .field("finished", &state.finished)
            .field("env_overrides", &state.env.len())
            .field("temp_dirs", &state.temp_dirs)
            .field("cleanups", &state.cleanups.len())
            .finish()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let state = self.state.get_mut().get_mut();
        if state.cleanups.is_empty() && state.env.is_empty() && state.temp_dirs.is_empty() {
            return;
        }
        debug!("Harness dropped before finalize, finalizing now");
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.finalize())) {
            if !scope::is_abort(payload.as_ref()) {
                warn!("Cleanup action panicked while dropping harness");
            }
        }
    }
}
