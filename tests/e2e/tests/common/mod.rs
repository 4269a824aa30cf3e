//! Common test utilities and fixtures

pub use nontest_e2e::*;

use std::sync::Arc;

use nontest::{Harness, MemoryLogger};

/// Harness logging into memory, with abort configured as given
pub fn memory_harness(allow_exit: bool) -> (Harness, MemoryLogger) {
    init_logging();
    let logger = MemoryLogger::new();
    let harness = Harness::builder()
        .logger(Arc::new(logger.clone()))
        .allow_exit(allow_exit)
        .build();
    (harness, logger)
}

/// Generate an environment variable name no other test uses
#[allow(dead_code)]
pub fn unique_env_key(prefix: &str) -> String {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!(
        "NONTEST_E2E_{}_{}_{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}
