//! Environment variable overrides
//!
//! Each key's original value (or absence) is recorded the first time the
//! key is overridden. Later overrides of the same key change the live value
//! but not the recorded one, so restoring always returns the variable to
//! its state before the first override.
//!
//! The variables themselves live in the process-wide environment. Two
//! harnesses overriding the same key concurrently can interleave their
//! snapshot/restore pairs; callers must coordinate that themselves.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;

use tracing::debug;

use crate::error::{HarnessError, Result};

/// Reject names and values the OS environment cannot hold.
pub fn validate(key: &str, value: &str) -> Result<()> {
    if key.is_empty() || key.contains('=') || key.contains('\0') {
        return Err(HarnessError::InvalidEnvKey(key.to_string()));
    }
    if value.contains('\0') {
        return Err(HarnessError::InvalidEnvValue(key.to_string()));
    }
    Ok(())
}

/// Original values of every overridden key
#[derive(Debug, Default)]
pub struct EnvSnapshots {
    prev: HashMap<String, Option<OsString>>,
}

impl EnvSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, snapshotting the current value on first use.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        if !self.prev.contains_key(key) {
            let original = env::var_os(key);
            debug!(
                "Snapshot env {} (previously {})",
                key,
                if original.is_some() { "set" } else { "unset" }
            );
            self.prev.insert(key.to_string(), original);
        }
        env::set_var(key, value);
        Ok(())
    }

    /// The recorded original value of `key`, if it has been overridden
    pub fn original(&self, key: &str) -> Option<Option<&OsString>> {
        self.prev.get(key).map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }

    /// Put every overridden variable back and forget the snapshots.
    ///
    /// Returns the number of variables restored.
    pub fn restore_all(&mut self) -> usize {
        let count = self.prev.len();
        for (key, original) in self.prev.drain() {
            match original {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
        count
    }
}
