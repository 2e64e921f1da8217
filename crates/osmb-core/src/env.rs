//! Process environment access behind an injectable store.
//!
//! The bridge both reads configuration out of the environment and publishes
//! overrides back into it. Putting that behind a trait keeps every consumer
//! testable against an in-memory map instead of process-wide state.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::io;

use thiserror::Error;

/// Errors from writing a variable into an environment store.
#[derive(Debug, Error)]
pub enum EnvWriteError {
    /// Variable names may not be empty or contain `=` or NUL.
    #[error("invalid environment variable name {0:?}")]
    InvalidKey(String),

    /// Values may not contain NUL.
    #[error("invalid environment variable value {0:?}")]
    InvalidValue(String),

    /// The runtime refused the write (environment storage exhausted).
    #[error("setenv failed: {0}")]
    Rejected(#[from] io::Error),
}

/// Key/value store the bridge reads from and writes overrides into.
///
/// Production code uses [`ProcessEnv`]; tests use [`EnvMap`].
pub trait EnvStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), EnvWriteError>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EnvWriteError> {
        if key.is_empty() || key.contains('=') {
            return Err(EnvWriteError::InvalidKey(key.to_string()));
        }
        let c_key =
            CString::new(key).map_err(|_| EnvWriteError::InvalidKey(key.to_string()))?;
        let c_value =
            CString::new(value).map_err(|_| EnvWriteError::InvalidValue(value.to_string()))?;
        // setenv copies both strings, so the CStrings may drop afterwards.
        let rc = unsafe { libc::setenv(c_key.as_ptr(), c_value.as_ptr(), 1) };
        if rc != 0 {
            return Err(EnvWriteError::Rejected(io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// In-memory environment snapshot.
#[derive(Debug, Clone, Default)]
pub struct EnvMap {
    vars: BTreeMap<String, String>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for seeding test environments.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl EnvStore for EnvMap {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EnvWriteError> {
        if key.is_empty() || key.contains('=') {
            return Err(EnvWriteError::InvalidKey(key.to_string()));
        }
        self.vars.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
