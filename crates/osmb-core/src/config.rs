//! Config-file loading and key dispatch.
//!
//! The config file is line-oriented `KEY=VALUE` text at a fixed path. Keys
//! fall into three groups: bridge-control keys (consumed into the snapshot),
//! version-control keys (buffered for the version resolver), and everything
//! else (exported into the process environment verbatim).

use std::fs;
use std::path::Path;

use crate::diag::Diag;
use crate::env::EnvStore;

/// Fixed, well-known config file location read at load time.
pub const DEFAULT_CONFIG_PATH: &str = "/sdcard/Mesa/env.txt";

/// Enables diagnostic output when set to `true`.
pub const DIAGNOSTICS_KEY: &str = "OSM_PLUGIN_LOGE";

/// Restricts resolution to the generic proc-address path when `true`.
pub const GPA_ONLY_KEY: &str = "OSM_PLUGIN_GPA_ONLY";

/// Selects the version policy tag.
pub const VERSION_POLICY_KEY: &str = "CUSTOM_GL_GLSL";

/// Explicit GL version string; also the env var the version resolver writes.
pub const GL_OVERRIDE_KEY: &str = "MESA_GL_VERSION_OVERRIDE";

/// Explicit GLSL version string; also the env var the version resolver writes.
pub const GLSL_OVERRIDE_KEY: &str = "MESA_GLSL_VERSION_OVERRIDE";

/// What the loader does with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Diagnostics,
    GpaOnly,
    PolicyTag,
    GlVersion,
    GlslVersion,
    PassThrough,
}

/// Declarative key table. Anything not listed passes through to the
/// process environment.
pub fn key_role(key: &str) -> KeyRole {
    match key {
        DIAGNOSTICS_KEY => KeyRole::Diagnostics,
        GPA_ONLY_KEY => KeyRole::GpaOnly,
        VERSION_POLICY_KEY => KeyRole::PolicyTag,
        GL_OVERRIDE_KEY => KeyRole::GlVersion,
        GLSL_OVERRIDE_KEY => KeyRole::GlslVersion,
        _ => KeyRole::PassThrough,
    }
}

/// Configuration snapshot, produced once per process.
///
/// Control keys are consumed into typed fields; pass-through keys have
/// already been published to the environment by the time loading returns.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Diagnostic output enabled.
    pub diagnostics: bool,
    /// Only resolve through the generic proc-address path.
    pub gpa_only: bool,
    /// Raw version-policy tag from the file, if any.
    pub policy_tag: Option<String>,
    /// Explicit GL version string from the file, if any.
    pub gl_version: Option<String>,
    /// Explicit GLSL version string from the file, if any.
    pub glsl_version: Option<String>,
}

impl BridgeConfig {
    /// Snapshot seeded from the environment alone. Used as the baseline
    /// when loading; stands on its own when the config file is absent.
    pub fn from_env(env: &dyn EnvStore) -> Self {
        Self {
            diagnostics: flag_set(env, DIAGNOSTICS_KEY),
            gpa_only: flag_set(env, GPA_ONLY_KEY),
            ..Self::default()
        }
    }

    /// Load the config file at `path`, applying per-key semantics.
    ///
    /// A missing or unreadable file is not an error: the environment-seeded
    /// defaults stand. Lines without a `=` separator are skipped; trailing
    /// CR/LF is stripped; for duplicate keys the last value wins.
    /// Pass-through keys are written into `env` as a side effect, and an
    /// environment-write failure only drops that one key.
    pub fn load(path: &Path, env: &mut dyn EnvStore) -> Self {
        let mut cfg = Self::from_env(env);
        let Ok(text) = fs::read_to_string(path) else {
            return cfg;
        };
        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key_role(key) {
                KeyRole::Diagnostics => cfg.diagnostics = value == "true",
                KeyRole::GpaOnly => cfg.gpa_only = value == "true",
                KeyRole::PolicyTag => cfg.policy_tag = Some(value.to_string()),
                KeyRole::GlVersion => cfg.gl_version = Some(value.to_string()),
                KeyRole::GlslVersion => cfg.glsl_version = Some(value.to_string()),
                KeyRole::PassThrough => {
                    let diag = cfg.diag();
                    match env.set(key, value) {
                        Ok(()) => diag.note(&format!("env {}={}", key, value)),
                        Err(e) => diag.warn(&format!("could not set {}: {}", key, e)),
                    }
                }
            }
        }
        cfg
    }

    /// Diagnostics sink matching the current flag.
    pub fn diag(&self) -> Diag {
        Diag::new(self.diagnostics)
    }
}

fn flag_set(env: &dyn EnvStore, key: &str) -> bool {
    // Unset reads as disabled.
    env.get(key).as_deref() == Some("true")
}
