//! GL/GLSL version-override policy.
//!
//! Exactly one [`VersionPolicy`] is derived per process, from the config
//! snapshot, and applied to the environment once. A version pair the host
//! exported before this library loaded is authoritative and is never
//! overwritten, whatever the config file asked for.

use crate::config::{BridgeConfig, GLSL_OVERRIDE_KEY, GL_OVERRIDE_KEY};
use crate::diag::Diag;
use crate::env::EnvStore;

/// GL version written by [`VersionPolicy::ForceLatest`].
pub const FORCED_GL_VERSION: &str = "4.6";

/// GLSL version written by [`VersionPolicy::ForceLatest`].
pub const FORCED_GLSL_VERSION: &str = "460";

const TAG_FORCE_LATEST: &str = "1";
const TAG_FOLLOW_SYSTEM: &str = "2";

/// The version-override decision for the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPolicy {
    /// No override requested.
    Default,
    /// Leave the environment exactly as found, set or not.
    FollowSystem,
    /// Pin the newest version pair the bridge knows to be good.
    ForceLatest,
    /// Caller-supplied version pair.
    Custom { gl: String, glsl: String },
}

impl VersionPolicy {
    /// Derive the policy from the configuration snapshot. Done once, never
    /// re-derived.
    pub fn derive(cfg: &BridgeConfig) -> Self {
        match cfg.policy_tag.as_deref() {
            Some(TAG_FORCE_LATEST) => VersionPolicy::ForceLatest,
            Some(TAG_FOLLOW_SYSTEM) => VersionPolicy::FollowSystem,
            // Tag 3 asks for an explicit pair, and a pair supplied with no
            // tag at all means the same thing. Both strings are required; a
            // partial pair applies nothing.
            _ => match (cfg.gl_version.clone(), cfg.glsl_version.clone()) {
                (Some(gl), Some(glsl)) => VersionPolicy::Custom { gl, glsl },
                _ => VersionPolicy::Default,
            },
        }
    }

    /// Write the decision into `env`.
    pub fn apply(&self, env: &mut dyn EnvStore, diag: Diag) {
        // The hosting process may export overrides before this library
        // loads; a complete pre-existing pair wins unconditionally.
        if env.get(GL_OVERRIDE_KEY).is_some() && env.get(GLSL_OVERRIDE_KEY).is_some() {
            diag.note("version override already present in environment, leaving as-is");
            return;
        }
        match self {
            VersionPolicy::Default => {}
            VersionPolicy::FollowSystem => {
                diag.note("following system-reported GL/GLSL version");
            }
            VersionPolicy::ForceLatest => {
                set_pair(env, FORCED_GL_VERSION, FORCED_GLSL_VERSION, diag);
            }
            VersionPolicy::Custom { gl, glsl } => {
                set_pair(env, gl, glsl, diag);
            }
        }
    }
}

fn set_pair(env: &mut dyn EnvStore, gl: &str, glsl: &str, diag: Diag) {
    for (key, value) in [(GL_OVERRIDE_KEY, gl), (GLSL_OVERRIDE_KEY, glsl)] {
        match env.set(key, value) {
            Ok(()) => diag.note(&format!("env {}={}", key, value)),
            Err(e) => diag.warn(&format!("could not set {}: {}", key, e)),
        }
    }
}
