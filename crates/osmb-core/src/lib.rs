//! # osmb-core
//!
//! Configuration and symbol-resolution core of the OSMesa plugin bridge.
//!
//! The bridge is a shared library that exports the OSMesa/GL entry-point
//! surface and forwards every call to an implementation library picked at
//! process start. This crate holds everything with actual branching logic:
//! the layered configuration (config file plus process environment), the
//! GL/GLSL version-override decision, and the target-library handle with
//! its symbol cache. The ABI-facing wrappers live in `osmb-shim`.
//!
//! ## Configuration sources
//!
//! - `/sdcard/Mesa/env.txt`: line-oriented `KEY=VALUE` pairs. Control keys
//!   configure the bridge itself; everything else is exported into the
//!   process environment verbatim.
//! - `MESA_LIBRARY`: path of the implementation library to delegate to.
//! - `MESA_GL_VERSION_OVERRIDE` / `MESA_GLSL_VERSION_OVERRIDE`: version
//!   overrides. A pair the host set before load always wins.
//! - `GALLIUM_DRIVER`: backend driver, defaulted to `zink` when absent.
//! - `OSM_PLUGIN_LOGE`: set to `true` for diagnostic output.
//! - `OSM_PLUGIN_GPA_ONLY`: set to `true` to resolve only through the
//!   generic proc-address path.

pub mod config;
pub mod diag;
pub mod driver;
pub mod env;
pub mod loader;
pub mod resolver;
pub mod version;

pub use config::{BridgeConfig, DEFAULT_CONFIG_PATH};
pub use diag::Diag;
pub use env::{EnvMap, EnvStore, EnvWriteError, ProcessEnv};
pub use loader::{DlLoader, LibraryLoader, LoadError, SharedLibrary, TableLoader};
pub use resolver::{EntryPoint, SymbolResolver, TARGET_LIBRARY_KEY};
pub use version::VersionPolicy;

use std::path::Path;

/// Fully initialized bridge: configuration snapshot, version decision, and
/// resolver state. Built once at library load, torn down at unload.
pub struct BridgeState<L: LibraryLoader = DlLoader> {
    config: BridgeConfig,
    policy: VersionPolicy,
    resolver: SymbolResolver<L>,
}

impl BridgeState<DlLoader> {
    /// Initialize against the real process environment, the well-known
    /// config path, and the operating loader.
    pub fn initialize() -> Self {
        Self::initialize_with(DlLoader, Path::new(DEFAULT_CONFIG_PATH), &mut ProcessEnv)
    }
}

impl<L: LibraryLoader> BridgeState<L> {
    /// Full load-time sequence: config file, version policy, driver
    /// default, then eager symbol resolution. Every stage degrades locally;
    /// this never fails and never panics. A broken backend only stops
    /// rendering, never the host.
    pub fn initialize_with(loader: L, config_path: &Path, env: &mut dyn EnvStore) -> Self {
        let config = BridgeConfig::load(config_path, env);
        let diag = config.diag();

        let policy = VersionPolicy::derive(&config);
        policy.apply(env, diag);
        driver::ensure_driver_default(env, diag);

        let resolver = SymbolResolver::new(loader, config.gpa_only, diag);
        match resolver.ensure_library(env) {
            Ok(()) => resolver.resolve_known(),
            Err(e) => diag.warn(&e.to_string()),
        }

        Self {
            config,
            policy,
            resolver,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn policy(&self) -> &VersionPolicy {
        &self.policy
    }

    pub fn resolver(&self) -> &SymbolResolver<L> {
        &self.resolver
    }

    /// Release the target handle. Calling any delegated entry point after
    /// teardown is unsupported.
    pub fn shutdown(&self) {
        self.config.diag().note("releasing target library");
        self.resolver.shutdown();
    }
}
