//! End-to-end load-time scenarios: config file, version precedence, driver
//! default, and symbol resolution, driven entirely through the injectable
//! environment store and table-backed loader.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use osmb_core::config::{GLSL_OVERRIDE_KEY, GL_OVERRIDE_KEY};
use osmb_core::driver::{DEFAULT_DRIVER, DRIVER_KEY};
use osmb_core::version::{FORCED_GLSL_VERSION, FORCED_GL_VERSION};
use osmb_core::{
    BridgeState, EntryPoint, EnvMap, EnvStore, TableLoader, VersionPolicy, TARGET_LIBRARY_KEY,
};

const LIB: &str = "/fake/libOSMesa.so";

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("env.txt");
    fs::write(&path, contents).unwrap();
    path
}

fn target_loader() -> TableLoader {
    let symbols: Vec<(&str, usize)> = EntryPoint::ALL
        .iter()
        .enumerate()
        .map(|(i, ep)| (ep.symbol_name(), 0x4000 + i * 0x10))
        .collect();
    TableLoader::new().library(LIB, &symbols)
}

#[test]
fn test_custom_version_pair_reaches_environment() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "CUSTOM_GL_GLSL=3\n\
         MESA_GL_VERSION_OVERRIDE=4.3\n\
         MESA_GLSL_VERSION_OVERRIDE=430\n",
    );
    let mut env = EnvMap::new();
    let state = BridgeState::initialize_with(TableLoader::new(), &path, &mut env);

    assert_eq!(env.get(GL_OVERRIDE_KEY).as_deref(), Some("4.3"));
    assert_eq!(env.get(GLSL_OVERRIDE_KEY).as_deref(), Some("430"));
    assert_eq!(
        state.policy(),
        &VersionPolicy::Custom {
            gl: "4.3".to_string(),
            glsl: "430".to_string()
        }
    );
}

#[test]
fn test_missing_config_still_applies_driver_default() {
    let temp = TempDir::new().unwrap();
    let mut env = EnvMap::new();
    BridgeState::initialize_with(TableLoader::new(), &temp.path().join("absent.txt"), &mut env);
    assert_eq!(env.get(DRIVER_KEY).as_deref(), Some(DEFAULT_DRIVER));
}

#[test]
fn test_existing_driver_selection_is_kept() {
    let temp = TempDir::new().unwrap();
    let mut env = EnvMap::new().with(DRIVER_KEY, "llvmpipe");
    BridgeState::initialize_with(TableLoader::new(), &temp.path().join("absent.txt"), &mut env);
    assert_eq!(env.get(DRIVER_KEY).as_deref(), Some("llvmpipe"));
}

#[test]
fn test_preexisting_override_pair_beats_force_latest() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "CUSTOM_GL_GLSL=1\n");
    let mut env = EnvMap::new()
        .with(GL_OVERRIDE_KEY, "3.3")
        .with(GLSL_OVERRIDE_KEY, "330");
    let state = BridgeState::initialize_with(TableLoader::new(), &path, &mut env);

    assert_eq!(state.policy(), &VersionPolicy::ForceLatest);
    assert_eq!(env.get(GL_OVERRIDE_KEY).as_deref(), Some("3.3"));
    assert_eq!(env.get(GLSL_OVERRIDE_KEY).as_deref(), Some("330"));
}

#[test]
fn test_force_latest_applied_to_clean_environment() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "CUSTOM_GL_GLSL=1\n");
    let mut env = EnvMap::new();
    BridgeState::initialize_with(TableLoader::new(), &path, &mut env);

    assert_eq!(env.get(GL_OVERRIDE_KEY).as_deref(), Some(FORCED_GL_VERSION));
    assert_eq!(
        env.get(GLSL_OVERRIDE_KEY).as_deref(),
        Some(FORCED_GLSL_VERSION)
    );
}

#[test]
fn test_follow_system_leaves_environment_alone() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        &temp,
        "CUSTOM_GL_GLSL=2\n\
         MESA_GL_VERSION_OVERRIDE=4.3\n\
         MESA_GLSL_VERSION_OVERRIDE=430\n",
    );
    let mut env = EnvMap::new();
    let state = BridgeState::initialize_with(TableLoader::new(), &path, &mut env);

    assert_eq!(state.policy(), &VersionPolicy::FollowSystem);
    assert!(env.get(GL_OVERRIDE_KEY).is_none());
    assert!(env.get(GLSL_OVERRIDE_KEY).is_none());
}

#[test]
fn test_pass_through_keys_reach_environment() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, "MESA_NO_ERROR=1\nLIBGL_ALWAYS_SOFTWARE=1\n");
    let mut env = EnvMap::new();
    BridgeState::initialize_with(TableLoader::new(), &path, &mut env);

    assert_eq!(env.get("MESA_NO_ERROR").as_deref(), Some("1"));
    assert_eq!(env.get("LIBGL_ALWAYS_SOFTWARE").as_deref(), Some("1"));
}

#[test]
fn test_full_bootstrap_resolves_known_symbols() {
    let temp = TempDir::new().unwrap();
    let mut env = EnvMap::new().with(TARGET_LIBRARY_KEY, LIB);
    let state = BridgeState::initialize_with(
        target_loader(),
        &temp.path().join("absent.txt"),
        &mut env,
    );

    for ep in EntryPoint::ALL {
        assert!(
            state.resolver().cached(ep).is_some(),
            "expected {} to be resolved",
            ep.symbol_name()
        );
    }
}

#[test]
fn test_config_file_can_supply_target_library() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp, &format!("MESA_LIBRARY={}\n", LIB));
    let mut env = EnvMap::new();
    let state = BridgeState::initialize_with(target_loader(), &path, &mut env);

    assert!(state.resolver().has_library());
    assert!(state.resolver().cached(EntryPoint::GetString).is_some());
}

#[test]
fn test_missing_target_library_degrades_to_unresolved() {
    let temp = TempDir::new().unwrap();
    let mut env = EnvMap::new();
    let state = BridgeState::initialize_with(
        TableLoader::new(),
        &temp.path().join("absent.txt"),
        &mut env,
    );

    for ep in EntryPoint::ALL {
        assert!(state.resolver().cached(ep).is_none());
    }
    assert!(state
        .resolver()
        .resolve_on_demand("glGetString", &env)
        .is_none());
}

#[test]
fn test_target_library_appearing_late_is_picked_up() {
    let temp = TempDir::new().unwrap();
    let mut env = EnvMap::new();
    let state = BridgeState::initialize_with(
        target_loader(),
        &temp.path().join("absent.txt"),
        &mut env,
    );
    assert!(!state.resolver().has_library());

    env.set(TARGET_LIBRARY_KEY, LIB).unwrap();
    assert!(state
        .resolver()
        .resolve_on_demand("glFinish", &env)
        .is_some());
    assert!(state.resolver().has_library());
}

#[test]
fn test_shutdown_releases_target_handle() {
    let temp = TempDir::new().unwrap();
    let loader = target_loader();
    let mut env = EnvMap::new().with(TARGET_LIBRARY_KEY, LIB);
    let state = BridgeState::initialize_with(
        loader.clone(),
        &temp.path().join("absent.txt"),
        &mut env,
    );

    assert_eq!(loader.live_handles(), 1);
    state.shutdown();
    assert_eq!(loader.live_handles(), 0);
}

#[test]
fn test_two_states_are_independent() {
    let temp = TempDir::new().unwrap();
    let absent = temp.path().join("absent.txt");

    let mut env_a = EnvMap::new().with(TARGET_LIBRARY_KEY, LIB);
    let state_a = BridgeState::initialize_with(target_loader(), &absent, &mut env_a);

    let mut env_b = EnvMap::new();
    let state_b = BridgeState::initialize_with(TableLoader::new(), &absent, &mut env_b);

    assert!(state_a.resolver().cached(EntryPoint::Clear).is_some());
    assert!(state_b.resolver().cached(EntryPoint::Clear).is_none());
}
