//! # osmb-shim
//!
//! The OSMesa plugin bridge shared library. Exports the OSMesa/GL entry
//! points and forwards each call to the implementation library named by
//! `MESA_LIBRARY`, as resolved by `osmb-core`.
//!
//! ## Usage
//!
//! ```bash
//! MESA_LIBRARY=/data/data/host.app/files/libOSMesa_8.so \
//! OSM_PLUGIN_LOGE=true \
//! some-host-binary   # links against libosmb_shim.so for its OSMesa surface
//! ```
//!
//! Further keys are read from `/sdcard/Mesa/env.txt`; see `osmb-core` for
//! the full list. The host must treat library load/unload as serialization
//! points: entry-point calls racing either hook are unsupported.

mod exports;

pub use exports::*;

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::OnceLock;

use osmb_core::BridgeState;

static BRIDGE: OnceLock<BridgeState> = OnceLock::new();

/// Handle pinning our own image against premature unload; informational
/// only, never dereferenced.
static SELF_HANDLE: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

/// The process-wide bridge, built by the load hook or on first use,
/// whichever comes first.
pub(crate) fn bridge() -> &'static BridgeState {
    BRIDGE.get_or_init(BridgeState::initialize)
}

/// Bump the loader refcount on our own image so in-flight delegated calls
/// cannot outlive the code they run in. Best-effort.
unsafe fn retain_self() {
    let mut info: libc::Dl_info = std::mem::zeroed();
    if libc::dladdr(init_hook as *const c_void, &mut info) == 0 || info.dli_fname.is_null() {
        return;
    }
    let handle = libc::dlopen(info.dli_fname, libc::RTLD_LAZY | libc::RTLD_NOLOAD);
    SELF_HANDLE.store(handle, Ordering::Release);
}

extern "C" fn init_hook() {
    let state = bridge();
    state.config().diag().note("bridge initialized");
    unsafe { retain_self() };
}

extern "C" fn fini_hook() {
    if let Some(state) = BRIDGE.get() {
        state.shutdown();
    }
}

/// Runs when the dynamic loader maps this library, before any entry point
/// is reachable.
#[used]
#[cfg_attr(
    any(target_os = "linux", target_os = "android"),
    link_section = ".init_array"
)]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_init_func")]
static INIT: extern "C" fn() = init_hook;

/// Runs when the library is unloaded; releases the target handle exactly
/// once.
#[used]
#[cfg_attr(
    any(target_os = "linux", target_os = "android"),
    link_section = ".fini_array"
)]
#[cfg_attr(target_os = "macos", link_section = "__DATA,__mod_term_func")]
static FINI: extern "C" fn() = fini_hook;
