//! Backend driver selection guard.

use crate::diag::Diag;
use crate::env::EnvStore;

/// Environment variable choosing the Gallium driver backend.
pub const DRIVER_KEY: &str = "GALLIUM_DRIVER";

/// Backend used when the host did not pick one.
pub const DEFAULT_DRIVER: &str = "zink";

/// Make sure a driver selection exists. Runs after all version handling,
/// whether or not a config file was found; an existing value is left
/// untouched regardless of its content.
pub fn ensure_driver_default(env: &mut dyn EnvStore, diag: Diag) {
    if env.get(DRIVER_KEY).is_some() {
        return;
    }
    match env.set(DRIVER_KEY, DEFAULT_DRIVER) {
        Ok(()) => diag.note(&format!(
            "{} not set, defaulting to {}",
            DRIVER_KEY, DEFAULT_DRIVER
        )),
        Err(e) => diag.warn(&format!("could not set {}: {}", DRIVER_KEY, e)),
    }
}
