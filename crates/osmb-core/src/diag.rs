//! Flag-gated diagnostics.
//!
//! The bridge may be mapped into arbitrary hosts before any logging runtime
//! exists, so diagnostics are plain lines: progress on stdout, errors on
//! stderr, nothing at all unless the flag is on.

/// Prefix carried by every diagnostic line.
pub const DIAG_PREFIX: &str = "[osm-bridge]";

/// Copyable diagnostics sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diag {
    enabled: bool,
}

impl Diag {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Progress line on stdout.
    pub fn note(&self, msg: &str) {
        if self.enabled {
            println!("{} {}", DIAG_PREFIX, msg);
        }
    }

    /// Error line on stderr.
    pub fn warn(&self, msg: &str) {
        if self.enabled {
            eprintln!("{} error: {}", DIAG_PREFIX, msg);
        }
    }
}
