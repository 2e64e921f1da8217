//! Dynamic-library access behind a trait seam.
//!
//! Production resolution goes through the operating loader ([`DlLoader`]);
//! tests drive the same resolver against an in-memory [`TableLoader`], so
//! resolution logic runs without any real shared object on disk.

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors establishing the target library handle.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The environment variable naming the target library is unset.
    #[error("{0} is not set")]
    MissingPath(&'static str),

    /// The path contains an interior NUL and cannot cross the FFI boundary.
    #[error("invalid library path {0:?}")]
    InvalidPath(String),

    /// The operating loader rejected the library.
    #[error("failed to load {path}: {reason}")]
    Open { path: String, reason: String },
}

/// An opened implementation library symbols can be resolved against.
pub trait SharedLibrary: Send {
    /// Look up one symbol. `None` when the library does not export it.
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// Opens implementation libraries by path.
pub trait LibraryLoader {
    type Library: SharedLibrary;

    fn open(&self, path: &str) -> Result<Self::Library, LoadError>;

    /// Process-global-scope lookup, for hosts that already mapped the
    /// implementation some other way.
    fn global_symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

// ============================================================================
// dlopen-backed loader
// ============================================================================

/// `dlopen`/`dlsym` loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct DlLoader;

/// Owned `dlopen` handle, closed on drop.
#[derive(Debug)]
pub struct DlLibrary {
    handle: *mut c_void,
}

// dlopen handles are reference counted by the operating loader and usable
// from any thread.
unsafe impl Send for DlLibrary {}

impl SharedLibrary for DlLibrary {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(name).ok()?;
        NonNull::new(unsafe { libc::dlsym(self.handle, c_name.as_ptr()) })
    }
}

impl Drop for DlLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

impl LibraryLoader for DlLoader {
    type Library = DlLibrary;

    fn open(&self, path: &str) -> Result<DlLibrary, LoadError> {
        let c_path =
            CString::new(path).map_err(|_| LoadError::InvalidPath(path.to_string()))?;
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_LAZY) };
        if handle.is_null() {
            return Err(LoadError::Open {
                path: path.to_string(),
                reason: last_dl_error(),
            });
        }
        Ok(DlLibrary { handle })
    }

    fn global_symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(name).ok()?;
        NonNull::new(unsafe { libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr()) })
    }
}

fn last_dl_error() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return "unknown dlopen error".to_string();
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

// ============================================================================
// In-memory loader
// ============================================================================

/// In-memory loader: path to symbol table, plus a process-global scope.
///
/// Clones share the open-handle count, so a test can hand a clone to the
/// resolver and still observe handle lifetimes from the outside.
#[derive(Debug, Default, Clone)]
pub struct TableLoader {
    libraries: HashMap<String, HashMap<String, usize>>,
    process_scope: HashMap<String, usize>,
    live_handles: Arc<AtomicUsize>,
}

impl TableLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library with `(symbol name, address)` entries.
    pub fn library(mut self, path: &str, symbols: &[(&str, usize)]) -> Self {
        let table = symbols
            .iter()
            .map(|(name, addr)| (name.to_string(), *addr))
            .collect();
        self.libraries.insert(path.to_string(), table);
        self
    }

    /// Register a symbol visible in the process-global scope.
    pub fn global(mut self, name: &str, addr: usize) -> Self {
        self.process_scope.insert(name.to_string(), addr);
        self
    }

    /// Handles currently open across all clones of this loader.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }
}

/// Handle to a [`TableLoader`] library.
#[derive(Debug)]
pub struct TableLibrary {
    symbols: HashMap<String, usize>,
    live_handles: Arc<AtomicUsize>,
}

impl SharedLibrary for TableLibrary {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.symbols
            .get(name)
            .and_then(|addr| NonNull::new(*addr as *mut c_void))
    }
}

impl Drop for TableLibrary {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LibraryLoader for TableLoader {
    type Library = TableLibrary;

    fn open(&self, path: &str) -> Result<TableLibrary, LoadError> {
        let Some(symbols) = self.libraries.get(path) else {
            return Err(LoadError::Open {
                path: path.to_string(),
                reason: "no such table entry".to_string(),
            });
        };
        self.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(TableLibrary {
            symbols: symbols.clone(),
            live_handles: Arc::clone(&self.live_handles),
        })
    }

    fn global_symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.process_scope
            .get(name)
            .and_then(|addr| NonNull::new(*addr as *mut c_void))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_loader_tracks_handles() {
        let loader = TableLoader::new().library("/fake/lib.so", &[("sym", 0x10)]);
        let lib = loader.open("/fake/lib.so").unwrap();
        assert_eq!(loader.live_handles(), 1);
        assert_eq!(lib.symbol("sym").map(|p| p.as_ptr() as usize), Some(0x10));
        assert!(lib.symbol("other").is_none());
        drop(lib);
        assert_eq!(loader.live_handles(), 0);
    }

    #[test]
    fn test_table_loader_unknown_path() {
        let loader = TableLoader::new();
        assert!(matches!(
            loader.open("/missing.so"),
            Err(LoadError::Open { .. })
        ));
    }

    #[test]
    fn test_dl_loader_reports_open_failure() {
        let loader = DlLoader;
        let result = loader.open("/nonexistent/libOSMesa.so");
        assert!(matches!(result, Err(LoadError::Open { .. })));
    }
}
