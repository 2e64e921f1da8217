//! Target-library handle and symbol cache.
//!
//! One resolver owns at most one open handle to the implementation library
//! and a fixed-size cache with one slot per known entry point. The known
//! list is resolved eagerly at load time so delegated calls are a single
//! cached-pointer indirection; arbitrary names queried through the generic
//! proc-address entry point resolve late, on demand.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::diag::Diag;
use crate::env::EnvStore;
use crate::loader::{LibraryLoader, LoadError, SharedLibrary};

/// Environment variable holding the target implementation library path.
pub const TARGET_LIBRARY_KEY: &str = "MESA_LIBRARY";

/// Number of eagerly resolved entry points.
pub const ENTRY_POINT_COUNT: usize = 17;

/// The fixed delegated surface, one variant per exported entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    CreateContext,
    CreateContextExt,
    CreateContextAttribs,
    DestroyContext,
    MakeCurrent,
    GetCurrentContext,
    PixelStore,
    GetIntegerv,
    GetColorBuffer,
    GetDepthBuffer,
    ColorClamp,
    GetProcAddress,
    GetString,
    ClearColor,
    Clear,
    Finish,
    ReadPixels,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; ENTRY_POINT_COUNT] = [
        EntryPoint::CreateContext,
        EntryPoint::CreateContextExt,
        EntryPoint::CreateContextAttribs,
        EntryPoint::DestroyContext,
        EntryPoint::MakeCurrent,
        EntryPoint::GetCurrentContext,
        EntryPoint::PixelStore,
        EntryPoint::GetIntegerv,
        EntryPoint::GetColorBuffer,
        EntryPoint::GetDepthBuffer,
        EntryPoint::ColorClamp,
        EntryPoint::GetProcAddress,
        EntryPoint::GetString,
        EntryPoint::ClearColor,
        EntryPoint::Clear,
        EntryPoint::Finish,
        EntryPoint::ReadPixels,
    ];

    /// Exported symbol name in the target library.
    pub fn symbol_name(self) -> &'static str {
        match self {
            EntryPoint::CreateContext => "OSMesaCreateContext",
            EntryPoint::CreateContextExt => "OSMesaCreateContextExt",
            EntryPoint::CreateContextAttribs => "OSMesaCreateContextAttribs",
            EntryPoint::DestroyContext => "OSMesaDestroyContext",
            EntryPoint::MakeCurrent => "OSMesaMakeCurrent",
            EntryPoint::GetCurrentContext => "OSMesaGetCurrentContext",
            EntryPoint::PixelStore => "OSMesaPixelStore",
            EntryPoint::GetIntegerv => "OSMesaGetIntegerv",
            EntryPoint::GetColorBuffer => "OSMesaGetColorBuffer",
            EntryPoint::GetDepthBuffer => "OSMesaGetDepthBuffer",
            EntryPoint::ColorClamp => "OSMesaColorClamp",
            EntryPoint::GetProcAddress => "OSMesaGetProcAddress",
            EntryPoint::GetString => "glGetString",
            EntryPoint::ClearColor => "glClearColor",
            EntryPoint::Clear => "glClear",
            EntryPoint::Finish => "glFinish",
            EntryPoint::ReadPixels => "glReadPixels",
        }
    }

    pub fn from_symbol_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|ep| ep.symbol_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Resolver state: the (at most one) target handle plus the fixed symbol
/// cache.
///
/// Explicit and injectable rather than module-global, so independent
/// instances can live in one test process. Establishing the handle is
/// serialized through a mutex; a failed attempt is retried on the next
/// call, nothing is latched. Cache slots are written during the
/// single-threaded load phase and never re-resolved or invalidated.
pub struct SymbolResolver<L: LibraryLoader> {
    loader: L,
    library: Mutex<Option<L::Library>>,
    cache: [AtomicPtr<c_void>; ENTRY_POINT_COUNT],
    gpa_only: bool,
    diag: Diag,
}

impl<L: LibraryLoader> SymbolResolver<L> {
    pub fn new(loader: L, gpa_only: bool, diag: Diag) -> Self {
        Self {
            loader,
            library: Mutex::new(None),
            cache: std::array::from_fn(|_| AtomicPtr::new(ptr::null_mut())),
            gpa_only,
            diag,
        }
    }

    fn lock_library(&self) -> MutexGuard<'_, Option<L::Library>> {
        // A poisoned lock only means another thread failed mid-attempt; the
        // slot itself is still either empty or a valid handle.
        match self.library.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Open the target library if it is not open yet. Idempotent; failures
    /// are reported to the caller and the next call tries again.
    pub fn ensure_library(&self, env: &dyn EnvStore) -> Result<(), LoadError> {
        let mut guard = self.lock_library();
        self.ensure_library_locked(&mut guard, env).map(|_| ())
    }

    fn ensure_library_locked<'a>(
        &self,
        guard: &'a mut Option<L::Library>,
        env: &dyn EnvStore,
    ) -> Result<&'a L::Library, LoadError> {
        match guard {
            Some(library) => Ok(&*library),
            None => {
                let path = env
                    .get(TARGET_LIBRARY_KEY)
                    .ok_or(LoadError::MissingPath(TARGET_LIBRARY_KEY))?;
                let library = self.loader.open(&path)?;
                self.diag.note(&format!("loaded target library {}", path));
                Ok(guard.insert(library))
            }
        }
    }

    /// Resolve every known entry point against the established handle.
    ///
    /// Run once at load time, after [`Self::ensure_library`] succeeded. Each
    /// name resolves independently; a missing symbol leaves only its own
    /// slot unresolved.
    pub fn resolve_known(&self) {
        let guard = self.lock_library();
        let Some(library) = guard.as_ref() else {
            return;
        };
        for ep in EntryPoint::ALL {
            let name = ep.symbol_name();
            match library.symbol(name) {
                Some(addr) => self.cache[ep.index()].store(addr.as_ptr(), Ordering::Release),
                None => self
                    .diag
                    .warn(&format!("symbol {} not found in target library", name)),
            }
        }
    }

    /// Cached address for a known entry point, if eager resolution found
    /// one.
    pub fn cached(&self, ep: EntryPoint) -> Option<NonNull<c_void>> {
        NonNull::new(self.cache[ep.index()].load(Ordering::Acquire))
    }

    /// Late resolution for arbitrary names, used by the generic
    /// proc-address query.
    ///
    /// Re-attempts [`Self::ensure_library`] first, so a target library that
    /// appeared after a failed load-time attempt is picked up here. Without
    /// a handle the lookup fails, unless the generic-only override is set,
    /// in which case the process-global scope is consulted instead.
    pub fn resolve_on_demand(&self, name: &str, env: &dyn EnvStore) -> Option<NonNull<c_void>> {
        let mut guard = self.lock_library();
        match self.ensure_library_locked(&mut guard, env) {
            Ok(library) => {
                let found = library.symbol(name);
                if found.is_none() {
                    self.diag
                        .warn(&format!("symbol {} not found in target library", name));
                }
                found
            }
            Err(e) if self.gpa_only => {
                self.diag
                    .note(&format!("{}; trying process scope for {}", e, name));
                self.loader.global_symbol(name)
            }
            Err(e) => {
                self.diag.warn(&e.to_string());
                None
            }
        }
    }

    /// Whether a target handle is currently established.
    pub fn has_library(&self) -> bool {
        self.lock_library().is_some()
    }

    /// Release the target handle. Idempotent. Invoking any delegated entry
    /// point after teardown is unsupported.
    pub fn shutdown(&self) {
        self.lock_library().take();
    }
}
