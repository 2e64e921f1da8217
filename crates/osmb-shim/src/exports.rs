//! The delegated OSMesa/GL entry points.
//!
//! Signatures mirror the OSMesa public API bit-exactly. Every wrapper
//! either calls the cached target symbol or returns its documented sentinel
//! (null, `GL_FALSE`, or a silent no-op); a missing backend must never take
//! the host down. Only `OSMesaGetProcAddress` ever resolves late.

#![allow(non_snake_case)]

use std::ffi::CStr;
use std::mem;

use libc::{c_char, c_int, c_uchar, c_uint, c_void};

use osmb_core::{EntryPoint, ProcessEnv};

use crate::bridge;

// GL scalar types, as the headers spell them.
pub type GLenum = c_uint;
pub type GLboolean = c_uchar;
pub type GLbitfield = c_uint;
pub type GLint = c_int;
pub type GLsizei = c_int;
pub type GLfloat = f32;
pub type GLubyte = c_uchar;

/// Context owned by the target implementation; opaque on this side.
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct osmesa_context {
    _opaque: [u8; 0],
}

pub type OSMesaContext = *mut osmesa_context;
pub type OSMESAproc = Option<unsafe extern "C" fn()>;

macro_rules! delegate {
    ($ep:ident => fn $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty, $sentinel:expr) => {
        #[no_mangle]
        pub unsafe extern "C" fn $name($($arg: $ty),*) -> $ret {
            type Target = unsafe extern "C" fn($($ty),*) -> $ret;
            match bridge().resolver().cached(EntryPoint::$ep) {
                Some(addr) => mem::transmute::<*mut c_void, Target>(addr.as_ptr())($($arg),*),
                None => $sentinel,
            }
        }
    };
}

// ============================================================================
// Context lifecycle
// ============================================================================

delegate!(CreateContext =>
    fn OSMesaCreateContext(format: GLenum, sharelist: OSMesaContext) -> OSMesaContext,
    std::ptr::null_mut());

delegate!(CreateContextExt =>
    fn OSMesaCreateContextExt(
        format: GLenum,
        depth_bits: GLint,
        stencil_bits: GLint,
        accum_bits: GLint,
        sharelist: OSMesaContext
    ) -> OSMesaContext,
    std::ptr::null_mut());

delegate!(CreateContextAttribs =>
    fn OSMesaCreateContextAttribs(
        attrib_list: *const c_int,
        sharelist: OSMesaContext
    ) -> OSMesaContext,
    std::ptr::null_mut());

delegate!(DestroyContext =>
    fn OSMesaDestroyContext(ctx: OSMesaContext) -> (), ());

delegate!(MakeCurrent =>
    fn OSMesaMakeCurrent(
        ctx: OSMesaContext,
        buffer: *mut c_void,
        kind: GLenum,
        width: GLsizei,
        height: GLsizei
    ) -> GLboolean,
    0);

delegate!(GetCurrentContext =>
    fn OSMesaGetCurrentContext() -> OSMesaContext, std::ptr::null_mut());

// ============================================================================
// Pixel and buffer operations
// ============================================================================

delegate!(PixelStore =>
    fn OSMesaPixelStore(pname: GLint, value: GLint) -> (), ());

delegate!(GetIntegerv =>
    fn OSMesaGetIntegerv(pname: GLint, value: *mut GLint) -> (), ());

delegate!(GetColorBuffer =>
    fn OSMesaGetColorBuffer(
        ctx: OSMesaContext,
        width: *mut GLint,
        height: *mut GLint,
        format: *mut GLint,
        buffer: *mut *mut c_void
    ) -> GLboolean,
    0);

delegate!(GetDepthBuffer =>
    fn OSMesaGetDepthBuffer(
        ctx: OSMesaContext,
        width: *mut GLint,
        height: *mut GLint,
        bytes_per_value: *mut GLint,
        buffer: *mut *mut c_void
    ) -> GLboolean,
    0);

delegate!(ColorClamp =>
    fn OSMesaColorClamp(enable: GLboolean) -> (), ());

// ============================================================================
// Core GL primitives
// ============================================================================

delegate!(GetString =>
    fn glGetString(name: GLenum) -> *const GLubyte, std::ptr::null());

delegate!(ClearColor =>
    fn glClearColor(red: GLfloat, green: GLfloat, blue: GLfloat, alpha: GLfloat) -> (), ());

delegate!(Clear =>
    fn glClear(mask: GLbitfield) -> (), ());

delegate!(Finish =>
    fn glFinish() -> (), ());

delegate!(ReadPixels =>
    fn glReadPixels(
        x: GLint,
        y: GLint,
        width: GLsizei,
        height: GLsizei,
        format: GLenum,
        kind: GLenum,
        pixels: *mut c_void
    ) -> (), ());

// ============================================================================
// Generic query
// ============================================================================

/// Known, already-resolved names answer from the cache; anything else goes
/// through on-demand resolution against the target library.
#[no_mangle]
pub unsafe extern "C" fn OSMesaGetProcAddress(func_name: *const c_char) -> OSMESAproc {
    if func_name.is_null() {
        return None;
    }
    let Ok(name) = CStr::from_ptr(func_name).to_str() else {
        return None;
    };
    let resolver = bridge().resolver();
    let addr = EntryPoint::from_symbol_name(name)
        .and_then(|ep| resolver.cached(ep))
        .or_else(|| resolver.resolve_on_demand(name, &ProcessEnv));
    addr.map(|a| mem::transmute::<*mut c_void, unsafe extern "C" fn()>(a.as_ptr()))
}
