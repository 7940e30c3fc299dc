//! FFI quarantine zone: all unsafe code lives here.
//!
//! # Safety Architecture
//!
//! The public modules are compiled with `#![deny(unsafe_code)]`. Everything
//! that touches a raw libnrm pointer sits below this module and exposes
//! safe functions over [`handle::NativeHandle`] instead.
//!
//! ## Safety Rules
//!
//! - Every `unsafe` block has a `// SAFETY:` comment
//! - No raw pointer leaves this module except inside a `NativeHandle`
//! - Native strings are copied and validated as UTF-8 before use
//! - Every native object is destroyed by exactly one owner
//! - No panic unwinds into a native listener thread
//!
//! # Module Structure
//!
//! ```text
//! ffi/
//! ├── mod.rs          # This file - module router, init/finalize
//! ├── sys.rs          # ABI types and the function table
//! ├── loader.rs       # libloading symbol resolution
//! ├── handle.rs       # Owned native pointers, string conversion
//! ├── vector.rs       # nrm_vector_t draining
//! ├── entity.rs       # Per-kind create/destroy/add/list/remove
//! ├── client.rs       # nrm_client_* calls
//! ├── trampoline.rs   # Listener callbacks and their slots
//! └── mock.rs         # In-process fake libnrm (tests only)
//! ```

// Allow unsafe in this module only - quarantine zone
#![allow(unsafe_code)]

pub mod client;
pub mod entity;
pub mod handle;
pub mod loader;
pub mod sys;
pub mod trampoline;
pub mod vector;

#[cfg(test)]
pub mod mock;

use crate::config::NativeDefaults;
use crate::error::{check, Result};
use handle::copy_string;
use std::ffi::{c_char, c_int};
use sys::NrmApi;
use tracing::{debug, warn};

/// `nrm_init` with an empty argument vector.
pub fn init(api: &NrmApi) -> Result<()> {
    let mut argc: c_int = 0;
    let mut argv: *mut *mut c_char = std::ptr::null_mut();
    // SAFETY: both out-pointers are valid; libnrm only scans argv when
    // argc is positive.
    check("nrm_init", unsafe { (api.init)(&mut argc, &mut argv) })
}

/// `nrm_finalize`. A failure is logged, there is nobody to report it to.
pub fn finalize(api: &NrmApi) {
    // SAFETY: called once, after every client and handle is gone.
    let code = unsafe { (api.finalize)() };
    if let Err(e) = check("nrm_finalize", code) {
        warn!(error = %e, "library teardown reported failure");
    }
}

/// Read the native configuration globals, falling back to the header
/// defaults for anything the library does not export.
pub fn read_defaults(api: &NrmApi) -> NativeDefaults {
    let vars = &api.variables;
    let mut defaults = NativeDefaults::default();

    // Each pointer is either null or the address of a global that stays
    // valid while the library is loaded. The globals are only written by
    // nrm_init, which has returned.
    if !vars.upstream_uri.is_null() {
        // SAFETY: see above; the string itself is owned by libnrm.
        match unsafe { copy_string("nrm_upstream_uri", *vars.upstream_uri) } {
            Ok(uri) => defaults.uri = uri,
            Err(e) => warn!(error = %e, "ignoring unreadable nrm_upstream_uri"),
        }
    }
    if !vars.upstream_pub_port.is_null() {
        // SAFETY: see above.
        defaults.pub_port = port("nrm_upstream_pub_port", unsafe { *vars.upstream_pub_port }, defaults.pub_port);
    }
    if !vars.upstream_rpc_port.is_null() {
        // SAFETY: see above.
        defaults.rpc_port = port("nrm_upstream_rpc_port", unsafe { *vars.upstream_rpc_port }, defaults.rpc_port);
    }
    if !vars.ratelimit.is_null() {
        // SAFETY: see above.
        defaults.ratelimit = unsafe { *vars.ratelimit };
    }
    if !vars.transmit.is_null() {
        // SAFETY: see above.
        defaults.transmit = unsafe { *vars.transmit } != 0;
    }
    if !vars.timeout.is_null() {
        // SAFETY: see above.
        defaults.timeout_ms = unsafe { *vars.timeout };
    }
    debug!(?defaults, "native defaults");
    defaults
}

fn port(name: &'static str, raw: u32, fallback: u16) -> u16 {
    u16::try_from(raw).unwrap_or_else(|_| {
        warn!(variable = name, value = raw, "port out of range, using header default");
        fallback
    })
}
