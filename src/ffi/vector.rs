//! Draining native `nrm_vector_t` arrays into Rust vectors.
//!
//! `nrm_vector_get` hands out a pointer *into* the array's storage. The slot
//! value (an element handle, or a plain `double` for actuator choices) is
//! copied out immediately, before the array is destroyed; destroying the
//! array invalidates slot pointers but not the objects they referred to.

use super::sys::{NrmApi, NrmVector};
use crate::error::{check, check_pointer, Result};
use std::ffi::c_void;
use tracing::trace;

/// Destroys a native vector exactly once, on every exit path.
struct OwnedVector<'a> {
    api: &'a NrmApi,
    ptr: *mut NrmVector,
}

impl Drop for OwnedVector<'_> {
    fn drop(&mut self) {
        // SAFETY: ptr came from a successful list call and is owned by this
        // guard only. vector_destroy nulls the pointer it is given.
        unsafe { (self.api.vector_destroy)(&mut self.ptr) };
    }
}

/// Copy every slot of `vector` out as a `T`, then destroy the vector.
///
/// Elements keep the order `nrm_vector_get` yields them in.
///
/// # Safety
///
/// `vector` must be null or a vector the caller owns whose slots each hold
/// one `T`. Ownership of the vector passes to this function.
pub unsafe fn drain<T: Copy>(api: &NrmApi, call: &'static str, vector: *mut NrmVector) -> Result<Vec<T>> {
    let mut out = Vec::new();
    // SAFETY: forwarded from the caller's contract.
    unsafe { drain_into(api, call, vector, &mut out) }?;
    Ok(out)
}

/// Like [`drain`], but appends to `out`. Slots read before a failure stay
/// in `out`, so the caller can release whatever they refer to.
///
/// # Safety
///
/// Same contract as [`drain`].
pub unsafe fn drain_into<T: Copy>(
    api: &NrmApi,
    call: &'static str,
    vector: *mut NrmVector,
    out: &mut Vec<T>,
) -> Result<()> {
    let vector = check_pointer(call, vector)?;
    let guard = OwnedVector {
        api,
        ptr: vector.as_ptr(),
    };

    let mut len = 0usize;
    // SAFETY: guard.ptr is a live vector; len is a valid out-pointer.
    check("nrm_vector_length", unsafe { (api.vector_length)(guard.ptr, &mut len) })?;

    out.reserve(len);
    for index in 0..len {
        let mut slot: *mut c_void = std::ptr::null_mut();
        // SAFETY: index < len; slot is a valid out-pointer.
        check("nrm_vector_get", unsafe { (api.vector_get)(guard.ptr, index, &mut slot) })?;
        let slot = check_pointer("nrm_vector_get", slot)?;
        // SAFETY: per the caller's contract each slot holds one T; the read
        // happens while the vector, and so the slot, is still alive.
        out.push(unsafe { slot.as_ptr().cast::<T>().read_unaligned() });
    }
    trace!(call, len, "drained native vector");
    drop(guard);
    Ok(())
}
