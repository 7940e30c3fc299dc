//! Owned native pointers and C string conversion.

use crate::error::{Error, Result};
use std::ffi::{c_char, CStr, CString};
use std::ptr::NonNull;

/// A non-null pointer to a native-owned object of type `T`.
///
/// The handle carries no destructor of its own: destroying the object needs
/// the function table, so the owning wrapper (`ResourceHandle`, `Client`)
/// takes it out and passes it to the kind-specific destroy exactly once.
/// Not `Clone`, so a handle can only be destroyed through one owner.
pub struct NativeHandle<T> {
    ptr: NonNull<T>,
}

// SAFETY: libnrm objects are plain heap allocations with no thread
// affinity. Moving ownership to another thread is sound; shared access is
// not, so there is no `Sync` impl.
unsafe impl<T> Send for NativeHandle<T> {}

impl<T> NativeHandle<T> {
    /// Take ownership of a pointer returned by a native constructor.
    ///
    /// Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point at a live object of type `T` that the
    /// caller owns and that nothing else will destroy.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// The raw pointer, for passing back to the native layer.
    #[must_use]
    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Give up ownership and return the raw pointer.
    #[must_use]
    pub const fn into_raw(self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> std::fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeHandle({:p})", self.ptr)
    }
}

/// Convert a caller-supplied name into a C string.
pub fn c_string(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::invalid_input(format!("{what} contains an interior NUL byte")))
}

/// Copy a native string into an owned `String`.
///
/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn copy_string(call: &'static str, ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Err(Error::invalid_string(call));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let s = unsafe { CStr::from_ptr(ptr) };
    s.to_str()
        .map(str::to_owned)
        .map_err(|_| Error::invalid_string(call))
}
