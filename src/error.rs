//! Error types for the NRM client bindings.
//!
//! Every native entry point reports failure through a signed integer. Those
//! integers are classified into an [`ErrorKind`] right at the call site and
//! surfaced as a structured [`Error`]. Binding-layer failures (null handles,
//! already-destroyed handles, loader problems) get their own variants.

use std::fmt;
use thiserror::Error;

/// Classification of a native libnrm result code.
///
/// Discriminants match the positive constants of `nrm/utils/error.h`. Native
/// functions usually return the negated constant (`-NRM_EINVAL`), some
/// return it positive; [`ErrorKind::from_code`] accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorKind {
    /// `NRM_SUCCESS`.
    Success = 0,
    /// `NRM_FAILURE`, generic failure with no further detail.
    Failure = 1,
    /// `NRM_ENOMEM`.
    OutOfMemory = 2,
    /// `NRM_EINVAL`.
    InvalidArgument = 3,
    /// `NRM_EDOM`, typically an actuation value outside the permitted set.
    DomainError = 4,
    /// `NRM_ENOTSUP`.
    NotSupported = 5,
    /// `NRM_EBUSY`.
    Busy = 6,
    /// `NRM_EPERM`.
    PermissionDenied = 7,
    /// `NRM_ENOTFOUND`.
    NotFound = 8,
}

impl ErrorKind {
    /// All kinds, in native code order.
    pub const ALL: [Self; 9] = [
        Self::Success,
        Self::Failure,
        Self::OutOfMemory,
        Self::InvalidArgument,
        Self::DomainError,
        Self::NotSupported,
        Self::Busy,
        Self::PermissionDenied,
        Self::NotFound,
    ];

    /// Classify a raw native result code.
    ///
    /// Classification uses the magnitude of the code. Magnitudes outside the
    /// known range are reported as [`ErrorKind::Failure`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code.unsigned_abs() {
            0 => Self::Success,
            2 => Self::OutOfMemory,
            3 => Self::InvalidArgument,
            4 => Self::DomainError,
            5 => Self::NotSupported,
            6 => Self::Busy,
            7 => Self::PermissionDenied,
            8 => Self::NotFound,
            _ => Self::Failure,
        }
    }

    /// The code the native layer uses when returning this kind.
    #[must_use]
    pub const fn native_code(self) -> i32 {
        -(self as i32)
    }

    /// Whether this kind denotes success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "generic failure"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::DomainError => write!(f, "value out of domain"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::Busy => write!(f, "resource busy"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// Primary error type for NRM client operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A native call returned a non-zero result code.
    #[error("{call} failed: {kind} (code {code})")]
    Native {
        /// The native entry point that failed.
        call: &'static str,
        /// Classified failure.
        kind: ErrorKind,
        /// The raw code as returned.
        code: i32,
    },

    /// A native constructor returned no object.
    #[error("{call} returned a null handle")]
    NullHandle {
        /// The native entry point that returned null.
        call: &'static str,
    },

    /// An operation was attempted on a handle that was already destroyed.
    #[error("{what} handle used after it was destroyed")]
    Consumed {
        /// Kind of object the handle referred to.
        what: &'static str,
    },

    /// A native string was null or not valid UTF-8.
    #[error("{call} returned an invalid string")]
    InvalidString {
        /// The native entry point that produced the string.
        call: &'static str,
    },

    /// Invalid input was provided by the caller before reaching native code.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of what was invalid.
        reason: String,
    },

    /// The shared library could not be opened.
    #[error("failed to load {path}: {message}")]
    Load {
        /// Path or file name that was attempted.
        path: String,
        /// Loader diagnostic.
        message: String,
    },

    /// A required entry point is missing from the shared library.
    #[error("missing symbol {symbol}: {message}")]
    MissingSymbol {
        /// The symbol name.
        symbol: &'static str,
        /// Loader diagnostic.
        message: String,
    },

    /// A live [`Library`](crate::Library) already exists in this process.
    #[error("libnrm is already initialized in this process")]
    AlreadyInitialized,

    /// The receiving side of a listener channel went away.
    #[error("{listener} listener channel is closed")]
    ListenerClosed {
        /// Which listener the channel belonged to.
        listener: &'static str,
    },

    /// A bounded listener channel had no room for another notification.
    #[error("{listener} listener channel is full")]
    ListenerFull {
        /// Which listener the channel belonged to.
        listener: &'static str,
    },

    /// Another live client already holds the process-wide listener slot.
    #[error("{listener} listener is held by client {owner}")]
    ListenerTaken {
        /// Which listener slot was requested.
        listener: &'static str,
        /// Id of the client holding it.
        owner: u64,
    },
}

/// Result type alias for NRM client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a `Native` error from a raw result code.
    #[must_use]
    pub const fn native(call: &'static str, code: i32) -> Self {
        Self::Native {
            call,
            kind: ErrorKind::from_code(code),
            code,
        }
    }

    /// Create a new `NullHandle` error.
    #[must_use]
    pub const fn null_handle(call: &'static str) -> Self {
        Self::NullHandle { call }
    }

    /// Create a new `Consumed` error.
    #[must_use]
    pub const fn consumed(what: &'static str) -> Self {
        Self::Consumed { what }
    }

    /// Create a new `InvalidString` error.
    #[must_use]
    pub const fn invalid_string(call: &'static str) -> Self {
        Self::InvalidString { call }
    }

    /// Create a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a new `Load` error.
    #[must_use]
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new `MissingSymbol` error.
    #[must_use]
    pub fn missing_symbol(symbol: &'static str, message: impl Into<String>) -> Self {
        Self::MissingSymbol {
            symbol,
            message: message.into(),
        }
    }

    /// The classified kind of this error.
    ///
    /// Binding-layer errors without a native code report
    /// [`ErrorKind::Failure`], except invalid caller input which reports
    /// [`ErrorKind::InvalidArgument`] and contention for process-wide state
    /// which reports [`ErrorKind::Busy`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Native { kind, .. } => *kind,
            Self::InvalidInput { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyInitialized | Self::ListenerFull { .. } | Self::ListenerTaken { .. } => ErrorKind::Busy,
            _ => ErrorKind::Failure,
        }
    }

    /// Check if this error came from a native result code.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native { .. })
    }

    /// Check if this error reports use of a destroyed handle.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed { .. })
    }

    /// Get the raw native code, if any.
    #[must_use]
    pub const fn native_code(&self) -> Option<i32> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Check a native result code.
///
/// Zero is success; anything else becomes an [`Error::Native`].
///
/// # Errors
///
/// Returns [`Error::Native`] for every non-zero code.
pub const fn check(call: &'static str, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::native(call, code))
    }
}

/// Check a pointer returned by a native constructor.
///
/// # Errors
///
/// Returns [`Error::NullHandle`] if `ptr` is null.
pub fn check_pointer<T>(call: &'static str, ptr: *mut T) -> Result<std::ptr::NonNull<T>> {
    std::ptr::NonNull::new(ptr).ok_or(Error::null_handle(call))
}
