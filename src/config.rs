//! Configuration: which shared library to load and where to connect.
//!
//! Three layers, narrowest last:
//!
//! 1. [`LibraryConfig`] picks the libnrm shared object (explicit path, then
//!    the `LIBNRM_SO_` environment variable, then the platform file name).
//! 2. [`NativeDefaults`] is what libnrm itself was configured with after
//!    `nrm_init` parsed the `NRM_*` environment variables.
//! 3. [`ClientConfig`] is the uri and port pair one client connects to,
//!    usually derived from the native defaults.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the shared library path.
pub const LIBRARY_PATH_ENV: &str = "LIBNRM_SO_";

/// Header default for `nrm_upstream_uri`.
pub const DEFAULT_URI: &str = "tcp://127.0.0.1";
/// Header default for `nrm_upstream_pub_port`.
pub const DEFAULT_PUB_PORT: u16 = 2345;
/// Header default for `nrm_upstream_rpc_port`.
pub const DEFAULT_RPC_PORT: u16 = 3456;
/// Header default for `nrm_ratelimit`, in nanoseconds.
pub const DEFAULT_RATELIMIT: u64 = 10_000_000;
/// Header default for `nrm_transmit`.
pub const DEFAULT_TRANSMIT: bool = true;
/// Header default for `nrm_timeout`, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Where to find libnrm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Explicit path; takes precedence over the environment.
    pub path: Option<PathBuf>,
}

impl LibraryConfig {
    /// Configuration that loads from an explicit path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// The path that will be opened, consulting `LIBNRM_SO_` if no explicit
    /// path was given.
    #[must_use]
    pub fn resolve(&self) -> PathBuf {
        resolve_library_path(self.path.as_deref(), std::env::var_os(LIBRARY_PATH_ENV))
    }
}

/// Pick the shared library path from an explicit setting and an
/// environment value.
///
/// An empty environment value is ignored.
#[must_use]
pub fn resolve_library_path(explicit: Option<&std::path::Path>, env: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match env {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(libloading::library_filename("nrm")),
    }
}

/// libnrm's process-wide settings as seen right after `nrm_init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDefaults {
    /// Daemon uri (`nrm_upstream_uri`).
    pub uri: String,
    /// Publish port (`nrm_upstream_pub_port`).
    pub pub_port: u16,
    /// RPC port (`nrm_upstream_rpc_port`).
    pub rpc_port: u16,
    /// Minimum nanoseconds between two sent events (`nrm_ratelimit`).
    pub ratelimit: u64,
    /// Whether clients transmit at all (`nrm_transmit`).
    pub transmit: bool,
    /// RPC timeout in milliseconds (`nrm_timeout`).
    pub timeout_ms: u32,
}

impl Default for NativeDefaults {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            pub_port: DEFAULT_PUB_PORT,
            rpc_port: DEFAULT_RPC_PORT,
            ratelimit: DEFAULT_RATELIMIT,
            transmit: DEFAULT_TRANSMIT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Connection parameters for one [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Daemon uri, e.g. `tcp://127.0.0.1`.
    pub uri: String,
    /// Publish/subscribe port.
    pub pub_port: u16,
    /// Request/reply port.
    pub rpc_port: u16,
}

impl ClientConfig {
    /// Explicit connection parameters.
    #[must_use]
    pub fn new(uri: impl Into<String>, pub_port: u16, rpc_port: u16) -> Self {
        Self {
            uri: uri.into(),
            pub_port,
            rpc_port,
        }
    }

    /// Connection parameters libnrm was configured with.
    #[must_use]
    pub fn from_defaults(defaults: &NativeDefaults) -> Self {
        Self::new(defaults.uri.clone(), defaults.pub_port, defaults.rpc_port)
    }

    /// Replace the uri.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Replace the publish port.
    #[must_use]
    pub const fn with_pub_port(mut self, port: u16) -> Self {
        self.pub_port = port;
        self
    }

    /// Replace the RPC port.
    #[must_use]
    pub const fn with_rpc_port(mut self, port: u16) -> Self {
        self.rpc_port = port;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_defaults(&NativeDefaults::default())
    }
}
