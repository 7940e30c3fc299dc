//! The process-wide libnrm lifecycle.
//!
//! [`Library`] loads the shared object, resolves every entry point, runs
//! `nrm_init`, and runs `nrm_finalize` when dropped. Clients and resource
//! handles borrow it, so the borrow checker guarantees finalize happens after
//! every native object is gone.
//!
//! libnrm keeps global state, so only one `Library` may be live per process.
//! A failed `nrm_init` is remembered and makes every later open fail too.

use crate::config::{LibraryConfig, NativeDefaults};
use crate::error::{Error, Result};
use crate::ffi::{self, sys::NrmApi};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

static LIFECYCLE: Lifecycle = Lifecycle::new();

/// Process-wide init bookkeeping.
struct Lifecycle {
    /// Set while a `Library` is live.
    live: AtomicBool,
    /// Code of a failed `nrm_init`, zero if none failed.
    init_failure: AtomicI32,
}

impl Lifecycle {
    const fn new() -> Self {
        Self {
            live: AtomicBool::new(false),
            init_failure: AtomicI32::new(0),
        }
    }

    /// Claim the process and run `nrm_init`.
    fn begin(&self, api: &NrmApi) -> Result<()> {
        let failed = self.init_failure.load(Ordering::SeqCst);
        if failed != 0 {
            return Err(Error::native("nrm_init", failed));
        }
        if self
            .live
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }
        if let Err(e) = ffi::init(api) {
            if let Some(code) = e.native_code() {
                self.init_failure.store(code, Ordering::SeqCst);
            }
            self.live.store(false, Ordering::SeqCst);
            error!(error = %e, "libnrm initialization failed");
            return Err(e);
        }
        Ok(())
    }

    fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// A loaded and initialized libnrm.
///
/// # Example
///
/// ```no_run
/// use nrm::{Client, Library};
///
/// let lib = Library::open()?;
/// let client = Client::connect_default(&lib)?;
/// for sensor in client.list_sensors()? {
///     println!("{}", sensor.uuid()?);
/// }
/// # Ok::<(), nrm::Error>(())
/// ```
#[derive(Debug)]
pub struct Library {
    api: Arc<NrmApi>,
    defaults: NativeDefaults,
    path: Option<PathBuf>,
}

impl Library {
    /// Open libnrm from `LIBNRM_SO_` or the platform default location.
    ///
    /// # Errors
    ///
    /// See [`Library::open_with`].
    pub fn open() -> Result<Self> {
        Self::open_with(&LibraryConfig::default())
    }

    /// Open libnrm as described by `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInitialized`] if another `Library` is live
    /// - [`Error::Load`] or [`Error::MissingSymbol`] if loading fails
    /// - [`Error::Native`] if `nrm_init` fails now or failed earlier
    #[instrument(level = "debug", skip(config))]
    pub fn open_with(config: &LibraryConfig) -> Result<Self> {
        let path = config.resolve();
        let api = ffi::loader::load(&path)?;
        Self::from_api(api, Some(path))
    }

    /// Initialize over an already resolved function table.
    pub(crate) fn from_api(api: NrmApi, path: Option<PathBuf>) -> Result<Self> {
        LIFECYCLE.begin(&api)?;
        let defaults = ffi::read_defaults(&api);
        info!(
            path = ?path,
            uri = %defaults.uri,
            pub_port = defaults.pub_port,
            rpc_port = defaults.rpc_port,
            "libnrm initialized"
        );
        Ok(Self {
            api: Arc::new(api),
            defaults,
            path,
        })
    }

    /// Whether a `Library` is currently live in this process.
    #[must_use]
    pub fn is_live() -> bool {
        LIFECYCLE.is_live()
    }

    /// libnrm's own configuration, read right after `nrm_init`.
    #[must_use]
    pub const fn defaults(&self) -> &NativeDefaults {
        &self.defaults
    }

    /// Path the shared object was loaded from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) const fn api(&self) -> &Arc<NrmApi> {
        &self.api
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        ffi::finalize(&self.api);
        LIFECYCLE.end();
        debug!("libnrm finalized");
    }
}
