//! Wall-clock timestamps exchanged with the daemon.
//!
//! The native layer uses `nrm_time_t` (a `struct timespec` taken from
//! `CLOCK_REALTIME`). [`Timestamp`] is its host-side counterpart: a duration
//! since the Unix epoch.

use crate::error::{Error, Result};
use crate::ffi::sys::NrmTime;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point in time, as nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(Duration::ZERO);

    /// The current wall-clock time.
    ///
    /// A clock set before 1970 reads as [`Timestamp::EPOCH`].
    #[must_use]
    pub fn now() -> Self {
        Self(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    /// Build from nanoseconds since the epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(Duration::from_nanos(nanos))
    }

    /// Build from a duration since the epoch.
    #[must_use]
    pub const fn from_duration(since_epoch: Duration) -> Self {
        Self(since_epoch)
    }

    /// Nanoseconds since the epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> u128 {
        self.0.as_nanos()
    }

    /// Duration since the epoch.
    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    /// Convert to a [`SystemTime`].
    #[must_use]
    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.0
    }

    /// Convert to the native `nrm_time_t` layout.
    pub(crate) fn to_native(self) -> Result<NrmTime> {
        let tv_sec = self
            .0
            .as_secs()
            .try_into()
            .map_err(|_| Error::invalid_input(format!("timestamp {self} does not fit nrm_time_t")))?;
        Ok(NrmTime {
            tv_sec,
            tv_nsec: self.0.subsec_nanos().into(),
        })
    }

    /// Convert from the native layout, rejecting pre-epoch or malformed
    /// values.
    pub(crate) fn from_native(time: NrmTime) -> Result<Self> {
        let sec = i64::from(time.tv_sec);
        let nsec = i64::from(time.tv_nsec);
        if sec < 0 || !(0..NANOS_PER_SEC).contains(&nsec) {
            return Err(Error::invalid_input(format!(
                "malformed nrm_time_t {{ tv_sec: {sec}, tv_nsec: {nsec} }}"
            )));
        }
        // Both checked non-negative above.
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let duration = Duration::new(sec as u64, nsec as u32);
        Ok(Self(duration))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(time.duration_since(UNIX_EPOCH).unwrap_or_default())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0.as_secs(), self.0.subsec_nanos())
    }
}
