//! Owned sensors, actuators, scopes and slices.
//!
//! [`ResourceHandle`] wraps one native object of a given [`Kind`]. The kind
//! binds the handle, at compile time, to the native create/destroy/uuid
//! functions of that entity and to the client add/list/remove calls for it.
//!
//! A handle runs its native destroy exactly once: on [`ResourceHandle::destroy`]
//! or on drop, whichever happens first. After that the handle is consumed and
//! every further operation returns [`Error::Consumed`].
//!
//! Handles returned by `Client::list_*` are independent copies; destroying
//! one never affects the daemon's record or other handles.

use crate::error::{Error, Result};
use crate::ffi::entity::{self, RawEntity};
use crate::ffi::handle::{c_string, NativeHandle};
use crate::ffi::sys::{NrmActuator, NrmScope, NrmSensor, NrmSlice};
use crate::library::Library;
use crate::scope::{ScopeResource, ScopeSnapshot, ScopeTopology};
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, instrument};

mod sealed {
    pub trait Sealed {}
}

/// An entity kind managed by the daemon.
///
/// Sealed: the set of kinds is fixed by libnrm.
#[allow(private_bounds)]
pub trait Kind: sealed::Sealed + 'static {
    /// Native object type.
    #[doc(hidden)]
    type Raw: RawEntity;
    /// Lowercase name used in logs and errors.
    const NAME: &'static str;
}

macro_rules! kind {
    ($(#[$meta:meta])* $name:ident => $raw:ty, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {}

        impl sealed::Sealed for $name {}

        impl Kind for $name {
            type Raw = $raw;
            const NAME: &'static str = $label;
        }
    };
}

kind! {
    /// A telemetry source.
    Sensor => NrmSensor, "sensor"
}
kind! {
    /// A control knob the daemon can set.
    Actuator => NrmActuator, "actuator"
}
kind! {
    /// A set of CPUs, NUMA nodes and GPUs.
    Scope => NrmScope, "scope"
}
kind! {
    /// A group of processes managed together.
    Slice => NrmSlice, "slice"
}

/// An owned native object of kind `K`.
pub struct ResourceHandle<'lib, K: Kind> {
    lib: &'lib Library,
    raw: Option<NativeHandle<K::Raw>>,
    _kind: PhantomData<K>,
}

/// An owned sensor.
pub type SensorHandle<'lib> = ResourceHandle<'lib, Sensor>;
/// An owned actuator.
pub type ActuatorHandle<'lib> = ResourceHandle<'lib, Actuator>;
/// An owned scope.
pub type ScopeHandle<'lib> = ResourceHandle<'lib, Scope>;
/// An owned slice.
pub type SliceHandle<'lib> = ResourceHandle<'lib, Slice>;

impl<'lib, K: Kind> ResourceHandle<'lib, K> {
    /// Create a new native object named `name`.
    ///
    /// For actuators this creates a discrete actuator; see
    /// [`ActuatorHandle::create_continuous`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `name` contains a NUL byte,
    /// [`Error::NullHandle`] if the native create returns nothing.
    #[instrument(level = "debug", skip(lib), fields(kind = K::NAME))]
    pub fn create(lib: &'lib Library, name: &str) -> Result<Self> {
        let name = c_string("name", name)?;
        let raw = K::Raw::create(lib.api(), &name)?;
        debug!(kind = K::NAME, ?raw, "created");
        Ok(Self::from_native(lib, raw))
    }

    pub(crate) const fn from_native(lib: &'lib Library, raw: NativeHandle<K::Raw>) -> Self {
        Self {
            lib,
            raw: Some(raw),
            _kind: PhantomData,
        }
    }

    pub(crate) fn native(&self) -> Result<&NativeHandle<K::Raw>> {
        self.raw.as_ref().ok_or(Error::consumed(K::NAME))
    }

    /// The object's uuid.
    ///
    /// # Errors
    ///
    /// [`Error::Consumed`] after destroy, [`Error::InvalidString`] if the
    /// native uuid is missing or not UTF-8.
    pub fn uuid(&self) -> Result<String> {
        K::Raw::uuid(self.lib.api(), self.native()?)
    }

    /// Run the native destroy now. Later calls do nothing.
    pub fn destroy(&mut self) {
        if let Some(raw) = self.raw.take() {
            debug!(kind = K::NAME, ?raw, "destroying");
            K::Raw::destroy(self.lib.api(), raw);
        }
    }

    /// Whether the native object has been destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.raw.is_none()
    }
}

impl<K: Kind> Drop for ResourceHandle<'_, K> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<K: Kind> fmt::Debug for ResourceHandle<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ResourceHandle");
        s.field("kind", &K::NAME);
        match &self.raw {
            Some(raw) => s.field("raw", raw),
            None => s.field("raw", &"destroyed"),
        };
        s.finish()
    }
}

impl<'lib> ResourceHandle<'lib, Actuator> {
    /// Create a continuous actuator, whose value may be anything within its
    /// limits.
    ///
    /// # Errors
    ///
    /// As for [`ResourceHandle::create`].
    #[instrument(level = "debug", skip(lib))]
    pub fn create_continuous(lib: &'lib Library, name: &str) -> Result<Self> {
        let name = c_string("name", name)?;
        let raw = entity::actuator_continuous_create(lib.api(), &name)?;
        Ok(Self::from_native(lib, raw))
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// [`Error::Consumed`] after destroy.
    pub fn value(&self) -> Result<f64> {
        Ok(entity::actuator_value(self.lib.api(), self.native()?))
    }

    /// Permitted values of a discrete actuator, in native order.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the actuator is not discrete.
    pub fn choices(&self) -> Result<Vec<f64>> {
        entity::actuator_choices(self.lib.api(), self.native()?)
    }

    /// Replace the permitted values of a discrete actuator.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the actuator is not discrete.
    pub fn set_choices(&mut self, choices: &[f64]) -> Result<()> {
        entity::actuator_set_choices(self.lib.api(), self.native()?, choices)
    }

    /// Set the range of a continuous actuator.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if `min > max` or either bound is NaN;
    /// [`Error::Native`] if the actuator is not continuous.
    pub fn set_limits(&mut self, min: f64, max: f64) -> Result<()> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(Error::invalid_input(format!("actuator limits [{min}, {max}] are empty")));
        }
        entity::actuator_set_limits(self.lib.api(), self.native()?, min, max)
    }

    /// Uuid of the client that registered this actuator with the daemon.
    ///
    /// # Errors
    ///
    /// [`Error::NullHandle`] if the actuator was never registered.
    pub fn client_id(&self) -> Result<String> {
        entity::actuator_client_id(self.lib.api(), self.native()?)
    }
}

impl ResourceHandle<'_, Scope> {
    /// Add one resource index to the scope.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if libnrm rejects the index.
    pub fn add(&mut self, resource: ScopeResource, index: u32) -> Result<()> {
        entity::scope_add(self.lib.api(), self.native()?, resource.native_type(), index)
    }

    /// Add several indices of one resource class.
    ///
    /// # Errors
    ///
    /// Stops at the first index libnrm rejects.
    pub fn add_all(&mut self, resource: ScopeResource, indices: impl IntoIterator<Item = u32>) -> Result<()> {
        indices
            .into_iter()
            .try_for_each(|index| self.add(resource, index))
    }

    /// Resources the scope covers.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidString`] if the native description cannot be parsed.
    pub fn topology(&self) -> Result<ScopeTopology> {
        entity::scope_describe(self.lib.api(), self.native()?)?.parse()
    }

    /// Owned copy of uuid and topology.
    ///
    /// # Errors
    ///
    /// As for [`ResourceHandle::uuid`] and [`ScopeHandle::topology`].
    pub fn snapshot(&self) -> Result<ScopeSnapshot> {
        Ok(ScopeSnapshot {
            uuid: self.uuid()?,
            topology: self.topology()?,
        })
    }

    /// `{"uuid", "cpu", "numa", "gpu"}` JSON rendering of the scope.
    ///
    /// # Errors
    ///
    /// As for [`ScopeHandle::snapshot`].
    pub fn to_json(&self) -> Result<String> {
        let snapshot = self.snapshot()?;
        snapshot.topology.to_json(&snapshot.uuid)
    }
}
