//! Raw libnrm ABI: opaque types, `nrm_time_t`, and the function table.
//!
//! Nothing in here is called directly by the public modules. The table is
//! filled either by the dynamic loader ([`super::loader`]) or, in tests, by
//! the in-process fake native layer.

use std::ffi::{c_char, c_double, c_int, c_long, c_uint, c_ulonglong, c_void};

macro_rules! opaque {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            pub struct $name {
                _data: [u8; 0],
                _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
            }
        )*
    };
}

opaque! {
    /// `nrm_client_t`.
    NrmClient;
    /// `nrm_sensor_t`.
    NrmSensor;
    /// `nrm_actuator_t`.
    NrmActuator;
    /// `nrm_scope_t`.
    NrmScope;
    /// `nrm_slice_t`.
    NrmSlice;
    /// `nrm_vector_t`.
    NrmVector;
    /// `nrm_uuid_t`.
    NrmUuid;
}

/// `nrm_string_t`: a reference-counted, NUL-terminated string.
pub type NrmString = *mut c_char;

/// `nrm_time_t`, which is `struct timespec`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NrmTime {
    pub tv_sec: c_long,
    pub tv_nsec: c_long,
}

/// `nrm_client_event_listener_fn`.
pub type EventListenerFn =
    extern "C" fn(sensor_uuid: NrmString, time: NrmTime, scope: *mut NrmScope, value: c_double) -> c_int;

/// `nrm_client_actuate_listener_fn`.
pub type ActuateListenerFn = extern "C" fn(uuid: *mut NrmUuid, value: c_double) -> c_int;

/// Pointers to the process-wide configuration globals.
///
/// Any of them may be null when the loaded library does not export the
/// symbol.
#[derive(Debug, Clone, Copy)]
pub struct Variables {
    pub upstream_uri: *const *const c_char,
    pub upstream_pub_port: *const c_uint,
    pub upstream_rpc_port: *const c_uint,
    pub ratelimit: *const c_ulonglong,
    pub transmit: *const c_int,
    pub timeout: *const c_uint,
}

impl Variables {
    pub const fn missing() -> Self {
        Self {
            upstream_uri: std::ptr::null(),
            upstream_pub_port: std::ptr::null(),
            upstream_rpc_port: std::ptr::null(),
            ratelimit: std::ptr::null(),
            transmit: std::ptr::null(),
            timeout: std::ptr::null(),
        }
    }
}

/// Every libnrm entry point this crate consumes.
///
/// Built once per [`crate::Library`] and read-only afterwards.
pub struct NrmApi {
    // library lifecycle
    pub init: unsafe extern "C" fn(argc: *mut c_int, argv: *mut *mut *mut c_char) -> c_int,
    pub finalize: unsafe extern "C" fn() -> c_int,

    // client
    pub client_create: unsafe extern "C" fn(
        client: *mut *mut NrmClient,
        uri: *const c_char,
        pub_port: c_int,
        rpc_port: c_int,
    ) -> c_int,
    pub client_destroy: unsafe extern "C" fn(client: *mut *mut NrmClient),
    pub client_add_sensor: unsafe extern "C" fn(*mut NrmClient, *mut NrmSensor) -> c_int,
    pub client_add_actuator: unsafe extern "C" fn(*mut NrmClient, *mut NrmActuator) -> c_int,
    pub client_add_scope: unsafe extern "C" fn(*mut NrmClient, *mut NrmScope) -> c_int,
    pub client_add_slice: unsafe extern "C" fn(*mut NrmClient, *mut NrmSlice) -> c_int,
    pub client_list_sensors: unsafe extern "C" fn(*mut NrmClient, *mut *mut NrmVector) -> c_int,
    pub client_list_actuators: unsafe extern "C" fn(*mut NrmClient, *mut *mut NrmVector) -> c_int,
    pub client_list_scopes: unsafe extern "C" fn(*mut NrmClient, *mut *mut NrmVector) -> c_int,
    pub client_list_slices: unsafe extern "C" fn(*mut NrmClient, *mut *mut NrmVector) -> c_int,
    pub client_remove_sensor: unsafe extern "C" fn(*mut NrmClient, *mut NrmSensor) -> c_int,
    pub client_remove_actuator: unsafe extern "C" fn(*mut NrmClient, *mut NrmActuator) -> c_int,
    pub client_remove_scope: unsafe extern "C" fn(*mut NrmClient, *mut NrmScope) -> c_int,
    pub client_remove_slice: unsafe extern "C" fn(*mut NrmClient, *mut NrmSlice) -> c_int,
    pub client_send_event: unsafe extern "C" fn(
        client: *mut NrmClient,
        time: NrmTime,
        sensor: *mut NrmSensor,
        scope: *mut NrmScope,
        value: c_double,
    ) -> c_int,
    pub client_actuate:
        unsafe extern "C" fn(client: *mut NrmClient, actuator: *mut NrmActuator, value: c_double) -> c_int,
    pub client_send_exit: unsafe extern "C" fn(*mut NrmClient) -> c_int,
    pub client_send_tick: unsafe extern "C" fn(*mut NrmClient) -> c_int,
    pub client_set_event_listener: unsafe extern "C" fn(*mut NrmClient, EventListenerFn) -> c_int,
    pub client_start_event_listener: unsafe extern "C" fn(*mut NrmClient, NrmString) -> c_int,
    pub client_set_actuate_listener: unsafe extern "C" fn(*mut NrmClient, ActuateListenerFn) -> c_int,
    pub client_start_actuate_listener: unsafe extern "C" fn(*mut NrmClient) -> c_int,

    // sensors
    pub sensor_create: unsafe extern "C" fn(name: *const c_char) -> *mut NrmSensor,
    pub sensor_destroy: unsafe extern "C" fn(*mut *mut NrmSensor),
    pub sensor_uuid: unsafe extern "C" fn(*mut NrmSensor) -> NrmString,

    // slices
    pub slice_create: unsafe extern "C" fn(name: *const c_char) -> *mut NrmSlice,
    pub slice_destroy: unsafe extern "C" fn(*mut *mut NrmSlice),
    pub slice_uuid: unsafe extern "C" fn(*mut NrmSlice) -> NrmString,

    // scopes
    pub scope_create: unsafe extern "C" fn(name: *const c_char) -> *mut NrmScope,
    pub scope_destroy: unsafe extern "C" fn(*mut NrmScope) -> c_int,
    pub scope_uuid: unsafe extern "C" fn(*mut NrmScope) -> NrmString,
    pub scope_add: unsafe extern "C" fn(*mut NrmScope, kind: c_uint, num: c_uint) -> c_int,
    pub scope_snprintf:
        unsafe extern "C" fn(buf: *mut c_char, bufsize: usize, scope: *const NrmScope) -> c_int,

    // actuators
    pub actuator_discrete_create: unsafe extern "C" fn(name: *const c_char) -> *mut NrmActuator,
    pub actuator_continuous_create: unsafe extern "C" fn(name: *const c_char) -> *mut NrmActuator,
    pub actuator_destroy: unsafe extern "C" fn(*mut *mut NrmActuator),
    pub actuator_uuid: unsafe extern "C" fn(*mut NrmActuator) -> NrmString,
    pub actuator_value: unsafe extern "C" fn(*mut NrmActuator) -> c_double,
    pub actuator_clientid: unsafe extern "C" fn(*mut NrmActuator) -> *mut NrmUuid,
    pub actuator_discrete_list_choices:
        unsafe extern "C" fn(*mut NrmActuator, *mut *mut NrmVector) -> c_int,
    pub actuator_discrete_set_choices:
        unsafe extern "C" fn(*mut NrmActuator, len: usize, choices: *mut c_double) -> c_int,
    pub actuator_continuous_set_limits:
        unsafe extern "C" fn(*mut NrmActuator, min: c_double, max: c_double) -> c_int,

    // utilities
    pub uuid_to_char: unsafe extern "C" fn(*mut NrmUuid) -> *const c_char,
    pub string_fromchar: unsafe extern "C" fn(*const c_char) -> NrmString,
    pub string_decref: unsafe extern "C" fn(NrmString),
    pub vector_length: unsafe extern "C" fn(*const NrmVector, *mut usize) -> c_int,
    pub vector_get: unsafe extern "C" fn(*const NrmVector, usize, *mut *mut c_void) -> c_int,
    pub vector_destroy: unsafe extern "C" fn(*mut *mut NrmVector),

    pub variables: Variables,

    /// Keeps the shared object mapped for as long as the pointers above are
    /// in use. `None` when the table points at in-process functions.
    pub library: Option<libloading::Library>,
}

// SAFETY: the table only holds function pointers and addresses of
// process-wide globals that live as long as the loaded library, which the
// owning `Library` keeps mapped. Nothing in it is mutated after
// construction.
unsafe impl Send for NrmApi {}
// SAFETY: see above; all access is read-only.
unsafe impl Sync for NrmApi {}

impl std::fmt::Debug for NrmApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NrmApi").finish_non_exhaustive()
    }
}
