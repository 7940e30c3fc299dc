//! Dynamic loading of libnrm.
//!
//! The shared object is opened with `libloading` and every entry point is
//! resolved up front, so a missing symbol fails [`crate::Library::open`]
//! instead of surfacing halfway through a session.

use super::sys::{NrmApi, Variables};
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Resolve one entry point.
///
/// `T` is always inferred from the matching `NrmApi` field, whose type
/// mirrors the C prototype in `nrm.h`.
fn resolve<T: Copy>(lib: &libloading::Library, name: &'static str) -> Result<T> {
    // SAFETY: the symbol is looked up by its C name and read as the
    // function-pointer type declared for it in `NrmApi`. The pointer is only
    // used while `lib` stays loaded, which `NrmApi::library` guarantees.
    let symbol = unsafe { lib.get::<T>(name.as_bytes()) }
        .map_err(|e| Error::missing_symbol(name, e.to_string()))?;
    Ok(*symbol)
}

/// Resolve the address of an exported global, or null if it is absent.
fn variable<T>(lib: &libloading::Library, name: &'static str) -> *const T {
    // SAFETY: data symbols resolve to the address of the global; the address
    // stays valid while `lib` is loaded.
    match unsafe { lib.get::<*const T>(name.as_bytes()) } {
        Ok(symbol) => *symbol,
        Err(e) => {
            debug!(symbol = name, error = %e, "global not exported, using header default");
            std::ptr::null()
        }
    }
}

/// Open the shared object at `path` and resolve the full function table.
pub fn load(path: &Path) -> Result<NrmApi> {
    debug!(path = %path.display(), "loading libnrm");
    // SAFETY: loading runs the library's initializers. libnrm has no
    // load-time side effects beyond static initialization.
    let lib = unsafe { libloading::Library::new(path) }
        .map_err(|e| Error::load(path.display().to_string(), e.to_string()))?;

    let variables = Variables {
        upstream_uri: variable::<*const std::ffi::c_char>(&lib, "nrm_upstream_uri"),
        upstream_pub_port: variable::<std::ffi::c_uint>(&lib, "nrm_upstream_pub_port"),
        upstream_rpc_port: variable::<std::ffi::c_uint>(&lib, "nrm_upstream_rpc_port"),
        ratelimit: variable::<std::ffi::c_ulonglong>(&lib, "nrm_ratelimit"),
        transmit: variable::<std::ffi::c_int>(&lib, "nrm_transmit"),
        timeout: variable::<std::ffi::c_uint>(&lib, "nrm_timeout"),
    };

    Ok(NrmApi {
        init: resolve(&lib, "nrm_init")?,
        finalize: resolve(&lib, "nrm_finalize")?,
        client_create: resolve(&lib, "nrm_client_create")?,
        client_destroy: resolve(&lib, "nrm_client_destroy")?,
        client_add_sensor: resolve(&lib, "nrm_client_add_sensor")?,
        client_add_actuator: resolve(&lib, "nrm_client_add_actuator")?,
        client_add_scope: resolve(&lib, "nrm_client_add_scope")?,
        client_add_slice: resolve(&lib, "nrm_client_add_slice")?,
        client_list_sensors: resolve(&lib, "nrm_client_list_sensors")?,
        client_list_actuators: resolve(&lib, "nrm_client_list_actuators")?,
        client_list_scopes: resolve(&lib, "nrm_client_list_scopes")?,
        client_list_slices: resolve(&lib, "nrm_client_list_slices")?,
        client_remove_sensor: resolve(&lib, "nrm_client_remove_sensor")?,
        client_remove_actuator: resolve(&lib, "nrm_client_remove_actuator")?,
        client_remove_scope: resolve(&lib, "nrm_client_remove_scope")?,
        client_remove_slice: resolve(&lib, "nrm_client_remove_slice")?,
        client_send_event: resolve(&lib, "nrm_client_send_event")?,
        client_actuate: resolve(&lib, "nrm_client_actuate")?,
        client_send_exit: resolve(&lib, "nrm_client_send_exit")?,
        client_send_tick: resolve(&lib, "nrm_client_send_tick")?,
        client_set_event_listener: resolve(&lib, "nrm_client_set_event_listener")?,
        client_start_event_listener: resolve(&lib, "nrm_client_start_event_listener")?,
        client_set_actuate_listener: resolve(&lib, "nrm_client_set_actuate_listener")?,
        client_start_actuate_listener: resolve(&lib, "nrm_client_start_actuate_listener")?,
        sensor_create: resolve(&lib, "nrm_sensor_create")?,
        sensor_destroy: resolve(&lib, "nrm_sensor_destroy")?,
        sensor_uuid: resolve(&lib, "nrm_sensor_uuid")?,
        slice_create: resolve(&lib, "nrm_slice_create")?,
        slice_destroy: resolve(&lib, "nrm_slice_destroy")?,
        slice_uuid: resolve(&lib, "nrm_slice_uuid")?,
        scope_create: resolve(&lib, "nrm_scope_create")?,
        scope_destroy: resolve(&lib, "nrm_scope_destroy")?,
        scope_uuid: resolve(&lib, "nrm_scope_uuid")?,
        scope_add: resolve(&lib, "nrm_scope_add")?,
        scope_snprintf: resolve(&lib, "nrm_scope_snprintf")?,
        actuator_discrete_create: resolve(&lib, "nrm_actuator_discrete_create")?,
        actuator_continuous_create: resolve(&lib, "nrm_actuator_continuous_create")?,
        actuator_destroy: resolve(&lib, "nrm_actuator_destroy")?,
        actuator_uuid: resolve(&lib, "nrm_actuator_uuid")?,
        actuator_value: resolve(&lib, "nrm_actuator_value")?,
        actuator_clientid: resolve(&lib, "nrm_actuator_clientid")?,
        actuator_discrete_list_choices: resolve(&lib, "nrm_actuator_discrete_list_choices")?,
        actuator_discrete_set_choices: resolve(&lib, "nrm_actuator_discrete_set_choices")?,
        actuator_continuous_set_limits: resolve(&lib, "nrm_actuator_continuous_set_limits")?,
        uuid_to_char: resolve(&lib, "nrm_uuid_to_char")?,
        string_fromchar: resolve(&lib, "nrm_string_fromchar")?,
        string_decref: resolve(&lib, "nrm_string_decref")?,
        vector_length: resolve(&lib, "nrm_vector_length")?,
        vector_get: resolve(&lib, "nrm_vector_get")?,
        vector_destroy: resolve(&lib, "nrm_vector_destroy")?,
        variables,
        library: Some(lib),
    })
}
