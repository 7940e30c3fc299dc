//! Per-kind native function sets for sensors, actuators, scopes and slices.
//!
//! Each opaque type implements [`RawEntity`], binding it statically to its
//! create/destroy/uuid entry points and to the client add/remove/list calls
//! for that kind. Actuator- and scope-only calls are free functions below.

use super::handle::{copy_string, NativeHandle};
use super::sys::{NrmActuator, NrmApi, NrmClient, NrmScope, NrmSensor, NrmSlice, NrmVector};
use super::vector::{drain, drain_into};
use crate::error::{check, Error, Result};
use std::ffi::{c_char, c_uint, CStr};
use tracing::warn;

/// Native function set of one entity kind.
pub trait RawEntity: Sized + 'static {
    /// Native create; null becomes [`Error::NullHandle`].
    fn create(api: &NrmApi, name: &CStr) -> Result<NativeHandle<Self>>;

    /// Native destroy. Failures are logged, never returned.
    fn destroy(api: &NrmApi, handle: NativeHandle<Self>);

    /// Native uuid accessor.
    fn uuid(api: &NrmApi, handle: &NativeHandle<Self>) -> Result<String>;

    /// `nrm_client_add_*`.
    fn add(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()>;

    /// `nrm_client_remove_*`.
    fn remove(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()>;

    /// `nrm_client_list_*`, drained into freshly owned handles.
    fn list(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<Vec<NativeHandle<Self>>>;
}

/// Drain a vector of element pointers into owned handles.
///
/// If the vector cannot be read to the end, every element already copied
/// out is destroyed before the error is returned.
///
/// # Safety
///
/// `vector` must hold pointers to objects of type `T` that the caller now
/// owns.
unsafe fn drain_handles<T: RawEntity>(
    api: &NrmApi,
    call: &'static str,
    vector: *mut NrmVector,
) -> Result<Vec<NativeHandle<T>>> {
    let mut raw: Vec<*mut T> = Vec::new();
    // SAFETY: forwarded from the caller's contract.
    let drained = unsafe { drain_into(api, call, vector, &mut raw) };
    let total = raw.len();
    let handles: Vec<_> = raw
        .into_iter()
        // SAFETY: each element is an object the list call handed over to us.
        .filter_map(|ptr| unsafe { NativeHandle::from_raw(ptr) })
        .collect();
    if handles.len() != total {
        warn!(call, skipped = total - handles.len(), "native list contained null elements");
    }
    if let Err(e) = drained {
        warn!(call, read = handles.len(), error = %e, "native list failed partway, releasing elements read");
        for handle in handles {
            T::destroy(api, handle);
        }
        return Err(e);
    }
    Ok(handles)
}

macro_rules! entity {
    (
        $raw:ty,
        create: $create:ident ($create_name:literal),
        destroy: $destroy:ident,
        uuid: $uuid:ident ($uuid_name:literal),
        add: $add:ident ($add_name:literal),
        remove: $remove:ident ($remove_name:literal),
        list: $list:ident ($list_name:literal) $(,)?
    ) => {
        impl RawEntity for $raw {
            fn create(api: &NrmApi, name: &CStr) -> Result<NativeHandle<Self>> {
                // SAFETY: name is a valid NUL-terminated string for the call.
                let ptr = unsafe { (api.$create)(name.as_ptr()) };
                // SAFETY: a non-null return is a fresh object owned by us.
                unsafe { NativeHandle::from_raw(ptr) }.ok_or(Error::null_handle($create_name))
            }

            fn destroy(api: &NrmApi, handle: NativeHandle<Self>) {
                let mut ptr = handle.into_raw();
                // SAFETY: ownership of ptr was just given up by the handle,
                // so this is the only destroy call for it.
                unsafe { (api.$destroy)(&mut ptr) };
            }

            fn uuid(api: &NrmApi, handle: &NativeHandle<Self>) -> Result<String> {
                // SAFETY: handle is live; the returned string is owned by
                // the object and copied before the object can go away.
                unsafe { copy_string($uuid_name, (api.$uuid)(handle.as_ptr())) }
            }

            fn add(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()> {
                // SAFETY: both pointers are live handles.
                check($add_name, unsafe { (api.$add)(client.as_ptr(), handle.as_ptr()) })
            }

            fn remove(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()> {
                // SAFETY: both pointers are live handles.
                check($remove_name, unsafe { (api.$remove)(client.as_ptr(), handle.as_ptr()) })
            }

            fn list(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<Vec<NativeHandle<Self>>> {
                let mut vector: *mut NrmVector = std::ptr::null_mut();
                // SAFETY: client is live; vector is a valid out-pointer.
                check($list_name, unsafe { (api.$list)(client.as_ptr(), &mut vector) })?;
                // SAFETY: a successful list call hands us a vector of
                // freshly created element pointers of this kind.
                unsafe { drain_handles(api, $list_name, vector) }
            }
        }
    };
}

entity! {
    NrmSensor,
    create: sensor_create("nrm_sensor_create"),
    destroy: sensor_destroy,
    uuid: sensor_uuid("nrm_sensor_uuid"),
    add: client_add_sensor("nrm_client_add_sensor"),
    remove: client_remove_sensor("nrm_client_remove_sensor"),
    list: client_list_sensors("nrm_client_list_sensors"),
}

entity! {
    NrmSlice,
    create: slice_create("nrm_slice_create"),
    destroy: slice_destroy,
    uuid: slice_uuid("nrm_slice_uuid"),
    add: client_add_slice("nrm_client_add_slice"),
    remove: client_remove_slice("nrm_client_remove_slice"),
    list: client_list_slices("nrm_client_list_slices"),
}

entity! {
    NrmActuator,
    create: actuator_discrete_create("nrm_actuator_discrete_create"),
    destroy: actuator_destroy,
    uuid: actuator_uuid("nrm_actuator_uuid"),
    add: client_add_actuator("nrm_client_add_actuator"),
    remove: client_remove_actuator("nrm_client_remove_actuator"),
    list: client_list_actuators("nrm_client_list_actuators"),
}

// Scopes differ: destroy takes the pointer itself and returns a code.
impl RawEntity for NrmScope {
    fn create(api: &NrmApi, name: &CStr) -> Result<NativeHandle<Self>> {
        // SAFETY: name is a valid NUL-terminated string for the call.
        let ptr = unsafe { (api.scope_create)(name.as_ptr()) };
        // SAFETY: a non-null return is a fresh object owned by us.
        unsafe { NativeHandle::from_raw(ptr) }.ok_or(Error::null_handle("nrm_scope_create"))
    }

    fn destroy(api: &NrmApi, handle: NativeHandle<Self>) {
        // SAFETY: ownership was just given up by the handle.
        let code = unsafe { (api.scope_destroy)(handle.into_raw()) };
        if let Err(e) = check("nrm_scope_destroy", code) {
            warn!(error = %e, "scope teardown reported failure");
        }
    }

    fn uuid(api: &NrmApi, handle: &NativeHandle<Self>) -> Result<String> {
        // SAFETY: handle is live; the string is copied immediately.
        unsafe { copy_string("nrm_scope_uuid", (api.scope_uuid)(handle.as_ptr())) }
    }

    fn add(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()> {
        // SAFETY: both pointers are live handles.
        check("nrm_client_add_scope", unsafe {
            (api.client_add_scope)(client.as_ptr(), handle.as_ptr())
        })
    }

    fn remove(api: &NrmApi, client: &NativeHandle<NrmClient>, handle: &NativeHandle<Self>) -> Result<()> {
        // SAFETY: both pointers are live handles.
        check("nrm_client_remove_scope", unsafe {
            (api.client_remove_scope)(client.as_ptr(), handle.as_ptr())
        })
    }

    fn list(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<Vec<NativeHandle<Self>>> {
        let mut vector: *mut NrmVector = std::ptr::null_mut();
        // SAFETY: client is live; vector is a valid out-pointer.
        check("nrm_client_list_scopes", unsafe {
            (api.client_list_scopes)(client.as_ptr(), &mut vector)
        })?;
        // SAFETY: the vector holds freshly created scope pointers.
        unsafe { drain_handles(api, "nrm_client_list_scopes", vector) }
    }
}

// ---------------------------------------------------------------------------
// Actuator-only calls
// ---------------------------------------------------------------------------

pub fn actuator_continuous_create(api: &NrmApi, name: &CStr) -> Result<NativeHandle<NrmActuator>> {
    // SAFETY: name is a valid NUL-terminated string for the call.
    let ptr = unsafe { (api.actuator_continuous_create)(name.as_ptr()) };
    // SAFETY: a non-null return is a fresh object owned by us.
    unsafe { NativeHandle::from_raw(ptr) }.ok_or(Error::null_handle("nrm_actuator_continuous_create"))
}

pub fn actuator_value(api: &NrmApi, handle: &NativeHandle<NrmActuator>) -> f64 {
    // SAFETY: handle is live.
    unsafe { (api.actuator_value)(handle.as_ptr()) }
}

pub fn actuator_choices(api: &NrmApi, handle: &NativeHandle<NrmActuator>) -> Result<Vec<f64>> {
    let mut vector: *mut NrmVector = std::ptr::null_mut();
    // SAFETY: handle is live; vector is a valid out-pointer.
    check("nrm_actuator_discrete_list_choices", unsafe {
        (api.actuator_discrete_list_choices)(handle.as_ptr(), &mut vector)
    })?;
    // SAFETY: the choices vector stores doubles by value and is ours.
    unsafe { drain::<f64>(api, "nrm_actuator_discrete_list_choices", vector) }
}

pub fn actuator_set_choices(api: &NrmApi, handle: &NativeHandle<NrmActuator>, choices: &[f64]) -> Result<()> {
    let mut owned = choices.to_vec();
    // SAFETY: handle is live; owned outlives the call and has the given
    // length. The native side copies the values.
    check("nrm_actuator_discrete_set_choices", unsafe {
        (api.actuator_discrete_set_choices)(handle.as_ptr(), owned.len(), owned.as_mut_ptr())
    })
}

pub fn actuator_set_limits(api: &NrmApi, handle: &NativeHandle<NrmActuator>, min: f64, max: f64) -> Result<()> {
    // SAFETY: handle is live.
    check("nrm_actuator_continuous_set_limits", unsafe {
        (api.actuator_continuous_set_limits)(handle.as_ptr(), min, max)
    })
}

pub fn actuator_client_id(api: &NrmApi, handle: &NativeHandle<NrmActuator>) -> Result<String> {
    // SAFETY: handle is live.
    let uuid = unsafe { (api.actuator_clientid)(handle.as_ptr()) };
    if uuid.is_null() {
        return Err(Error::null_handle("nrm_actuator_clientid"));
    }
    // SAFETY: uuid is owned by the actuator and alive while it is.
    unsafe { copy_string("nrm_uuid_to_char", (api.uuid_to_char)(uuid)) }
}

// ---------------------------------------------------------------------------
// Scope-only calls
// ---------------------------------------------------------------------------

pub fn scope_add(api: &NrmApi, scope: &NativeHandle<NrmScope>, kind: c_uint, index: c_uint) -> Result<()> {
    // SAFETY: scope is a live, owned handle.
    check("nrm_scope_add", unsafe { (api.scope_add)(scope.as_ptr(), kind, index) })
}

/// Largest description buffer tried before giving up.
const MAX_DESCRIPTION: usize = 1 << 20;

/// `nrm_scope_snprintf` on an owned scope.
pub fn scope_describe(api: &NrmApi, scope: &NativeHandle<NrmScope>) -> Result<String> {
    // SAFETY: scope is a live, owned handle.
    unsafe { describe_raw(api, scope.as_ptr()) }
}

/// `nrm_scope_snprintf`, growing the buffer until the description fits.
///
/// # Safety
///
/// `scope` must point at a live scope for the duration of the call; it may
/// be borrowed.
pub unsafe fn describe_raw(api: &NrmApi, scope: *const NrmScope) -> Result<String> {
    let mut size = 256;
    loop {
        let mut buf = vec![0 as c_char; size];
        // SAFETY: scope is live per the caller's contract; buf holds `size`
        // bytes.
        let code = unsafe { (api.scope_snprintf)(buf.as_mut_ptr(), buf.len(), scope) };
        if code == 0 {
            // SAFETY: snprintf NUL-terminates within the buffer on success.
            return unsafe { copy_string("nrm_scope_snprintf", buf.as_ptr()) };
        }
        if size >= MAX_DESCRIPTION {
            return Err(Error::native("nrm_scope_snprintf", code));
        }
        size *= 2;
    }
}

/// Uuid of a scope that may be borrowed rather than owned.
///
/// # Safety
///
/// `scope` must point at a live scope for the duration of the call.
pub unsafe fn uuid_raw(api: &NrmApi, scope: *mut NrmScope) -> Result<String> {
    // SAFETY: scope is live per the caller's contract.
    unsafe { copy_string("nrm_scope_uuid", (api.scope_uuid)(scope)) }
}
