//! `nrm_client_*` calls that are not tied to one entity kind.

use super::handle::{c_string, NativeHandle};
use super::sys::{ActuateListenerFn, EventListenerFn, NrmActuator, NrmApi, NrmClient, NrmScope, NrmSensor, NrmTime};
use crate::error::{check, Error, Result};
use std::ffi::CStr;

pub fn create(api: &NrmApi, uri: &CStr, pub_port: i32, rpc_port: i32) -> Result<NativeHandle<NrmClient>> {
    let mut ptr: *mut NrmClient = std::ptr::null_mut();
    // SAFETY: ptr is a valid out-pointer and uri is NUL-terminated.
    check("nrm_client_create", unsafe {
        (api.client_create)(&mut ptr, uri.as_ptr(), pub_port, rpc_port)
    })?;
    // SAFETY: on success the out-pointer holds a client we now own.
    unsafe { NativeHandle::from_raw(ptr) }.ok_or(Error::null_handle("nrm_client_create"))
}

/// `nrm_client_destroy`. Joins the native listener threads before freeing.
pub fn destroy(api: &NrmApi, client: NativeHandle<NrmClient>) {
    let mut ptr = client.into_raw();
    // SAFETY: ownership was just given up by the handle, so this is the only
    // destroy for this client.
    unsafe { (api.client_destroy)(&mut ptr) };
}

pub fn send_event(
    api: &NrmApi,
    client: &NativeHandle<NrmClient>,
    time: NrmTime,
    sensor: &NativeHandle<NrmSensor>,
    scope: &NativeHandle<NrmScope>,
    value: f64,
) -> Result<()> {
    // SAFETY: every pointer is a live handle.
    check("nrm_client_send_event", unsafe {
        (api.client_send_event)(client.as_ptr(), time, sensor.as_ptr(), scope.as_ptr(), value)
    })
}

pub fn actuate(
    api: &NrmApi,
    client: &NativeHandle<NrmClient>,
    actuator: &NativeHandle<NrmActuator>,
    value: f64,
) -> Result<()> {
    // SAFETY: both pointers are live handles.
    check("nrm_client_actuate", unsafe {
        (api.client_actuate)(client.as_ptr(), actuator.as_ptr(), value)
    })
}

pub fn send_exit(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<()> {
    // SAFETY: client is live.
    check("nrm_client_send_exit", unsafe { (api.client_send_exit)(client.as_ptr()) })
}

pub fn send_tick(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<()> {
    // SAFETY: client is live.
    check("nrm_client_send_tick", unsafe { (api.client_send_tick)(client.as_ptr()) })
}

pub fn set_event_listener(api: &NrmApi, client: &NativeHandle<NrmClient>, f: EventListenerFn) -> Result<()> {
    // SAFETY: client is live; f is a plain `extern "C"` function with
    // static lifetime.
    check("nrm_client_set_event_listener", unsafe {
        (api.client_set_event_listener)(client.as_ptr(), f)
    })
}

pub fn start_event_listener(api: &NrmApi, client: &NativeHandle<NrmClient>, topic: &str) -> Result<()> {
    let topic = c_string("topic", topic)?;
    // SAFETY: topic is NUL-terminated; the result is a fresh nrm_string_t
    // carrying one reference that is released below.
    let native_topic = unsafe { (api.string_fromchar)(topic.as_ptr()) };
    if native_topic.is_null() {
        return Err(Error::null_handle("nrm_string_fromchar"));
    }
    // SAFETY: client is live; the listener takes its own reference to the
    // topic if it keeps it.
    let code = unsafe { (api.client_start_event_listener)(client.as_ptr(), native_topic) };
    // SAFETY: drops the reference taken by nrm_string_fromchar above.
    unsafe { (api.string_decref)(native_topic) };
    check("nrm_client_start_event_listener", code)
}

pub fn set_actuate_listener(api: &NrmApi, client: &NativeHandle<NrmClient>, f: ActuateListenerFn) -> Result<()> {
    // SAFETY: client is live; f has static lifetime.
    check("nrm_client_set_actuate_listener", unsafe {
        (api.client_set_actuate_listener)(client.as_ptr(), f)
    })
}

pub fn start_actuate_listener(api: &NrmApi, client: &NativeHandle<NrmClient>) -> Result<()> {
    // SAFETY: client is live.
    check("nrm_client_start_actuate_listener", unsafe {
        (api.client_start_actuate_listener)(client.as_ptr())
    })
}
