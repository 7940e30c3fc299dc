//! Fixed `extern "C"` entry points handed to the native listener threads.
//!
//! libnrm's listener callbacks carry no user-data pointer, so the Rust
//! listener a trampoline forwards to lives in a process-wide slot, one for
//! events and one for actuation requests. A slot belongs to the client that
//! filled it until that client releases it: the owner may swap in a new
//! listener, any other client is refused. A client releases its slots on
//! teardown, after `nrm_client_destroy` has joined the native threads, so no
//! trampoline can observe a released listener.
//!
//! Nothing raised inside a trampoline crosses back into the native thread:
//! conversion errors, listener errors and panics all become a logged
//! failure code.

use super::entity::{describe_raw, uuid_raw};
use super::handle::copy_string;
use super::sys::{NrmApi, NrmScope, NrmString, NrmTime, NrmUuid};
use crate::error::{Error, ErrorKind, Result};
use crate::listener::{ActuateListener, ActuateRequest, Event, EventListener, ListenerResult};
use crate::scope::{ScopeSnapshot, ScopeTopology};
use crate::time::Timestamp;
use std::any::Any;
use std::ffi::{c_double, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, trace, warn};

/// Returned to the native thread when a notification was handled.
const HANDLED: c_int = 0;
/// Returned to the native thread for every kind of failure.
const FAILED: c_int = ErrorKind::Failure.native_code();

struct Slot<L: ?Sized> {
    owner: u64,
    api: Arc<NrmApi>,
    listener: Arc<L>,
}

type SlotCell<L> = RwLock<Option<Slot<L>>>;

static EVENT_SLOT: SlotCell<dyn EventListener> = RwLock::new(None);
static ACTUATE_SLOT: SlotCell<dyn ActuateListener> = RwLock::new(None);

fn install<L: ?Sized>(
    cell: &SlotCell<L>,
    name: &'static str,
    owner: u64,
    api: Arc<NrmApi>,
    listener: Arc<L>,
) -> Result<()> {
    let mut slot = cell.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(holder) = slot.as_ref() {
        if holder.owner != owner {
            warn!(listener = name, holder = holder.owner, owner, "listener slot held by another client");
            return Err(Error::ListenerTaken {
                listener: name,
                owner: holder.owner,
            });
        }
    }
    *slot = Some(Slot { owner, api, listener });
    debug!(listener = name, owner, "listener installed");
    Ok(())
}

fn release<L: ?Sized>(cell: &SlotCell<L>, name: &'static str, owner: u64) -> bool {
    let mut slot = cell.write().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().is_some_and(|s| s.owner == owner) {
        *slot = None;
        debug!(listener = name, owner, "listener released");
        true
    } else {
        false
    }
}

fn current<L: ?Sized>(cell: &SlotCell<L>) -> Option<(Arc<NrmApi>, Arc<L>)> {
    let slot = cell.read().unwrap_or_else(PoisonError::into_inner);
    slot.as_ref()
        .map(|s| (Arc::clone(&s.api), Arc::clone(&s.listener)))
}

fn owned_by<L: ?Sized>(cell: &SlotCell<L>) -> Option<u64> {
    cell.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|s| s.owner)
}

/// Make `listener` the process-wide event listener.
///
/// # Errors
///
/// [`Error::ListenerTaken`] if a client other than `owner` holds the slot.
pub fn install_event(owner: u64, api: Arc<NrmApi>, listener: Arc<dyn EventListener>) -> Result<()> {
    install(&EVENT_SLOT, "event", owner, api, listener)
}

/// Make `listener` the process-wide actuate listener.
///
/// # Errors
///
/// [`Error::ListenerTaken`] if a client other than `owner` holds the slot.
pub fn install_actuate(owner: u64, api: Arc<NrmApi>, listener: Arc<dyn ActuateListener>) -> Result<()> {
    install(&ACTUATE_SLOT, "actuate", owner, api, listener)
}

/// Clear the event slot if `owner` still holds it.
pub fn release_event(owner: u64) -> bool {
    release(&EVENT_SLOT, "event", owner)
}

/// Clear the actuate slot if `owner` still holds it.
pub fn release_actuate(owner: u64) -> bool {
    release(&ACTUATE_SLOT, "actuate", owner)
}

/// Client id currently holding the event slot.
pub fn event_owner() -> Option<u64> {
    owned_by(&EVENT_SLOT)
}

/// Client id currently holding the actuate slot.
pub fn actuate_owner() -> Option<u64> {
    owned_by(&ACTUATE_SLOT)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Run `f`, turning a panic into [`FAILED`].
fn ffi_boundary(listener: &'static str, f: impl FnOnce() -> c_int) -> c_int {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => code,
        Err(payload) => {
            error!(listener, panic = panic_message(payload.as_ref()), "listener panicked");
            FAILED
        }
    }
}

fn outcome(listener: &'static str, result: ListenerResult) -> c_int {
    match result {
        Ok(()) => HANDLED,
        Err(e) => {
            warn!(listener, error = %e, "listener reported failure");
            FAILED
        }
    }
}

/// Build an owned [`Event`] from the borrowed native arguments.
///
/// # Safety
///
/// `sensor_uuid` and `scope` must be null or live for the duration of the
/// call.
unsafe fn event_from_native(
    api: &NrmApi,
    sensor_uuid: NrmString,
    time: NrmTime,
    scope: *mut NrmScope,
    value: f64,
) -> Result<Event> {
    // SAFETY: the native thread keeps the string alive for this call.
    let sensor_uuid = unsafe { copy_string("event sensor uuid", sensor_uuid) }?;
    let time = Timestamp::from_native(time)?;
    if scope.is_null() {
        return Err(Error::null_handle("event scope"));
    }
    // SAFETY: non-null and borrowed for this call only; both reads copy.
    let uuid = unsafe { uuid_raw(api, scope) }?;
    // SAFETY: as above.
    let topology: ScopeTopology = unsafe { describe_raw(api, scope) }?.parse()?;
    Ok(Event {
        sensor_uuid,
        time,
        scope: ScopeSnapshot { uuid, topology },
        value,
    })
}

/// Registered with `nrm_client_set_event_listener`.
pub extern "C" fn event_trampoline(
    sensor_uuid: NrmString,
    time: NrmTime,
    scope: *mut NrmScope,
    value: c_double,
) -> c_int {
    ffi_boundary("event", || {
        let Some((api, listener)) = current(&EVENT_SLOT) else {
            warn!("event received with no listener installed");
            return FAILED;
        };
        // SAFETY: the native listener thread owns every argument until this
        // function returns.
        let event = match unsafe { event_from_native(&api, sensor_uuid, time, scope, value) } {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "dropping malformed event");
                return FAILED;
            }
        };
        trace!(sensor = %event.sensor_uuid, value = event.value, "dispatching event");
        outcome("event", listener.on_event(event))
    })
}

/// Registered with `nrm_client_set_actuate_listener`.
pub extern "C" fn actuate_trampoline(uuid: *mut NrmUuid, value: c_double) -> c_int {
    ffi_boundary("actuate", || {
        let Some((api, listener)) = current(&ACTUATE_SLOT) else {
            warn!("actuation request received with no listener installed");
            return FAILED;
        };
        if uuid.is_null() {
            error!("dropping actuation request without actuator uuid");
            return FAILED;
        }
        // SAFETY: uuid is non-null and owned by the native thread for this
        // call; the string is copied before returning.
        let actuator_uuid = match unsafe { copy_string("nrm_uuid_to_char", (api.uuid_to_char)(uuid)) } {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "dropping malformed actuation request");
                return FAILED;
            }
        };
        trace!(actuator = %actuator_uuid, value, "dispatching actuation request");
        outcome("actuate", listener.on_actuate(ActuateRequest { actuator_uuid, value }))
    })
}
