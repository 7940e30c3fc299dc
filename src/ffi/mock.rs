//! In-process fake libnrm for unit tests.
//!
//! Every entry point of [`NrmApi`] is implemented here as an `extern "C"`
//! function over plain Rust objects. Each client gets a private fake daemon
//! (so tests do not see each other's sensors) and a real background thread
//! that plays the native listener thread: notifications queued by
//! `send_event`/`actuate` are delivered from that thread through whatever
//! callback the client registered.
//!
//! Objects whose name starts with [`REJECT_PREFIX`] are refused by every
//! `nrm_client_add_*`, which lets tests drive the failed-add path.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::float_cmp,
    clippy::undocumented_unsafe_blocks,
    missing_docs
)]

use super::sys::{
    ActuateListenerFn, EventListenerFn, NrmActuator, NrmApi, NrmClient, NrmScope, NrmSensor, NrmSlice, NrmString,
    NrmTime, NrmUuid, NrmVector, Variables,
};
use crate::library::Library;
use std::collections::HashMap;
use std::ffi::{c_char, c_double, c_int, c_uint, c_ulonglong, c_void, CStr, CString};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;

pub const URI: &str = "tcp://mock.nrm";
pub const PUB_PORT: u16 = 12345;
pub const RPC_PORT: u16 = 12346;
pub const RATELIMIT: u64 = 5_000;
pub const TIMEOUT: u32 = 250;

/// Names with this prefix are rejected by `nrm_client_add_*`.
pub const REJECT_PREFIX: &str = "reject-";

const EINVAL: c_int = -3;
const EDOM: c_int = -4;
const ENOTFOUND: c_int = -8;

// ---------------------------------------------------------------------------
// Exported globals
// ---------------------------------------------------------------------------

#[repr(transparent)]
struct SyncPtr(*const c_char);

// SAFETY: points at an immutable static byte string.
unsafe impl Sync for SyncPtr {}

static URI_PTR: SyncPtr = SyncPtr(b"tcp://mock.nrm\0".as_ptr().cast());
static PUB_PORT_VAR: c_uint = PUB_PORT as c_uint;
static RPC_PORT_VAR: c_uint = RPC_PORT as c_uint;
static RATELIMIT_VAR: c_ulonglong = RATELIMIT;
static TRANSMIT_VAR: c_int = 0;
static TIMEOUT_VAR: c_uint = TIMEOUT;

// ---------------------------------------------------------------------------
// Test observability
// ---------------------------------------------------------------------------

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
static FAILED_INIT_CALLS: AtomicUsize = AtomicUsize::new(0);
static VECTORS_DESTROYED: AtomicUsize = AtomicUsize::new(0);
static CALLBACK_FAILURES: AtomicUsize = AtomicUsize::new(0);
static NEXT_CLIENT: AtomicU64 = AtomicU64::new(1);
static LISTENER_TESTS: Mutex<()> = Mutex::new(());

fn destroyed() -> &'static Mutex<HashMap<String, usize>> {
    static DESTROYED: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();
    DESTROYED.get_or_init(|| Mutex::new(HashMap::new()))
}

fn record_destroy(name: &CStr) {
    let name = name.to_string_lossy().into_owned();
    *destroyed()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(name)
        .or_default() += 1;
}

/// How many native objects named `name` have been destroyed so far.
pub fn destroy_count(name: &str) -> usize {
    destroyed()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .copied()
        .unwrap_or(0)
}

pub fn init_calls() -> usize {
    INIT_CALLS.load(Ordering::SeqCst)
}

pub fn failed_init_calls() -> usize {
    FAILED_INIT_CALLS.load(Ordering::SeqCst)
}

pub fn vectors_destroyed() -> usize {
    VECTORS_DESTROYED.load(Ordering::SeqCst)
}

/// Number of non-zero codes listener callbacks have returned.
pub fn callback_failures() -> usize {
    CALLBACK_FAILURES.load(Ordering::SeqCst)
}

/// Listener slots are process-wide; tests that install listeners hold this.
pub fn serialize_listeners() -> MutexGuard<'static, ()> {
    LISTENER_TESTS.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MockNamed {
    name: CString,
}

#[derive(Clone)]
pub struct MockScope {
    name: CString,
    cpu: Vec<u32>,
    numa: Vec<u32>,
    gpu: Vec<u32>,
}

impl MockScope {
    fn describe(&self) -> String {
        let list = |v: &[u32]| v.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        format!(
            "name: {}: {{\"cpu\": [{}], \"numa\": [{}], \"gpu\": [{}]}}",
            self.name.to_string_lossy(),
            list(&self.cpu),
            list(&self.numa),
            list(&self.gpu)
        )
    }
}

#[derive(Clone)]
pub struct MockUuid {
    text: CString,
}

#[derive(Clone)]
struct MockActuator {
    name: CString,
    value: f64,
    continuous: bool,
    choices: Vec<f64>,
    limits: Option<(f64, f64)>,
    client_id: Option<Box<MockUuid>>,
}

impl MockActuator {
    fn accepts(&self, value: f64) -> bool {
        if self.continuous {
            self.limits.map_or(true, |(min, max)| (min..=max).contains(&value))
        } else {
            self.choices.is_empty() || self.choices.contains(&value)
        }
    }
}

enum MockVector {
    Pointers(Vec<*mut c_void>),
    Doubles(Vec<f64>),
}

impl MockVector {
    fn len(&self) -> usize {
        match self {
            Self::Pointers(v) => v.len(),
            Self::Doubles(v) => v.len(),
        }
    }

    fn into_native(self) -> *mut NrmVector {
        Box::into_raw(Box::new(self)).cast()
    }
}

/// Box an object and hand it out as the opaque native type `T`.
fn into_native<O, T>(object: O) -> *mut T {
    Box::into_raw(Box::new(object)).cast()
}

// ---------------------------------------------------------------------------
// Fake daemon and listener thread
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Daemon {
    sensors: Vec<MockNamed>,
    slices: Vec<MockNamed>,
    scopes: Vec<MockScope>,
    actuators: Vec<MockActuator>,
    ticks: usize,
    exited: bool,
}

#[derive(Default, Clone)]
struct Callbacks {
    event: Option<EventListenerFn>,
    topic: Option<String>,
    actuate: Option<ActuateListenerFn>,
    actuate_started: bool,
}

enum Notification {
    Event {
        sensor: CString,
        time: NrmTime,
        scope: MockScope,
        value: f64,
    },
    Actuate {
        uuid: CString,
        value: f64,
    },
    Stop,
}

struct MockClient {
    id: CString,
    daemon: Mutex<Daemon>,
    callbacks: Arc<Mutex<Callbacks>>,
    queue: mpsc::Sender<Notification>,
    thread: Option<JoinHandle<()>>,
}

impl MockClient {
    fn daemon(&self) -> MutexGuard<'_, Daemon> {
        self.daemon.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn note_result(code: c_int) {
    if code != 0 {
        CALLBACK_FAILURES.fetch_add(1, Ordering::SeqCst);
    }
}

fn listener_loop(queue: mpsc::Receiver<Notification>, callbacks: Arc<Mutex<Callbacks>>) {
    for note in queue {
        let current = callbacks.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match note {
            Notification::Stop => break,
            Notification::Event {
                sensor,
                time,
                scope,
                value,
            } => {
                let (Some(f), Some(topic)) = (current.event, current.topic) else {
                    continue;
                };
                if !sensor.to_string_lossy().starts_with(&topic) {
                    continue;
                }
                let sensor = sensor.into_raw();
                let scope = into_native::<_, NrmScope>(scope);
                note_result(f(sensor, time, scope, value));
                // SAFETY: both were created just above and the callback only
                // borrowed them.
                unsafe {
                    drop(CString::from_raw(sensor));
                    drop(Box::from_raw(scope.cast::<MockScope>()));
                }
            }
            Notification::Actuate { uuid, value } => {
                let (Some(f), true) = (current.actuate, current.actuate_started) else {
                    continue;
                };
                let uuid = into_native::<_, NrmUuid>(MockUuid { text: uuid });
                note_result(f(uuid, value));
                // SAFETY: created just above, borrowed by the callback.
                unsafe { drop(Box::from_raw(uuid.cast::<MockUuid>())) };
            }
        }
    }
}

/// # Safety
///
/// `ptr` must be null or a live mock client.
unsafe fn client_ref<'a>(ptr: *mut NrmClient) -> Option<&'a MockClient> {
    unsafe { ptr.cast::<MockClient>().as_ref() }
}

unsafe fn named<'a, T>(ptr: *mut T) -> Option<&'a MockNamed> {
    unsafe { ptr.cast::<MockNamed>().as_ref() }
}

unsafe fn scope<'a>(ptr: *const NrmScope) -> Option<&'a MockScope> {
    unsafe { ptr.cast::<MockScope>().as_ref() }
}

unsafe fn scope_mut<'a>(ptr: *mut NrmScope) -> Option<&'a mut MockScope> {
    unsafe { ptr.cast::<MockScope>().as_mut() }
}

unsafe fn actuator<'a>(ptr: *mut NrmActuator) -> Option<&'a mut MockActuator> {
    unsafe { ptr.cast::<MockActuator>().as_mut() }
}

fn rejected(name: &CStr) -> bool {
    name.to_bytes().starts_with(REJECT_PREFIX.as_bytes())
}

fn upsert<T, F: Fn(&T) -> bool>(items: &mut Vec<T>, item: T, same: F) {
    if let Some(slot) = items.iter_mut().find(|existing| same(existing)) {
        *slot = item;
    } else {
        items.push(item);
    }
}

fn remove_where<T, F: Fn(&T) -> bool>(items: &mut Vec<T>, same: F) -> c_int {
    let before = items.len();
    items.retain(|item| !same(item));
    if items.len() == before {
        ENOTFOUND
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Library lifecycle
// ---------------------------------------------------------------------------

unsafe extern "C" fn init(_argc: *mut c_int, _argv: *mut *mut *mut c_char) -> c_int {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

/// An `nrm_init` that always fails with `-ENOMEM`.
pub unsafe extern "C" fn failing_init(_argc: *mut c_int, _argv: *mut *mut *mut c_char) -> c_int {
    FAILED_INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    -2
}

unsafe extern "C" fn finalize() -> c_int {
    0
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

unsafe extern "C" fn client_create(
    out: *mut *mut NrmClient,
    uri: *const c_char,
    _pub_port: c_int,
    _rpc_port: c_int,
) -> c_int {
    if out.is_null() || uri.is_null() {
        return EINVAL;
    }
    let (queue, rx) = mpsc::channel();
    let callbacks = Arc::new(Mutex::new(Callbacks::default()));
    let thread_callbacks = Arc::clone(&callbacks);
    let thread = std::thread::Builder::new()
        .name("mock-nrm-listener".to_string())
        .spawn(move || listener_loop(rx, thread_callbacks))
        .expect("spawn mock listener thread");
    let id = CString::new(format!("client-{}", NEXT_CLIENT.fetch_add(1, Ordering::SeqCst))).unwrap();
    let mock = MockClient {
        id,
        daemon: Mutex::new(Daemon::default()),
        callbacks,
        queue,
        thread: Some(thread),
    };
    unsafe { *out = into_native(mock) };
    0
}

unsafe extern "C" fn client_destroy(client: *mut *mut NrmClient) {
    if client.is_null() || unsafe { *client }.is_null() {
        return;
    }
    let mut mock = unsafe { Box::from_raw((*client).cast::<MockClient>()) };
    let _ = mock.queue.send(Notification::Stop);
    if let Some(thread) = mock.thread.take() {
        thread.join().expect("mock listener thread panicked");
    }
    unsafe { *client = std::ptr::null_mut() };
}

unsafe extern "C" fn client_add_sensor(client: *mut NrmClient, sensor: *mut NrmSensor) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { named(sensor) }) else {
        return EINVAL;
    };
    if rejected(&s.name) {
        return EINVAL;
    }
    upsert(&mut c.daemon().sensors, s.clone(), |e| e.name == s.name);
    0
}

unsafe extern "C" fn client_add_slice(client: *mut NrmClient, slice: *mut NrmSlice) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { named(slice) }) else {
        return EINVAL;
    };
    if rejected(&s.name) {
        return EINVAL;
    }
    upsert(&mut c.daemon().slices, s.clone(), |e| e.name == s.name);
    0
}

unsafe extern "C" fn client_add_scope(client: *mut NrmClient, added: *mut NrmScope) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { scope(added) }) else {
        return EINVAL;
    };
    if rejected(&s.name) {
        return EINVAL;
    }
    upsert(&mut c.daemon().scopes, s.clone(), |e| e.name == s.name);
    0
}

unsafe extern "C" fn client_add_actuator(client: *mut NrmClient, added: *mut NrmActuator) -> c_int {
    let (Some(c), Some(a)) = (unsafe { client_ref(client) }, unsafe { actuator(added) }) else {
        return EINVAL;
    };
    if rejected(&a.name) {
        return EINVAL;
    }
    // The daemon's reply stamps the owning client onto the actuator.
    a.client_id = Some(Box::new(MockUuid { text: c.id.clone() }));
    let record = a.clone();
    upsert(&mut c.daemon().actuators, record, |e| e.name == a.name);
    0
}

unsafe fn list_into<T>(out: *mut *mut NrmVector, items: Vec<*mut T>) -> c_int {
    if out.is_null() {
        return EINVAL;
    }
    let pointers = items.into_iter().map(|p| p.cast::<c_void>()).collect();
    unsafe { *out = MockVector::Pointers(pointers).into_native() };
    0
}

unsafe extern "C" fn client_list_sensors(client: *mut NrmClient, out: *mut *mut NrmVector) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let items = c.daemon().sensors.iter().cloned().map(into_native::<_, NrmSensor>).collect();
    unsafe { list_into(out, items) }
}

unsafe extern "C" fn client_list_slices(client: *mut NrmClient, out: *mut *mut NrmVector) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let items = c.daemon().slices.iter().cloned().map(into_native::<_, NrmSlice>).collect();
    unsafe { list_into(out, items) }
}

unsafe extern "C" fn client_list_scopes(client: *mut NrmClient, out: *mut *mut NrmVector) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let items = c.daemon().scopes.iter().cloned().map(into_native::<_, NrmScope>).collect();
    unsafe { list_into(out, items) }
}

unsafe extern "C" fn client_list_actuators(client: *mut NrmClient, out: *mut *mut NrmVector) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let items = c.daemon().actuators.iter().cloned().map(into_native::<_, NrmActuator>).collect();
    unsafe { list_into(out, items) }
}

unsafe extern "C" fn client_remove_sensor(client: *mut NrmClient, sensor: *mut NrmSensor) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { named(sensor) }) else {
        return EINVAL;
    };
    remove_where(&mut c.daemon().sensors, |e| e.name == s.name)
}

unsafe extern "C" fn client_remove_slice(client: *mut NrmClient, slice: *mut NrmSlice) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { named(slice) }) else {
        return EINVAL;
    };
    remove_where(&mut c.daemon().slices, |e| e.name == s.name)
}

unsafe extern "C" fn client_remove_scope(client: *mut NrmClient, removed: *mut NrmScope) -> c_int {
    let (Some(c), Some(s)) = (unsafe { client_ref(client) }, unsafe { scope(removed) }) else {
        return EINVAL;
    };
    remove_where(&mut c.daemon().scopes, |e| e.name == s.name)
}

unsafe extern "C" fn client_remove_actuator(client: *mut NrmClient, removed: *mut NrmActuator) -> c_int {
    let (Some(c), Some(a)) = (unsafe { client_ref(client) }, unsafe { actuator(removed) }) else {
        return EINVAL;
    };
    remove_where(&mut c.daemon().actuators, |e| e.name == a.name)
}

unsafe extern "C" fn client_send_event(
    client: *mut NrmClient,
    time: NrmTime,
    sensor: *mut NrmSensor,
    event_scope: *mut NrmScope,
    value: c_double,
) -> c_int {
    let (Some(c), Some(s), Some(sc)) = (
        unsafe { client_ref(client) },
        unsafe { named(sensor) },
        unsafe { scope(event_scope) },
    ) else {
        return EINVAL;
    };
    let _ = c.queue.send(Notification::Event {
        sensor: s.name.clone(),
        time,
        scope: sc.clone(),
        value,
    });
    0
}

unsafe extern "C" fn client_actuate(client: *mut NrmClient, act: *mut NrmActuator, value: c_double) -> c_int {
    let (Some(c), Some(a)) = (unsafe { client_ref(client) }, unsafe { actuator(act) }) else {
        return EINVAL;
    };
    {
        let mut daemon = c.daemon();
        let Some(record) = daemon.actuators.iter_mut().find(|r| r.name == a.name) else {
            return ENOTFOUND;
        };
        if !record.accepts(value) {
            return EDOM;
        }
        record.value = value;
    }
    let _ = c.queue.send(Notification::Actuate {
        uuid: a.name.clone(),
        value,
    });
    0
}

unsafe extern "C" fn client_send_exit(client: *mut NrmClient) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    c.daemon().exited = true;
    0
}

unsafe extern "C" fn client_send_tick(client: *mut NrmClient) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let mut daemon = c.daemon();
    if daemon.exited {
        return EINVAL;
    }
    daemon.ticks += 1;
    0
}

unsafe extern "C" fn client_set_event_listener(client: *mut NrmClient, f: EventListenerFn) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    c.callbacks().event = Some(f);
    0
}

unsafe extern "C" fn client_start_event_listener(client: *mut NrmClient, topic: NrmString) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    let topic = if topic.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(topic) }.to_string_lossy().into_owned()
    };
    c.callbacks().topic = Some(topic);
    0
}

unsafe extern "C" fn client_set_actuate_listener(client: *mut NrmClient, f: ActuateListenerFn) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    c.callbacks().actuate = Some(f);
    0
}

unsafe extern "C" fn client_start_actuate_listener(client: *mut NrmClient) -> c_int {
    let Some(c) = (unsafe { client_ref(client) }) else {
        return EINVAL;
    };
    c.callbacks().actuate_started = true;
    0
}

// ---------------------------------------------------------------------------
// Sensors and slices
// ---------------------------------------------------------------------------

unsafe fn named_create<T>(name: *const c_char) -> *mut T {
    if name.is_null() {
        return std::ptr::null_mut();
    }
    let name = unsafe { CStr::from_ptr(name) }.to_owned();
    into_native(MockNamed { name })
}

unsafe fn named_destroy<T>(ptr: *mut *mut T) {
    if ptr.is_null() || unsafe { *ptr }.is_null() {
        return;
    }
    let object = unsafe { Box::from_raw((*ptr).cast::<MockNamed>()) };
    record_destroy(&object.name);
    unsafe { *ptr = std::ptr::null_mut() };
}

unsafe fn named_uuid<T>(ptr: *mut T) -> NrmString {
    unsafe { named(ptr) }.map_or(std::ptr::null_mut(), |n| n.name.as_ptr().cast_mut())
}

unsafe extern "C" fn sensor_create(name: *const c_char) -> *mut NrmSensor {
    unsafe { named_create(name) }
}

unsafe extern "C" fn sensor_destroy(sensor: *mut *mut NrmSensor) {
    unsafe { named_destroy(sensor) }
}

unsafe extern "C" fn sensor_uuid(sensor: *mut NrmSensor) -> NrmString {
    unsafe { named_uuid(sensor) }
}

unsafe extern "C" fn slice_create(name: *const c_char) -> *mut NrmSlice {
    unsafe { named_create(name) }
}

unsafe extern "C" fn slice_destroy(slice: *mut *mut NrmSlice) {
    unsafe { named_destroy(slice) }
}

unsafe extern "C" fn slice_uuid(slice: *mut NrmSlice) -> NrmString {
    unsafe { named_uuid(slice) }
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

unsafe extern "C" fn scope_create(name: *const c_char) -> *mut NrmScope {
    if name.is_null() {
        return std::ptr::null_mut();
    }
    let name = unsafe { CStr::from_ptr(name) }.to_owned();
    into_native(MockScope {
        name,
        cpu: Vec::new(),
        numa: Vec::new(),
        gpu: Vec::new(),
    })
}

unsafe extern "C" fn scope_destroy(destroyed_scope: *mut NrmScope) -> c_int {
    if destroyed_scope.is_null() {
        return EINVAL;
    }
    let object = unsafe { Box::from_raw(destroyed_scope.cast::<MockScope>()) };
    record_destroy(&object.name);
    0
}

unsafe extern "C" fn scope_uuid(ptr: *mut NrmScope) -> NrmString {
    unsafe { scope(ptr) }.map_or(std::ptr::null_mut(), |s| s.name.as_ptr().cast_mut())
}

unsafe extern "C" fn scope_add(ptr: *mut NrmScope, kind: c_uint, num: c_uint) -> c_int {
    let Some(s) = (unsafe { scope_mut(ptr) }) else {
        return EINVAL;
    };
    let list = match kind {
        0 => &mut s.cpu,
        1 => &mut s.numa,
        2 => &mut s.gpu,
        _ => return EINVAL,
    };
    if let Err(at) = list.binary_search(&num) {
        list.insert(at, num);
    }
    0
}

unsafe extern "C" fn scope_snprintf(buf: *mut c_char, bufsize: usize, ptr: *const NrmScope) -> c_int {
    let Some(s) = (unsafe { scope(ptr) }) else {
        return EINVAL;
    };
    let text = s.describe();
    if buf.is_null() || text.len() + 1 > bufsize {
        return -1;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr().cast::<c_char>(), buf, text.len());
        *buf.add(text.len()) = 0;
    }
    0
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

unsafe fn actuator_create(name: *const c_char, continuous: bool) -> *mut NrmActuator {
    if name.is_null() {
        return std::ptr::null_mut();
    }
    let name = unsafe { CStr::from_ptr(name) }.to_owned();
    into_native(MockActuator {
        name,
        value: 0.0,
        continuous,
        choices: Vec::new(),
        limits: None,
        client_id: None,
    })
}

unsafe extern "C" fn actuator_discrete_create(name: *const c_char) -> *mut NrmActuator {
    unsafe { actuator_create(name, false) }
}

unsafe extern "C" fn actuator_continuous_create(name: *const c_char) -> *mut NrmActuator {
    unsafe { actuator_create(name, true) }
}

unsafe extern "C" fn actuator_destroy(ptr: *mut *mut NrmActuator) {
    if ptr.is_null() || unsafe { *ptr }.is_null() {
        return;
    }
    let object = unsafe { Box::from_raw((*ptr).cast::<MockActuator>()) };
    record_destroy(&object.name);
    unsafe { *ptr = std::ptr::null_mut() };
}

unsafe extern "C" fn actuator_uuid(ptr: *mut NrmActuator) -> NrmString {
    unsafe { actuator(ptr) }.map_or(std::ptr::null_mut(), |a| a.name.as_ptr().cast_mut())
}

unsafe extern "C" fn actuator_value(ptr: *mut NrmActuator) -> c_double {
    unsafe { actuator(ptr) }.map_or(f64::NAN, |a| a.value)
}

unsafe extern "C" fn actuator_clientid(ptr: *mut NrmActuator) -> *mut NrmUuid {
    unsafe { actuator(ptr) }
        .and_then(|a| a.client_id.as_deref_mut())
        .map_or(std::ptr::null_mut(), |uuid: &mut MockUuid| (uuid as *mut MockUuid).cast())
}

unsafe extern "C" fn actuator_discrete_list_choices(ptr: *mut NrmActuator, out: *mut *mut NrmVector) -> c_int {
    let Some(a) = (unsafe { actuator(ptr) }) else {
        return EINVAL;
    };
    if out.is_null() || a.continuous {
        return EINVAL;
    }
    unsafe { *out = MockVector::Doubles(a.choices.clone()).into_native() };
    0
}

unsafe extern "C" fn actuator_discrete_set_choices(ptr: *mut NrmActuator, len: usize, choices: *mut c_double) -> c_int {
    let Some(a) = (unsafe { actuator(ptr) }) else {
        return EINVAL;
    };
    if a.continuous || (choices.is_null() && len > 0) {
        return EINVAL;
    }
    a.choices = if len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(choices, len) }.to_vec()
    };
    0
}

unsafe extern "C" fn actuator_continuous_set_limits(ptr: *mut NrmActuator, min: c_double, max: c_double) -> c_int {
    let Some(a) = (unsafe { actuator(ptr) }) else {
        return EINVAL;
    };
    if !a.continuous || min > max {
        return EINVAL;
    }
    a.limits = Some((min, max));
    0
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

unsafe extern "C" fn uuid_to_char(uuid: *mut NrmUuid) -> *const c_char {
    unsafe { uuid.cast::<MockUuid>().as_ref() }.map_or(std::ptr::null(), |u| u.text.as_ptr())
}

unsafe extern "C" fn string_fromchar(s: *const c_char) -> NrmString {
    if s.is_null() {
        return std::ptr::null_mut();
    }
    unsafe { CStr::from_ptr(s) }.to_owned().into_raw()
}

unsafe extern "C" fn string_decref(s: NrmString) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

unsafe extern "C" fn vector_length(vector: *const NrmVector, len: *mut usize) -> c_int {
    let Some(v) = (unsafe { vector.cast::<MockVector>().as_ref() }) else {
        return EINVAL;
    };
    if len.is_null() {
        return EINVAL;
    }
    unsafe { *len = v.len() };
    0
}

unsafe extern "C" fn vector_get(vector: *const NrmVector, index: usize, slot: *mut *mut c_void) -> c_int {
    let Some(v) = (unsafe { vector.cast::<MockVector>().as_ref() }) else {
        return EINVAL;
    };
    if slot.is_null() || index >= v.len() {
        return EINVAL;
    }
    let address = match v {
        MockVector::Pointers(items) => (&items[index] as *const *mut c_void).cast::<c_void>(),
        MockVector::Doubles(items) => (&items[index] as *const f64).cast::<c_void>(),
    };
    unsafe { *slot = address.cast_mut() };
    0
}

/// A `vector_get` that fails for every index past the first.
pub unsafe extern "C" fn vector_get_first_only(vector: *const NrmVector, index: usize, slot: *mut *mut c_void) -> c_int {
    if index > 0 {
        return EINVAL;
    }
    unsafe { vector_get(vector, index, slot) }
}

unsafe extern "C" fn vector_destroy(vector: *mut *mut NrmVector) {
    if vector.is_null() || unsafe { *vector }.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw((*vector).cast::<MockVector>()) });
    VECTORS_DESTROYED.fetch_add(1, Ordering::SeqCst);
    unsafe { *vector = std::ptr::null_mut() };
}

// ---------------------------------------------------------------------------
// Tables and helpers for tests
// ---------------------------------------------------------------------------

/// A fresh function table pointing at this module.
pub fn raw_api() -> NrmApi {
    NrmApi {
        init,
        finalize,
        client_create,
        client_destroy,
        client_add_sensor,
        client_add_actuator,
        client_add_scope,
        client_add_slice,
        client_list_sensors,
        client_list_actuators,
        client_list_scopes,
        client_list_slices,
        client_remove_sensor,
        client_remove_actuator,
        client_remove_scope,
        client_remove_slice,
        client_send_event,
        client_actuate,
        client_send_exit,
        client_send_tick,
        client_set_event_listener,
        client_start_event_listener,
        client_set_actuate_listener,
        client_start_actuate_listener,
        sensor_create,
        sensor_destroy,
        sensor_uuid,
        slice_create,
        slice_destroy,
        slice_uuid,
        scope_create,
        scope_destroy,
        scope_uuid,
        scope_add,
        scope_snprintf,
        actuator_discrete_create,
        actuator_continuous_create,
        actuator_destroy,
        actuator_uuid,
        actuator_value,
        actuator_clientid,
        actuator_discrete_list_choices,
        actuator_discrete_set_choices,
        actuator_continuous_set_limits,
        uuid_to_char,
        string_fromchar,
        string_decref,
        vector_length,
        vector_get,
        vector_destroy,
        variables: Variables {
            upstream_uri: std::ptr::addr_of!(URI_PTR).cast(),
            upstream_pub_port: std::ptr::addr_of!(PUB_PORT_VAR),
            upstream_rpc_port: std::ptr::addr_of!(RPC_PORT_VAR),
            ratelimit: std::ptr::addr_of!(RATELIMIT_VAR),
            transmit: std::ptr::addr_of!(TRANSMIT_VAR),
            timeout: std::ptr::addr_of!(TIMEOUT_VAR),
        },
        library: None,
    }
}

/// Shared function table.
pub fn api() -> Arc<NrmApi> {
    static API: OnceLock<Arc<NrmApi>> = OnceLock::new();
    Arc::clone(API.get_or_init(|| Arc::new(raw_api())))
}

/// The process-wide library, initialized over the mock table.
pub fn library() -> &'static Library {
    static LIBRARY: OnceLock<Library> = OnceLock::new();
    LIBRARY.get_or_init(|| Library::from_api(raw_api(), None).expect("mock library initializes"))
}

/// A scope owned by the test, for passing to trampolines directly.
pub struct OwnedScope(*mut NrmScope);

impl OwnedScope {
    pub fn new(name: &str, cpu: &[u32], numa: &[u32], gpu: &[u32]) -> Self {
        Self(into_native(MockScope {
            name: CString::new(name).unwrap(),
            cpu: cpu.to_vec(),
            numa: numa.to_vec(),
            gpu: gpu.to_vec(),
        }))
    }

    pub const fn as_ptr(&self) -> *mut NrmScope {
        self.0
    }
}

impl Drop for OwnedScope {
    fn drop(&mut self) {
        // SAFETY: created by `new` and never handed over.
        drop(unsafe { Box::from_raw(self.0.cast::<MockScope>()) });
    }
}

/// A uuid owned by the test.
pub struct OwnedUuid(*mut NrmUuid);

impl OwnedUuid {
    pub fn new(text: &str) -> Self {
        Self(into_native(MockUuid {
            text: CString::new(text).unwrap(),
        }))
    }

    pub const fn as_ptr(&self) -> *mut NrmUuid {
        self.0
    }
}

impl Drop for OwnedUuid {
    fn drop(&mut self) {
        // SAFETY: created by `new` and never handed over.
        drop(unsafe { Box::from_raw(self.0.cast::<MockUuid>()) });
    }
}

/// A native vector of raw pointers; ownership passes to the caller.
pub fn pointer_vector(items: Vec<*mut c_void>) -> *mut NrmVector {
    MockVector::Pointers(items).into_native()
}

/// A native vector of doubles; ownership passes to the caller.
pub fn double_vector(items: Vec<f64>) -> *mut NrmVector {
    MockVector::Doubles(items).into_native()
}
