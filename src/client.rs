//! Connection to the NRM daemon.
//!
//! A [`Client`] owns one native `nrm_client_t`. Every call that touches it
//! goes through an internal mutex, so a `Client` can be shared between
//! threads; the native client itself is not thread-safe.
//!
//! # Listeners
//!
//! libnrm delivers events and actuation requests on its own background
//! threads. [`Client::set_event_listener`] / [`Client::start_event_listener`]
//! (and the actuate pair) route them to an [`EventListener`] /
//! [`ActuateListener`]; [`Client::event_channel`] and
//! [`Client::actuate_channel`] route them into an `mpsc` channel instead.
//!
//! The native callbacks carry no context pointer, so there is one event
//! listener and one actuate listener per process. The first client to
//! register one keeps it until it disconnects; registering on another
//! client fails with [`Error::ListenerTaken`].
//!
//! Dropping the client destroys the native handle, which joins the listener
//! threads; listeners are released only after that.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::ffi::client as native;
use crate::ffi::entity::RawEntity;
use crate::ffi::handle::{c_string, NativeHandle};
use crate::ffi::sys::NrmClient;
use crate::ffi::trampoline;
use crate::library::Library;
use crate::listener::{ActuateListener, ActuateRequest, ChannelListener, Event, EventListener, Listeners};
use crate::resource::{
    Actuator, ActuatorHandle, Kind, ResourceHandle, Scope, ScopeHandle, Sensor, SensorHandle, Slice, SliceHandle,
};
use crate::time::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct ClientState {
    handle: Option<NativeHandle<NrmClient>>,
    started: Listeners,
}

/// A connection to the NRM daemon.
pub struct Client<'lib> {
    lib: &'lib Library,
    id: u64,
    config: ClientConfig,
    state: Mutex<ClientState>,
}

impl<'lib> Client<'lib> {
    /// Connect to the daemon at `uri` using the given publish and RPC ports.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if `nrm_client_create` fails,
    /// [`Error::InvalidInput`] if `uri` contains a NUL byte.
    pub fn connect(lib: &'lib Library, uri: &str, pub_port: u16, rpc_port: u16) -> Result<Self> {
        Self::with_config(lib, ClientConfig::new(uri, pub_port, rpc_port))
    }

    /// Connect with the uri and ports libnrm was configured with.
    ///
    /// # Errors
    ///
    /// As for [`Client::connect`].
    pub fn connect_default(lib: &'lib Library) -> Result<Self> {
        Self::with_config(lib, ClientConfig::from_defaults(lib.defaults()))
    }

    /// Connect as described by `config`.
    ///
    /// # Errors
    ///
    /// As for [`Client::connect`].
    #[instrument(level = "debug", skip(lib))]
    pub fn with_config(lib: &'lib Library, config: ClientConfig) -> Result<Self> {
        let uri = c_string("uri", &config.uri)?;
        let handle = native::create(
            lib.api(),
            &uri,
            i32::from(config.pub_port),
            i32::from(config.rpc_port),
        )?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            id,
            uri = %config.uri,
            pub_port = config.pub_port,
            rpc_port = config.rpc_port,
            "connected"
        );
        Ok(Self {
            lib,
            id,
            config,
            state: Mutex::new(ClientState {
                handle: Some(handle),
                started: Listeners::empty(),
            }),
        })
    }

    /// Connection parameters this client was created with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Process-unique id of this client, as used in logs.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The library this client belongs to.
    #[must_use]
    pub const fn library(&self) -> &'lib Library {
        self.lib
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the live native client, with the client lock held.
    fn with_native<T>(&self, f: impl FnOnce(&NativeHandle<NrmClient>) -> Result<T>) -> Result<T> {
        let state = self.lock();
        let handle = state.handle.as_ref().ok_or(Error::consumed("client"))?;
        f(handle)
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Create an object of kind `K` and register it with the daemon.
    ///
    /// The returned handle is owned by the caller. If registration fails the
    /// new native object is destroyed before the error is returned.
    ///
    /// # Errors
    ///
    /// Any error from [`ResourceHandle::create`] or [`Client::register`].
    #[instrument(level = "debug", skip(self), fields(client = self.id, kind = K::NAME))]
    pub fn add<K: Kind>(&self, name: &str) -> Result<ResourceHandle<'lib, K>> {
        let handle = ResourceHandle::<K>::create(self.lib, name)?;
        self.register(&handle)?;
        Ok(handle)
    }

    /// Register an existing object with the daemon.
    ///
    /// Useful when the object needs configuring (actuator choices, scope
    /// resources) before the daemon sees it.
    ///
    /// # Errors
    ///
    /// [`Error::Consumed`] if the client or the handle is gone,
    /// [`Error::Native`] if the daemon refuses.
    pub fn register<K: Kind>(&self, handle: &ResourceHandle<'_, K>) -> Result<()> {
        let raw = handle.native()?;
        self.with_native(|client| K::Raw::add(self.lib.api(), client, raw))?;
        debug!(client = self.id, kind = K::NAME, "registered");
        Ok(())
    }

    /// Snapshot of every object of kind `K` the daemon knows about.
    ///
    /// Each call returns freshly owned handles in native order.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the list call fails.
    #[instrument(level = "debug", skip(self), fields(client = self.id, kind = K::NAME))]
    pub fn list<K: Kind>(&self) -> Result<Vec<ResourceHandle<'lib, K>>> {
        let raw = self.with_native(|client| K::Raw::list(self.lib.api(), client))?;
        debug!(count = raw.len(), "listed");
        Ok(raw
            .into_iter()
            .map(|raw| ResourceHandle::from_native(self.lib, raw))
            .collect())
    }

    /// Unregister an object from the daemon. The handle stays valid.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the daemon does not know the object.
    #[instrument(level = "debug", skip(self, handle), fields(client = self.id, kind = K::NAME))]
    pub fn remove<K: Kind>(&self, handle: &ResourceHandle<'_, K>) -> Result<()> {
        let raw = handle.native()?;
        self.with_native(|client| K::Raw::remove(self.lib.api(), client, raw))
    }

    /// Create and register a sensor.
    ///
    /// # Errors
    ///
    /// See [`Client::add`].
    pub fn add_sensor(&self, name: &str) -> Result<SensorHandle<'lib>> {
        self.add::<Sensor>(name)
    }

    /// Create and register a discrete actuator with no choices yet.
    ///
    /// # Errors
    ///
    /// See [`Client::add`].
    pub fn add_actuator(&self, name: &str) -> Result<ActuatorHandle<'lib>> {
        self.add::<Actuator>(name)
    }

    /// Create and register a scope.
    ///
    /// # Errors
    ///
    /// See [`Client::add`].
    pub fn add_scope(&self, name: &str) -> Result<ScopeHandle<'lib>> {
        self.add::<Scope>(name)
    }

    /// Create and register a slice.
    ///
    /// # Errors
    ///
    /// See [`Client::add`].
    pub fn add_slice(&self, name: &str) -> Result<SliceHandle<'lib>> {
        self.add::<Slice>(name)
    }

    /// Every sensor the daemon knows about.
    ///
    /// # Errors
    ///
    /// See [`Client::list`].
    pub fn list_sensors(&self) -> Result<Vec<SensorHandle<'lib>>> {
        self.list::<Sensor>()
    }

    /// Every actuator the daemon knows about.
    ///
    /// # Errors
    ///
    /// See [`Client::list`].
    pub fn list_actuators(&self) -> Result<Vec<ActuatorHandle<'lib>>> {
        self.list::<Actuator>()
    }

    /// Every scope the daemon knows about.
    ///
    /// # Errors
    ///
    /// See [`Client::list`].
    pub fn list_scopes(&self) -> Result<Vec<ScopeHandle<'lib>>> {
        self.list::<Scope>()
    }

    /// Every slice the daemon knows about.
    ///
    /// # Errors
    ///
    /// See [`Client::list`].
    pub fn list_slices(&self) -> Result<Vec<SliceHandle<'lib>>> {
        self.list::<Slice>()
    }

    /// Unregister a sensor.
    ///
    /// # Errors
    ///
    /// See [`Client::remove`].
    pub fn remove_sensor(&self, sensor: &SensorHandle<'_>) -> Result<()> {
        self.remove(sensor)
    }

    /// Unregister an actuator.
    ///
    /// # Errors
    ///
    /// See [`Client::remove`].
    pub fn remove_actuator(&self, actuator: &ActuatorHandle<'_>) -> Result<()> {
        self.remove(actuator)
    }

    /// Unregister a scope.
    ///
    /// # Errors
    ///
    /// See [`Client::remove`].
    pub fn remove_scope(&self, scope: &ScopeHandle<'_>) -> Result<()> {
        self.remove(scope)
    }

    /// Unregister a slice.
    ///
    /// # Errors
    ///
    /// See [`Client::remove`].
    pub fn remove_slice(&self, slice: &SliceHandle<'_>) -> Result<()> {
        self.remove(slice)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Publish one sensor reading.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if libnrm rejects the arguments,
    /// [`Error::InvalidInput`] if `time` does not fit `nrm_time_t`.
    #[instrument(level = "trace", skip(self, sensor, scope), fields(client = self.id))]
    pub fn send_event(
        &self,
        time: Timestamp,
        sensor: &SensorHandle<'_>,
        scope: &ScopeHandle<'_>,
        value: f64,
    ) -> Result<()> {
        let time = time.to_native()?;
        let sensor = sensor.native()?;
        let scope = scope.native()?;
        self.with_native(|client| native::send_event(self.lib.api(), client, time, sensor, scope, value))
    }

    /// Ask the daemon to set an actuator.
    ///
    /// `value` is not checked locally against the actuator's choices; the
    /// daemon decides.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the daemon refuses the value.
    #[instrument(level = "debug", skip(self, actuator), fields(client = self.id))]
    pub fn actuate(&self, actuator: &ActuatorHandle<'_>, value: f64) -> Result<()> {
        let actuator = actuator.native()?;
        self.with_native(|client| native::actuate(self.lib.api(), client, actuator, value))
    }

    /// Ask the daemon to shut down.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the request fails.
    #[instrument(level = "debug", skip(self), fields(client = self.id))]
    pub fn send_exit(&self) -> Result<()> {
        self.with_native(|client| native::send_exit(self.lib.api(), client))
    }

    /// Trigger one control-loop iteration in the daemon.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the request fails.
    #[instrument(level = "debug", skip(self), fields(client = self.id))]
    pub fn send_tick(&self) -> Result<()> {
        self.with_native(|client| native::send_tick(self.lib.api(), client))
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Route events to `listener`.
    ///
    /// Events only arrive once [`Client::start_event_listener`] is called.
    /// Calling this again on the same client swaps the listener.
    ///
    /// # Errors
    ///
    /// [`Error::ListenerTaken`] if another live client holds the event
    /// listener, [`Error::Native`] if libnrm refuses the callback.
    #[instrument(level = "debug", skip(self, listener), fields(client = self.id))]
    pub fn set_event_listener<L: EventListener>(&self, listener: L) -> Result<()> {
        self.with_native(|client| {
            trampoline::install_event(self.id, Arc::clone(self.lib.api()), Arc::new(listener))?;
            native::set_event_listener(self.lib.api(), client, trampoline::event_trampoline).map_err(|e| {
                trampoline::release_event(self.id);
                e
            })
        })
    }

    /// Subscribe to events whose sensor uuid starts with `topic` (`""` for
    /// all).
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if the subscription fails.
    #[instrument(level = "debug", skip(self), fields(client = self.id))]
    pub fn start_event_listener(&self, topic: &str) -> Result<()> {
        let mut state = self.lock();
        let client = state.handle.as_ref().ok_or(Error::consumed("client"))?;
        native::start_event_listener(self.lib.api(), client, topic)?;
        state.started |= Listeners::EVENT;
        Ok(())
    }

    /// Route actuation requests to `listener`.
    ///
    /// # Errors
    ///
    /// [`Error::ListenerTaken`] if another live client holds the actuate
    /// listener, [`Error::Native`] if libnrm refuses the callback.
    #[instrument(level = "debug", skip(self, listener), fields(client = self.id))]
    pub fn set_actuate_listener<L: ActuateListener>(&self, listener: L) -> Result<()> {
        self.with_native(|client| {
            trampoline::install_actuate(self.id, Arc::clone(self.lib.api()), Arc::new(listener))?;
            native::set_actuate_listener(self.lib.api(), client, trampoline::actuate_trampoline).map_err(|e| {
                trampoline::release_actuate(self.id);
                e
            })
        })
    }

    /// Start receiving actuation requests.
    ///
    /// # Errors
    ///
    /// [`Error::Native`] if libnrm fails to start the listener.
    #[instrument(level = "debug", skip(self), fields(client = self.id))]
    pub fn start_actuate_listener(&self) -> Result<()> {
        let mut state = self.lock();
        let client = state.handle.as_ref().ok_or(Error::consumed("client"))?;
        native::start_actuate_listener(self.lib.api(), client)?;
        state.started |= Listeners::ACTUATE;
        Ok(())
    }

    /// Receive events on a channel instead of a callback.
    ///
    /// Once the receiver is dropped, deliveries fail and are reported to
    /// libnrm as failures.
    ///
    /// # Errors
    ///
    /// As for [`Client::set_event_listener`] and
    /// [`Client::start_event_listener`].
    pub fn event_channel(&self, topic: &str) -> Result<mpsc::Receiver<Event>> {
        let (tx, rx) = mpsc::channel();
        self.set_event_listener(ChannelListener::new(tx))?;
        self.start_event_listener(topic)?;
        Ok(rx)
    }

    /// Receive actuation requests on a channel instead of a callback.
    ///
    /// # Errors
    ///
    /// As for [`Client::set_actuate_listener`] and
    /// [`Client::start_actuate_listener`].
    pub fn actuate_channel(&self) -> Result<mpsc::Receiver<ActuateRequest>> {
        let (tx, rx) = mpsc::channel();
        self.set_actuate_listener(ChannelListener::new(tx))?;
        self.start_actuate_listener()?;
        Ok(rx)
    }

    /// Listeners started on this client.
    #[must_use]
    pub fn listeners(&self) -> Listeners {
        self.lock().started
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Whether [`Client::disconnect`] has run.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.lock().handle.is_none()
    }

    /// Destroy the native client. Later calls do nothing.
    ///
    /// Blocks until the native listener threads have stopped. Every other
    /// operation returns [`Error::Consumed`] afterwards.
    pub fn disconnect(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = state.handle.take() else {
            return;
        };
        native::destroy(self.lib.api(), handle);
        state.started = Listeners::empty();
        // The native threads are joined, nothing can call a trampoline for
        // this client any more.
        let released_event = trampoline::release_event(self.id);
        let released_actuate = trampoline::release_actuate(self.id);
        info!(
            id = self.id,
            released_event, released_actuate, "disconnected"
        );
    }
}

impl Drop for Client<'_> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Client<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("listeners", &self.listeners())
            .finish_non_exhaustive()
    }
}
