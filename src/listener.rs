//! Listener callbacks and the values they receive.
//!
//! libnrm runs one background thread per started listener and calls back
//! into a fixed `extern "C"` trampoline. The trampoline converts the native
//! arguments into the owned values below and then invokes the registered
//! [`EventListener`] or [`ActuateListener`]. A failure returned by (or a
//! panic raised inside) a listener is logged and reported to the native
//! thread as a plain failure code.
//!
//! Listeners run on the native thread. To run user code on a thread of your
//! own, use [`Client::event_channel`](crate::Client::event_channel) or
//! [`Client::actuate_channel`](crate::Client::actuate_channel), which plug a
//! [`ChannelListener`] in and hand back the receiving end.

use crate::error::Error;
use crate::scope::ScopeSnapshot;
use crate::time::Timestamp;
use bitflags::bitflags;
use std::sync::mpsc::{Sender, SyncSender, TrySendError};

/// Error type a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by listeners.
pub type ListenerResult = std::result::Result<(), ListenerError>;

/// One telemetry event received from the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Uuid of the sensor that produced the value.
    pub sensor_uuid: String,
    /// Time the event was recorded.
    pub time: Timestamp,
    /// Owned copy of the scope the event was recorded in.
    pub scope: ScopeSnapshot,
    /// Measured value.
    pub value: f64,
}

/// One actuation request received from the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuateRequest {
    /// Uuid of the actuator to set.
    pub actuator_uuid: String,
    /// Requested value.
    pub value: f64,
}

/// Receives events on the native event-listener thread.
pub trait EventListener: Send + Sync + 'static {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Any error is logged and reported to the native layer as failure.
    fn on_event(&self, event: Event) -> ListenerResult;
}

/// Receives actuation requests on the native actuate-listener thread.
pub trait ActuateListener: Send + Sync + 'static {
    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Any error is logged and reported to the native layer as failure.
    fn on_actuate(&self, request: ActuateRequest) -> ListenerResult;
}

impl<F> EventListener for F
where
    F: Fn(Event) -> ListenerResult + Send + Sync + 'static,
{
    fn on_event(&self, event: Event) -> ListenerResult {
        self(event)
    }
}

impl<F> ActuateListener for F
where
    F: Fn(ActuateRequest) -> ListenerResult + Send + Sync + 'static,
{
    fn on_actuate(&self, request: ActuateRequest) -> ListenerResult {
        self(request)
    }
}

/// Forwards every notification into an `mpsc` channel.
///
/// Once the receiver is dropped, each notification fails with
/// [`Error::ListenerClosed`]. A bounded channel never blocks the native
/// thread: a notification that finds it full fails with
/// [`Error::ListenerFull`] and is dropped.
#[derive(Debug)]
pub struct ChannelListener<S> {
    sender: S,
}

impl<S> ChannelListener<S> {
    /// Wrap a sender.
    pub const fn new(sender: S) -> Self {
        Self { sender }
    }
}

/// The sending half of a channel, bounded or not.
pub trait ChannelSender<T>: Send + Sync + 'static {
    /// Send one value without blocking.
    ///
    /// # Errors
    ///
    /// [`Error::ListenerClosed`] if the receiver is gone,
    /// [`Error::ListenerFull`] if a bounded channel has no room.
    fn deliver(&self, listener: &'static str, value: T) -> Result<(), Error>;
}

impl<T: Send + 'static> ChannelSender<T> for Sender<T> {
    fn deliver(&self, listener: &'static str, value: T) -> Result<(), Error> {
        self.send(value).map_err(|_| Error::ListenerClosed { listener })
    }
}

impl<T: Send + 'static> ChannelSender<T> for SyncSender<T> {
    fn deliver(&self, listener: &'static str, value: T) -> Result<(), Error> {
        self.try_send(value).map_err(|e| match e {
            TrySendError::Full(_) => Error::ListenerFull { listener },
            TrySendError::Disconnected(_) => Error::ListenerClosed { listener },
        })
    }
}

impl<S: ChannelSender<Event>> EventListener for ChannelListener<S> {
    fn on_event(&self, event: Event) -> ListenerResult {
        Ok(self.sender.deliver("event", event)?)
    }
}

impl<S: ChannelSender<ActuateRequest>> ActuateListener for ChannelListener<S> {
    fn on_actuate(&self, request: ActuateRequest) -> ListenerResult {
        Ok(self.sender.deliver("actuate", request)?)
    }
}

bitflags! {
    /// Which native listener threads a client has started.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Listeners: u8 {
        /// The event listener (`start_event_listener`).
        const EVENT = 1 << 0;
        /// The actuate listener (`start_actuate_listener`).
        const ACTUATE = 1 << 1;
    }
}
