//! nrm: Safe Rust client bindings for the Node Resource Manager
//!
//! This crate drives an NRM daemon through libnrm, its C client library:
//! registering sensors, actuators, scopes and slices, publishing telemetry
//! events, requesting actuations, and receiving both kinds of notification
//! from libnrm's listener threads.
//!
//! # Design Philosophy
//!
//! - **Explicit lifecycle**: [`Library`] is the one live libnrm per process;
//!   everything else borrows it
//! - **Single-shot release**: every native object is destroyed exactly once,
//!   later use reports [`Error::Consumed`]
//! - **Zero unsafe in public API**: all FFI quarantined in internal modules
//! - **No unwinding across the ABI**: listener failures and panics become a
//!   logged failure code
//!
//! # Entity Kinds
//!
//! | Kind | Handle | Extra operations |
//! |------|--------|------------------|
//! | Sensor | [`SensorHandle`] | - |
//! | Actuator | [`ActuatorHandle`] | value, choices, limits, client id |
//! | Scope | [`ScopeHandle`] | add resources, topology, JSON |
//! | Slice | [`SliceHandle`] | - |
//!
//! # Quick Start
//!
//! ```no_run
//! use nrm::{Client, Library, Timestamp};
//!
//! let lib = Library::open()?;
//! let client = Client::connect(&lib, "tcp://127.0.0.1", 2345, 3456)?;
//!
//! let sensor = client.add_sensor("app.progress")?;
//! let scope = client.add_scope("app.scope")?;
//! client.send_event(Timestamp::now(), &sensor, &scope, 1.0)?;
//!
//! let events = client.event_channel("")?;
//! while let Ok(event) = events.recv() {
//!     println!("{} = {}", event.sensor_uuid, event.value);
//! }
//! # Ok::<(), nrm::Error>(())
//! ```
//!
//! # Configuration
//!
//! The shared library is found through [`LibraryConfig`]: an explicit path,
//! else the `LIBNRM_SO_` environment variable, else `libnrm.so`. Connection
//! defaults come from libnrm itself (see [`NativeDefaults`]).
//!
//! # Error Handling
//!
//! All operations that can fail return [`Result<T, Error>`]. Native result
//! codes are classified into an [`ErrorKind`]; binding-layer failures have
//! their own [`Error`] variants.
//!
//! # Thread Safety
//!
//! [`Client`] is `Send + Sync` and serializes its native calls internally.
//! Resource handles are `Send` but not `Sync`. Listeners run on libnrm's
//! threads and must be `Send + Sync`.

// SAFETY: This crate denies unsafe code at the library level.
// All unsafe FFI code is quarantined in src/ffi/, which is not exported.
// We use deny (not forbid) so it can be overridden in the ffi module.
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)] // Allow libnrm, NUMA, etc. without backticks

pub mod client;
pub mod config;
pub mod error;
pub mod library;
pub mod listener;
pub mod resource;
pub mod scope;
pub mod time;

// FFI module is internal only - not exported
mod ffi;

// Re-export main types for convenience
pub use client::Client;
pub use config::{ClientConfig, LibraryConfig, NativeDefaults};
pub use error::{Error, ErrorKind, Result};
pub use library::Library;
pub use listener::{
    ActuateListener, ActuateRequest, ChannelListener, Event, EventListener, ListenerError, ListenerResult, Listeners,
};
pub use resource::{
    Actuator, ActuatorHandle, Kind, ResourceHandle, Scope, ScopeHandle, Sensor, SensorHandle, Slice, SliceHandle,
};
pub use scope::{ScopeResource, ScopeSnapshot, ScopeTopology};
pub use time::Timestamp;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
