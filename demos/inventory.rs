//! Daemon Inventory Example
//!
//! Connects to a running NRM daemon and lists every sensor, actuator, scope
//! and slice it knows about.
//!
//! Run with: cargo run --example inventory
//!
//! Set `LIBNRM_SO_` to point at a non-standard libnrm, and `RUST_LOG=nrm=debug`
//! to trace native calls.

use nrm::{Client, Library};
use tracing_subscriber::EnvFilter;

fn main() -> nrm::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nrm=info")))
        .init();

    println!("nrm client {}", nrm::VERSION);

    let lib = Library::open()?;
    let defaults = lib.defaults();
    println!(
        "libnrm: {} (pub {}, rpc {}, timeout {} ms)",
        defaults.uri, defaults.pub_port, defaults.rpc_port, defaults.timeout_ms
    );

    let client = Client::connect_default(&lib)?;

    println!();
    println!("Sensors:");
    for sensor in client.list_sensors()? {
        println!("  {}", sensor.uuid()?);
    }

    println!();
    println!("Actuators:");
    for actuator in client.list_actuators()? {
        let choices = actuator.choices().unwrap_or_default();
        println!("  {:<40} value={:<10} choices={choices:?}", actuator.uuid()?, actuator.value()?);
    }

    println!();
    println!("Scopes:");
    for scope in client.list_scopes()? {
        let topology = scope.topology()?;
        println!(
            "  {:<40} cpu={:?} numa={:?} gpu={:?}",
            scope.uuid()?,
            topology.cpu,
            topology.numa,
            topology.gpu
        );
    }

    println!();
    println!("Slices:");
    for slice in client.list_slices()? {
        println!("  {}", slice.uuid()?);
    }

    Ok(())
}
