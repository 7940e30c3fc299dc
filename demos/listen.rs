//! Event Listener Example
//!
//! Registers a sensor, subscribes to the daemon's event stream, publishes a
//! few values and prints what comes back.
//!
//! Run with: cargo run --example listen

use nrm::{Client, Library, ScopeResource, Timestamp};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SAMPLES: u32 = 5;

fn main() -> nrm::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nrm=info")))
        .init();

    let lib = Library::open()?;
    let client = Client::connect_default(&lib)?;

    let events = client.event_channel("")?;

    let sensor = client.add_sensor("demo.listen.sensor")?;
    let mut scope = client.add_scope("demo.listen.scope")?;
    scope.add(ScopeResource::Cpu, 0)?;
    scope.add(ScopeResource::Numa, 0)?;

    for i in 0..SAMPLES {
        client.send_event(Timestamp::now(), &sensor, &scope, f64::from(i))?;
    }

    let mut received = 0;
    while received < SAMPLES {
        match events.recv_timeout(Duration::from_secs(2)) {
            Ok(event) => {
                received += 1;
                println!(
                    "[{}] {} @ {} = {}",
                    event.time, event.sensor_uuid, event.scope.uuid, event.value
                );
            }
            Err(_) => {
                println!("no event within 2s, giving up after {received} of {SAMPLES}");
                break;
            }
        }
    }

    client.remove_sensor(&sensor)?;
    client.remove_scope(&scope)?;
    Ok(())
}
