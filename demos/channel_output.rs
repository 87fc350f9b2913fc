//! Example: Consuming engine records in-process
//!
//! Wires an engine to a `ChannelListener` for live change and timing
//! records and to `Output::channel` for periodic snapshots, the way a UI
//! thread would consume them.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example channel_output
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use vismon_sdk::{
    ChangeNotifier, ChannelListener, Engine, FieldError, FieldValue, Output, TrackOptions,
    Trackable,
};

struct Door {
    state: RwLock<&'static str>,
    notifier: ChangeNotifier,
}

impl Door {
    fn set(&self, state: &'static str) {
        *self.state.write() = state;
        self.notifier.notify("State");
    }
}

impl Trackable for Door {
    fn fields(&self) -> Vec<String> {
        vec!["State".into()]
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "State" => Ok((*self.state.read()).into()),
            other => Err(FieldError::unknown(other)),
        }
    }

    fn notifier(&self) -> Option<&ChangeNotifier> {
        Some(&self.notifier)
    }
}

#[tokio::main]
async fn main() {
    let (listener, mut records) = ChannelListener::new();
    let (output, mut snapshots) = Output::channel(4);

    let engine = Engine::builder()
        .discovery_interval(Duration::from_millis(200))
        .listener(Arc::new(listener))
        .output(output)
        .build();
    engine.start();

    let door = Arc::new(Door {
        state: RwLock::new("Closed"),
        notifier: ChangeNotifier::new(),
    });
    engine.register_object(&door, TrackOptions::new().name("front-door").project("House"));

    for state in ["Opening", "Open", "Closing", "Closed"] {
        let _timer = engine.start_phase(state, "front-door", "House");
        door.set(state);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    while let Ok(change) = records.changes.try_recv() {
        println!("change: {} {} -> {}", change.field, change.old_value, change.new_value);
    }
    while let Ok(timing) = records.timings.try_recv() {
        println!("timing: {} took {}", timing.phase, timing.duration);
    }

    if let Some(snapshot) = snapshots.recv().await {
        println!(
            "snapshot: {} objects, {} recent changes",
            snapshot.len(),
            snapshot.recent_changes.len()
        );
    }

    engine.shutdown();
}
