//! Example: Following a snapshot file
//!
//! Polls the JSON file an engine writes through `Output::file` and prints
//! a short summary whenever it is rewritten.
//!
//! # Usage
//!
//! ```bash
//! # In one terminal, produce snapshots:
//! cargo run -- demo --duration 30s --output snapshot.json
//!
//! # In another, follow them:
//! cargo run --example file_source -- snapshot.json
//! ```

use std::env;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use vismon::{FileSource, SnapshotSource};

fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example file_source -- <path-to-snapshot.json>");
        std::process::exit(1);
    });

    println!("Following file: {}", path);
    println!("Press Ctrl+C to stop\n");

    let mut source = FileSource::new(&path);

    loop {
        match source.poll() {
            Some(snapshot) => {
                println!("Snapshot with {} objects:", snapshot.len());
                for object in &snapshot.objects {
                    let state = object
                        .fields
                        .get("State")
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("  - [{}] {}: {}", object.project, object.name, state);
                }
                for (phase, stats) in &snapshot.phases {
                    println!("  phase {}: {} samples, mean {}", phase, stats.count, stats.mean);
                }
                println!();
            }
            None => {
                if let Some(err) = source.error() {
                    eprint!("\rError: {}  ", err);
                } else {
                    print!("\rWaiting for changes...  ");
                }
                io::stdout().flush().unwrap();
            }
        }

        thread::sleep(Duration::from_millis(500));
    }
}
