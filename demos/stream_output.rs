//! Example: Streaming snapshots over TCP
//!
//! Starts a local line reader, points an engine's `Output::tcp` at it and
//! prints each newline-delimited JSON snapshot it receives.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example stream_output
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use vismon_sdk::{Engine, FieldError, FieldValue, Output, Snapshot, TrackOptions, Trackable};

struct Queue {
    depth: AtomicU64,
}

impl Trackable for Queue {
    fn fields(&self) -> Vec<String> {
        vec!["Depth".into()]
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "Depth" => Ok(self.depth.load(Ordering::Relaxed).into()),
            other => Err(FieldError::unknown(other)),
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    println!("Listening on {}", addr);

    let engine = Engine::builder()
        .poll_interval(Duration::from_millis(100))
        .discovery_interval(Duration::from_millis(300))
        .output(Output::tcp(addr.to_string()))
        .build();

    let queue = Arc::new(Queue {
        depth: AtomicU64::new(0),
    });
    engine.register_object(&queue, TrackOptions::new().name("jobs").project("Pipeline"));
    engine.start();

    let producer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            for _ in 0..20 {
                queue.depth.fetch_add(3, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    };

    for _ in 0..3 {
        let (stream, peer) = listener.accept().await?;
        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next_line().await? {
            match serde_json::from_str::<Snapshot>(&line) {
                Ok(snapshot) => {
                    let depth = snapshot
                        .object("jobs")
                        .and_then(|o| o.fields.get("Depth"))
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    println!("{}: jobs depth = {}", peer, depth);
                }
                Err(e) => eprintln!("{}: bad snapshot: {}", peer, e),
            }
        }
    }

    producer.await.ok();
    engine.shutdown();
    Ok(())
}
