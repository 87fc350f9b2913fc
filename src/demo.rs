//! A simulated workload that exercises the engine end to end.
//!
//! Each worker is a small state machine cycling through
//! `Idle -> Loading -> Processing -> Idle` with timed `load` and `process`
//! phases. The first worker announces its transitions through a
//! [`ChangeNotifier`]; the others are only polled. A shared
//! [`DemoControl`] object is never registered directly: it is handed to a
//! [`SingletonRegistry`] and picked up by discovery.

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio::time::Instant;
use vismon_sdk::{
    ChangeNotifier, Detection, Engine, EngineConfig, EngineListener, FieldError, FieldValue,
    Output, SingletonRegistry, Snapshot, TrackMarker, TrackOptions, Trackable,
};

use crate::settings::DemoSettings;

/// What to run and where to write results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOptions {
    pub workers: usize,
    pub duration: Duration,
    pub output: Option<PathBuf>,
    pub export: Option<PathBuf>,
}

impl From<&DemoSettings> for DemoOptions {
    fn from(settings: &DemoSettings) -> Self {
        Self {
            workers: settings.workers,
            duration: settings.duration,
            output: settings.output.clone(),
            export: settings.export.clone(),
        }
    }
}

/// Lifecycle of a simulated worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Loading,
    Processing,
    Done,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Idle => "Idle",
            WorkerState::Loading => "Loading",
            WorkerState::Processing => "Processing",
            WorkerState::Done => "Done",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated worker.
#[derive(Debug)]
pub struct Worker {
    state: RwLock<WorkerState>,
    processed: AtomicU64,
    last_batch: RwLock<Option<u64>>,
    notifier: Option<ChangeNotifier>,
}

impl Worker {
    /// A worker that is only observable by polling.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with(None))
    }

    /// A worker that announces its own changes.
    pub fn notifying() -> Arc<Self> {
        Arc::new(Self::with(Some(ChangeNotifier::new())))
    }

    fn with(notifier: Option<ChangeNotifier>) -> Self {
        Self {
            state: RwLock::new(WorkerState::Idle),
            processed: AtomicU64::new(0),
            last_batch: RwLock::new(None),
            notifier,
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
        if let Some(notifier) = &self.notifier {
            notifier.notify("State");
        }
    }

    /// Record a completed batch of `items`.
    pub fn complete_batch(&self, batch: u64, items: u64) {
        self.processed.fetch_add(items, Ordering::Relaxed);
        *self.last_batch.write() = Some(batch);
        if let Some(notifier) = &self.notifier {
            notifier.notify("Processed");
            notifier.notify("LastBatch");
        }
    }
}

impl Trackable for Worker {
    fn fields(&self) -> Vec<String> {
        vec!["State".into(), "Processed".into(), "LastBatch".into()]
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "State" => Ok(self.state().as_str().into()),
            "Processed" => Ok(self.processed().into()),
            "LastBatch" => Ok((*self.last_batch.read()).into()),
            other => Err(FieldError::unknown(other)),
        }
    }

    fn notifier(&self) -> Option<&ChangeNotifier> {
        self.notifier.as_ref()
    }
}

/// Shared tunable read by every worker.
#[derive(Debug)]
pub struct DemoControl {
    batch_size: AtomicU64,
}

impl DemoControl {
    pub fn new(batch_size: u64) -> Arc<Self> {
        Arc::new(Self {
            batch_size: AtomicU64::new(batch_size),
        })
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size.load(Ordering::Relaxed)
    }

    pub fn grow(&self) {
        self.batch_size.fetch_add(1, Ordering::Relaxed);
    }
}

impl Trackable for DemoControl {
    fn fields(&self) -> Vec<String> {
        vec!["BatchSize".into()]
    }

    fn read_field(&self, name: &str) -> Result<FieldValue, FieldError> {
        match name {
            "BatchSize" => Ok(self.batch_size().into()),
            other => Err(FieldError::unknown(other)),
        }
    }
}

/// Project a worker belongs to.
fn project_of(index: usize) -> &'static str {
    if index % 2 == 0 {
        "Core"
    } else {
        "Batch"
    }
}

/// Run the workload until `options.duration` elapses and return the final
/// snapshot. Must be called inside a tokio runtime.
pub async fn run(
    options: &DemoOptions,
    config: EngineConfig,
    listener: Arc<dyn EngineListener>,
) -> Result<Snapshot> {
    let control = DemoControl::new(8);
    let singletons = Arc::new(SingletonRegistry::new("demo"));
    singletons.add(
        Arc::clone(&control),
        TrackMarker::auto().project("Settings").name("control"),
    );

    let mut builder = Engine::builder()
        .config(config)
        .listener(listener)
        .provider(singletons);
    if let Some(path) = &options.output {
        builder = builder.output(Output::file(path));
    }
    let engine = Arc::new(builder.build());
    engine.discover_now();
    engine.start();

    let workers: Vec<Arc<Worker>> = (0..options.workers)
        .map(|i| if i == 0 { Worker::notifying() } else { Worker::new() })
        .collect();
    let deadline = Instant::now() + options.duration;
    let mut tasks = Vec::with_capacity(workers.len());
    for (i, worker) in workers.iter().enumerate() {
        let name = format!("worker-{}", i);
        let detection = if worker.notifier.is_some() {
            Detection::PollAndNotify
        } else {
            Detection::Poll
        };
        engine.register_object(
            worker,
            TrackOptions::new()
                .name(name.clone())
                .project(project_of(i))
                .category("workers")
                .detection(detection),
        );
        tasks.push(tokio::spawn(drive_worker(
            Arc::clone(&engine),
            Arc::clone(worker),
            Arc::clone(&control),
            name,
            project_of(i),
            i as u64,
            deadline,
        )));
    }

    tracing::info!(
        workers = options.workers,
        duration_ms = options.duration.as_millis() as u64,
        "demo running"
    );
    for task in tasks {
        task.await.context("worker task failed")?;
    }

    // Catch transitions made after the last poll tick.
    engine.poll_now();
    engine.emit_now().await;

    if let Some(path) = &options.export {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let rows = engine.export_timings(BufWriter::new(file), None, None)?;
        tracing::info!(rows, path = %path.display(), "timings exported");
    }

    let snapshot = engine.collect();
    engine.shutdown();
    Ok(snapshot)
}

async fn drive_worker(
    engine: Arc<Engine>,
    worker: Arc<Worker>,
    control: Arc<DemoControl>,
    component: String,
    project: &'static str,
    seed: u64,
    deadline: Instant,
) {
    let mut batch = 0u64;
    while Instant::now() < deadline {
        batch += 1;
        let step = Duration::from_millis(10 + (batch * 7 + seed * 11) % 25);

        {
            let _timer = engine.start_phase("load", component.as_str(), project);
            worker.set_state(WorkerState::Loading);
            tokio::time::sleep(step).await;
        }
        {
            let _timer = engine.start_phase("process", component.as_str(), project);
            worker.set_state(WorkerState::Processing);
            tokio::time::sleep(step * 2).await;
            worker.complete_batch(batch, control.batch_size());
        }
        worker.set_state(WorkerState::Idle);
        if seed == 0 && batch % 5 == 0 {
            control.grow();
        }
        tokio::time::sleep(step).await;
    }
    worker.set_state(WorkerState::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use vismon_sdk::CollectingListener;

    #[test]
    fn worker_fields() {
        let worker = Worker::new();
        assert_eq!(worker.read_field("State").unwrap(), FieldValue::from("Idle"));
        assert!(worker.read_field("LastBatch").unwrap().is_null());
        worker.complete_batch(3, 8);
        assert_eq!(worker.read_field("Processed").unwrap(), FieldValue::from(8u64));
        assert_eq!(worker.read_field("LastBatch").unwrap(), FieldValue::from(3u64));
        assert!(worker.read_field("Color").is_err());
    }

    #[test]
    fn notifying_worker_reports_through_engine() {
        let engine = Engine::new();
        let worker = Worker::notifying();
        engine.register(&worker);

        worker.set_state(WorkerState::Loading);
        let history = engine.change_history(None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].new_value, FieldValue::from("Loading"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_produces_snapshot_output_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let options = DemoOptions {
            workers: 2,
            duration: Duration::from_millis(300),
            output: Some(dir.path().join("snapshot.json")),
            export: Some(dir.path().join("timings.csv")),
        };
        let config = EngineConfig {
            poll_interval: Duration::from_millis(20),
            discovery_interval: Duration::from_millis(50),
            ..EngineConfig::default()
        };
        let listener = Arc::new(CollectingListener::new(1000));

        let snapshot = run(&options, config, listener.clone()).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.object("control").is_some());
        assert_eq!(
            snapshot.object("worker-0").unwrap().fields["State"],
            FieldValue::from("Done")
        );
        assert!(snapshot.phases.contains_key("load"));
        assert!(snapshot.phases.contains_key("process"));
        assert!(!listener.changes().is_empty());
        assert!(!listener.timings().is_empty());

        assert!(dir.path().join("snapshot.json").exists());
        let csv = std::fs::read_to_string(dir.path().join("timings.csv")).unwrap();
        assert!(csv.lines().count() > 1);
    }
}
