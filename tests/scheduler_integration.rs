//! Scheduler Integration Tests
//!
//! Drives the public API end to end with in-memory doubles and the SQLite
//! store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use vigil::broadcast::MonitorEventKind;
use vigil::model::LOCAL_TRANSPORT_ID;
use vigil::{
    Agent, AgentDoc, AgentError, AgentRegistry, ChannelBroadcaster, ExecOutput, Host, Job, LOCAL_HOST_ID, MemoryStore, Monitor, MonitorEvent,
    ObjectId, Point, PointSink, Scheduler, SchedulerBuilder, SchedulerError, SinkError,
    SqliteStore, StorageBuilder, StorageError, Store, Transport, TransportError,
    TransportRegistry,
};

// =============================================================================
// Test Helpers
// =============================================================================

const MEMINFO: &str = "\
MemTotal:        1000 kB
MemFree:          200 kB
Buffers:          100 kB
Cached:           300 kB
Shmem:             10 kB
SwapTotal:        500 kB
SwapFree:         400 kB
";

fn t(secs: i64, millis: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, millis * 1_000_000).unwrap()
}

/// Answers `cat /proc/meminfo`, `hostname` and `overflow-plugin`; anything
/// else exits 127.
struct FakeHost;

#[async_trait::async_trait]
impl Transport for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    async fn exec(&self, command: &str, args: &[&str]) -> Result<ExecOutput, TransportError> {
        match (command, args) {
            ("cat", ["/proc/meminfo"]) => Ok(ExecOutput::from_stdout(MEMINFO)),
            ("hostname", []) => Ok(ExecOutput::from_stdout("fake-host\n")),
            ("overflow-plugin", []) => Ok(ExecOutput::from_stdout(format!(
                "big.value 1{}\nsmall.value 2\n",
                "0".repeat(400)
            ))),
            _ => Err(TransportError::NonZeroExit {
                command: command.to_string(),
                status: 127,
                stderr: String::new(),
            }),
        }
    }
}

/// Transport registry whose local transport is [`FakeHost`].
fn fake_transports() -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    registry.register(LOCAL_TRANSPORT_ID, |_| Ok(Arc::new(FakeHost) as Arc<dyn Transport>));
    registry
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<Point>>>,
    fail: AtomicBool,
}

impl RecordingSink {
    fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PointSink for RecordingSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected {
                status: 500,
                body: "down".to_string(),
            });
        }
        self.batches.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

/// Store wrapper whose monitor listing can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_listing: AtomicBool,
}

#[async_trait::async_trait]
impl Store for FlakyStore {
    async fn find_monitors(&self) -> Result<Vec<Monitor>, StorageError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("store offline".to_string()));
        }
        self.inner.find_monitors().await
    }

    async fn find_monitor(&self, id: ObjectId) -> Result<Option<Monitor>, StorageError> {
        self.inner.find_monitor(id).await
    }

    async fn insert_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        self.inner.insert_monitor(monitor).await
    }

    async fn update_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        self.inner.update_monitor(monitor).await
    }

    async fn remove_monitor(&self, id: ObjectId) -> Result<bool, StorageError> {
        self.inner.remove_monitor(id).await
    }

    async fn find_hosts(&self) -> Result<Vec<Host>, StorageError> {
        self.inner.find_hosts().await
    }

    async fn find_host(&self, id: ObjectId) -> Result<Option<Host>, StorageError> {
        self.inner.find_host(id).await
    }

    async fn insert_host(&self, host: &Host) -> Result<(), StorageError> {
        self.inner.insert_host(host).await
    }

    async fn update_host(&self, host: &Host) -> Result<(), StorageError> {
        self.inner.update_host(host).await
    }

    async fn remove_host(&self, id: ObjectId) -> Result<bool, StorageError> {
        self.inner.remove_host(id).await
    }
}

fn scheduler_over(store: Arc<dyn Store>, sink: Arc<dyn PointSink>) -> Arc<Scheduler> {
    SchedulerBuilder::new(store, sink)
        .transports(fake_transports())
        .build()
}

/// Add a memorystats monitor last checked at `last`.
async fn memory_monitor(scheduler: &Scheduler, interval: Duration, last: DateTime<Utc>) -> Monitor {
    scheduler.ensure_local_host().await.unwrap();
    let mut m = scheduler
        .add_monitor(Monitor::new(
            LOCAL_HOST_ID,
            interval,
            Job::new("memorystats", serde_json::Value::Null),
        ))
        .await
        .unwrap();
    m.last_check = last;
    m.next_check = last + TimeDelta::from_std(interval).unwrap();
    scheduler.update_monitor(m).await.unwrap()
}

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test]
async fn test_due_monitor_scenario() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_over(Arc::new(MemoryStore::new()), sink.clone());

    let t0 = t(1_700_000_000, 0);
    let m = memory_monitor(&scheduler, Duration::from_secs(1), t0).await;

    // not yet due
    let report = scheduler.tick(t(1_700_000_000, 900)).await.unwrap();
    assert_eq!(report.dispatched, 0);

    let at = t(1_700_000_001, 50);
    let report = scheduler.tick(at).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.dispatched, 1);
    scheduler.wait_idle().await;

    let stored = scheduler.get_monitor(&m.id.to_hex()).await.unwrap();
    assert_eq!(stored.last_check, at);
    assert_eq!(stored.next_check, t(1_700_000_002, 50));
    assert!(scheduler.in_flight().is_empty());

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let used = batches[0].iter().find(|p| p.name == "mem.Used").unwrap();
    assert_eq!(used.value, 400.0 * 1024.0);
    assert_eq!(used.tags["monitor"], m.id.to_hex());
    assert_eq!(used.tags["hostname"], "localhost");
    assert_eq!(stored.last_points.len(), 7);
}

#[tokio::test]
async fn test_store_fetch_failure_skips_tick() {
    let store = Arc::new(FlakyStore::default());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_over(store.clone(), sink.clone());
    let m = memory_monitor(&scheduler, Duration::from_secs(1), t(10_000, 0)).await;

    store.fail_listing.store(true, Ordering::SeqCst);
    let err = scheduler.tick(t(10_001, 10)).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Storage(_)));
    scheduler.wait_idle().await;
    assert!(sink.batches().is_empty());

    store.fail_listing.store(false, Ordering::SeqCst);
    let report = scheduler.tick(t(10_001, 110)).await.unwrap();
    assert_eq!(report.dispatched, 1);
    scheduler.wait_idle().await;

    let stored = scheduler.get_monitor(&m.id.to_hex()).await.unwrap();
    assert_eq!(stored.last_check, t(10_001, 110));
}

#[tokio::test]
async fn test_sink_failure_is_not_retried() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail.store(true, Ordering::SeqCst);
    let scheduler = scheduler_over(Arc::new(MemoryStore::new()), sink.clone());
    let m = memory_monitor(&scheduler, Duration::from_secs(1), t(20_000, 0)).await;

    scheduler.tick(t(20_001, 10)).await.unwrap();
    scheduler.wait_idle().await;
    assert!(scheduler.in_flight().is_empty());

    sink.fail.store(false, Ordering::SeqCst);
    // same instant again: not due, nothing replayed
    scheduler.tick(t(20_001, 20)).await.unwrap();
    scheduler.wait_idle().await;
    assert!(sink.batches().is_empty());

    let stored = scheduler.get_monitor(&m.id.to_hex()).await.unwrap();
    assert_eq!(stored.next_check, t(20_002, 10));
}

#[tokio::test]
async fn test_failing_job_advances_schedule() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_over(Arc::new(MemoryStore::new()), sink.clone());
    scheduler.ensure_local_host().await.unwrap();

    // /proc/stat is not scripted on the fake host
    let mut m = scheduler
        .add_monitor(Monitor::new(
            LOCAL_HOST_ID,
            Duration::from_secs(2),
            Job::new("cpustats", serde_json::Value::Null),
        ))
        .await
        .unwrap();
    m.last_check = t(30_000, 0);
    m.next_check = t(30_002, 0);
    scheduler.update_monitor(m.clone()).await.unwrap();

    scheduler.tick(t(30_002, 500)).await.unwrap();
    scheduler.wait_idle().await;

    let stored = scheduler.get_monitor(&m.id.to_hex()).await.unwrap();
    assert_eq!(stored.last_check, t(30_002, 500));
    assert_eq!(stored.next_check, t(30_004, 500));
    assert!(stored.last_points.is_empty());
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn test_cold_start_jitter_within_interval() {
    let scheduler = scheduler_over(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingSink::default()),
    );
    scheduler.ensure_local_host().await.unwrap();

    let interval = Duration::from_secs(60);
    let mut ids = Vec::new();
    for _ in 0..20 {
        let m = scheduler
            .add_monitor(Monitor::new(
                LOCAL_HOST_ID,
                interval,
                Job::new("entropy", serde_json::Value::Null),
            ))
            .await
            .unwrap();
        ids.push(m.id);
    }

    let now = t(1_800_000_000, 0);
    let report = scheduler.tick(now).await.unwrap();
    assert_eq!(report.deferred, 20);
    assert_eq!(report.dispatched, 0);

    for id in ids {
        let m = scheduler.get_monitor(&id.to_hex()).await.unwrap();
        assert!(m.next_check >= now);
        assert!(m.next_check < now + TimeDelta::seconds(60));
    }
}

// =============================================================================
// Admin operations and events
// =============================================================================

#[tokio::test]
async fn test_events_follow_mutations() {
    let broadcaster = Arc::new(ChannelBroadcaster::default());
    let mut rx = broadcaster.subscribe();
    let scheduler = SchedulerBuilder::new(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingSink::default()),
    )
    .broadcaster(broadcaster.clone())
    .transports(fake_transports())
    .build();

    let template = Monitor::new(
        LOCAL_HOST_ID,
        Duration::from_secs(5),
        Job::new("entropy", serde_json::Value::Null),
    );
    let a = scheduler.add_monitor(template.clone()).await.unwrap();
    let b = scheduler.add_monitor(template).await.unwrap();
    assert_ne!(a.id, b.id);

    assert!(matches!(
        scheduler.delete_monitor("12345").await,
        Err(SchedulerError::InvalidIdentifier(_))
    ));
    scheduler.delete_monitor(&a.id.to_hex()).await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    let kinds: Vec<MonitorEventKind> = received.iter().map(MonitorEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            MonitorEventKind::Added,
            MonitorEventKind::Added,
            MonitorEventKind::Deleted
        ]
    );
    assert_eq!(received[2], MonitorEvent::Deleted(a.id));
    assert_eq!(scheduler.list_monitors().await.unwrap(), vec![b]);
}

#[tokio::test]
async fn test_host_identity_tags_points() {
    let sink = Arc::new(RecordingSink::default());
    let scheduler = scheduler_over(Arc::new(MemoryStore::new()), sink.clone());
    scheduler.ensure_local_host().await.unwrap();

    let mut m = scheduler
        .add_monitor(Monitor::new(
            LOCAL_HOST_ID,
            Duration::from_secs(1),
            Job::new("hostname", serde_json::Value::Null),
        ))
        .await
        .unwrap();
    m.last_check = t(40_000, 0);
    m.next_check = t(40_001, 0);
    scheduler.update_monitor(m).await.unwrap();

    scheduler.tick(t(40_001, 1)).await.unwrap();
    scheduler.wait_idle().await;

    let batches = sink.batches();
    assert_eq!(batches[0][0].name, "host.Identity");
    assert_eq!(batches[0][0].tags["hostname"], "fake-host");
}

// =============================================================================
// SQLite persistence
// =============================================================================

/// Emits values that cannot be stored as JSON numbers next to a normal one.
struct NonFiniteAgent;

#[async_trait::async_trait]
impl Agent for NonFiniteAgent {
    async fn gather(&mut self, _transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        Ok(vec![
            Point::new("odd.Infinite", f64::INFINITY),
            Point::new("odd.Nan", f64::NAN),
            Point::new("odd.Finite", 1.5),
        ])
    }

    fn doc(&self) -> AgentDoc {
        AgentDoc::new("non-finite values")
    }
}

#[tokio::test]
async fn test_non_finite_values_do_not_stall_scheduling() {
    let storage = StorageBuilder::new("sqlite::memory:").build().await.unwrap();
    let mut agents = AgentRegistry::with_builtins();
    agents.register("nonfinite", AgentDoc::new("non-finite values"), |_| {
        Ok(Box::new(NonFiniteAgent) as Box<dyn Agent>)
    });
    let sink = Arc::new(RecordingSink::default());
    let scheduler = SchedulerBuilder::new(storage.store.clone(), sink.clone())
        .agents(agents)
        .transports(fake_transports())
        .build();
    scheduler.ensure_local_host().await.unwrap();

    let last = t(70_000, 0);
    let jobs = [
        Job::new("muninpluginrunner", serde_json::json!({"command": "overflow-plugin"})),
        Job::new("nonfinite", serde_json::Value::Null),
        Job::new("memorystats", serde_json::Value::Null),
    ];
    for job in jobs {
        let mut m = scheduler
            .add_monitor(Monitor::new(LOCAL_HOST_ID, Duration::from_secs(1), job))
            .await
            .unwrap();
        m.last_check = last;
        m.next_check = t(70_001, 0);
        scheduler.update_monitor(m).await.unwrap();
    }

    let report = scheduler.tick(t(70_001, 10)).await.unwrap();
    assert_eq!(report.dispatched, 3);
    scheduler.wait_idle().await;

    // every monitor is due again and the snapshot still loads
    let report = scheduler.tick(t(70_002, 20)).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.dispatched, 3);
    scheduler.wait_idle().await;

    let monitors = scheduler.list_monitors().await.unwrap();
    assert_eq!(monitors.len(), 3);
    for m in &monitors {
        assert_eq!(m.last_check, t(70_002, 20));
        assert!(m.last_points.iter().all(|p| p.value.is_finite()));
    }
    let munin = monitors
        .iter()
        .find(|m| m.job.agent_id == "muninpluginrunner")
        .unwrap();
    let names: Vec<&str> = munin.last_points.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["small"]);

    let written: Vec<Point> = sink.batches().into_iter().flatten().collect();
    assert!(written.iter().all(|p| p.value.is_finite()));
    assert!(written.iter().any(|p| p.name == "odd.Finite"));
    assert!(!written.iter().any(|p| p.name.starts_with("odd.") && p.name != "odd.Finite"));
}

#[tokio::test]
async fn test_sqlite_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("vigil.db");

    let storage = StorageBuilder::from_path(&path)
        .batch_size(1_000)
        .build()
        .await
        .unwrap();
    let scheduler = scheduler_over(storage.store.clone(), Arc::new(storage.writer.clone()));
    let m = memory_monitor(&scheduler, Duration::from_secs(1), t(50_000, 0)).await;

    scheduler.tick(t(50_001, 10)).await.unwrap();
    scheduler.wait_idle().await;
    storage.writer.flush().await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM points")
        .fetch_one(storage.store.pool().inner())
        .await
        .unwrap();
    assert_eq!(count, 7);

    drop(scheduler);
    storage.shutdown().await.unwrap();

    // reopen: schedule state survived
    let store = SqliteStore::connect(&format!("sqlite:{}", path.display()))
        .await
        .unwrap();
    let stored = store.find_monitor(m.id).await.unwrap().unwrap();
    assert_eq!(stored.last_check, t(50_001, 10));
    assert_eq!(stored.next_check, t(50_002, 10));
    assert_eq!(stored.last_points.len(), 7);
    assert!(store.find_host(LOCAL_HOST_ID).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_get_roundtrip_sqlite() {
    let storage = StorageBuilder::new("sqlite::memory:").build().await.unwrap();
    let scheduler = scheduler_over(storage.store.clone(), Arc::new(storage.writer.clone()));

    let mut m = scheduler
        .add_monitor(Monitor::new(
            LOCAL_HOST_ID,
            Duration::from_millis(1500),
            Job::new(
                "muninpluginrunner",
                serde_json::json!({"command": "/usr/bin/plugin", "prefix": "munin"}),
            ),
        ))
        .await
        .unwrap();
    m.record_check(
        t(60_000, 123),
        vec![Point::new("munin.load", 0.5).at(t(60_000, 123)).with_tag("monitor", "x")],
    );
    scheduler.update_monitor(m.clone()).await.unwrap();

    let back = scheduler.get_monitor(&m.id.to_hex()).await.unwrap();
    assert_eq!(back, m);
}
