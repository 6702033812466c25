//! Test doubles for scheduler tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Notify, Semaphore};

use crate::agent::testing::ScriptedTransport;
use crate::agent::{Agent, AgentDoc, AgentError, AgentRegistry};
use crate::broadcast::{Broadcaster, MonitorEvent, MonitorEventKind};
use crate::model::Point;
use crate::sink::{PointSink, SinkError};
use crate::storage::MemoryStore;
use crate::transport::{Transport, TransportRegistry};

use super::{Scheduler, SchedulerBuilder};

/// Agent key of the [`Probe`] agent.
pub const PROBE: &str = "probe";

/// Transport key answering `hostname` with `web-7`.
pub const SCRIPTED: &str = "scripted";

pub fn t(secs: i64, millis: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, millis * 1_000_000).unwrap()
}

#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Point>>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl PointSink for RecordingSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.batches.lock().unwrap().push(points.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<MonitorEventKind> {
        self.events().iter().map(MonitorEvent::kind).collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: MonitorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Shared controls of every probe agent instance.
struct ProbeState {
    builds: AtomicUsize,
    calls: AtomicUsize,
    fail: AtomicBool,
    hold: AtomicBool,
    gate: Semaphore,
    started: Notify,
}

/// Handle on the probe agent: counts builds and gathers, can fail or block.
#[derive(Clone)]
pub struct Probe(Arc<ProbeState>);

impl Default for Probe {
    fn default() -> Self {
        Self(Arc::new(ProbeState {
            builds: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
            started: Notify::new(),
        }))
    }
}

impl Probe {
    pub fn builds(&self) -> usize {
        self.0.builds.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.0.fail.store(fail, Ordering::SeqCst);
    }

    /// Block every gather until [`release`](Self::release).
    pub fn hold(&self) {
        self.0.hold.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, n: usize) {
        self.0.gate.add_permits(n);
    }

    /// Wait until at least `n` gathers have started.
    pub async fn wait_started(&self, n: usize) {
        loop {
            let notified = self.0.started.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }

    fn register(&self, registry: &mut AgentRegistry) {
        let state = Arc::clone(&self.0);
        registry.register(PROBE, AgentDoc::new("test probe"), move |_| {
            state.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ProbeAgent {
                state: Arc::clone(&state),
                gathered: 0,
            }) as Box<dyn Agent>)
        });
    }
}

struct ProbeAgent {
    state: Arc<ProbeState>,
    gathered: usize,
}

#[async_trait::async_trait]
impl Agent for ProbeAgent {
    async fn gather(&mut self, _transport: &dyn Transport) -> Result<Vec<Point>, AgentError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.started.notify_waiters();

        if self.state.hold.load(Ordering::SeqCst) {
            self.state.gate.acquire().await.unwrap().forget();
        }
        if self.state.fail.load(Ordering::SeqCst) {
            return Err(AgentError::Parse("probe failure".to_string()));
        }

        self.gathered += 1;
        Ok(vec![Point::new("probe.Value", self.gathered as f64)])
    }

    fn doc(&self) -> AgentDoc {
        AgentDoc::new("test probe")
    }
}

pub struct Harness {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub events: Arc<RecordingBroadcaster>,
    pub probe: Probe,
}

pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

pub fn harness_with(configure: impl FnOnce(SchedulerBuilder) -> SchedulerBuilder) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let events = Arc::new(RecordingBroadcaster::default());
    let probe = Probe::default();

    let mut agents = AgentRegistry::with_builtins();
    probe.register(&mut agents);

    let mut transports = TransportRegistry::with_builtins();
    transports.register(SCRIPTED, |_| {
        Ok(Arc::new(ScriptedTransport::new().with_output("hostname", "web-7\n")) as Arc<dyn Transport>)
    });

    let builder = SchedulerBuilder::new(store.clone(), sink.clone())
        .broadcaster(events.clone())
        .agents(agents)
        .transports(transports);
    let scheduler = configure(builder).build();

    Harness {
        scheduler,
        store,
        sink,
        events,
        probe,
    }
}
