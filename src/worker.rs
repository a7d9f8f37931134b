// src/worker.rs
//! Single sequential worker that owns the [`FilterEngine`].
//!
//! Events arrive over an mpsc channel and are judged one at a time, in
//! order. Observers get a rate notice and the decision for every event.
//! Shutdown is checked between events only, so an event is either fully
//! judged or not touched.
//!
//! Events are judged at the worker's own arrival clock, never earlier than
//! the previous arrival. `ChatEvent::received_at` is carried along as
//! metadata and does not move the engine's time.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::event::ChatEvent;
use crate::filter::{Decision, FilterEngine};
use crate::rate::RateState;

/// Receives filter output. Called on the worker task, so keep it cheap.
pub trait FilterObserver: Send + Sync {
    /// Emitted for every event, blocked or not.
    fn on_rate(&self, state: RateState);
    fn on_decision(&self, event: &ChatEvent, decision: &Decision);
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl FilterObserver for NoopObserver {
    fn on_rate(&self, _state: RateState) {}
    fn on_decision(&self, _event: &ChatEvent, _decision: &Decision) {}
}

/// What presentation subscribers receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterNotice {
    Rate {
        filter_active: bool,
        messages_per_second: f64,
    },
    Decision {
        user: String,
        /// Stable colour for the user name, `0..360`.
        hue: u16,
        text: String,
        decision: Decision,
    },
}

/// Fans notices out over a broadcast channel and remembers the last rate.
#[derive(Debug)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<FilterNotice>,
    last_rate: RwLock<Option<RateState>>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last_rate: RwLock::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FilterNotice> {
        self.tx.subscribe()
    }

    pub fn last_rate(&self) -> Option<RateState> {
        self.last_rate.read().ok().and_then(|g| *g)
    }
}

impl FilterObserver for BroadcastObserver {
    fn on_rate(&self, state: RateState) {
        if let Ok(mut g) = self.last_rate.write() {
            *g = Some(state);
        }
        // No subscribers is fine.
        let _ = self.tx.send(FilterNotice::Rate {
            filter_active: state.filter_active,
            messages_per_second: state.messages_per_second,
        });
    }

    fn on_decision(&self, event: &ChatEvent, decision: &Decision) {
        let _ = self.tx.send(FilterNotice::Decision {
            user: event.user.clone(),
            hue: event.name_hue(),
            text: event.text.clone(),
            decision: *decision,
        });
    }
}

struct Job {
    event: ChatEvent,
    reply: Option<oneshot::Sender<Decision>>,
}

/// Cheap, clonable front door to the worker.
#[derive(Clone)]
pub struct FilterClient {
    tx: mpsc::Sender<Job>,
}

impl FilterClient {
    /// Queue an event and wait for its decision.
    pub async fn decide(&self, event: ChatEvent) -> Result<Decision> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                event,
                reply: Some(reply),
            })
            .await
            .map_err(|_| anyhow!("filter worker is not running"))?;
        rx.await.context("filter worker stopped before deciding")
    }

    /// Queue an event; the outcome only goes to observers.
    pub async fn submit(&self, event: ChatEvent) -> Result<()> {
        self.tx
            .send(Job { event, reply: None })
            .await
            .map_err(|_| anyhow!("filter worker is not running"))
    }
}

/// Handle to a running worker.
pub struct FilterWorker {
    client: FilterClient,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<FilterEngine>,
}

impl FilterWorker {
    pub fn client(&self) -> FilterClient {
        self.client.clone()
    }

    /// Stop after the event in progress and hand back the engine.
    pub async fn stop(self) -> Result<FilterEngine> {
        let _ = self.shutdown.send(true);
        drop(self.client);
        self.handle.await.context("filter worker panicked")
    }

    /// Let the worker run on its own; it ends when every client is dropped.
    pub fn detach(self) -> FilterClient {
        self.client
    }
}

/// Spawn the worker on the current Tokio runtime, judging at wall-clock
/// arrival time.
pub fn spawn_worker(
    engine: FilterEngine,
    observer: Arc<dyn FilterObserver>,
    queue: usize,
) -> FilterWorker {
    spawn_worker_with_clock(engine, observer, queue, Utc::now)
}

/// Like [`spawn_worker`] with an explicit arrival clock.
pub fn spawn_worker_with_clock<C>(
    engine: FilterEngine,
    observer: Arc<dyn FilterObserver>,
    queue: usize,
    clock: C,
) -> FilterWorker
where
    C: Fn() -> DateTime<Utc> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(queue.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run(engine, rx, observer, shutdown_rx, clock));
    FilterWorker {
        client: FilterClient { tx },
        shutdown: shutdown_tx,
        handle,
    }
}

async fn run<C>(
    mut engine: FilterEngine,
    mut rx: mpsc::Receiver<Job>,
    observer: Arc<dyn FilterObserver>,
    mut shutdown: watch::Receiver<bool>,
    clock: C,
) -> FilterEngine
where
    C: Fn() -> DateTime<Utc>,
{
    let mut shutdown_gone = false;
    let mut last_arrival: Option<DateTime<Utc>> = None;
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed(), if !shutdown_gone => {
                match changed {
                    Ok(()) if *shutdown.borrow_and_update() => {
                        info!(target: "chatgate", "filter worker shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => shutdown_gone = true,
                }
            }
            job = rx.recv() => {
                let Some(job) = job else {
                    debug!(target: "chatgate", "event channel closed");
                    break;
                };
                // The rate window needs a clock that never runs backwards.
                let arrival = clock();
                let now = last_arrival.map_or(arrival, |last| arrival.max(last));
                last_arrival = Some(now);
                let decision = engine.decide_at(&job.event, now);
                observer.on_rate(decision.rate());
                observer.on_decision(&job.event, &decision);
                if let Some(reply) = job.reply {
                    let _ = reply.send(decision);
                }
            }
        }
    }
    engine
}
