//! Async session router
//!
//! One tokio task per participant owns that participant's worker. Events are
//! sharded by participant over bounded channels, so a participant's events
//! are handled in arrival order while different participants run
//! concurrently. Each task also polls its active trade on an interval.
//!
//! A task whose participant has gone idle raises a mark carrying the number
//! of events it has handled. The router only closes that task's queue when
//! it has sent exactly that many, so a stopping task never has events left
//! that a replacement task could overtake.

use crate::settings::SharedSettings;
use crate::trade::TradeState;
use crate::types::ParticipantId;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use super::dedup::SeenEvents;
use super::event::{EventKind, ProtocolEvent};
use super::worker::{Dispatch, DropReason, PeerWorker, Services};

/// Events buffered per participant before `route` waits
const WORKER_QUEUE_DEPTH: usize = 256;

/// What a worker task did before it stopped
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSummary {
    pub participant: ParticipantId,
    pub events_handled: u64,
    pub ticks: u64,
    /// Trade state when the task stopped
    pub final_state: TradeState,
}

/// Router's end of one participant's task
struct WorkerHandle {
    events: mpsc::Sender<EventKind>,
    sent: u64,
    /// Events handled plus one when the task last found itself idle; 0 when busy
    idle_mark: Arc<AtomicU64>,
}

impl WorkerHandle {
    fn drained_and_idle(&self) -> bool {
        self.idle_mark.load(Ordering::Acquire) == self.sent + 1
    }
}

pub struct SessionRouter {
    services: Services,
    seen: SeenEvents,
    workers: HashMap<ParticipantId, WorkerHandle>,
    tasks: JoinSet<WorkerSummary>,
    last_sweep: time::Instant,
}

impl SessionRouter {
    pub fn new(services: Services) -> Self {
        let seen = SeenEvents::new(services.config.dedup_window);
        Self {
            services,
            seen,
            workers: HashMap::new(),
            tasks: JoinSet::new(),
            last_sweep: time::Instant::now(),
        }
    }

    /// Settings store handed to workers spawned from now on
    pub fn with_settings(mut self, settings: SharedSettings) -> Self {
        self.services = self.services.with_settings(settings);
        self
    }

    /// Number of participant tasks currently running
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Hand `event` to its participant's task, spawning the task on first
    /// contact
    pub async fn route(&mut self, event: ProtocolEvent) -> Dispatch {
        if !self.seen.insert(event.id) {
            tracing::debug!("Duplicate event {} ({})", event.id, event.kind.name());
            return Dispatch::Duplicate;
        }

        let participant = match event.kind.participant() {
            Some(participant) => participant.clone(),
            None => {
                tracing::warn!("Dropping event {} of unknown kind", event.id);
                return Dispatch::Dropped(DropReason::UnknownKind);
            }
        };

        let outcome = match self.send(&participant, event.kind).await {
            Ok(()) => Dispatch::Queued,
            // the task stopped on its own; give the participant a fresh one
            Err(mpsc::error::SendError(kind)) => {
                tracing::warn!("Worker for {} is gone, restarting it", participant);
                self.workers.remove(&participant);
                match self.send(&participant, kind).await {
                    Ok(()) => Dispatch::Queued,
                    Err(_) => {
                        tracing::warn!(
                            "Worker for {} failed again, dropping event {}",
                            participant,
                            event.id
                        );
                        self.workers.remove(&participant);
                        Dispatch::Dropped(DropReason::WorkerGone)
                    }
                }
            }
        };

        if self.last_sweep.elapsed() >= self.services.config.poll_interval() {
            self.sweep_idle();
        }
        outcome
    }

    async fn send(
        &mut self,
        participant: &ParticipantId,
        kind: EventKind,
    ) -> Result<(), mpsc::error::SendError<EventKind>> {
        if !self.workers.contains_key(participant) {
            self.spawn_worker(participant.clone());
        }
        match self.workers.get_mut(participant) {
            Some(handle) => {
                handle.events.send(kind).await?;
                handle.sent += 1;
                Ok(())
            }
            None => Err(mpsc::error::SendError(kind)),
        }
    }

    fn spawn_worker(&mut self, participant: ParticipantId) {
        let (tx, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
        let worker = self.services.worker(participant.clone(), now());
        let idle_mark = Arc::new(AtomicU64::new(0));
        let options = WorkerOptions {
            poll: self.services.config.poll_interval(),
            idle_after: self.services.config.idle_worker_timeout(),
            idle_mark: idle_mark.clone(),
        };

        tracing::debug!("Starting worker for {}", participant);
        self.tasks.spawn(run_worker(worker, rx, options));
        self.workers.insert(
            participant,
            WorkerHandle {
                events: tx,
                sent: 0,
                idle_mark,
            },
        );
    }

    /// Stop the tasks of participants that went idle after handling every
    /// event sent to them. Returns how many were stopped.
    pub fn sweep_idle(&mut self) -> usize {
        self.last_sweep = time::Instant::now();

        let before = self.workers.len();
        self.workers.retain(|participant, handle| {
            let idle = handle.drained_and_idle();
            if idle {
                tracing::debug!("Stopping idle worker for {}", participant);
            }
            !idle
        });

        while let Some(joined) = self.tasks.try_join_next() {
            match joined {
                Ok(summary) => tracing::debug!(
                    "Worker for {} stopped after {} events",
                    summary.participant,
                    summary.events_handled
                ),
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }
        before - self.workers.len()
    }

    /// Close every queue and wait for the tasks to drain them
    pub async fn shutdown(mut self) -> Vec<WorkerSummary> {
        self.workers.clear();

        let mut summaries = Vec::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }
        summaries.sort_by(|a, b| a.participant.cmp(&b.participant));
        summaries
    }
}

fn now() -> std::time::Instant {
    time::Instant::now().into_std()
}

struct WorkerOptions {
    poll: Duration,
    idle_after: Option<Duration>,
    idle_mark: Arc<AtomicU64>,
}

async fn run_worker(
    mut worker: PeerWorker,
    mut events: mpsc::Receiver<EventKind>,
    options: WorkerOptions,
) -> WorkerSummary {
    // tokio's interval panics on a zero period
    let poll = options.poll.max(Duration::from_millis(1));

    // Random phase so workers spawned together do not poll in lockstep
    let offset = {
        let max = (poll.as_millis() as u64 / 4).max(1);
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    };
    let mut ticker = time::interval_at(time::Instant::now() + poll + offset, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut events_handled = 0u64;
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(kind) => {
                    let outcome = worker.handle(kind, now());
                    if let Dispatch::Dropped(reason) = outcome {
                        tracing::debug!("Event for {} dropped: {:?}", worker.participant(), reason);
                    }
                    events_handled += 1;
                }
                None => break,
            },

            _ = ticker.tick() => {
                let at = now();
                worker.tick(at);
                ticks += 1;

                let idle = options.idle_after.map_or(false, |after| worker.is_idle(at, after));
                let mark = if idle { events_handled + 1 } else { 0 };
                options.idle_mark.store(mark, Ordering::Release);
            }
        }
    }

    let final_state = worker.trade_state();
    if let Some(trade_id) = worker.active_trade() {
        tracing::info!(
            "Worker for {} stopping with trade {} in state {}",
            worker.participant(),
            trade_id,
            final_state
        );
    }

    WorkerSummary {
        participant: worker.participant().clone(),
        events_handled,
        ticks,
        final_state,
    }
}
