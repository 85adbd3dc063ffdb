//! Synchronous event dispatcher
//!
//! Drives every participant's worker on the caller's thread. The async
//! [`SessionRouter`](super::SessionRouter) runs the same workers on their own
//! tasks; this one is what embedders with their own loop (and the tests) use.

use crate::settings::SharedSettings;
use crate::trade::TradeState;
use crate::types::{ParticipantId, TradeId};
use std::collections::HashMap;
use std::time::Instant;

use super::dedup::SeenEvents;
use super::event::ProtocolEvent;
use super::worker::{Dispatch, DropReason, PeerWorker, Services};

pub struct Dispatcher {
    services: Services,
    seen: SeenEvents,
    workers: HashMap<ParticipantId, PeerWorker>,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        let seen = SeenEvents::new(services.config.dedup_window);
        Self {
            services,
            seen,
            workers: HashMap::new(),
        }
    }

    pub fn with_settings(mut self, settings: SharedSettings) -> Self {
        self.services = self.services.with_settings(settings);
        self
    }

    pub fn dispatch(&mut self, event: ProtocolEvent) -> Dispatch {
        self.dispatch_at(event, Instant::now())
    }

    /// Dispatch `event` as if received at `now`
    pub fn dispatch_at(&mut self, event: ProtocolEvent, now: Instant) -> Dispatch {
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

        let services = &self.services;
        let worker = self
            .workers
            .entry(participant)
            .or_insert_with_key(|p| services.worker(p.clone(), now));
        worker.handle(event.kind, now)
    }

    /// Poll every active trade, then forget participants that went idle
    pub fn tick(&mut self, now: Instant) {
        for worker in self.workers.values_mut() {
            worker.tick(now);
        }

        if let Some(after) = self.services.config.idle_worker_timeout() {
            self.workers.retain(|participant, worker| {
                let idle = worker.is_idle(now, after);
                if idle {
                    tracing::debug!("Dropping idle worker for {}", participant);
                }
                !idle
            });
        }
    }

    /// Participants currently holding a worker
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// State of `participant`'s trade; `Idle` when it has none
    pub fn trade_state(&self, participant: &ParticipantId) -> TradeState {
        self.workers
            .get(participant)
            .map(|w| w.trade_state())
            .unwrap_or(TradeState::Idle)
    }

    /// Trades currently held open, by participant
    pub fn active_trades(&self) -> Vec<(ParticipantId, TradeId)> {
        let mut trades: Vec<_> = self
            .workers
            .values()
            .filter_map(|w| w.active_trade().map(|t| (w.participant().clone(), t.clone())))
            .collect();
        trades.sort_by(|a, b| a.0.cmp(&b.0));
        trades
    }
}
