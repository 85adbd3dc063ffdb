//! Trade session state machine

use crate::config::TradeLimits;
use crate::transport::TradeChannel;
use crate::types::{ParticipantId, TradeId};
use std::time::Instant;

use super::poller::SessionPoller;
use super::types::{Ignored, Notification, ObservedState, TradeSignal, TradeState, Transition};

/// One trade between the bot and a peer
#[derive(Debug)]
pub struct TradeSession {
    trade_id: TradeId,
    local: ParticipantId,
    peer: ParticipantId,
    state: TradeState,
    poller: SessionPoller,
    limits: TradeLimits,
    started_at: Instant,
    last_activity: Instant,
}

impl TradeSession {
    /// Create an idle session over an opened trade channel
    pub fn new(
        local: ParticipantId,
        peer: ParticipantId,
        channel: Box<dyn TradeChannel>,
        limits: TradeLimits,
        now: Instant,
    ) -> Self {
        Self {
            trade_id: channel.trade_id().clone(),
            local,
            peer,
            state: TradeState::Idle,
            poller: SessionPoller::new(channel),
            limits,
            started_at: now,
            last_activity: now,
        }
    }

    pub fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn state(&self) -> TradeState {
        self.state
    }

    pub fn channel_mut(&mut self) -> &mut dyn TradeChannel {
        self.poller.channel_mut()
    }

    /// Apply the handler's decision on the incoming trade request
    pub fn request(&mut self, approved: bool) -> Transition {
        let from = self.state;
        if from != TradeState::Idle {
            return Transition::unchanged(from, Ignored::NotApplicable);
        }

        let mut notes = Vec::new();
        if approved {
            self.state = TradeState::Requested;
            notes.push(Notification::Init);
        }
        self.finish(from, notes, None)
    }

    /// Apply one trade signal received from the transport
    pub fn apply(&mut self, signal: TradeSignal, now: Instant) -> Transition {
        let from = self.state;
        if from.is_terminal() {
            return Transition::unchanged(from, Ignored::Terminal);
        }
        if from == TradeState::Idle {
            return Transition::unchanged(from, Ignored::NotApplicable);
        }

        let mut notes = Vec::new();
        let mut ignored = None;

        match signal {
            TradeSignal::Error(reason) => self.fail(reason, &mut notes),
            TradeSignal::Timeout => self.time_out(&mut notes),
            TradeSignal::Close => self.close(&mut notes),
            TradeSignal::Ready => {
                self.touch(now);
                self.observe(&mut notes);
            }
            TradeSignal::Accept => {
                self.touch(now);
                ignored = self.accept(&mut notes);
            }
            TradeSignal::ItemAdded(item) => {
                self.touch(now);
                if self.state.is_negotiating() {
                    notes.push(Notification::ItemAdded(item));
                } else {
                    ignored = Some(Ignored::NotApplicable);
                }
            }
            TradeSignal::ItemRemoved(item) => {
                self.touch(now);
                if self.state.is_negotiating() {
                    notes.push(Notification::ItemRemoved(item));
                } else {
                    ignored = Some(Ignored::NotApplicable);
                }
            }
            TradeSignal::Message(message) => {
                self.touch(now);
                if self.state.is_negotiating() || self.state == TradeState::Accepted {
                    notes.push(Notification::Message(message));
                } else {
                    ignored = Some(Ignored::NotApplicable);
                }
            }
        }

        self.finish(from, notes, ignored)
    }

    /// Periodic poll: enforce deadlines, then sample readiness
    pub fn tick(&mut self, now: Instant) -> Transition {
        let from = self.state;
        if from.is_terminal() {
            return Transition::unchanged(from, Ignored::Terminal);
        }
        if from == TradeState::Idle {
            return Transition::unchanged(from, Ignored::NotApplicable);
        }

        let mut notes = Vec::new();
        if self.is_expired(now) {
            self.time_out(&mut notes);
        } else if self.state != TradeState::Accepted {
            self.begin_negotiation();
            if let Some(observed) = self.observe(&mut notes) {
                if observed.changed {
                    self.last_activity = now;
                }
            }
        }

        self.finish(from, notes, None)
    }

    /// Whether either deadline has passed at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= self.limits.inactivity
            || now.saturating_duration_since(self.started_at) >= self.limits.max_duration
    }

    fn finish(
        &self,
        from: TradeState,
        notifications: Vec<Notification>,
        ignored: Option<Ignored>,
    ) -> Transition {
        Transition {
            from,
            to: self.state,
            notifications,
            ignored,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.begin_negotiation();
        self.last_activity = now;
    }

    fn begin_negotiation(&mut self) {
        if self.state == TradeState::Requested {
            self.state = TradeState::Negotiating;
        }
    }

    /// Sample readiness; a change while negotiating (re)enters ReadyPending
    fn observe(&mut self, notes: &mut Vec<Notification>) -> Option<ObservedState> {
        match self.poller.sample() {
            Ok(observed) => {
                if observed.changed && self.state.is_negotiating() {
                    self.state = TradeState::ReadyPending;
                    notes.push(Notification::Ready(observed));
                }
                Some(observed)
            }
            Err(gone) => {
                self.fail(gone.to_string(), notes);
                None
            }
        }
    }

    fn accept(&mut self, notes: &mut Vec<Notification>) -> Option<Ignored> {
        // Re-sample first: the peer may have withdrawn since the last poll.
        let observed = self.observe(notes)?;

        match self.state {
            TradeState::ReadyPending if observed.both_ready() => {
                self.state = TradeState::Accepted;
                notes.push(Notification::Accept);
                None
            }
            TradeState::ReadyPending => {
                self.state = TradeState::Negotiating;
                Some(Ignored::GuardViolation)
            }
            TradeState::Negotiating => Some(Ignored::GuardViolation),
            _ => Some(Ignored::NotApplicable),
        }
    }

    fn fail(&mut self, reason: String, notes: &mut Vec<Notification>) {
        self.state = TradeState::Errored;
        notes.push(Notification::Error(reason));
    }

    fn time_out(&mut self, notes: &mut Vec<Notification>) {
        self.state = TradeState::TimedOut;
        notes.push(Notification::Timeout);
    }

    fn close(&mut self, notes: &mut Vec<Notification>) {
        if self.state == TradeState::Accepted {
            notes.push(Notification::Success);
        }
        self.state = TradeState::Closed;
        notes.push(Notification::Close);
    }
}
