//! Per-participant worker
//!
//! Owns one participant's handler and at most one trade session. All events
//! for that participant pass through here strictly one at a time.

use crate::config::BotConfig;
use crate::error::Result;
use crate::handler::{HandlerContext, HandlerFactory, UserHandler};
use crate::settings::SharedSettings;
use crate::trade::{Notification, TradeSession, TradeState, Transition};
use crate::transport::{TradeChannel, Transport};
use crate::types::{ParticipantId, TradeId};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::dedup::RecentSet;
use super::event::EventKind;

/// Outcome of dispatching one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Handled synchronously
    Delivered,
    /// Handed to the participant's worker task
    Queued,
    /// Event id already seen
    Duplicate,
    Dropped(DropReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Kind not recognised
    UnknownKind,
    /// Trade already finished or was declined
    RetiredTrade,
    /// Trade was never opened
    UnknownTrade,
    /// Participant already has an active trade
    SessionBusy,
    /// Transport refused to open the trade
    TransportFailure,
    /// Participant's worker task is gone
    WorkerGone,
}

/// Collaborators shared by every worker
#[derive(Clone)]
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub config: Arc<BotConfig>,
    pub settings: Option<SharedSettings>,
    pub factory: Arc<dyn HandlerFactory>,
}

impl Services {
    /// Fails when `config` does not pass [`BotConfig::validate`]
    pub fn new(
        transport: Arc<dyn Transport>,
        config: BotConfig,
        factory: Arc<dyn HandlerFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            config: Arc::new(config),
            settings: None,
            factory,
        })
    }

    pub fn with_settings(mut self, settings: SharedSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Fresh worker for `participant`, with a handler from the factory
    pub fn worker(&self, participant: ParticipantId, now: Instant) -> PeerWorker {
        let handler = self.factory.create(&participant);
        PeerWorker {
            env: WorkerEnv {
                local: self.transport.local_id(),
                participant,
                transport: self.transport.clone(),
                config: self.config.clone(),
                settings: self.settings.clone(),
            },
            handler,
            session: None,
            retired: RecentSet::new(self.config.retired_window),
            last_event: now,
        }
    }
}

struct WorkerEnv {
    local: ParticipantId,
    participant: ParticipantId,
    transport: Arc<dyn Transport>,
    config: Arc<BotConfig>,
    settings: Option<SharedSettings>,
}

impl WorkerEnv {
    fn context<'a>(&'a self, trade: Option<&'a mut dyn TradeChannel>) -> HandlerContext<'a> {
        HandlerContext::new(
            &self.local,
            &self.participant,
            self.transport.as_ref(),
            &self.config,
        )
        .with_trade(trade)
        .with_settings(self.settings.as_ref())
    }
}

/// Handler plus trade session for one participant
pub struct PeerWorker {
    env: WorkerEnv,
    handler: Box<dyn UserHandler>,
    session: Option<TradeSession>,
    retired: RecentSet<TradeId>,
    last_event: Instant,
}

impl PeerWorker {
    pub fn participant(&self) -> &ParticipantId {
        &self.env.participant
    }

    /// State of the current trade; `Idle` when there is none
    pub fn trade_state(&self) -> TradeState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(TradeState::Idle)
    }

    pub fn active_trade(&self) -> Option<&TradeId> {
        self.session.as_ref().map(|s| s.trade_id())
    }

    /// No active trade and no event for at least `after`
    pub fn is_idle(&self, now: Instant, after: Duration) -> bool {
        self.session.is_none() && now.saturating_duration_since(self.last_event) >= after
    }

    /// Process one event for this participant
    pub fn handle(&mut self, kind: EventKind, now: Instant) -> Dispatch {
        tracing::debug!("{} event for {}", kind.name(), self.env.participant);
        self.last_event = self.last_event.max(now);

        if let Some((trade_id, signal)) = kind.trade_signal() {
            let trade_id = trade_id.clone();
            return self.signal_trade(&trade_id, signal, now);
        }

        match kind {
            EventKind::TradeRequest { trade_id, .. } => self.open_trade(trade_id, now),
            EventKind::FriendAdd { .. } => {
                let mut ctx = self.env.context(None);
                let accept = self.handler.on_friend_add(&mut ctx);
                let result = self
                    .env
                    .transport
                    .respond_friend_request(&self.env.participant, accept);
                if let Err(e) = result {
                    tracing::warn!("Could not answer friend request from {}: {}", self.env.participant, e);
                }
                Dispatch::Delivered
            }
            EventKind::FriendRemove { .. } => {
                let mut ctx = self.env.context(None);
                self.handler.on_friend_remove(&mut ctx);
                Dispatch::Delivered
            }
            EventKind::GroupInvite { .. } => {
                let mut ctx = self.env.context(None);
                let accept = self.handler.on_group_add(&mut ctx);
                let result = self
                    .env
                    .transport
                    .respond_group_invite(&self.env.participant, accept);
                if let Err(e) = result {
                    tracing::warn!("Could not answer group invite {}: {}", self.env.participant, e);
                }
                Dispatch::Delivered
            }
            EventKind::ChatMessage { message, entry, .. } => {
                let mut ctx = self.env.context(self.session.as_mut().map(|s| s.channel_mut()));
                self.handler.on_message(&mut ctx, &message, entry);
                Dispatch::Delivered
            }
            EventKind::ChatRoomMessage {
                room,
                sender,
                message,
            } => {
                let mut ctx = self.env.context(None);
                self.handler
                    .on_chat_room_message(&mut ctx, &room, &sender, &message);
                Dispatch::Delivered
            }
            EventKind::BotCommand { command, .. } => {
                let mut ctx = self.env.context(self.session.as_mut().map(|s| s.channel_mut()));
                self.handler.on_bot_command(&mut ctx, &command);
                Dispatch::Delivered
            }
            EventKind::TradeRequestReply {
                accepted, response, ..
            } => {
                let mut ctx = self.env.context(None);
                self.handler
                    .on_trade_request_reply(&mut ctx, accepted, &response);
                Dispatch::Delivered
            }
            other => {
                tracing::warn!("Dropping unrecognised {} event", other.name());
                Dispatch::Dropped(DropReason::UnknownKind)
            }
        }
    }

    /// Periodic poll of the active trade
    pub fn tick(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            let transition = session.tick(now);
            self.settle(transition);
        }
    }

    fn open_trade(&mut self, trade_id: TradeId, now: Instant) -> Dispatch {
        if self.retired.contains(&trade_id) {
            tracing::debug!("Ignoring repeated request for finished trade {}", trade_id);
            return Dispatch::Dropped(DropReason::RetiredTrade);
        }
        if let Some(active) = &self.session {
            tracing::warn!(
                "{} requested trade {} while trade {} is active",
                self.env.participant,
                trade_id,
                active.trade_id()
            );
            return Dispatch::Dropped(DropReason::SessionBusy);
        }

        let channel = match self
            .env
            .transport
            .open_trade(&trade_id, &self.env.participant)
        {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!("Could not open trade {}: {}", trade_id, e);
                return Dispatch::Dropped(DropReason::TransportFailure);
            }
        };

        let mut session = TradeSession::new(
            self.env.local.clone(),
            self.env.participant.clone(),
            channel,
            self.env.config.limits(),
            now,
        );

        let mut ctx = self.env.context(None);
        let approved = self.handler.on_trade_request(&mut ctx);

        if let Err(e) = session.channel_mut().respond_request(approved) {
            tracing::warn!("Could not answer trade request {}: {}", trade_id, e);
        }

        let transition = session.request(approved);
        self.session = Some(session);
        self.settle(transition);
        Dispatch::Delivered
    }

    fn signal_trade(
        &mut self,
        trade_id: &TradeId,
        signal: crate::trade::TradeSignal,
        now: Instant,
    ) -> Dispatch {
        let session = match self.session.as_mut() {
            Some(session) if session.trade_id() == trade_id => session,
            _ if self.retired.contains(trade_id) => {
                tracing::debug!("Dropping event for finished trade {}", trade_id);
                return Dispatch::Dropped(DropReason::RetiredTrade);
            }
            _ => {
                tracing::warn!(
                    "Dropping event for unknown trade {} from {}",
                    trade_id,
                    self.env.participant
                );
                return Dispatch::Dropped(DropReason::UnknownTrade);
            }
        };

        let transition = session.apply(signal, now);
        self.settle(transition);
        Dispatch::Delivered
    }

    /// Deliver a transition's notifications, then release the session if it
    /// ended.
    fn settle(&mut self, transition: Transition) {
        let trade_id = match self.session.as_ref() {
            Some(session) => session.trade_id().clone(),
            None => return,
        };

        if transition.from != transition.to {
            tracing::info!(
                "Trade {} with {}: {} -> {}",
                trade_id,
                self.env.participant,
                transition.from,
                transition.to
            );
        }
        if let Some(reason) = transition.ignored {
            tracing::debug!("Trade {} ignored signal: {:?}", trade_id, reason);
        }

        for note in transition.notifications {
            let mut ctx = self.env.context(self.session.as_mut().map(|s| s.channel_mut()));
            deliver(self.handler.as_mut(), &mut ctx, note);
        }

        if transition.to == TradeState::Idle || transition.to.is_terminal() {
            if let Some(mut session) = self.session.take() {
                session.channel_mut().release();
            }
            self.retired.insert(trade_id.clone());
            tracing::debug!("Released trade {}", trade_id);
        }
    }
}

fn deliver(handler: &mut dyn UserHandler, ctx: &mut HandlerContext<'_>, note: Notification) {
    match note {
        Notification::Init => handler.on_trade_init(ctx),
        Notification::ItemAdded(item) => handler.on_trade_add_item(ctx, &item),
        Notification::ItemRemoved(item) => handler.on_trade_remove_item(ctx, &item),
        Notification::Message(message) => handler.on_trade_message(ctx, &message),
        Notification::Ready(observed) => handler.on_trade_ready(ctx, observed),
        Notification::Accept => handler.on_trade_accept(ctx),
        Notification::Error(reason) => handler.on_trade_error(ctx, &reason),
        Notification::Timeout => handler.on_trade_timeout(ctx),
        Notification::Success => handler.on_trade_success(ctx),
        Notification::Close => handler.on_trade_close(ctx),
    }
}
