//! Inbound protocol events

use crate::trade::TradeSignal;
use crate::types::{ChatEntryType, EventId, Item, ParticipantId, TradeId};
use serde::{Deserialize, Serialize};

/// One inbound occurrence delivered by the transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    pub id: EventId,
    pub kind: EventKind,
}

impl ProtocolEvent {
    pub fn new(id: u64, kind: EventKind) -> Self {
        Self {
            id: EventId(id),
            kind,
        }
    }
}

/// Event payloads, tagged by `type` on the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    FriendAdd {
        from: ParticipantId,
    },
    FriendRemove {
        from: ParticipantId,
    },
    GroupInvite {
        group: ParticipantId,
    },
    ChatMessage {
        from: ParticipantId,
        message: String,
        #[serde(default)]
        entry: ChatEntryType,
    },
    ChatRoomMessage {
        room: ParticipantId,
        sender: ParticipantId,
        message: String,
    },
    BotCommand {
        target: ParticipantId,
        command: String,
    },
    TradeRequestReply {
        from: ParticipantId,
        accepted: bool,
        #[serde(default)]
        response: String,
    },
    TradeRequest {
        from: ParticipantId,
        trade_id: TradeId,
    },
    TradeReady {
        from: ParticipantId,
        trade_id: TradeId,
        ready: bool,
    },
    TradeAccept {
        from: ParticipantId,
        trade_id: TradeId,
    },
    TradeItemAdd {
        from: ParticipantId,
        trade_id: TradeId,
        item: Item,
    },
    TradeItemRemove {
        from: ParticipantId,
        trade_id: TradeId,
        item: Item,
    },
    TradeMessage {
        from: ParticipantId,
        trade_id: TradeId,
        message: String,
    },
    TradeError {
        from: ParticipantId,
        trade_id: TradeId,
        reason: String,
    },
    TradeTimeout {
        from: ParticipantId,
        trade_id: TradeId,
    },
    TradeClose {
        from: ParticipantId,
        trade_id: TradeId,
    },
    /// Any tag this build does not know
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Participant whose handler receives the event
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            EventKind::FriendAdd { from }
            | EventKind::FriendRemove { from }
            | EventKind::ChatMessage { from, .. }
            | EventKind::TradeRequestReply { from, .. }
            | EventKind::TradeRequest { from, .. }
            | EventKind::TradeReady { from, .. }
            | EventKind::TradeAccept { from, .. }
            | EventKind::TradeItemAdd { from, .. }
            | EventKind::TradeItemRemove { from, .. }
            | EventKind::TradeMessage { from, .. }
            | EventKind::TradeError { from, .. }
            | EventKind::TradeTimeout { from, .. }
            | EventKind::TradeClose { from, .. } => Some(from),
            EventKind::GroupInvite { group } => Some(group),
            EventKind::ChatRoomMessage { sender, .. } => Some(sender),
            EventKind::BotCommand { target, .. } => Some(target),
            EventKind::Unknown => None,
        }
    }

    /// Trade the event belongs to, for trade events
    pub fn trade_id(&self) -> Option<&TradeId> {
        match self {
            EventKind::TradeRequest { trade_id, .. }
            | EventKind::TradeReady { trade_id, .. }
            | EventKind::TradeAccept { trade_id, .. }
            | EventKind::TradeItemAdd { trade_id, .. }
            | EventKind::TradeItemRemove { trade_id, .. }
            | EventKind::TradeMessage { trade_id, .. }
            | EventKind::TradeError { trade_id, .. }
            | EventKind::TradeTimeout { trade_id, .. }
            | EventKind::TradeClose { trade_id, .. } => Some(trade_id),
            _ => None,
        }
    }

    /// Whether the event goes through the trade state machine
    pub fn is_trade_event(&self) -> bool {
        self.trade_id().is_some()
    }

    /// State machine input for an in-trade event.
    ///
    /// `None` for direct events and for `TradeRequest`, which opens a session
    /// rather than signalling one.
    pub fn trade_signal(&self) -> Option<(&TradeId, TradeSignal)> {
        let pair = match self {
            EventKind::TradeReady { trade_id, .. } => (trade_id, TradeSignal::Ready),
            EventKind::TradeAccept { trade_id, .. } => (trade_id, TradeSignal::Accept),
            EventKind::TradeItemAdd { trade_id, item, .. } => {
                (trade_id, TradeSignal::ItemAdded(item.clone()))
            }
            EventKind::TradeItemRemove { trade_id, item, .. } => {
                (trade_id, TradeSignal::ItemRemoved(item.clone()))
            }
            EventKind::TradeMessage {
                trade_id, message, ..
            } => (trade_id, TradeSignal::Message(message.clone())),
            EventKind::TradeError {
                trade_id, reason, ..
            } => (trade_id, TradeSignal::Error(reason.clone())),
            EventKind::TradeTimeout { trade_id, .. } => (trade_id, TradeSignal::Timeout),
            EventKind::TradeClose { trade_id, .. } => (trade_id, TradeSignal::Close),
            _ => return None,
        };
        Some(pair)
    }

    /// Wire tag, for logging
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FriendAdd { .. } => "friend_add",
            EventKind::FriendRemove { .. } => "friend_remove",
            EventKind::GroupInvite { .. } => "group_invite",
            EventKind::ChatMessage { .. } => "chat_message",
            EventKind::ChatRoomMessage { .. } => "chat_room_message",
            EventKind::BotCommand { .. } => "bot_command",
            EventKind::TradeRequestReply { .. } => "trade_request_reply",
            EventKind::TradeRequest { .. } => "trade_request",
            EventKind::TradeReady { .. } => "trade_ready",
            EventKind::TradeAccept { .. } => "trade_accept",
            EventKind::TradeItemAdd { .. } => "trade_item_add",
            EventKind::TradeItemRemove { .. } => "trade_item_remove",
            EventKind::TradeMessage { .. } => "trade_message",
            EventKind::TradeError { .. } => "trade_error",
            EventKind::TradeTimeout { .. } => "trade_timeout",
            EventKind::TradeClose { .. } => "trade_close",
            EventKind::Unknown => "unknown",
        }
    }
}
