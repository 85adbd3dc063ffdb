//! Boundary to the session/transport library
//!
//! The transport owns the connection, the raw readiness flags of each trade
//! and every outbound action. The core only talks to it through these traits.

pub mod memory;

use crate::error::Result;
use crate::types::{Item, ParticipantId, PersonaState, Readiness, TradeId};

pub use memory::{MemoryTransport, OutboundAction};

/// Presentation actions a handler may invoke back into the bot
pub trait BotControl: Send + Sync {
    /// Change the advertised presence state
    fn set_status(&self, state: PersonaState) -> Result<()>;

    /// Change the advertised status line
    fn set_chat_status(&self, message: &str) -> Result<()>;

    /// Open a chat window with `peer`; false when the peer is unreachable
    fn open_chat(&self, peer: &ParticipantId) -> bool;

    /// Send a direct chat message
    fn send_chat(&self, peer: &ParticipantId, message: &str) -> Result<()>;

    /// Tell `peer` the state of a trade
    fn send_trade_state(&self, peer: &ParticipantId, trade_id: &TradeId) -> Result<()>;

    /// Tell `peer` a trade failed
    fn send_trade_error(&self, peer: &ParticipantId, message: &str) -> Result<()>;
}

/// Session-level transport operations
pub trait Transport: BotControl {
    /// Identifier of the bot itself
    fn local_id(&self) -> ParticipantId;

    /// Answer a pending friend request
    fn respond_friend_request(&self, peer: &ParticipantId, accept: bool) -> Result<()>;

    /// Answer a pending group invite
    fn respond_group_invite(&self, group: &ParticipantId, accept: bool) -> Result<()>;

    /// Open a handle on the trade `peer` requested
    fn open_trade(&self, trade_id: &TradeId, peer: &ParticipantId) -> Result<Box<dyn TradeChannel>>;
}

/// Source of the raw readiness flags of one trade
pub trait ReadinessSource {
    /// Current flags, or `None` once the trade no longer exists
    fn readiness(&self) -> Option<Readiness>;
}

/// Handle on one trade held by the transport
pub trait TradeChannel: ReadinessSource + Send {
    fn trade_id(&self) -> &TradeId;

    /// Accept or decline the pending trade request
    fn respond_request(&mut self, accept: bool) -> Result<()>;

    /// Set the local readiness flag
    fn set_ready(&mut self, ready: bool) -> Result<()>;

    fn add_item(&mut self, item: &Item) -> Result<()>;

    fn remove_item(&mut self, item: &Item) -> Result<()>;

    /// Send a message inside the trade window
    fn send_message(&mut self, message: &str) -> Result<()>;

    /// Confirm the trade on the local side
    fn request_accept(&mut self) -> Result<()>;

    /// Close the trade and release transport-side resources
    fn request_close(&mut self) -> Result<()>;

    /// Forget the trade without messaging the peer. Called once the session
    /// has ended for any reason; reading flags afterwards yields `None`.
    fn release(&mut self);
}
