//! Policy handlers
//!
//! A deployment plugs its policy into the bot by implementing [`UserHandler`].
//! Decisions that affect an outcome (friend/group/trade acceptance, error and
//! timeout handling) have no default and must be written out; passive
//! notifications (chat room messages, bot commands, replies to bot-initiated
//! trade requests) default to doing nothing, and `on_trade_close` defaults to
//! the standard close.

pub mod context;
pub mod standard;

use crate::types::{ChatEntryType, Item, ParticipantId};
use crate::trade::ObservedState;

pub use context::HandlerContext;
pub use standard::StandardHandler;

/// Policy for one participant the bot interacts with
pub trait UserHandler: Send {
    /// Invited to a group; returns whether to join
    fn on_group_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool;

    /// Added as a friend; returns whether to accept
    fn on_friend_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool;

    fn on_friend_remove(&mut self, ctx: &mut HandlerContext<'_>);

    /// Direct chat message (regular or emote)
    fn on_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str, entry: ChatEntryType);

    /// Trade requested; returns whether to accept the request
    fn on_trade_request(&mut self, ctx: &mut HandlerContext<'_>) -> bool;

    /// Message in a group chat room
    fn on_chat_room_message(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _room: &ParticipantId,
        _sender: &ParticipantId,
        _message: &str,
    ) {
    }

    /// Command issued by the bot operator
    fn on_bot_command(&mut self, _ctx: &mut HandlerContext<'_>, _command: &str) {}

    /// Peer answered a trade request the bot sent
    fn on_trade_request_reply(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _accepted: bool,
        _response: &str,
    ) {
    }

    fn on_trade_error(&mut self, ctx: &mut HandlerContext<'_>, error: &str);

    fn on_trade_timeout(&mut self, ctx: &mut HandlerContext<'_>);

    /// Accepted trade completed
    fn on_trade_success(&mut self, ctx: &mut HandlerContext<'_>);

    /// Trade closed; the default logs and closes the trade on our side
    fn on_trade_close(&mut self, ctx: &mut HandlerContext<'_>) {
        tracing::warn!("Trade with {} closed", ctx.other_id());
        if let Err(e) = ctx.close_trade() {
            tracing::warn!("Failed to close trade with {}: {}", ctx.other_id(), e);
        }
    }

    fn on_trade_init(&mut self, ctx: &mut HandlerContext<'_>);

    fn on_trade_add_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item);

    fn on_trade_remove_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item);

    fn on_trade_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str);

    /// Readiness changed; `observed` is the sample that saw the change
    fn on_trade_ready(&mut self, ctx: &mut HandlerContext<'_>, observed: ObservedState);

    /// Both sides ready and the peer confirmed
    fn on_trade_accept(&mut self, ctx: &mut HandlerContext<'_>);
}

/// Builds the handler for a participant on first contact
pub trait HandlerFactory: Send + Sync {
    fn create(&self, participant: &ParticipantId) -> Box<dyn UserHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&ParticipantId) -> Box<dyn UserHandler> + Send + Sync,
{
    fn create(&self, participant: &ParticipantId) -> Box<dyn UserHandler> {
        self(participant)
    }
}
