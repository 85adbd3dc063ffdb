//! Handler that records every callback, for dispatcher tests

use crate::handler::{HandlerContext, HandlerFactory, UserHandler};
use crate::trade::ObservedState;
use crate::types::{ChatEntryType, Item, ParticipantId};
use std::sync::{Arc, Mutex};

/// Shared log of `participant:callback` entries
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingHandler {
    log: CallLog,
    accept_trades: bool,
}

impl RecordingHandler {
    fn record(&self, ctx: &HandlerContext<'_>, call: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", ctx.other_id(), call));
    }
}

/// Factory handing out recording handlers; `accept_trades` is their trade
/// request decision
pub fn factory(log: CallLog, accept_trades: bool) -> Arc<dyn HandlerFactory> {
    Arc::new(move |_: &ParticipantId| -> Box<dyn UserHandler> {
        Box::new(RecordingHandler {
            log: log.clone(),
            accept_trades,
        })
    })
}

/// Entries recorded for `participant`, without the prefix
pub fn calls_for(log: &CallLog, participant: &str) -> Vec<String> {
    let prefix = format!("{}:", participant);
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

impl UserHandler for RecordingHandler {
    fn on_group_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        self.record(ctx, "group_add");
        false
    }

    fn on_friend_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        self.record(ctx, "friend_add");
        true
    }

    fn on_friend_remove(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "friend_remove");
    }

    fn on_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str, _entry: ChatEntryType) {
        self.record(ctx, &format!("message {}", message));
    }

    fn on_trade_request(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        self.record(ctx, "trade_request");
        self.accept_trades
    }

    fn on_trade_error(&mut self, ctx: &mut HandlerContext<'_>, error: &str) {
        self.record(ctx, &format!("trade_error {}", error));
    }

    fn on_trade_timeout(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "trade_timeout");
    }

    fn on_trade_success(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "trade_success");
    }

    fn on_trade_close(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "trade_close");
        ctx.close_trade().unwrap();
    }

    fn on_trade_init(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "trade_init");
    }

    fn on_trade_add_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item) {
        self.record(ctx, &format!("add_item {}", item.id));
    }

    fn on_trade_remove_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item) {
        self.record(ctx, &format!("remove_item {}", item.id));
    }

    fn on_trade_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str) {
        self.record(ctx, &format!("trade_message {}", message));
    }

    fn on_trade_ready(&mut self, ctx: &mut HandlerContext<'_>, observed: ObservedState) {
        self.record(
            ctx,
            &format!("trade_ready {} {}", observed.local_ready, observed.peer_ready),
        );
    }

    fn on_trade_accept(&mut self, ctx: &mut HandlerContext<'_>) {
        self.record(ctx, "trade_accept");
    }
}
