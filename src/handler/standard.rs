//! Ready-made handler policy
//!
//! Accepts friends, optionally joins groups, trades with anyone (or admins
//! only), mirrors the peer's readiness and confirms when asked. Completed
//! trades are counted in the settings store.

use super::{HandlerContext, UserHandler};
use crate::error::Result;
use crate::trade::ObservedState;
use crate::types::{ChatEntryType, Item, PersonaState};

/// Settings key holding the number of completed trades
pub const TRADES_COMPLETED_KEY: &str = "trades_completed";

/// Default policy used by the `run` command
#[derive(Debug, Default)]
pub struct StandardHandler {
    offered: Vec<Item>,
}

impl StandardHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items the peer currently has in the trade window
    pub fn offered(&self) -> &[Item] {
        &self.offered
    }
}

fn log_failure(action: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!("{} failed: {}", action, e);
    }
}

impl UserHandler for StandardHandler {
    fn on_group_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        let accept = ctx.config().accept_group_invites;
        tracing::info!("Group invite from {} (accept: {})", ctx.other_id(), accept);
        accept
    }

    fn on_friend_add(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        tracing::info!("{} added us as a friend", ctx.other_id());
        true
    }

    fn on_friend_remove(&mut self, ctx: &mut HandlerContext<'_>) {
        tracing::info!("{} removed us as a friend", ctx.other_id());
    }

    fn on_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str, entry: ChatEntryType) {
        tracing::info!("Chat from {} ({:?}): {}", ctx.other_id(), entry, message);
        if entry == ChatEntryType::ChatMsg {
            log_failure(
                "chat reply",
                ctx.send_chat("Hi! Send me a trade request to get started."),
            );
        }
    }

    fn on_trade_request(&mut self, ctx: &mut HandlerContext<'_>) -> bool {
        let accept = !ctx.config().trade_admins_only || ctx.is_admin();
        tracing::info!("Trade request from {} (accept: {})", ctx.other_id(), accept);
        accept
    }

    fn on_bot_command(&mut self, ctx: &mut HandlerContext<'_>, command: &str) {
        let state = match command.trim() {
            "online" => PersonaState::Online,
            "busy" => PersonaState::Busy,
            "away" => PersonaState::Away,
            "trade" => PersonaState::LookingToTrade,
            other => {
                tracing::warn!("Unknown bot command: {}", other);
                return;
            }
        };
        log_failure("set status", ctx.set_status(state));
    }

    fn on_trade_error(&mut self, ctx: &mut HandlerContext<'_>, error: &str) {
        tracing::warn!("Trade with {} failed: {}", ctx.other_id(), error);
        log_failure(
            "trade error notice",
            ctx.send_trade_error(&format!("Trade failed: {}", error)),
        );
    }

    fn on_trade_timeout(&mut self, ctx: &mut HandlerContext<'_>) {
        tracing::info!("Trade with {} timed out", ctx.other_id());
        log_failure(
            "trade timeout notice",
            ctx.send_trade_error("Trade timed out."),
        );
    }

    fn on_trade_success(&mut self, ctx: &mut HandlerContext<'_>) {
        tracing::info!(
            "Trade with {} completed ({} items received)",
            ctx.other_id(),
            self.offered.len()
        );

        let snapshot = ctx.with_settings_store(|store| {
            let completed = store.get(TRADES_COMPLETED_KEY).parse::<u64>().unwrap_or(0) + 1;
            log_failure(
                "record completed trade",
                store.set(TRADES_COMPLETED_KEY, completed.to_string()),
            );
            store.snapshot()
        });

        // Saved after the lock is released
        if let Some(snapshot) = snapshot {
            if let Err(e) = snapshot.save() {
                tracing::warn!("Could not persist settings: {}", e);
            }
        }
    }

    fn on_trade_init(&mut self, ctx: &mut HandlerContext<'_>) {
        self.offered.clear();
        tracing::info!("Trade with {} opened", ctx.other_id());
        if let Some(trade) = ctx.trade() {
            log_failure(
                "trade greeting",
                trade.send_message("Add your items and ready up when done."),
            );
        }
    }

    fn on_trade_add_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item) {
        tracing::debug!("{} added {}", ctx.other_id(), item);
        self.offered.push(item.clone());
    }

    fn on_trade_remove_item(&mut self, ctx: &mut HandlerContext<'_>, item: &Item) {
        tracing::debug!("{} removed {}", ctx.other_id(), item);
        if let Some(pos) = self.offered.iter().position(|i| i == item) {
            self.offered.remove(pos);
        }
    }

    fn on_trade_message(&mut self, ctx: &mut HandlerContext<'_>, message: &str) {
        tracing::debug!("Trade message from {}: {}", ctx.other_id(), message);
    }

    fn on_trade_ready(&mut self, ctx: &mut HandlerContext<'_>, observed: ObservedState) {
        if observed.peer_ready == observed.local_ready {
            return;
        }
        if let Some(trade) = ctx.trade() {
            log_failure("set ready", trade.set_ready(observed.peer_ready));
        }
    }

    fn on_trade_accept(&mut self, ctx: &mut HandlerContext<'_>) {
        if let Some(trade) = ctx.trade() {
            log_failure("accept trade", trade.request_accept());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BotConfig;
    use crate::settings::SettingsStore;
    use crate::transport::{MemoryTransport, OutboundAction, Transport};
    use crate::types::{ParticipantId, TradeId};

    struct Env {
        transport: MemoryTransport,
        config: BotConfig,
        local: ParticipantId,
        other: ParticipantId,
    }

    fn env(config: BotConfig) -> Env {
        let transport = MemoryTransport::new(ParticipantId::new("bot"));
        let local = transport.local_id();
        Env {
            transport,
            config,
            local,
            other: ParticipantId::new("alice"),
        }
    }

    impl Env {
        fn ctx(&self) -> HandlerContext<'_> {
            HandlerContext::new(&self.local, &self.other, &self.transport, &self.config)
        }
    }

    #[test]
    fn test_trade_request_policy() {
        let mut handler = StandardHandler::new();

        let open = env(BotConfig::default());
        assert!(handler.on_trade_request(&mut open.ctx()));

        let strict = env(BotConfig {
            trade_admins_only: true,
            ..BotConfig::default()
        });
        assert!(!handler.on_trade_request(&mut strict.ctx()));

        let admin = env(BotConfig {
            trade_admins_only: true,
            admins: vec![ParticipantId::new("alice")],
            ..BotConfig::default()
        });
        assert!(handler.on_trade_request(&mut admin.ctx()));
    }

    #[test]
    fn test_group_invites_follow_config() {
        let mut handler = StandardHandler::new();
        assert!(!handler.on_group_add(&mut env(BotConfig::default()).ctx()));

        let joining = env(BotConfig {
            accept_group_invites: true,
            ..BotConfig::default()
        });
        assert!(handler.on_group_add(&mut joining.ctx()));
    }

    #[test]
    fn test_mirrors_peer_readiness() {
        let env = env(BotConfig::default());
        let trade_id = TradeId::new("t1");
        let mut channel = env.transport.open_trade(&trade_id, &env.other).unwrap();
        let mut handler = StandardHandler::new();

        let mut ctx = env.ctx().with_trade(Some(channel.as_mut()));
        handler.on_trade_ready(
            &mut ctx,
            ObservedState {
                local_ready: false,
                peer_ready: true,
                changed: true,
            },
        );
        handler.on_trade_accept(&mut ctx);

        assert_eq!(
            env.transport.actions(),
            vec![
                OutboundAction::SetReady {
                    trade_id: trade_id.clone(),
                    ready: true
                },
                OutboundAction::Accept { trade_id },
            ]
        );
    }

    #[test]
    fn test_tracks_offered_items() {
        let env = env(BotConfig::default());
        let mut handler = StandardHandler::new();
        let mut ctx = env.ctx();

        handler.on_trade_add_item(&mut ctx, &Item::new(1));
        handler.on_trade_add_item(&mut ctx, &Item::new(2));
        handler.on_trade_remove_item(&mut ctx, &Item::new(1));

        assert_eq!(handler.offered(), &[Item::new(2)]);
    }

    #[test]
    fn test_success_counts_trades() {
        let env = env(BotConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.settings");
        let settings = SettingsStore::load(&path).shared();
        let mut handler = StandardHandler::new();

        let mut ctx = env.ctx().with_settings(Some(&settings));
        handler.on_trade_success(&mut ctx);
        handler.on_trade_success(&mut ctx);

        assert_eq!(settings.lock().unwrap().get(TRADES_COMPLETED_KEY), "2");
        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.get(TRADES_COMPLETED_KEY), "2");
    }

    #[test]
    fn test_success_count_kept_when_save_fails() {
        let env = env(BotConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("bot.settings");
        let settings = SettingsStore::new(&path).shared();
        let mut handler = StandardHandler::new();

        let mut ctx = env.ctx().with_settings(Some(&settings));
        handler.on_trade_success(&mut ctx);

        assert!(!path.exists());
        let store = settings.try_lock().unwrap();
        assert_eq!(store.get(TRADES_COMPLETED_KEY), "1");
    }

    #[test]
    fn test_timeout_notifies_peer() {
        let env = env(BotConfig::default());
        let mut handler = StandardHandler::new();
        handler.on_trade_timeout(&mut env.ctx());

        assert_eq!(
            env.transport.actions(),
            vec![OutboundAction::TradeError {
                to: ParticipantId::new("alice"),
                message: "Trade timed out.".to_string()
            }]
        );
    }

    #[test]
    fn test_bot_command_sets_status() {
        let env = env(BotConfig::default());
        let mut handler = StandardHandler::new();
        handler.on_bot_command(&mut env.ctx(), "trade");
        handler.on_bot_command(&mut env.ctx(), "dance");

        assert_eq!(
            env.transport.actions(),
            vec![OutboundAction::Status(PersonaState::LookingToTrade)]
        );
    }
}
