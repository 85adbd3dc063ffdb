//! Capabilities a handler may use while reacting to an event

use crate::config::BotConfig;
use crate::error::Result;
use crate::settings::{SettingsStore, SharedSettings};
use crate::transport::{TradeChannel, Transport};
use crate::types::{ParticipantId, PersonaState, TradeId};

/// View of the bot handed to every handler callback.
///
/// Carries the current trade channel when the event belongs to an active
/// trade; otherwise `trade()` is `None`.
pub struct HandlerContext<'a> {
    local: &'a ParticipantId,
    other: &'a ParticipantId,
    bot: &'a dyn Transport,
    config: &'a BotConfig,
    trade: Option<&'a mut dyn TradeChannel>,
    settings: Option<&'a SharedSettings>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        local: &'a ParticipantId,
        other: &'a ParticipantId,
        bot: &'a dyn Transport,
        config: &'a BotConfig,
    ) -> Self {
        Self {
            local,
            other,
            bot,
            config,
            trade: None,
            settings: None,
        }
    }

    pub fn with_trade(mut self, trade: Option<&'a mut dyn TradeChannel>) -> Self {
        self.trade = trade;
        self
    }

    pub fn with_settings(mut self, settings: Option<&'a SharedSettings>) -> Self {
        self.settings = settings;
        self
    }

    /// The bot's own id
    pub fn local_id(&self) -> &ParticipantId {
        self.local
    }

    /// The participant this handler serves
    pub fn other_id(&self) -> &ParticipantId {
        self.other
    }

    /// Whether the other participant is a configured admin
    pub fn is_admin(&self) -> bool {
        self.config.is_admin(self.other)
    }

    pub fn config(&self) -> &BotConfig {
        self.config
    }

    /// The active trade, if this event belongs to one
    pub fn trade(&mut self) -> Option<&mut (dyn TradeChannel + 'a)> {
        self.trade.as_deref_mut()
    }

    pub fn trade_id(&self) -> Option<&TradeId> {
        self.trade.as_deref().map(|t| t.trade_id())
    }

    /// Close the active trade; no-op outside a trade
    pub fn close_trade(&mut self) -> Result<()> {
        match self.trade.as_deref_mut() {
            Some(trade) => trade.request_close(),
            None => Ok(()),
        }
    }

    pub fn set_status(&self, state: PersonaState) -> Result<()> {
        self.bot.set_status(state)
    }

    pub fn set_chat_status(&self, message: &str) -> Result<()> {
        self.bot.set_chat_status(message)
    }

    pub fn open_chat(&self, peer: &ParticipantId) -> bool {
        self.bot.open_chat(peer)
    }

    /// Send a direct chat message to the other participant
    pub fn send_chat(&self, message: &str) -> Result<()> {
        self.bot.send_chat(self.other, message)
    }

    /// Tell the other participant the state of the active trade
    pub fn send_trade_state(&self) -> Result<()> {
        match self.trade_id() {
            Some(trade_id) => self.bot.send_trade_state(self.other, trade_id),
            None => Ok(()),
        }
    }

    pub fn send_trade_error(&self, message: &str) -> Result<()> {
        self.bot.send_trade_error(self.other, message)
    }

    /// Run `f` against the shared settings store, if one is attached
    pub fn with_settings_store<R>(&self, f: impl FnOnce(&mut SettingsStore) -> R) -> Option<R> {
        let settings = self.settings?;
        let mut store = settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(f(&mut store))
    }
}
