//! Trade bot framework
//!
//! Event-driven runtime for a bot that negotiates item trades with remote
//! participants. Inbound protocol events are deduplicated and routed to one
//! worker per participant; trade events drive a [`TradeSession`] state
//! machine that polls readiness from the transport before acting on accepts;
//! the resulting notifications reach a pluggable [`UserHandler`].

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod settings;
pub mod trade;
pub mod transport;
pub mod types;

pub use config::{BotConfig, TradeLimits};
pub use dispatch::{
    Dispatch, Dispatcher, DropReason, EventKind, ProtocolEvent, Services, SessionRouter,
};
pub use error::{PersistenceFailure, Result, TradeBotError};
pub use handler::{HandlerContext, HandlerFactory, StandardHandler, UserHandler};
pub use settings::{SettingsStore, SharedSettings};
pub use trade::{Notification, ObservedState, SessionPoller, TradeSession, TradeSignal, TradeState};
pub use transport::{BotControl, MemoryTransport, TradeChannel, Transport};
pub use types::{ChatEntryType, EventId, Item, ParticipantId, PersonaState, Readiness, TradeId};
