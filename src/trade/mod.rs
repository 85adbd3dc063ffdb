//! Trade sessions: readiness polling and the lifecycle state machine

pub mod poller;
pub mod session;
pub mod types;

pub use poller::{SessionGone, SessionPoller};
pub use session::TradeSession;
pub use types::{Ignored, Notification, ObservedState, TradeSignal, TradeState, Transition};
