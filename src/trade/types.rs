//! Trade lifecycle types

use crate::types::Item;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a trade session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeState {
    Idle,
    Requested,
    Negotiating,
    ReadyPending,
    Accepted,
    Errored,
    TimedOut,
    Closed,
}

impl TradeState {
    /// Check if the trade is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Errored | TradeState::TimedOut | TradeState::Closed
        )
    }

    /// Check if the trade window is open for item and readiness changes
    pub fn is_negotiating(&self) -> bool {
        matches!(self, TradeState::Negotiating | TradeState::ReadyPending)
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One readiness sample
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    pub local_ready: bool,
    pub peer_ready: bool,
    /// Whether either flag differs from the previous sample
    pub changed: bool,
}

impl ObservedState {
    pub fn both_ready(&self) -> bool {
        self.local_ready && self.peer_ready
    }
}

/// Input applied to a trade session
#[derive(Clone, Debug, PartialEq)]
pub enum TradeSignal {
    /// Peer changed its readiness
    Ready,
    /// Peer confirmed the trade
    Accept,
    ItemAdded(Item),
    ItemRemoved(Item),
    Message(String),
    /// Protocol reported a failure
    Error(String),
    /// Transport reported the trade timed out
    Timeout,
    Close,
}

/// Handler notification produced by a transition
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Init,
    ItemAdded(Item),
    ItemRemoved(Item),
    Message(String),
    Ready(ObservedState),
    Accept,
    Error(String),
    Timeout,
    Success,
    Close,
}

/// Why a signal left the session unchanged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ignored {
    /// Accept arrived while the fresh sample was not both ready
    GuardViolation,
    /// Session already reached a terminal state
    Terminal,
    /// Signal has no meaning in the current state
    NotApplicable,
}

/// Result of applying one signal
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub from: TradeState,
    pub to: TradeState,
    pub notifications: Vec<Notification>,
    pub ignored: Option<Ignored>,
}

impl Transition {
    pub(crate) fn unchanged(state: TradeState, reason: Ignored) -> Self {
        Self {
            from: state,
            to: state,
            notifications: Vec::new(),
            ignored: Some(reason),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }
}
