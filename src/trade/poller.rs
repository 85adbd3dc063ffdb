//! Readiness poller
//!
//! The transport does not push readiness changes; the session samples them.
//! Sampling is a pure read of the transport's flags plus an update of the
//! last-observed cache.

use crate::transport::TradeChannel;
use crate::types::Readiness;
use thiserror::Error;

use super::types::ObservedState;

/// The transport no longer knows the sampled trade
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("trade session gone")]
pub struct SessionGone;

/// Samples the readiness flags of one trade
pub struct SessionPoller {
    channel: Box<dyn TradeChannel>,
    last: Readiness,
}

impl SessionPoller {
    /// Poller over `channel`; both flags are assumed unset before the first sample
    pub fn new(channel: Box<dyn TradeChannel>) -> Self {
        Self {
            channel,
            last: Readiness::default(),
        }
    }

    /// Take a sample and compare it with the previous one
    pub fn sample(&mut self) -> Result<ObservedState, SessionGone> {
        let current = self.channel.readiness().ok_or(SessionGone)?;
        let changed = current != self.last;
        self.last = current;

        Ok(ObservedState {
            local_ready: current.local_ready,
            peer_ready: current.peer_ready,
            changed,
        })
    }

    /// Flags seen by the most recent sample
    pub fn last_observed(&self) -> Readiness {
        self.last
    }

    pub fn channel(&self) -> &dyn TradeChannel {
        self.channel.as_ref()
    }

    pub fn channel_mut(&mut self) -> &mut dyn TradeChannel {
        self.channel.as_mut()
    }
}

impl std::fmt::Debug for SessionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPoller")
            .field("trade_id", self.channel.trade_id())
            .field("last", &self.last)
            .finish()
    }
}
