//! In-process transport
//!
//! Records every outbound action instead of sending it and keeps per-trade
//! readiness flags in shared memory. Used by the `run` command and the tests.

use super::{BotControl, ReadinessSource, TradeChannel, Transport};
use crate::error::{Result, TradeBotError};
use crate::types::{Item, ParticipantId, PersonaState, Readiness, TradeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Action the bot asked the transport to perform
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundAction {
    Status(PersonaState),
    ChatStatus(String),
    OpenChat(ParticipantId),
    Chat { to: ParticipantId, message: String },
    TradeState { to: ParticipantId, trade_id: TradeId },
    TradeError { to: ParticipantId, message: String },
    FriendResponse { peer: ParticipantId, accept: bool },
    GroupResponse { group: ParticipantId, accept: bool },
    TradeResponse { trade_id: TradeId, accept: bool },
    SetReady { trade_id: TradeId, ready: bool },
    AddItem { trade_id: TradeId, item: Item },
    RemoveItem { trade_id: TradeId, item: Item },
    TradeMessage { trade_id: TradeId, message: String },
    Accept { trade_id: TradeId },
    Close { trade_id: TradeId },
}

#[derive(Debug, Default)]
struct TradeFlags {
    local_ready: AtomicBool,
    peer_ready: AtomicBool,
    open: AtomicBool,
}

#[derive(Debug)]
struct Inner {
    local_id: ParticipantId,
    actions: Mutex<Vec<OutboundAction>>,
    trades: Mutex<HashMap<TradeId, Arc<TradeFlags>>>,
}

/// Transport that keeps everything in memory
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Inner {
    fn record(&self, action: OutboundAction) {
        tracing::debug!("Outbound: {:?}", action);
        lock(&self.actions).push(action);
    }

    fn flags(&self, trade_id: &TradeId) -> Arc<TradeFlags> {
        lock(&self.trades)
            .entry(trade_id.clone())
            .or_default()
            .clone()
    }

    /// Drop `trade_id`'s entry if it still belongs to `flags`
    fn forget(&self, trade_id: &TradeId, flags: &Arc<TradeFlags>) {
        flags.open.store(false, Ordering::SeqCst);
        let mut trades = lock(&self.trades);
        if trades
            .get(trade_id)
            .map_or(false, |current| Arc::ptr_eq(current, flags))
        {
            trades.remove(trade_id);
        }
    }
}

impl MemoryTransport {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            inner: Arc::new(Inner {
                local_id,
                actions: Mutex::new(Vec::new()),
                trades: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Record the peer's readiness as received from the remote side. The
    /// frame may arrive before the bot has opened the trade.
    pub fn set_peer_ready(&self, trade_id: &TradeId, ready: bool) {
        self.inner
            .flags(trade_id)
            .peer_ready
            .store(ready, Ordering::SeqCst);
    }

    /// Overwrite the local readiness flag directly
    pub fn set_local_ready(&self, trade_id: &TradeId, ready: bool) {
        self.inner
            .flags(trade_id)
            .local_ready
            .store(ready, Ordering::SeqCst);
    }

    /// Make the trade disappear, as when the remote session drops
    pub fn vanish_trade(&self, trade_id: &TradeId) {
        if let Some(flags) = lock(&self.inner.trades).remove(trade_id) {
            flags.open.store(false, Ordering::SeqCst);
        }
    }

    /// Current flags of an open trade
    pub fn readiness(&self, trade_id: &TradeId) -> Option<Readiness> {
        let trades = lock(&self.inner.trades);
        trades.get(trade_id).and_then(|flags| read_flags(flags))
    }

    /// Number of trades the transport is still tracking
    pub fn open_trades(&self) -> usize {
        lock(&self.inner.trades).len()
    }

    /// Every action recorded so far
    pub fn actions(&self) -> Vec<OutboundAction> {
        lock(&self.inner.actions).clone()
    }

    /// Drain the recorded actions
    pub fn take_actions(&self) -> Vec<OutboundAction> {
        std::mem::take(&mut *lock(&self.inner.actions))
    }
}

fn read_flags(flags: &TradeFlags) -> Option<Readiness> {
    if !flags.open.load(Ordering::SeqCst) {
        return None;
    }
    Some(Readiness::new(
        flags.local_ready.load(Ordering::SeqCst),
        flags.peer_ready.load(Ordering::SeqCst),
    ))
}

impl BotControl for MemoryTransport {
    fn set_status(&self, state: PersonaState) -> Result<()> {
        self.inner.record(OutboundAction::Status(state));
        Ok(())
    }

    fn set_chat_status(&self, message: &str) -> Result<()> {
        self.inner
            .record(OutboundAction::ChatStatus(message.to_string()));
        Ok(())
    }

    fn open_chat(&self, peer: &ParticipantId) -> bool {
        self.inner.record(OutboundAction::OpenChat(peer.clone()));
        true
    }

    fn send_chat(&self, peer: &ParticipantId, message: &str) -> Result<()> {
        self.inner.record(OutboundAction::Chat {
            to: peer.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn send_trade_state(&self, peer: &ParticipantId, trade_id: &TradeId) -> Result<()> {
        self.inner.record(OutboundAction::TradeState {
            to: peer.clone(),
            trade_id: trade_id.clone(),
        });
        Ok(())
    }

    fn send_trade_error(&self, peer: &ParticipantId, message: &str) -> Result<()> {
        self.inner.record(OutboundAction::TradeError {
            to: peer.clone(),
            message: message.to_string(),
        });
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn local_id(&self) -> ParticipantId {
        self.inner.local_id.clone()
    }

    fn respond_friend_request(&self, peer: &ParticipantId, accept: bool) -> Result<()> {
        self.inner.record(OutboundAction::FriendResponse {
            peer: peer.clone(),
            accept,
        });
        Ok(())
    }

    fn respond_group_invite(&self, group: &ParticipantId, accept: bool) -> Result<()> {
        self.inner.record(OutboundAction::GroupResponse {
            group: group.clone(),
            accept,
        });
        Ok(())
    }

    fn open_trade(&self, trade_id: &TradeId, peer: &ParticipantId) -> Result<Box<dyn TradeChannel>> {
        if peer == &self.inner.local_id {
            return Err(TradeBotError::Transport(
                "cannot trade with ourselves".to_string(),
            ));
        }

        let flags = self.inner.flags(trade_id);
        flags.open.store(true, Ordering::SeqCst);

        Ok(Box::new(MemoryTradeChannel {
            trade_id: trade_id.clone(),
            flags,
            inner: self.inner.clone(),
        }))
    }
}

/// Trade handle issued by [`MemoryTransport`]
#[derive(Debug)]
pub struct MemoryTradeChannel {
    trade_id: TradeId,
    flags: Arc<TradeFlags>,
    inner: Arc<Inner>,
}

impl MemoryTradeChannel {
    fn ensure_open(&self) -> Result<()> {
        if self.flags.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TradeBotError::SessionGone(self.trade_id.0.clone()))
        }
    }
}

impl ReadinessSource for MemoryTradeChannel {
    fn readiness(&self) -> Option<Readiness> {
        read_flags(&self.flags)
    }
}

impl TradeChannel for MemoryTradeChannel {
    fn trade_id(&self) -> &TradeId {
        &self.trade_id
    }

    fn respond_request(&mut self, accept: bool) -> Result<()> {
        self.inner.record(OutboundAction::TradeResponse {
            trade_id: self.trade_id.clone(),
            accept,
        });
        if !accept {
            self.flags.open.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    fn set_ready(&mut self, ready: bool) -> Result<()> {
        self.ensure_open()?;
        self.flags.local_ready.store(ready, Ordering::SeqCst);
        self.inner.record(OutboundAction::SetReady {
            trade_id: self.trade_id.clone(),
            ready,
        });
        Ok(())
    }

    fn add_item(&mut self, item: &Item) -> Result<()> {
        self.ensure_open()?;
        self.inner.record(OutboundAction::AddItem {
            trade_id: self.trade_id.clone(),
            item: item.clone(),
        });
        Ok(())
    }

    fn remove_item(&mut self, item: &Item) -> Result<()> {
        self.ensure_open()?;
        self.inner.record(OutboundAction::RemoveItem {
            trade_id: self.trade_id.clone(),
            item: item.clone(),
        });
        Ok(())
    }

    fn send_message(&mut self, message: &str) -> Result<()> {
        self.ensure_open()?;
        self.inner.record(OutboundAction::TradeMessage {
            trade_id: self.trade_id.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn request_accept(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.inner.record(OutboundAction::Accept {
            trade_id: self.trade_id.clone(),
        });
        Ok(())
    }

    fn request_close(&mut self) -> Result<()> {
        self.inner.forget(&self.trade_id, &self.flags);
        self.inner.record(OutboundAction::Close {
            trade_id: self.trade_id.clone(),
        });
        Ok(())
    }

    fn release(&mut self) {
        self.inner.forget(&self.trade_id, &self.flags);
    }
}
