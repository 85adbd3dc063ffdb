//! Event dispatch: classification, deduplication and per-participant routing

pub mod dedup;
pub mod dispatcher;
pub mod event;
pub mod router;
pub mod worker;

#[cfg(test)]
pub(crate) mod recording;

pub use dedup::{RecentSet, SeenEvents};
pub use dispatcher::Dispatcher;
pub use event::{EventKind, ProtocolEvent};
pub use router::{SessionRouter, WorkerSummary};
pub use worker::{Dispatch, DropReason, PeerWorker, Services};
