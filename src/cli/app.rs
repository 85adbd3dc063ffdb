//! Trade bot application wiring the router, handler and transport together

use crate::config::BotConfig;
use crate::dispatch::{Dispatch, EventKind, ProtocolEvent, Services, SessionRouter, WorkerSummary};
use crate::error::{Result, TradeBotError};
use crate::handler::{StandardHandler, UserHandler};
use crate::settings::{SettingsStore, SharedSettings};
use crate::transport::MemoryTransport;
use crate::types::ParticipantId;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};

/// Identity the in-memory transport reports for the bot
const LOCAL_ID: &str = "tradebot";

/// Tally of one feed replay
#[derive(Debug, Default)]
pub struct FeedReport {
    pub lines: u64,
    pub queued: u64,
    pub duplicates: u64,
    pub dropped: u64,
    pub malformed: u64,
    pub workers: Vec<WorkerSummary>,
}

/// Main trade bot application
pub struct TradeBotApp {
    config: BotConfig,
    settings: SharedSettings,
    transport: MemoryTransport,
}

impl TradeBotApp {
    pub fn new(config: BotConfig, settings_path: Option<PathBuf>) -> Self {
        let path = settings_path.unwrap_or_else(|| config.settings_file());
        let settings = SettingsStore::load(path).shared();

        Self {
            config,
            settings,
            transport: MemoryTransport::new(ParticipantId::new(LOCAL_ID)),
        }
    }

    /// Build from an optional config file and settings override
    pub fn from_paths(config: Option<&Path>, settings: Option<PathBuf>) -> Result<Self> {
        let config = BotConfig::load_or_default(config)?;
        Ok(Self::new(config, settings))
    }

    pub fn transport(&self) -> &MemoryTransport {
        &self.transport
    }

    pub fn settings(&self) -> SharedSettings {
        self.settings.clone()
    }

    /// Replay the feed at `feed` (`-` for stdin)
    pub async fn run_feed(&self, feed: &str, linger: Duration) -> Result<FeedReport> {
        if feed == "-" {
            tracing::info!("Reading events from stdin");
            self.replay(tokio::io::stdin(), linger).await
        } else {
            tracing::info!("Reading events from {}", feed);
            let file = tokio::fs::File::open(feed).await?;
            self.replay(file, linger).await
        }
    }

    /// Route every JSON line of `reader`, then wait for the workers to drain
    pub async fn replay<R>(&self, reader: R, linger: Duration) -> Result<FeedReport>
    where
        R: AsyncRead + Unpin,
    {
        let factory = Arc::new(|_: &ParticipantId| -> Box<dyn UserHandler> {
            Box::new(StandardHandler::new())
        });
        let services = Services::new(
            Arc::new(self.transport.clone()),
            self.config.clone(),
            factory,
        )?
        .with_settings(self.settings.clone());
        let mut router = SessionRouter::new(services);

        let mut lines = FramedRead::new(reader, LinesCodec::new());
        let mut report = FeedReport::default();

        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| TradeBotError::Protocol(format!("event feed: {}", e)))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            report.lines += 1;

            let event: ProtocolEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Skipping malformed event line {}: {}", report.lines, e);
                    report.malformed += 1;
                    continue;
                }
            };

            // The transport learns the peer's flag from the frame itself
            if let EventKind::TradeReady {
                trade_id, ready, ..
            } = &event.kind
            {
                self.transport.set_peer_ready(trade_id, *ready);
            }

            match router.route(event).await {
                Dispatch::Queued | Dispatch::Delivered => report.queued += 1,
                Dispatch::Duplicate => report.duplicates += 1,
                Dispatch::Dropped(_) => report.dropped += 1,
            }
        }

        if !linger.is_zero() {
            tokio::time::sleep(linger).await;
        }

        report.workers = router.shutdown().await;
        for summary in &report.workers {
            tracing::info!(
                "{}: {} events, {} polls, trade {}",
                summary.participant,
                summary.events_handled,
                summary.ticks,
                summary.final_state
            );
        }
        for action in self.transport.actions() {
            tracing::info!("Sent {:?}", action);
        }

        Ok(report)
    }

    /// Stored value of `key`, or `default` when absent
    pub fn settings_get(&self, key: &str, default: Option<&str>) -> String {
        let mut store = self.lock_settings();
        if let Some(default) = default {
            store.declare(key, default);
        }
        store.get(key)
    }

    /// Store `value` under `key` and save the file
    pub fn settings_set(&self, key: &str, value: &str) -> Result<()> {
        let mut store = self.lock_settings();
        store.set(key, value)?;
        store.save_all()?;
        tracing::info!("Saved {} to {}", key, store.path().display());
        Ok(())
    }

    pub fn settings_list(&self) -> Vec<(String, String)> {
        self.lock_settings().entries().to_vec()
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, SettingsStore> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::standard::TRADES_COMPLETED_KEY;
    use crate::trade::TradeState;
    use crate::transport::OutboundAction;
    use crate::types::TradeId;

    const FEED: &str = r#"
{"id": 1, "kind": {"type": "friend_add", "from": "alice"}}
{"id": 2, "kind": {"type": "trade_request", "from": "alice", "trade_id": "t1"}}
{"id": 3, "kind": {"type": "trade_item_add", "from": "alice", "trade_id": "t1", "item": {"id": 7}}}
{"id": 4, "kind": {"type": "trade_ready", "from": "alice", "trade_id": "t1", "ready": true}}
{"id": 4, "kind": {"type": "trade_ready", "from": "alice", "trade_id": "t1", "ready": true}}
not json
{"id": 5, "kind": {"type": "trade_accept", "from": "alice", "trade_id": "t1"}}
{"id": 6, "kind": {"type": "trade_close", "from": "alice", "trade_id": "t1"}}
{"id": 7, "kind": {"type": "trade_message", "from": "alice", "trade_id": "t1", "message": "late"}}
"#;

    fn app(dir: &tempfile::TempDir) -> TradeBotApp {
        TradeBotApp::new(BotConfig::default(), Some(dir.path().join("bot.settings")))
    }

    #[tokio::test]
    async fn test_replay_completes_trade() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let report = app.replay(FEED.as_bytes(), Duration::ZERO).await.unwrap();

        assert_eq!(report.lines, 9);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.workers.len(), 1);
        assert_eq!(report.workers[0].final_state, TradeState::Idle);

        let actions = app.transport().actions();
        let t1 = TradeId::new("t1");
        assert!(actions.contains(&OutboundAction::SetReady {
            trade_id: t1.clone(),
            ready: true
        }));
        assert!(actions.contains(&OutboundAction::Accept {
            trade_id: t1.clone()
        }));
        assert!(actions.contains(&OutboundAction::Close { trade_id: t1 }));

        assert_eq!(app.settings_get(TRADES_COMPLETED_KEY, None), "1");
        let reloaded = SettingsStore::load(dir.path().join("bot.settings"));
        assert_eq!(reloaded.get(TRADES_COMPLETED_KEY), "1");
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"id\": 1, \"kind\": {\"type\": \"friend_")
            .read(b"add\", \"from\": \"carol\"}}\n{\"id\": 2, \"kind\": ")
            .read(b"{\"type\": \"friend_remove\", \"from\": \"carol\"}}\n")
            .build();

        let report = app.replay(reader, Duration::ZERO).await.unwrap();

        assert_eq!(report.lines, 2);
        assert_eq!(report.queued, 2);
        assert_eq!(report.workers[0].events_handled, 2);
        assert_eq!(
            app.transport().actions(),
            vec![OutboundAction::FriendResponse {
                peer: ParticipantId::new("carol"),
                accept: true
            }]
        );
    }

    #[tokio::test]
    async fn test_run_feed_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let feed = dir.path().join("events.jsonl");
        std::fs::write(
            &feed,
            "{\"id\": 1, \"kind\": {\"type\": \"chat_message\", \"from\": \"bob\", \"message\": \"hi\"}}\n",
        )
        .unwrap();
        let app = app(&dir);

        let report = app
            .run_feed(feed.to_str().unwrap(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(report.queued, 1);
        assert_eq!(
            app.transport().actions(),
            vec![OutboundAction::Chat {
                to: ParticipantId::new("bob"),
                message: "Hi! Send me a trade request to get started.".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_feed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);
        let missing = dir.path().join("absent.jsonl");

        let result = app.run_feed(missing.to_str().unwrap(), Duration::ZERO).await;
        assert!(matches!(result, Err(TradeBotError::Io(_))));
    }

    #[test]
    fn test_settings_commands() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        assert_eq!(app.settings_get("Greeting", Some("hello")), "hello");
        app.settings_set("Greeting", "hi").unwrap();

        let again = TradeBotApp::new(BotConfig::default(), Some(dir.path().join("bot.settings")));
        assert_eq!(again.settings_get("Greeting", None), "hi");
        assert_eq!(
            again.settings_list(),
            vec![("Greeting".to_string(), "hi".to_string())]
        );
    }
}
