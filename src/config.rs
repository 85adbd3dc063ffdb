//! Bot configuration
//!
//! Everything a handler or session would otherwise look up globally (admin
//! membership, application name, timing limits) lives here and is passed in
//! explicitly.

use crate::error::{Result, TradeBotError};
use crate::types::ParticipantId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bot configuration, loaded from an optional JSON file
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Application name, used for the default settings file name
    pub app_name: String,
    /// Participants allowed to administer the bot
    pub admins: Vec<ParticipantId>,
    /// Whether the standard handler joins groups it is invited to
    pub accept_group_invites: bool,
    /// Whether the standard handler only trades with admins
    pub trade_admins_only: bool,
    /// Interval between readiness polls of an active trade
    pub poll_interval_ms: u64,
    /// Trade times out after this long without activity
    pub inactivity_timeout_secs: u64,
    /// Trade times out after this long regardless of activity
    pub max_trade_secs: u64,
    /// Number of recent event ids remembered for duplicate suppression
    pub dedup_window: usize,
    /// Number of finished trade ids each participant remembers, so late
    /// events for them are recognised and dropped
    pub retired_window: usize,
    /// A participant with no active trade is forgotten after this long
    /// without events; 0 keeps every participant
    pub idle_worker_secs: u64,
    /// Settings file; defaults to `<app_name>.settings`
    pub settings_path: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            app_name: "tradebot".to_string(),
            admins: Vec::new(),
            accept_group_invites: false,
            trade_admins_only: false,
            poll_interval_ms: 1000,
            inactivity_timeout_secs: 60,
            max_trade_secs: 180,
            dedup_window: 4096,
            retired_window: 64,
            idle_worker_secs: 300,
            settings_path: None,
        }
    }
}

impl BotConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: BotConfig = serde_json::from_str(&raw)
            .map_err(|e| TradeBotError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(TradeBotError::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.dedup_window == 0 {
            return Err(TradeBotError::InvalidConfig(
                "dedup_window must be positive".to_string(),
            ));
        }
        if self.retired_window == 0 {
            return Err(TradeBotError::InvalidConfig(
                "retired_window must be positive".to_string(),
            ));
        }
        if self.app_name.trim().is_empty() {
            return Err(TradeBotError::InvalidConfig(
                "app_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_admin(&self, participant: &ParticipantId) -> bool {
        self.admins.contains(participant)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// How long an idle participant is kept, `None` when never dropped
    pub fn idle_worker_timeout(&self) -> Option<Duration> {
        match self.idle_worker_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn limits(&self) -> TradeLimits {
        TradeLimits {
            inactivity: Duration::from_secs(self.inactivity_timeout_secs),
            max_duration: Duration::from_secs(self.max_trade_secs),
        }
    }

    /// Settings file location
    pub fn settings_file(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.settings", self.app_name.trim())))
    }
}

/// Deadlines applied to every trade session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradeLimits {
    pub inactivity: Duration,
    pub max_duration: Duration,
}

impl Default for TradeLimits {
    fn default() -> Self {
        BotConfig::default().limits()
    }
}
