//! CLI module for the trade bot

pub mod app;
pub mod commands;

pub use app::{FeedReport, TradeBotApp};
pub use commands::{Cli, Commands, SettingsAction};
