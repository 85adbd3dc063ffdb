//! Persistent bot settings

pub mod store;

pub use store::{SettingsSnapshot, SettingsStore, SharedSettings};
