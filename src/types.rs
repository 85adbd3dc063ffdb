//! Core types used throughout the trade bot

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a participant (the bot, a friend, a group or a chat room).
///
/// Opaque to the core; the transport decides its format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned identifier of one trade.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(pub String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of one inbound protocol occurrence.
///
/// Replays of the same occurrence carry the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inventory item referenced by trade events. The core only forwards it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Item {
    pub fn new(id: u64) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "item {}", self.id),
        }
    }
}

/// Kind of a direct chat entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEntryType {
    #[default]
    ChatMsg,
    Emote,
}

/// Presence state the bot advertises
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaState {
    Offline,
    Online,
    Busy,
    Away,
    Snooze,
    LookingToTrade,
    LookingToPlay,
}

/// Raw mutual-readiness flags of a trade as held by the transport
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub local_ready: bool,
    pub peer_ready: bool,
}

impl Readiness {
    pub fn new(local_ready: bool, peer_ready: bool) -> Self {
        Self {
            local_ready,
            peer_ready,
        }
    }

    pub fn both(&self) -> bool {
        self.local_ready && self.peer_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_display() {
        let id = ParticipantId::new("76561198000000001");
        assert_eq!(id.to_string(), "76561198000000001");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&TradeId::new("t-1")).unwrap();
        assert_eq!(json, "\"t-1\"");

        let event: EventId = serde_json::from_str("17").unwrap();
        assert_eq!(event, EventId(17));
    }

    #[test]
    fn test_item_display() {
        assert_eq!(Item::new(5).to_string(), "item 5");
        assert_eq!(Item::named(5, "Key").to_string(), "Key (5)");
    }

    #[test]
    fn test_readiness_both() {
        assert!(Readiness::new(true, true).both());
        assert!(!Readiness::new(true, false).both());
        assert!(!Readiness::default().both());
    }

    #[test]
    fn test_chat_entry_default() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            entry: ChatEntryType,
        }
        let w: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(w.entry, ChatEntryType::ChatMsg);
    }
}
