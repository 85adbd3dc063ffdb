//! Portable key/value settings backed by a small XML file
//!
//! The file holds a single `<Settings>` root with one child element per key:
//!
//! ```text
//! <?xml version="1.0" encoding="utf-8"?>
//! <Settings>
//!   <LastPartner>76561198000000001</LastPartner>
//!   <trades_completed>3</trades_completed>
//! </Settings>
//! ```

use crate::error::{PersistenceFailure, Result, TradeBotError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SETTINGS_ROOT: &str = "Settings";

/// Settings store shared between session workers
pub type SharedSettings = Arc<Mutex<SettingsStore>>;

/// XML-backed settings store
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    entries: Vec<(String, String)>,
    defaults: HashMap<String, String>,
}

impl SettingsStore {
    /// Empty store that will save to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            defaults: HashMap::new(),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing or unreadable file yields a fresh, empty document.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(store) => store,
            Err(PersistenceFailure::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {}, starting fresh", path.display());
                Self::new(path)
            }
            Err(e) => {
                tracing::warn!("Discarding settings file {}: {}", path.display(), e);
                Self::new(path)
            }
        }
    }

    /// Load the store from `path`, reporting why it could not be read
    pub fn try_load(path: &Path) -> std::result::Result<Self, PersistenceFailure> {
        let raw = std::fs::read(path)?;
        let text = String::from_utf8(raw).map_err(|_| PersistenceFailure::Encoding)?;
        let entries = parse_document(&text)?;

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            defaults: HashMap::new(),
        })
    }

    /// Wrap the store for sharing between workers
    pub fn shared(self) -> SharedSettings {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declare the value `get` falls back to when `key` is unset
    pub fn declare(&mut self, key: impl Into<String>, default: impl Into<String>) {
        self.defaults.insert(key.into(), default.into());
    }

    /// Stored value, else the declared default, else an empty string
    pub fn get(&self, key: &str) -> String {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| self.defaults.get(key).cloned())
            .unwrap_or_default()
    }

    /// Whether `key` has a stored value (defaults do not count)
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Set `key`, replacing any previous value
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if !is_element_name(key) {
            return Err(TradeBotError::InvalidConfig(format!(
                "'{}' is not a valid settings key",
                key
            )));
        }

        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    /// Stored keys in document order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Stored key/value pairs in document order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Write every stored value to disk.
    ///
    /// Callers treat settings as convenience state and may ignore the error.
    pub fn save_all(&self) -> std::result::Result<(), PersistenceFailure> {
        write_document(&self.path, &self.entries)
    }

    /// Copy of the stored values that can be saved after the store's lock
    /// is released
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            path: self.path.clone(),
            entries: self.entries.clone(),
        }
    }
}

/// Point-in-time copy of a [`SettingsStore`]
#[derive(Clone, Debug)]
pub struct SettingsSnapshot {
    path: PathBuf,
    entries: Vec<(String, String)>,
}

impl SettingsSnapshot {
    pub fn save(&self) -> std::result::Result<(), PersistenceFailure> {
        write_document(&self.path, &self.entries)
    }
}

fn write_document(
    path: &Path,
    entries: &[(String, String)],
) -> std::result::Result<(), PersistenceFailure> {
    let bytes = render_document(entries)?;
    std::fs::write(path, bytes)?;
    tracing::debug!("Saved {} settings to {}", entries.len(), path.display());
    Ok(())
}

fn parse_document(text: &str) -> std::result::Result<Vec<(String, String)>, PersistenceFailure> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e)?;
                depth += 1;
                match depth {
                    1 if name != SETTINGS_ROOT => {
                        return Err(PersistenceFailure::UnexpectedRoot(name));
                    }
                    2 => current = Some((name, String::new())),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = element_name(&e)?;
                match depth {
                    0 if name != SETTINGS_ROOT => {
                        return Err(PersistenceFailure::UnexpectedRoot(name));
                    }
                    1 => entries.push((name, String::new())),
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn render_document(entries: &[(String, String)]) -> std::result::Result<Vec<u8>, PersistenceFailure> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(SETTINGS_ROOT)))?;
    for (key, value) in entries {
        writer.write_event(Event::Start(BytesStart::new(key.as_str())))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(key.as_str())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(SETTINGS_ROOT)))?;

    Ok(writer.into_inner())
}

fn element_name(e: &BytesStart<'_>) -> std::result::Result<String, PersistenceFailure> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|_| PersistenceFailure::Encoding)
}

// XML names: a letter or underscore, then letters, digits, '_', '-' or '.'
fn is_element_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !key.to_ascii_lowercase().starts_with("xml")
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("bot.settings"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_fresh() {
        let (_dir, store) = temp_store();
        assert_eq!(store.keys().count(), 0);
        assert_eq!(store.get("anything"), "");
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, mut store) = temp_store();
        store.set("LastPartner", "76561198000000001").unwrap();
        assert_eq!(store.get("LastPartner"), "76561198000000001");

        store.set("LastPartner", "76561198000000002").unwrap();
        assert_eq!(store.get("LastPartner"), "76561198000000002");
        assert_eq!(store.keys().count(), 1);
    }

    #[test]
    fn test_unset_key_returns_declared_default() {
        let (_dir, mut store) = temp_store();
        store.declare("Greeting", "hello");
        assert_eq!(store.get("Greeting"), "hello");
        assert!(!store.contains("Greeting"));

        store.set("Greeting", "hi").unwrap();
        assert_eq!(store.get("Greeting"), "hi");
    }

    #[test]
    fn test_save_and_reload() {
        let (dir, mut store) = temp_store();
        store.set("trades_completed", "3").unwrap();
        store.set("Motd", "fish & <chips>").unwrap();
        store.set("Empty", "").unwrap();
        store.save_all().unwrap();

        let reloaded = SettingsStore::try_load(&dir.path().join("bot.settings")).unwrap();
        assert_eq!(reloaded.get("trades_completed"), "3");
        assert_eq!(reloaded.get("Motd"), "fish & <chips>");
        assert!(reloaded.contains("Empty"));
        let keys: Vec<_> = reloaded.keys().collect();
        assert_eq!(keys, vec!["trades_completed", "Motd", "Empty"]);
    }

    #[test]
    fn test_file_layout() {
        let (dir, mut store) = temp_store();
        store.set("Name", "bot").unwrap();
        store.save_all().unwrap();

        let text = std::fs::read_to_string(dir.path().join("bot.settings")).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(text.contains("<Settings>"));
        assert!(text.contains("<Name>bot</Name>"));
    }

    #[test]
    fn test_parses_empty_element_form() {
        let entries =
            parse_document("<?xml version=\"1.0\"?><Settings><A>1</A><B/></Settings>").unwrap();
        assert_eq!(
            entries,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), String::new())
            ]
        );
    }

    #[test]
    fn test_wrong_root_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.settings");
        std::fs::write(&path, "<Config><A>1</A></Config>").unwrap();

        assert!(matches!(
            SettingsStore::try_load(&path),
            Err(PersistenceFailure::UnexpectedRoot(_))
        ));
        let store = SettingsStore::load(&path);
        assert_eq!(store.get("A"), "");
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::new(dir.path().join("missing").join("bot.settings"));
        store.set("A", "1").unwrap();

        assert!(matches!(store.save_all(), Err(PersistenceFailure::Io(_))));
        // the in-memory value survives a failed save
        assert_eq!(store.get("A"), "1");
    }

    #[test]
    fn test_snapshot_saves_values_at_capture() {
        let (dir, mut store) = temp_store();
        store.set("trades_completed", "1").unwrap();
        let snapshot = store.snapshot();
        store.set("trades_completed", "2").unwrap();

        snapshot.save().unwrap();

        let reloaded = SettingsStore::try_load(&dir.path().join("bot.settings")).unwrap();
        assert_eq!(reloaded.get("trades_completed"), "1");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (_dir, mut store) = temp_store();
        assert!(store.set("has space", "x").is_err());
        assert!(store.set("1st", "x").is_err());
        assert!(store.set("xmlThing", "x").is_err());
        assert!(store.set("ok_key-2.v", "x").is_ok());
    }
}
