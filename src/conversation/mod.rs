pub mod router;

pub use router::{IntentRouter, RouteMatch};

use crate::continuity::{SessionStore, CHAT_HISTORY_KEY};
use crate::scene::Suggestion;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConversationEntry {
    pub timestamp_ms: u64,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

impl ConversationEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            timestamp_ms: unix_millis(),
            role,
            text: text.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: &[Suggestion]) -> Self {
        self.suggestions = suggestions.to_vec();
        self
    }
}

/// Where conversation entries are displayed.
pub trait ChatSurface {
    fn show_entry(&mut self, entry: &ConversationEntry);
    fn clear_entries(&mut self);
}

/// Append-only transcript. Every append rewrites the persisted copy in full;
/// storage failures are logged and the log keeps working in memory.
#[derive(Debug, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(
        &mut self,
        store: &mut dyn SessionStore,
        entry: ConversationEntry,
    ) -> &ConversationEntry {
        self.entries.push(entry);
        self.persist(store);
        let index = self.entries.len() - 1;
        &self.entries[index]
    }

    /// Loads the persisted transcript and replays it into `surface` in order.
    /// Returns the number of restored entries.
    pub fn restore(&mut self, store: &dyn SessionStore, surface: &mut dyn ChatSurface) -> usize {
        let json = match store.get(CHAT_HISTORY_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return 0,
            Err(err) => {
                log::warn!("Failed to read conversation history: {}", err);
                return 0;
            }
        };
        let entries: Vec<ConversationEntry> = match serde_json::from_str(&json) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Discarding unreadable conversation history: {}", err);
                return 0;
            }
        };
        for entry in &entries {
            surface.show_entry(entry);
        }
        let restored = entries.len();
        self.entries = entries;
        log::info!("Restored {} conversation entries", restored);
        restored
    }

    pub fn clear(&mut self, store: &mut dyn SessionStore) {
        self.entries.clear();
        if let Err(err) = store.remove(CHAT_HISTORY_KEY) {
            log::warn!("Failed to clear conversation history: {}", err);
        }
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.role == Role::User)
            .map(|entry| entry.text.as_str())
    }

    /// Chips of the most recent entry that offered any.
    pub fn latest_suggestions(&self) -> &[Suggestion] {
        self.entries
            .iter()
            .rev()
            .find(|entry| !entry.suggestions.is_empty())
            .map(|entry| entry.suggestions.as_slice())
            .unwrap_or(&[])
    }

    fn persist(&self, store: &mut dyn SessionStore) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("Failed to serialize conversation history: {}", err);
                return;
            }
        };
        if let Err(err) = store.set(CHAT_HISTORY_KEY, &json) {
            log::warn!("Failed to persist conversation history: {}", err);
        }
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
