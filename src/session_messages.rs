//! Session message store (spec §6 "Session message store").
//!
//! `Message`/`MessagePart` mirror the teacher's
//! `authorship::transcript::Message` tagged-enum shape (`User`/`Assistant`/
//! `ToolUse` variants, `#[serde(tag = "type")]`) so a dispatcher's existing
//! chat storage can be adapted to this trait with a thin shim rather than a
//! rewrite.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    ToolUse { name: String, input: String },
}

impl MessagePart {
    pub fn text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text),
            MessagePart::ToolUse { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of every `Text` part, in order.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One of `plan`, `agent` (spec §6 sub-session record `mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Plan,
    Agent,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Plan => "plan",
            SessionMode::Agent => "agent",
        }
    }
}

/// A sub-session record: its message log plus provider session handles
/// (spec §6). `chat_id` identifies the parent chat whose `updated_at` a
/// rehydrate touches (spec §4.14).
#[derive(Debug, Clone, PartialEq)]
pub struct SubSession {
    pub sub_session_id: String,
    pub chat_id: String,
    pub messages: Vec<Message>,
    pub provider_session_id: Option<String>,
    pub provider_stream_id: Option<String>,
    pub mode: SessionMode,
}

/// Read/write access to sub-session records and their parent chats.
/// Implementors own whatever storage backs the dispatcher's chat UI; the
/// engine only ever needs the operations below.
pub trait SessionMessageStore: Send + Sync {
    fn load(&self, sub_session_id: &str) -> Option<SubSession>;

    /// Last `limit` messages for `sub_session_id`, oldest first, or an
    /// empty vec if the sub-session doesn't exist.
    fn recent_messages(&self, sub_session_id: &str, limit: usize) -> Vec<Message>;

    fn append_message(&self, sub_session_id: &str, message: Message);

    /// Replace the sub-session's entire message list with `messages` and
    /// clear its provider session/stream handles (spec §4.14 step 4).
    fn replace_messages(&self, sub_session_id: &str, messages: Vec<Message>);

    /// Bump the parent chat's `updated_at` (spec §4.14 step 4).
    fn touch_parent_chat(&self, chat_id: &str, now: i64);
}

/// Reference implementation backed by the same SQLite connection as
/// `ContinuityStore`, for self-contained testing and dispatchers with no
/// chat store of their own.
pub struct SqliteSessionStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteSessionStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::ContinuityError> {
        let conn = rusqlite::Connection::open(path)?;
        let store = Self {
            conn: std::sync::Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, crate::error::ContinuityError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        let store = Self {
            conn: std::sync::Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), crate::error::ContinuityError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sub_session (
                sub_session_id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                messages_json TEXT NOT NULL,
                provider_session_id TEXT,
                provider_stream_id TEXT,
                mode TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat (
                chat_id TEXT PRIMARY KEY,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Create a sub-session row if absent, for tests and for
    /// `continuity-debug`'s scratch sessions.
    pub fn ensure(&self, sub_session_id: &str, chat_id: &str, mode: SessionMode) {
        let Ok(conn) = self.conn.lock() else { return };
        let mode_str = match mode {
            SessionMode::Plan => "plan",
            SessionMode::Agent => "agent",
        };
        let _ = conn.execute(
            "INSERT OR IGNORE INTO sub_session (sub_session_id, chat_id, messages_json, provider_session_id, provider_stream_id, mode)
             VALUES (?1, ?2, '[]', NULL, NULL, ?3)",
            rusqlite::params![sub_session_id, chat_id, mode_str],
        );
        let _ = conn.execute(
            "INSERT OR IGNORE INTO chat (chat_id, updated_at) VALUES (?1, 0)",
            rusqlite::params![chat_id],
        );
    }
}

impl SessionMessageStore for SqliteSessionStore {
    fn load(&self, sub_session_id: &str) -> Option<SubSession> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT sub_session_id, chat_id, messages_json, provider_session_id, provider_stream_id, mode
             FROM sub_session WHERE sub_session_id = ?1",
            rusqlite::params![sub_session_id],
            |row| {
                let messages_json: String = row.get(2)?;
                let mode_str: String = row.get(5)?;
                Ok((messages_json, mode_str, row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<String>>(3)?, row.get::<_, Option<String>>(4)?))
            },
        )
        .optional()
        .ok()
        .flatten()
        .map(|(messages_json, mode_str, sub_session_id, chat_id, psid, pstid)| SubSession {
            sub_session_id,
            chat_id,
            messages: serde_json::from_str(&messages_json).unwrap_or_default(),
            provider_session_id: psid,
            provider_stream_id: pstid,
            mode: if mode_str == "plan" {
                SessionMode::Plan
            } else {
                SessionMode::Agent
            },
        })
    }

    fn recent_messages(&self, sub_session_id: &str, limit: usize) -> Vec<Message> {
        let Some(sub_session) = self.load(sub_session_id) else {
            return Vec::new();
        };
        let len = sub_session.messages.len();
        let start = len.saturating_sub(limit);
        sub_session.messages[start..].to_vec()
    }

    fn append_message(&self, sub_session_id: &str, message: Message) {
        let Some(mut sub_session) = self.load(sub_session_id) else {
            return;
        };
        sub_session.messages.push(message);
        self.write_messages(sub_session_id, &sub_session.messages);
    }

    fn replace_messages(&self, sub_session_id: &str, messages: Vec<Message>) {
        let Ok(conn) = self.conn.lock() else { return };
        let messages_json = serde_json_canonicalizer::to_string(&messages).unwrap_or_else(|_| "[]".to_string());
        let _ = conn.execute(
            "UPDATE sub_session SET messages_json = ?1, provider_session_id = NULL, provider_stream_id = NULL
             WHERE sub_session_id = ?2",
            rusqlite::params![messages_json, sub_session_id],
        );
    }

    fn touch_parent_chat(&self, chat_id: &str, now: i64) {
        let Ok(conn) = self.conn.lock() else { return };
        let _ = conn.execute(
            "INSERT INTO chat (chat_id, updated_at) VALUES (?1, ?2)
             ON CONFLICT(chat_id) DO UPDATE SET updated_at = excluded.updated_at",
            rusqlite::params![chat_id, now],
        );
    }
}

impl SqliteSessionStore {
    fn write_messages(&self, sub_session_id: &str, messages: &[Message]) {
        let Ok(conn) = self.conn.lock() else { return };
        let messages_json = serde_json_canonicalizer::to_string(messages).unwrap_or_else(|_| "[]".to_string());
        let _ = conn.execute(
            "UPDATE sub_session SET messages_json = ?1 WHERE sub_session_id = ?2",
            rusqlite::params![messages_json, sub_session_id],
        );
    }
}

use rusqlite::OptionalExtension;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_messages_returns_last_n_in_order() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        store.ensure("sess1", "chat1", SessionMode::Agent);
        for i in 0..15 {
            store.append_message("sess1", Message::user_text(format!("msg{i}")));
        }
        let recent = store.recent_messages("sess1", 12);
        assert_eq!(recent.len(), 12);
        assert_eq!(recent[0].text_content(), "msg3");
        assert_eq!(recent[11].text_content(), "msg14");
    }

    #[test]
    fn replace_messages_clears_provider_handles() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        store.ensure("sess1", "chat1", SessionMode::Agent);
        store.append_message("sess1", Message::user_text("hello"));
        store.replace_messages("sess1", vec![Message::assistant_text("carry-over")]);
        let loaded = store.load("sess1").unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].text_content(), "carry-over");
        assert!(loaded.provider_session_id.is_none());
        assert!(loaded.provider_stream_id.is_none());
    }

    #[test]
    fn load_missing_sub_session_is_none() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        assert!(store.load("nope").is_none());
        assert!(store.recent_messages("nope", 12).is_empty());
    }
}
