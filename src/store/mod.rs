//! Persistence layer: six tables behind a narrow trait (spec §6 persistence
//! layout; Design Note "process-wide ORM handle" — no module-level
//! singleton, the connection is owned by whoever constructs the engine).
//!
//! Upserts use SQLite's `INSERT ... ON CONFLICT DO UPDATE`, the idiom the
//! pack's `claude-view` database layer uses for its `sessions` table
//! (`crates/db/src/queries/sessions.rs`). All cache upserts are idempotent
//! by construction (spec §5): re-inserting the same compound-hash key just
//! refreshes `updated_at`.

pub mod models;

use crate::error::ContinuityError;
use models::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::Mutex;

/// The six-table KV store the Continuity Engine persists through.
///
/// Implementors must tolerate concurrent upserts across sub-sessions (spec
/// §5); `SqliteStore` does this with a single `Mutex<Connection>` — callers
/// are serialized per sub-session anyway by the dispatcher's ordering
/// guarantee (spec §5), so contention here is never expected to be hot.
pub trait ContinuityStore: Send + Sync {
    fn get_pack_cache(&self, key: &str) -> Option<PackCacheEntry>;
    fn upsert_pack_cache(&self, entry: &PackCacheEntry);

    fn get_file_summary(&self, key: &str) -> Option<FileSummaryEntry>;
    fn upsert_file_summary(&self, entry: &FileSummaryEntry);

    fn get_search_cache(&self, key: &str) -> Option<SearchCacheEntry>;
    fn upsert_search_cache(&self, entry: &SearchCacheEntry);

    fn get_session_state(&self, sub_session_id: &str) -> Option<SessionState>;
    fn upsert_session_state(&self, state: &SessionState);

    fn insert_artifact(&self, artifact: &Artifact);
    /// Most recent `limit` artifacts for `(sub_session_id, artifact_type)`,
    /// newest first.
    fn recent_artifacts(&self, sub_session_id: &str, artifact_type: &str, limit: usize) -> Vec<Artifact>;
    /// Most recent `limit` artifacts for `sub_session_id` across all types,
    /// newest first (used by rehydrate, spec §4.14).
    fn recent_artifacts_any_type(&self, sub_session_id: &str, limit: usize) -> Vec<Artifact>;

    fn get_settings(&self) -> Option<SettingsRow>;
    fn upsert_settings(&self, row: &SettingsRow);
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ContinuityError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, ContinuityError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), ContinuityError> {
        let conn = self.conn.lock().expect("sqlite connection mutex poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pack_cache (
                key TEXT PRIMARY KEY,
                task_fingerprint TEXT NOT NULL,
                changed_files_hash TEXT NOT NULL,
                head_commit TEXT NOT NULL,
                provider TEXT NOT NULL,
                mode TEXT NOT NULL,
                budget_bytes INTEGER NOT NULL,
                pack TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS file_summary_cache (
                key TEXT PRIMARY KEY,
                repo_root TEXT NOT NULL,
                file_path TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                summary TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS search_cache (
                key TEXT PRIMARY KEY,
                repo_root TEXT NOT NULL,
                query TEXT NOT NULL,
                commit_hash TEXT NOT NULL,
                scope TEXT NOT NULL,
                result_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_state (
                sub_session_id TEXT PRIMARY KEY,
                last_changed_files_hash TEXT NOT NULL,
                turns_since_snapshot INTEGER NOT NULL,
                total_injected_bytes INTEGER NOT NULL,
                last_snapshot_at INTEGER,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS artifact (
                id TEXT PRIMARY KEY,
                sub_session_id TEXT NOT NULL,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                provenance_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifact_session_type
                ON artifact (sub_session_id, type, created_at DESC);
            CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY,
                artifact_policy TEXT NOT NULL,
                auto_commit_to_memory_branch INTEGER NOT NULL,
                token_mode TEXT NOT NULL,
                memory_branch TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl ContinuityStore for SqliteStore {
    fn get_pack_cache(&self, key: &str) -> Option<PackCacheEntry> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT key, task_fingerprint, changed_files_hash, head_commit, provider, mode, budget_bytes, pack, updated_at
             FROM pack_cache WHERE key = ?1",
            params![key],
            |row| {
                Ok(PackCacheEntry {
                    key: row.get(0)?,
                    task_fingerprint: row.get(1)?,
                    changed_files_hash: row.get(2)?,
                    head_commit: row.get(3)?,
                    provider: row.get(4)?,
                    mode: row.get(5)?,
                    budget_bytes: row.get(6)?,
                    pack_text: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn upsert_pack_cache(&self, entry: &PackCacheEntry) {
        let Ok(conn) = self.conn.lock() else { return };
        let _ = conn.execute(
            "INSERT INTO pack_cache (key, task_fingerprint, changed_files_hash, head_commit, provider, mode, budget_bytes, pack, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(key) DO UPDATE SET
                task_fingerprint = excluded.task_fingerprint,
                changed_files_hash = excluded.changed_files_hash,
                head_commit = excluded.head_commit,
                provider = excluded.provider,
                mode = excluded.mode,
                budget_bytes = excluded.budget_bytes,
                pack = excluded.pack,
                updated_at = excluded.updated_at",
            params![
                entry.key,
                entry.task_fingerprint,
                entry.changed_files_hash,
                entry.head_commit,
                entry.provider,
                entry.mode,
                entry.budget_bytes,
                entry.pack_text,
                entry.updated_at,
            ],
        );
    }

    fn get_file_summary(&self, key: &str) -> Option<FileSummaryEntry> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT key, repo_root, file_path, content_hash, summary, updated_at
             FROM file_summary_cache WHERE key = ?1",
            params![key],
            |row| {
                Ok(FileSummaryEntry {
                    key: row.get(0)?,
                    repo_root: row.get(1)?,
                    file_path: row.get(2)?,
                    content_hash: row.get(3)?,
                    summary: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn upsert_file_summary(&self, entry: &FileSummaryEntry) {
        let Ok(conn) = self.conn.lock() else { return };
        let _ = conn.execute(
            "INSERT INTO file_summary_cache (key, repo_root, file_path, content_hash, summary, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO UPDATE SET
                repo_root = excluded.repo_root,
                file_path = excluded.file_path,
                content_hash = excluded.content_hash,
                summary = excluded.summary,
                updated_at = excluded.updated_at",
            params![
                entry.key,
                entry.repo_root,
                entry.file_path,
                entry.content_hash,
                entry.summary,
                entry.updated_at,
            ],
        );
    }

    fn get_search_cache(&self, key: &str) -> Option<SearchCacheEntry> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT key, repo_root, query, commit_hash, scope, result_json, updated_at
             FROM search_cache WHERE key = ?1",
            params![key],
            |row| {
                let result_json: String = row.get(5)?;
                Ok((
                    SearchCacheEntry {
                        key: row.get(0)?,
                        repo_root: row.get(1)?,
                        query: row.get(2)?,
                        commit_hash: row.get(3)?,
                        scope: row.get(4)?,
                        result_files: Vec::new(),
                        updated_at: row.get(6)?,
                    },
                    result_json,
                ))
            },
        )
        .optional()
        .ok()
        .flatten()
        .map(|(mut entry, result_json)| {
            let parsed: SearchResultFiles =
                serde_json::from_str(&result_json).unwrap_or(SearchResultFiles { files: Vec::new() });
            entry.result_files = parsed.files;
            entry
        })
    }

    fn upsert_search_cache(&self, entry: &SearchCacheEntry) {
        let Ok(conn) = self.conn.lock() else { return };
        let result_json = serde_json_canonicalizer::to_string(&SearchResultFiles {
            files: entry.result_files.clone(),
        })
        .unwrap_or_else(|_| "{\"files\":[]}".to_string());
        let _ = conn.execute(
            "INSERT INTO search_cache (key, repo_root, query, commit_hash, scope, result_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(key) DO UPDATE SET
                repo_root = excluded.repo_root,
                query = excluded.query,
                commit_hash = excluded.commit_hash,
                scope = excluded.scope,
                result_json = excluded.result_json,
                updated_at = excluded.updated_at",
            params![
                entry.key,
                entry.repo_root,
                entry.query,
                entry.commit_hash,
                entry.scope,
                result_json,
                entry.updated_at,
            ],
        );
    }

    fn get_session_state(&self, sub_session_id: &str) -> Option<SessionState> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT sub_session_id, last_changed_files_hash, turns_since_snapshot, total_injected_bytes, last_snapshot_at, updated_at
             FROM session_state WHERE sub_session_id = ?1",
            params![sub_session_id],
            |row| {
                Ok(SessionState {
                    sub_session_id: row.get(0)?,
                    last_changed_files_hash: row.get(1)?,
                    turns_since_snapshot: row.get(2)?,
                    total_injected_bytes: row.get::<_, i64>(3)? as u64,
                    last_snapshot_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn upsert_session_state(&self, state: &SessionState) {
        let Ok(conn) = self.conn.lock() else { return };
        let _ = conn.execute(
            "INSERT INTO session_state (sub_session_id, last_changed_files_hash, turns_since_snapshot, total_injected_bytes, last_snapshot_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(sub_session_id) DO UPDATE SET
                last_changed_files_hash = excluded.last_changed_files_hash,
                turns_since_snapshot = excluded.turns_since_snapshot,
                total_injected_bytes = excluded.total_injected_bytes,
                last_snapshot_at = excluded.last_snapshot_at,
                updated_at = excluded.updated_at",
            params![
                state.sub_session_id,
                state.last_changed_files_hash,
                state.turns_since_snapshot,
                state.total_injected_bytes as i64,
                state.last_snapshot_at,
                state.updated_at,
            ],
        );
    }

    fn insert_artifact(&self, artifact: &Artifact) {
        let Ok(conn) = self.conn.lock() else { return };
        let provenance_json =
            serde_json_canonicalizer::to_string(&artifact.provenance).unwrap_or_else(|_| "{}".to_string());
        let _ = conn.execute(
            "INSERT INTO artifact (id, sub_session_id, type, content, status, provenance_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                artifact.id,
                artifact.sub_session_id,
                artifact.artifact_type,
                artifact.content,
                artifact.status,
                provenance_json,
                artifact.created_at,
                artifact.updated_at,
            ],
        );
    }

    fn recent_artifacts(&self, sub_session_id: &str, artifact_type: &str, limit: usize) -> Vec<Artifact> {
        let Ok(conn) = self.conn.lock() else {
            return Vec::new();
        };
        query_artifacts(
            &conn,
            "SELECT id, sub_session_id, type, content, status, provenance_json, created_at, updated_at
             FROM artifact WHERE sub_session_id = ?1 AND type = ?2
             ORDER BY created_at DESC LIMIT ?3",
            params![sub_session_id, artifact_type, limit as i64],
        )
    }

    fn recent_artifacts_any_type(&self, sub_session_id: &str, limit: usize) -> Vec<Artifact> {
        let Ok(conn) = self.conn.lock() else {
            return Vec::new();
        };
        query_artifacts(
            &conn,
            "SELECT id, sub_session_id, type, content, status, provenance_json, created_at, updated_at
             FROM artifact WHERE sub_session_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
            params![sub_session_id, limit as i64],
        )
    }

    fn get_settings(&self) -> Option<SettingsRow> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT artifact_policy, auto_commit_to_memory_branch, token_mode, memory_branch, updated_at
             FROM settings WHERE id = 'singleton'",
            [],
            |row| {
                Ok(SettingsRow {
                    artifact_policy: row.get(0)?,
                    auto_commit_to_memory_branch: row.get(1)?,
                    token_mode: row.get(2)?,
                    memory_branch: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()
        .ok()
        .flatten()
    }

    fn upsert_settings(&self, row: &SettingsRow) {
        let Ok(conn) = self.conn.lock() else { return };
        let _ = conn.execute(
            "INSERT INTO settings (id, artifact_policy, auto_commit_to_memory_branch, token_mode, memory_branch, updated_at)
             VALUES ('singleton', ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                artifact_policy = excluded.artifact_policy,
                auto_commit_to_memory_branch = excluded.auto_commit_to_memory_branch,
                token_mode = excluded.token_mode,
                memory_branch = excluded.memory_branch,
                updated_at = excluded.updated_at",
            params![
                row.artifact_policy,
                row.auto_commit_to_memory_branch,
                row.token_mode,
                row.memory_branch,
                row.updated_at,
            ],
        );
    }
}

fn query_artifacts(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Vec<Artifact> {
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let rows = stmt.query_map(params, |row| {
        let provenance_json: String = row.get(5)?;
        Ok((
            Artifact {
                id: row.get(0)?,
                sub_session_id: row.get(1)?,
                artifact_type: row.get(2)?,
                content: row.get(3)?,
                status: row.get(4)?,
                provenance: Provenance {
                    event_fingerprint: String::new(),
                    created_by: String::new(),
                },
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            },
            provenance_json,
        ))
    });

    let Ok(rows) = rows else { return Vec::new() };

    rows.filter_map(|r| r.ok())
        .map(|(mut artifact, provenance_json)| {
            artifact.provenance = serde_json::from_str(&provenance_json).unwrap_or(Provenance {
                event_fingerprint: String::new(),
                created_by: String::new(),
            });
            artifact
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn pack_cache_round_trips() {
        let s = store();
        assert!(s.get_pack_cache("k1").is_none());
        let entry = PackCacheEntry {
            key: "k1".into(),
            task_fingerprint: "tf".into(),
            changed_files_hash: "cfh".into(),
            head_commit: "abc".into(),
            provider: "claude".into(),
            mode: "agent".into(),
            budget_bytes: 24000,
            pack_text: "hello pack".into(),
            updated_at: 100,
        };
        s.upsert_pack_cache(&entry);
        assert_eq!(s.get_pack_cache("k1").unwrap(), entry);
    }

    #[test]
    fn pack_cache_upsert_overwrites() {
        let s = store();
        let mut entry = PackCacheEntry {
            key: "k1".into(),
            task_fingerprint: "tf".into(),
            changed_files_hash: "cfh".into(),
            head_commit: "abc".into(),
            provider: "claude".into(),
            mode: "agent".into(),
            budget_bytes: 24000,
            pack_text: "v1".into(),
            updated_at: 100,
        };
        s.upsert_pack_cache(&entry);
        entry.pack_text = "v2".into();
        entry.updated_at = 200;
        s.upsert_pack_cache(&entry);
        let got = s.get_pack_cache("k1").unwrap();
        assert_eq!(got.pack_text, "v2");
        assert_eq!(got.updated_at, 200);
    }

    #[test]
    fn search_cache_round_trips_file_list() {
        let s = store();
        let entry = SearchCacheEntry {
            key: "s1".into(),
            repo_root: "/repo".into(),
            query: "foo,bar".into(),
            commit_hash: "abc".into(),
            scope: "repo".into(),
            result_files: vec!["a.rs".into(), "b.rs".into()],
            updated_at: 10,
        };
        s.upsert_search_cache(&entry);
        assert_eq!(s.get_search_cache("s1").unwrap().result_files, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn session_state_round_trips() {
        let s = store();
        let state = SessionState {
            sub_session_id: "sess1".into(),
            last_changed_files_hash: "hash1".into(),
            turns_since_snapshot: 3,
            total_injected_bytes: 1234,
            last_snapshot_at: Some(999),
            updated_at: 1000,
        };
        s.upsert_session_state(&state);
        assert_eq!(s.get_session_state("sess1").unwrap(), state);
    }

    #[test]
    fn artifact_dedup_by_fingerprint_via_recent_query() {
        let s = store();
        let a1 = Artifact {
            id: "id1".into(),
            sub_session_id: "sess1".into(),
            artifact_type: "devlog".into(),
            content: "c1".into(),
            status: "draft".into(),
            provenance: Provenance {
                event_fingerprint: "fp1".into(),
                created_by: "engine".into(),
            },
            created_at: 1,
            updated_at: 1,
        };
        s.insert_artifact(&a1);
        let recent = s.recent_artifacts("sess1", "devlog", 12);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].provenance.event_fingerprint, "fp1");
    }

    #[test]
    fn settings_default_absent_until_written() {
        let s = store();
        assert!(s.get_settings().is_none());
        let row = SettingsRow {
            artifact_policy: "auto-write-memory-branch".into(),
            auto_commit_to_memory_branch: true,
            token_mode: "debug".into(),
            memory_branch: "memory/continuity".into(),
            updated_at: 5,
        };
        s.upsert_settings(&row);
        assert_eq!(s.get_settings().unwrap(), row);
    }
}
