//! Row types for the six persistence tables (spec §3, §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct PackCacheEntry {
    pub key: String,
    pub task_fingerprint: String,
    pub changed_files_hash: String,
    pub head_commit: String,
    pub provider: String,
    pub mode: String,
    pub budget_bytes: i64,
    pub pack_text: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSummaryEntry {
    pub key: String,
    pub repo_root: String,
    pub file_path: String,
    pub content_hash: String,
    pub summary: String,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultFiles {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCacheEntry {
    pub key: String,
    pub repo_root: String,
    pub query: String,
    pub commit_hash: String,
    pub scope: String,
    pub result_files: Vec<String>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub sub_session_id: String,
    pub last_changed_files_hash: String,
    pub turns_since_snapshot: u32,
    pub total_injected_bytes: u64,
    pub last_snapshot_at: Option<i64>,
    pub updated_at: i64,
}

impl SessionState {
    pub fn fresh(sub_session_id: &str, now: i64) -> Self {
        Self {
            sub_session_id: sub_session_id.to_string(),
            last_changed_files_hash: "no-changes".to_string(),
            turns_since_snapshot: 0,
            total_injected_bytes: 0,
            last_snapshot_at: None,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    Devlog,
    Adr,
    RejectedApproach,
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::Devlog => "devlog",
            ArtifactType::Adr => "adr",
            ArtifactType::RejectedApproach => "rejected-approach",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Draft,
    Accepted,
    Rejected,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::Draft => "draft",
            ArtifactStatus::Accepted => "accepted",
            ArtifactStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub event_fingerprint: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: String,
    pub sub_session_id: String,
    pub artifact_type: String,
    pub content: String,
    pub status: String,
    pub provenance: Provenance,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsRow {
    pub artifact_policy: String,
    pub auto_commit_to_memory_branch: bool,
    pub token_mode: String,
    pub memory_branch: String,
    pub updated_at: i64,
}

impl Default for SettingsRow {
    fn default() -> Self {
        Self {
            artifact_policy: "auto-write-manual-commit".to_string(),
            auto_commit_to_memory_branch: false,
            token_mode: "normal".to_string(),
            memory_branch: "memory/continuity".to_string(),
            updated_at: 0,
        }
    }
}
