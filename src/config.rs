//! Runtime configuration (spec §3 Mode/TokenMode/BudgetProfile, §6 config inputs).
//!
//! Loaded from the process environment the way the teacher's
//! `synopsis::config::SynopsisConfig` loads `GIT_AI_SYNOPSIS*` variables:
//! read with `envy`, unknown/missing values fall back to documented
//! defaults (spec §7, "Configuration inconsistency").

use serde::Deserialize;
use std::env;

/// One of `off`, `passive`, `active` (spec §3 Mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Off,
    Passive,
    Active,
}

/// One of `low`, `normal`, `debug` (spec §3 TokenMode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenMode {
    Low,
    #[default]
    Normal,
    Debug,
}

/// Fixed per-`TokenMode` byte/count ceilings (spec §3 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetProfile {
    pub max_pack_bytes: usize,
    pub max_context_files: usize,
    pub max_context_summary_bytes: usize,
    pub max_file_read_bytes: usize,
}

impl TokenMode {
    pub fn budget_profile(self) -> BudgetProfile {
        match self {
            TokenMode::Low => BudgetProfile {
                max_pack_bytes: 14_000,
                max_context_files: 4,
                max_context_summary_bytes: 9_000,
                max_file_read_bytes: 90_000,
            },
            TokenMode::Normal => BudgetProfile {
                max_pack_bytes: 24_000,
                max_context_files: 8,
                max_context_summary_bytes: 16_000,
                max_file_read_bytes: 180_000,
            },
            TokenMode::Debug => BudgetProfile {
                max_pack_bytes: 42_000,
                max_context_files: 12,
                max_context_summary_bytes: 24_000,
                max_file_read_bytes: 300_000,
            },
        }
    }
}

/// One of `auto-write-manual-commit`, `auto-write-memory-branch` (spec §3 Settings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactPolicy {
    #[default]
    AutoWriteManualCommit,
    AutoWriteMemoryBranch,
}

/// Settings singleton (spec §3 Settings, §6 settings table).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mode: Mode,
    pub token_mode: TokenMode,
    pub artifact_policy: ArtifactPolicy,
    pub auto_commit_to_memory_branch: bool,
    pub memory_branch: String,
    pub snapshot_enabled: bool,
    pub rehydrate_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            token_mode: TokenMode::Normal,
            artifact_policy: ArtifactPolicy::AutoWriteManualCommit,
            auto_commit_to_memory_branch: false,
            memory_branch: "memory/continuity".to_string(),
            snapshot_enabled: true,
            rehydrate_enabled: false,
        }
    }
}

/// Raw shape of the environment-derived overrides, deserialized via `envy`
/// with the `CONTINUITY_` prefix (mirrors `SynopsisConfig`'s
/// `GIT_AI_SYNOPSIS_*` variables).
#[derive(Debug, Deserialize, Default)]
struct RawEnvConfig {
    continuity_mode: Option<String>,
    enabled: Option<String>,
    token_mode: Option<String>,
    artifact_policy: Option<String>,
    auto_commit_to_memory_branch: Option<String>,
    memory_branch: Option<String>,
    snapshot_enabled: Option<String>,
    rehydrate_enabled: Option<String>,
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_mode(s: &str) -> Option<Mode> {
    match s.trim().to_lowercase().as_str() {
        "off" => Some(Mode::Off),
        "passive" => Some(Mode::Passive),
        "active" => Some(Mode::Active),
        _ => None,
    }
}

fn parse_token_mode(s: &str) -> Option<TokenMode> {
    match s.trim().to_lowercase().as_str() {
        "low" => Some(TokenMode::Low),
        "normal" => Some(TokenMode::Normal),
        "debug" => Some(TokenMode::Debug),
        _ => None,
    }
}

fn parse_artifact_policy(s: &str) -> Option<ArtifactPolicy> {
    match s.trim().to_lowercase().as_str() {
        "auto-write-manual-commit" => Some(ArtifactPolicy::AutoWriteManualCommit),
        "auto-write-memory-branch" => Some(ArtifactPolicy::AutoWriteMemoryBranch),
        _ => None,
    }
}

impl EngineConfig {
    /// Load from the process environment, falling back to documented
    /// defaults for anything absent or unrecognized.
    pub fn from_env() -> Self {
        let raw: RawEnvConfig = envy::prefixed("CONTINUITY_")
            .from_env()
            .unwrap_or_default();
        Self::from_raw(&raw)
    }

    fn from_raw(raw: &RawEnvConfig) -> Self {
        let defaults = Self::default();

        // Legacy boolean alias: enabled=1 => active, takes effect only when
        // continuity_mode itself is absent.
        let mode = raw
            .continuity_mode
            .as_deref()
            .and_then(parse_mode)
            .or_else(|| {
                raw.enabled
                    .as_deref()
                    .filter(|v| parse_bool(v, false))
                    .map(|_| Mode::Active)
            })
            .unwrap_or(defaults.mode);

        Self {
            mode,
            token_mode: raw
                .token_mode
                .as_deref()
                .and_then(parse_token_mode)
                .unwrap_or(defaults.token_mode),
            artifact_policy: raw
                .artifact_policy
                .as_deref()
                .and_then(parse_artifact_policy)
                .unwrap_or(defaults.artifact_policy),
            auto_commit_to_memory_branch: raw
                .auto_commit_to_memory_branch
                .as_deref()
                .map(|v| parse_bool(v, defaults.auto_commit_to_memory_branch))
                .unwrap_or(defaults.auto_commit_to_memory_branch),
            memory_branch: raw
                .memory_branch
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.memory_branch),
            snapshot_enabled: raw
                .snapshot_enabled
                .as_deref()
                .map(|v| parse_bool(v, defaults.snapshot_enabled))
                .unwrap_or(defaults.snapshot_enabled),
            rehydrate_enabled: raw
                .rehydrate_enabled
                .as_deref()
                .map(|v| parse_bool(v, defaults.rehydrate_enabled))
                .unwrap_or(defaults.rehydrate_enabled),
        }
    }

    /// Apply a persisted `settings` row override on top of env-derived
    /// values (spec §6: "settings table overrides env").
    pub fn apply_settings_override(&mut self, row: &crate::store::models::SettingsRow) {
        if let Some(mode) = parse_artifact_policy(&row.artifact_policy) {
            self.artifact_policy = mode;
        }
        self.auto_commit_to_memory_branch = row.auto_commit_to_memory_branch;
        if let Some(tm) = parse_token_mode(&row.token_mode) {
            self.token_mode = tm;
        }
        if !row.memory_branch.trim().is_empty() {
            self.memory_branch = row.memory_branch.clone();
        }
    }
}

/// Best-effort lookup of `$HOME`, used to locate conversation logs
/// (grounded on `synopsis::conversation::find_claude_code_conversation`,
/// which resolves `dirs::home_dir()` the same way).
pub fn home_dir() -> Option<std::path::PathBuf> {
    dirs::home_dir().or_else(|| env::var("HOME").ok().map(std::path::PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_off_and_normal() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.mode, Mode::Off);
        assert_eq!(cfg.token_mode, TokenMode::Normal);
        assert_eq!(cfg.memory_branch, "memory/continuity");
        assert!(cfg.snapshot_enabled);
        assert!(!cfg.rehydrate_enabled);
    }

    #[test]
    fn legacy_enabled_alias_maps_to_active() {
        let raw = RawEnvConfig {
            enabled: Some("1".to_string()),
            ..Default::default()
        };
        let cfg = EngineConfig::from_raw(&raw);
        assert_eq!(cfg.mode, Mode::Active);
    }

    #[test]
    fn explicit_mode_wins_over_legacy_alias() {
        let raw = RawEnvConfig {
            continuity_mode: Some("passive".to_string()),
            enabled: Some("1".to_string()),
            ..Default::default()
        };
        let cfg = EngineConfig::from_raw(&raw);
        assert_eq!(cfg.mode, Mode::Passive);
    }

    #[test]
    fn unknown_enum_value_falls_back_to_default() {
        let raw = RawEnvConfig {
            continuity_mode: Some("quantum".to_string()),
            ..Default::default()
        };
        let cfg = EngineConfig::from_raw(&raw);
        assert_eq!(cfg.mode, Mode::Off);
    }

    #[test]
    fn budget_profiles_match_table() {
        assert_eq!(TokenMode::Low.budget_profile().max_pack_bytes, 14_000);
        assert_eq!(TokenMode::Normal.budget_profile().max_context_files, 8);
        assert_eq!(
            TokenMode::Debug.budget_profile().max_context_summary_bytes,
            24_000
        );
    }
}
