//! The Continuity Engine: wires every component together behind the two
//! infallible public operations (spec §6), `apply` and `record_run_outcome`.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::artifacts::write_if_new;
use crate::cache::{CacheStats, HotCache};
use crate::config::{EngineConfig, Mode};
use crate::events::detect_events;
use crate::git::{probe, RepoState, Repository};
use crate::governor::{decide_with_capabilities, GovernorAction, GovernorDecision, GovernorInputs};
use crate::hashing::{sha256_fields, sha256_hex};
use crate::packs::anchor::build_anchor_pack;
use crate::packs::assembler::{assemble_delta_only_envelope, assemble_full_envelope, compose_final_prompt, StateIds};
use crate::packs::context::build_context_pack;
use crate::packs::delta::{build_delta_pack, failing_test_digest, objective_line, PriorDelta};
use crate::rehydrate::rehydrate;
use crate::safeguard;
use crate::session_messages::{SessionMessageStore, SessionMode};
use crate::store::models::{ArtifactType, PackCacheEntry, SessionState};
use crate::store::ContinuityStore;
use crate::telemetry::{GovernorActionEvent, PackMetrics, SafeguardEvent, TelemetrySink};

/// Normalize a prompt for fingerprinting: lowercase, whitespace-collapsed
/// (spec §3 TaskFingerprint).
fn normalize_prompt(prompt: &str) -> String {
    prompt.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// One of `claude`, `codex` (spec §4.8 `provider` parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Claude,
    Codex,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Codex => "codex",
        }
    }
}

pub struct ApplyInput<'a> {
    pub sub_session_id: &'a str,
    pub cwd: &'a Path,
    pub project_path: Option<&'a Path>,
    pub prompt: &'a str,
    pub mode: SessionMode,
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutput {
    pub prompt_out: String,
    pub cache_hit: bool,
    pub injected_bytes: usize,
    pub reused_percent: u8,
    pub anchor_pack_id: Option<String>,
    pub context_pack_id: Option<String>,
    pub plan_contract_id: Option<String>,
    pub delta_pack_id: Option<String>,
}

pub struct RecordRunOutcomeInput<'a> {
    pub sub_session_id: &'a str,
    pub cwd: &'a Path,
    pub project_path: Option<&'a Path>,
    pub provider: Provider,
    pub mode: SessionMode,
    pub prompt: &'a str,
    pub assistant_response: &'a str,
    pub injected_bytes: Option<i64>,
    pub was_error: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordRunOutcomeOutput {
    pub action: String,
    pub reasons: Vec<String>,
}

/// Diagnostic snapshot for `continuity-debug report` (spec.md §6): the
/// persisted `SessionState`, the governor decision the current inputs would
/// produce right now, and hot-cache statistics. Read-only — never mutates
/// `SessionState` or any cache tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutput {
    pub session_state: Option<SessionState>,
    pub governor_decision: GovernorDecision,
    pub last_cache_key: Option<String>,
    pub cached_pack_bytes: Option<usize>,
    pub cache_stats: CacheStats,
}

/// Wires a `ContinuityStore`, a `SessionMessageStore`, and a `TelemetrySink`
/// behind the two public operations. `project_path` in both input structs
/// is accepted for parity with the dispatcher's call signature (spec §4.8,
/// §4.13) but is not otherwise consulted — repo state is always read from
/// `cwd`, matching the source's own "probe from the working directory"
/// behavior.
pub struct Engine {
    store: Box<dyn ContinuityStore>,
    session_store: Box<dyn SessionMessageStore>,
    telemetry: Box<dyn TelemetrySink>,
    hot: HotCache,
}

impl Engine {
    pub fn new(
        store: Box<dyn ContinuityStore>,
        session_store: Box<dyn SessionMessageStore>,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Self {
        Self {
            store,
            session_store,
            telemetry,
            hot: HotCache::new(),
        }
    }

    fn effective_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(row) = self.store.get_settings() {
            config.apply_settings_override(&row);
        }
        config
    }

    pub async fn apply(&self, input: ApplyInput<'_>) -> ApplyOutput {
        let config = self.effective_config();
        let _ = input.project_path;

        if config.mode == Mode::Off {
            let plan_contract_id = (input.mode == SessionMode::Plan)
                .then(|| sha256_hex(&normalize_prompt(input.prompt)));
            return ApplyOutput {
                prompt_out: input.prompt.to_string(),
                cache_hit: false,
                injected_bytes: 0,
                reused_percent: 100,
                anchor_pack_id: None,
                context_pack_id: None,
                plan_contract_id,
                delta_pack_id: None,
            };
        }

        let repo = Repository::at(input.cwd);
        let repo_state = probe::probe_repo_state(&repo).await;
        let budget = config.token_mode.budget_profile();
        let now = now_unix();

        let task_fingerprint = sha256_hex(&normalize_prompt(input.prompt));
        let mode_str = input.mode.as_str();
        let provider_str = input.provider.as_str();
        let max_pack_bytes_str = budget.max_pack_bytes.to_string();
        let cache_key = sha256_fields(&[
            &task_fingerprint,
            &repo_state.changed_files_hash,
            &repo_state.head_commit,
            provider_str,
            mode_str,
            &max_pack_bytes_str,
        ]);

        let anchor_pack_id = sha256_hex(&format!("{}:anchor:{}", repo.root().display(), repo_state.head_commit));
        let context_pack_id = sha256_hex(&cache_key);
        let plan_contract_id =
            (input.mode == SessionMode::Plan).then(|| sha256_hex(&normalize_prompt(input.prompt)));

        let prior_session_state = self.store.get_session_state(input.sub_session_id);
        let diff_snippet = probe::diff_snippet(&repo).await;
        let digest = failing_test_digest(&*self.session_store, input.sub_session_id);
        let prior_delta = prior_session_state
            .as_ref()
            .map(|s| PriorDelta {
                last_changed_files_hash: s.last_changed_files_hash.as_str(),
            });
        let delta_pack_body = build_delta_pack(&repo_state, input.prompt, &diff_snippet, &digest, prior_delta);
        let delta_pack_id = sha256_hex(&delta_pack_body);
        let objective = objective_line(input.prompt);

        let state_ids = StateIds {
            anchor_pack_id: Some(anchor_pack_id.clone()),
            context_pack_id: Some(context_pack_id.clone()),
            plan_contract_id: plan_contract_id.clone(),
            delta_pack_id: Some(delta_pack_id.clone()),
        };

        let cached = self
            .hot
            .get_pack(&cache_key)
            .or_else(|| self.store.get_pack_cache(&cache_key));

        let (cache_hit, envelope, reused_percent) = match cached {
            Some(entry) => {
                let last_key = self.hot.last_cache_key(input.sub_session_id);
                let (envelope, reused) = if last_key.as_deref() == Some(cache_key.as_str()) {
                    (
                        assemble_delta_only_envelope(&state_ids, &delta_pack_body, &objective),
                        95,
                    )
                } else {
                    (entry.pack_text.clone(), 75)
                };
                (true, envelope, reused)
            }
            None => {
                let anchor_body = build_anchor_pack(repo.root()).await;
                let context_body =
                    build_context_pack(&repo, &repo_state, input.prompt, budget, &*self.store, &self.hot, now)
                        .await;
                let plan_contract_text = (input.mode == SessionMode::Plan)
                    .then(|| format!("planContractId: {}", plan_contract_id.clone().unwrap_or_default()));

                let envelope = assemble_full_envelope(
                    &state_ids,
                    &anchor_body,
                    &context_body,
                    plan_contract_text.as_deref(),
                    &delta_pack_body,
                    &objective,
                    budget.max_pack_bytes,
                );

                let entry = PackCacheEntry {
                    key: cache_key.clone(),
                    task_fingerprint: task_fingerprint.clone(),
                    changed_files_hash: repo_state.changed_files_hash.clone(),
                    head_commit: repo_state.head_commit.clone(),
                    provider: provider_str.to_string(),
                    mode: mode_str.to_string(),
                    budget_bytes: budget.max_pack_bytes as i64,
                    pack_text: envelope.clone(),
                    updated_at: now,
                };
                self.store.upsert_pack_cache(&entry);
                self.hot.put_pack(entry);

                let session_state = SessionState {
                    sub_session_id: input.sub_session_id.to_string(),
                    last_changed_files_hash: repo_state.changed_files_hash.clone(),
                    turns_since_snapshot: prior_session_state
                        .as_ref()
                        .map(|s| s.turns_since_snapshot)
                        .unwrap_or(0),
                    total_injected_bytes: envelope.len() as u64,
                    last_snapshot_at: prior_session_state.as_ref().and_then(|s| s.last_snapshot_at),
                    updated_at: now,
                };
                self.store.upsert_session_state(&session_state);

                (false, envelope, 35u8)
            }
        };

        self.hot.set_last_cache_key(input.sub_session_id, &cache_key);

        let full_prompt = compose_final_prompt(&envelope, input.prompt);
        let injected_bytes = full_prompt.len().saturating_sub(input.prompt.len());
        let prompt_out = if config.mode == Mode::Passive {
            input.prompt.to_string()
        } else {
            full_prompt
        };

        self.telemetry.pack_metrics(&PackMetrics {
            sub_session_id: input.sub_session_id.to_string(),
            cache_hit,
            injected_bytes,
            reused_percent,
        });

        ApplyOutput {
            prompt_out,
            cache_hit,
            injected_bytes,
            reused_percent,
            anchor_pack_id: Some(anchor_pack_id),
            context_pack_id: Some(context_pack_id),
            plan_contract_id,
            delta_pack_id: Some(delta_pack_id),
        }
    }

    pub async fn record_run_outcome(&self, input: RecordRunOutcomeInput<'_>) -> RecordRunOutcomeOutput {
        let config = self.effective_config();
        let _ = input.project_path;

        if config.mode == Mode::Off {
            return RecordRunOutcomeOutput {
                action: GovernorAction::Ok.as_str().to_string(),
                reasons: Vec::new(),
            };
        }

        let repo = Repository::at(input.cwd);
        let repo_state = probe::probe_repo_state(&repo).await;
        let diff_lines = probe::diff_stats(&repo).await;
        let now = now_unix();

        let prior = self
            .store
            .get_session_state(input.sub_session_id)
            .unwrap_or_else(|| SessionState::fresh(input.sub_session_id, now));

        let turns = prior.turns_since_snapshot + 1;
        let bytes = prior.total_injected_bytes + input.injected_bytes.unwrap_or(0).max(0) as u64;
        let elapsed_ms = prior
            .last_snapshot_at
            .map(|t| ((now - t).max(0) as u64) * 1000);

        let was_error = input.was_error.unwrap_or(false);
        let mode_label = input.mode.as_str();

        let current_branch = if config.mode == Mode::Active {
            probe::current_branch(&repo).await
        } else {
            "unknown".to_string()
        };
        let safeguard_decision = if config.mode == Mode::Active {
            Some(safeguard::evaluate(&config, &current_branch))
        } else {
            None
        };

        let governor_inputs = GovernorInputs {
            turns_since_snapshot: turns,
            total_injected_bytes: bytes,
            changed_files_count: repo_state.changed_files.len(),
            diff_lines,
            elapsed_since_snapshot_ms: elapsed_ms,
        };
        let decision = decide_with_capabilities(&governor_inputs, config.snapshot_enabled, config.rehydrate_enabled);
        let effective_action = decision.action;

        let detected = detect_events(
            &repo_state.head_commit,
            &repo_state.changed_files_hash,
            &repo_state.changed_files,
            diff_lines,
            input.assistant_response,
            was_error,
        );

        if config.mode == Mode::Active {
            if detected.devlog {
                let content = format!(
                    "provider: {}\nmode: {}\ncommit: {}\nchanged_files: {:?}\ndiff_lines: {}\nreasons: {}\nartifact_policy: {:?}\nmemory_branch: {}\nauto_commit_allowed: {}\nprompt: {}\nassistant_summary: {}",
                    input.provider.as_str(),
                    mode_label,
                    repo_state.head_commit,
                    repo_state.changed_files.iter().take(24).collect::<Vec<_>>(),
                    diff_lines,
                    detected.reasons.join(";"),
                    config.artifact_policy,
                    config.memory_branch,
                    safeguard_decision.as_ref().map(|d| d.allowed).unwrap_or(false),
                    crate::hashing::clamp_by_bytes(input.prompt, 900),
                    crate::hashing::clamp_by_bytes(input.assistant_response, 1_500),
                );
                write_if_new(
                    &*self.store,
                    input.sub_session_id,
                    ArtifactType::Devlog,
                    &detected.event_fingerprint,
                    &content,
                    "engine",
                    now,
                );
            }
            if detected.adr {
                let fingerprint = format!("{}:adr", detected.event_fingerprint);
                let content = format!(
                    "boundary_files: {:?}\ndecision: <pending>\nconsequences: <pending>",
                    detected.boundary_files.iter().take(12).collect::<Vec<_>>(),
                );
                write_if_new(
                    &*self.store,
                    input.sub_session_id,
                    ArtifactType::Adr,
                    &fingerprint,
                    &content,
                    "engine",
                    now,
                );
            }
            if detected.rejected_approach {
                let fingerprint = format!("{}:rejected", detected.event_fingerprint);
                let reason = detected
                    .rejected_reason
                    .as_ref()
                    .map(|r| r.as_str())
                    .unwrap_or("");
                let content = format!(
                    "reason: {reason}\nprompt: {}\nresponse: {}",
                    crate::hashing::clamp_by_bytes(input.prompt, 900),
                    crate::hashing::clamp_by_bytes(input.assistant_response, 1_500),
                );
                write_if_new(
                    &*self.store,
                    input.sub_session_id,
                    ArtifactType::RejectedApproach,
                    &fingerprint,
                    &content,
                    "engine",
                    now,
                );
            }
        }

        let new_session_state = if effective_action == GovernorAction::Ok {
            SessionState {
                sub_session_id: input.sub_session_id.to_string(),
                last_changed_files_hash: repo_state.changed_files_hash.clone(),
                turns_since_snapshot: turns,
                total_injected_bytes: bytes,
                last_snapshot_at: prior.last_snapshot_at,
                updated_at: now,
            }
        } else {
            SessionState {
                sub_session_id: input.sub_session_id.to_string(),
                last_changed_files_hash: repo_state.changed_files_hash.clone(),
                turns_since_snapshot: 0,
                total_injected_bytes: 0,
                last_snapshot_at: Some(now),
                updated_at: now,
            }
        };
        self.store.upsert_session_state(&new_session_state);

        if config.mode == Mode::Active && effective_action != GovernorAction::Ok {
            let fingerprint = sha256_fields(&[&now.to_string(), effective_action.as_str()]);
            let content = format!(
                "governor_action: {}\nreasons: {}",
                effective_action.as_str(),
                decision.reasons.join(";")
            );
            write_if_new(
                &*self.store,
                input.sub_session_id,
                ArtifactType::Devlog,
                &fingerprint,
                &content,
                "engine",
                now,
            );
            self.telemetry.governor_action(&GovernorActionEvent {
                sub_session_id: input.sub_session_id.to_string(),
                action: effective_action.as_str().to_string(),
                reasons: decision.reasons.clone(),
            });
        }

        if let Some(safeguard_decision) = &safeguard_decision {
            if safeguard_decision.requested {
                let outcome = if safeguard_decision.allowed {
                    "auto-commit-allowed"
                } else {
                    "auto-commit-blocked"
                };
                self.telemetry.safeguard(&SafeguardEvent {
                    sub_session_id: input.sub_session_id.to_string(),
                    outcome: outcome.to_string(),
                    current_branch: current_branch.clone(),
                    memory_branch: config.memory_branch.clone(),
                });
                if !safeguard_decision.allowed {
                    let fingerprint = safeguard::block_fingerprint(&repo_state.head_commit, &current_branch);
                    let content = format!(
                        "auto-commit blocked: branch {} is not memory branch {}",
                        current_branch, config.memory_branch
                    );
                    write_if_new(
                        &*self.store,
                        input.sub_session_id,
                        ArtifactType::Devlog,
                        &fingerprint,
                        &content,
                        "engine",
                        now,
                    );
                }
            }
        }

        if config.mode == Mode::Active && effective_action == GovernorAction::Rehydrate {
            rehydrate(
                &*self.session_store,
                &*self.store,
                input.sub_session_id,
                mode_label,
                &decision.reasons,
                input.prompt,
                now,
            );
        }

        RecordRunOutcomeOutput {
            action: effective_action.as_str().to_string(),
            reasons: decision.reasons,
        }
    }

    /// Render a read-only diagnostic snapshot for `sub_session_id`: its
    /// persisted `SessionState`, the governor decision its current inputs
    /// would produce, and hot-cache statistics (spec.md §6). Never writes
    /// to the store or either cache tier.
    pub async fn report(&self, sub_session_id: &str, cwd: &Path) -> ReportOutput {
        let config = self.effective_config();
        let repo = Repository::at(cwd);
        let repo_state = probe::probe_repo_state(&repo).await;
        let diff_lines = probe::diff_stats(&repo).await;
        let now = now_unix();

        let session_state = self.store.get_session_state(sub_session_id);
        let turns = session_state.as_ref().map(|s| s.turns_since_snapshot).unwrap_or(0);
        let bytes = session_state.as_ref().map(|s| s.total_injected_bytes).unwrap_or(0);
        let elapsed_ms = session_state
            .as_ref()
            .and_then(|s| s.last_snapshot_at)
            .map(|t| ((now - t).max(0) as u64) * 1000);

        let governor_inputs = GovernorInputs {
            turns_since_snapshot: turns,
            total_injected_bytes: bytes,
            changed_files_count: repo_state.changed_files.len(),
            diff_lines,
            elapsed_since_snapshot_ms: elapsed_ms,
        };
        let governor_decision =
            decide_with_capabilities(&governor_inputs, config.snapshot_enabled, config.rehydrate_enabled);

        let last_cache_key = self.hot.last_cache_key(sub_session_id);
        let cached_pack_bytes = last_cache_key
            .as_deref()
            .and_then(|key| self.hot.get_pack(key).or_else(|| self.store.get_pack_cache(key)))
            .map(|entry| entry.pack_text.len());

        ReportOutput {
            session_state,
            governor_decision,
            last_cache_key,
            cached_pack_bytes,
            cache_stats: self.hot.stats(),
        }
    }
}
