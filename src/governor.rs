//! Governor (spec §4.10): threshold-based state machine emitting
//! `ok | snapshot | rehydrate`, gated by configured capabilities.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GovernorAction {
    Ok,
    Snapshot,
    Rehydrate,
}

impl GovernorAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GovernorAction::Ok => "ok",
            GovernorAction::Snapshot => "snapshot",
            GovernorAction::Rehydrate => "rehydrate",
        }
    }
}

/// Governor inputs (spec §4.10). `elapsed_since_snapshot_ms` is `None` when
/// there is no prior snapshot, treated as +infinity (always past threshold).
#[derive(Debug, Clone, Copy)]
pub struct GovernorInputs {
    pub turns_since_snapshot: u32,
    pub total_injected_bytes: u64,
    pub changed_files_count: usize,
    pub diff_lines: u64,
    pub elapsed_since_snapshot_ms: Option<u64>,
}

const SNAPSHOT_TURNS: u32 = 7;
const REHYDRATE_TURNS: u32 = 12;
const SNAPSHOT_BYTES: u64 = 90_000;
const REHYDRATE_BYTES: u64 = 150_000;
const SNAPSHOT_CHANGED_FILES: usize = 10;
const REHYDRATE_CHANGED_FILES: usize = 18;
const SNAPSHOT_DIFF_LINES: u64 = 160;
const REHYDRATE_DIFF_LINES: u64 = 280;
const SNAPSHOT_ELAPSED_MS: u64 = 25 * 60 * 1000;
const REHYDRATE_ELAPSED_MS: u64 = 50 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorDecision {
    pub action: GovernorAction,
    pub reasons: Vec<String>,
}

fn elapsed_meets(elapsed: Option<u64>, threshold_ms: u64) -> bool {
    match elapsed {
        None => true,
        Some(ms) => ms >= threshold_ms,
    }
}

/// Raw decision before capability gating (spec §4.10 "Decision" rules).
fn decide(inputs: &GovernorInputs) -> GovernorDecision {
    let mut rehydrate_reasons = Vec::new();
    if inputs.turns_since_snapshot >= REHYDRATE_TURNS {
        rehydrate_reasons.push("turn-pressure".to_string());
    }
    if inputs.total_injected_bytes >= REHYDRATE_BYTES {
        rehydrate_reasons.push("byte-pressure".to_string());
    }
    if inputs.changed_files_count >= REHYDRATE_CHANGED_FILES {
        rehydrate_reasons.push("changed-files-pressure".to_string());
    }
    if inputs.diff_lines >= REHYDRATE_DIFF_LINES {
        rehydrate_reasons.push("diff-pressure".to_string());
    }
    if elapsed_meets(inputs.elapsed_since_snapshot_ms, REHYDRATE_ELAPSED_MS) {
        rehydrate_reasons.push("elapsed-pressure".to_string());
    }
    if rehydrate_reasons.len() >= 2 {
        return GovernorDecision {
            action: GovernorAction::Rehydrate,
            reasons: rehydrate_reasons,
        };
    }

    let mut snapshot_reasons = Vec::new();
    if inputs.turns_since_snapshot >= SNAPSHOT_TURNS {
        snapshot_reasons.push("turn-pressure".to_string());
    }
    if inputs.total_injected_bytes >= SNAPSHOT_BYTES {
        snapshot_reasons.push("byte-pressure".to_string());
    }
    if inputs.changed_files_count >= SNAPSHOT_CHANGED_FILES {
        snapshot_reasons.push("changed-files-pressure".to_string());
    }
    if inputs.diff_lines >= SNAPSHOT_DIFF_LINES {
        snapshot_reasons.push("diff-pressure".to_string());
    }
    if elapsed_meets(inputs.elapsed_since_snapshot_ms, SNAPSHOT_ELAPSED_MS) {
        snapshot_reasons.push("elapsed-pressure".to_string());
    }
    if snapshot_reasons.len() >= 2 {
        return GovernorDecision {
            action: GovernorAction::Snapshot,
            reasons: snapshot_reasons,
        };
    }

    GovernorDecision {
        action: GovernorAction::Ok,
        reasons: Vec::new(),
    }
}

/// Decide the governor action and apply capability gating (spec §4.10
/// "Capability gating"): a `rehydrate` decision degrades to `snapshot` (or
/// `ok`) when rehydrate/snapshot capability is disabled, and a `snapshot`
/// decision degrades to `ok` when snapshot capability is disabled.
pub fn decide_with_capabilities(
    inputs: &GovernorInputs,
    snapshot_enabled: bool,
    rehydrate_enabled: bool,
) -> GovernorDecision {
    let decision = decide(inputs);
    match decision.action {
        GovernorAction::Rehydrate if !rehydrate_enabled => {
            if snapshot_enabled {
                GovernorDecision {
                    action: GovernorAction::Snapshot,
                    reasons: decision.reasons,
                }
            } else {
                GovernorDecision {
                    action: GovernorAction::Ok,
                    reasons: decision.reasons,
                }
            }
        }
        GovernorAction::Snapshot if !snapshot_enabled => GovernorDecision {
            action: GovernorAction::Ok,
            reasons: decision.reasons,
        },
        _ => decision,
    }
}
