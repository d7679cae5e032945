//! Safeguard gate (spec §4.12): decides whether automatic commits to a
//! memory branch are permitted, independent of whether a commit is ever
//! actually performed (the engine never mutates the working tree — §1
//! Non-goals).

use crate::config::{ArtifactPolicy, EngineConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeguardDecision {
    pub requested: bool,
    pub allowed: bool,
}

/// `requested` iff policy opts into memory-branch auto-commit; `allowed`
/// iff requested and the repo is currently on the configured memory
/// branch.
pub fn evaluate(config: &EngineConfig, current_branch: &str) -> SafeguardDecision {
    let requested =
        config.artifact_policy == ArtifactPolicy::AutoWriteMemoryBranch && config.auto_commit_to_memory_branch;
    let allowed = requested && current_branch == config.memory_branch;
    SafeguardDecision { requested, allowed }
}

/// Fingerprint for the block-devlog artifact written when a commit was
/// requested but not allowed (spec §4.12).
pub fn block_fingerprint(head_commit: &str, current_branch: &str) -> String {
    format!("{head_commit}:auto-commit-blocked:{current_branch}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(policy: ArtifactPolicy, auto_commit: bool, memory_branch: &str) -> EngineConfig {
        EngineConfig {
            artifact_policy: policy,
            auto_commit_to_memory_branch: auto_commit,
            memory_branch: memory_branch.to_string(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn not_requested_when_policy_is_manual_commit() {
        let cfg = config(ArtifactPolicy::AutoWriteManualCommit, true, "memory/continuity");
        let decision = evaluate(&cfg, "memory/continuity");
        assert!(!decision.requested);
        assert!(!decision.allowed);
    }

    #[test]
    fn requested_and_allowed_on_memory_branch() {
        let cfg = config(ArtifactPolicy::AutoWriteMemoryBranch, true, "memory/continuity");
        let decision = evaluate(&cfg, "memory/continuity");
        assert!(decision.requested);
        assert!(decision.allowed);
    }

    #[test]
    fn requested_but_blocked_off_memory_branch() {
        let cfg = config(ArtifactPolicy::AutoWriteMemoryBranch, true, "memory/continuity");
        let decision = evaluate(&cfg, "feature/x");
        assert!(decision.requested);
        assert!(!decision.allowed);
    }

    #[test]
    fn block_fingerprint_format() {
        assert_eq!(
            block_fingerprint("abc123", "feature/x"),
            "abc123:auto-commit-blocked:feature/x"
        );
    }
}
