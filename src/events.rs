//! Event detector (spec §4.9): classifies a completed turn as devlog-worthy,
//! ADR-worthy, or rejected-approach-worthy.

use crate::hashing::sha256_fields;

const BOUNDARY_PREFIXES: &[&str] = &[
    "src/main/lib/trpc/",
    "src/main/lib/db/",
    "src/main/lib/continuity/",
    "src/main/lib/plugins/",
    "src/main/lib/mcp-",
    "src/main/lib/oauth",
    "src/main/lib/git/",
];

const DIFF_LINES_THRESHOLD: u64 = 120;
const CHANGED_FILES_THRESHOLD: usize = 6;
const DIRECTION_CHANGE_MARKERS: &[&str] = &["instead", "alternative approach", "pivot"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectedReason {
    RunError,
    DirectionChange,
}

impl RejectedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectedReason::RunError => "run-error",
            RejectedReason::DirectionChange => "direction-change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedEvents {
    pub devlog: bool,
    pub adr: bool,
    pub rejected_approach: bool,
    pub rejected_reason: Option<RejectedReason>,
    pub reasons: Vec<String>,
    pub boundary_files: Vec<String>,
    pub event_fingerprint: String,
}

/// Classify a turn given the repository state, diff size, assistant
/// response text, and whether the turn ended in an error (spec §4.9).
pub fn detect_events(
    head_commit: &str,
    changed_files_hash: &str,
    changed_files: &[String],
    diff_lines: u64,
    assistant_response: &str,
    was_error: bool,
) -> DetectedEvents {
    let mut reasons = Vec::new();
    let mut devlog = false;
    let mut rejected_approach = false;
    let mut rejected_reason = None;

    if diff_lines >= DIFF_LINES_THRESHOLD {
        reasons.push("diff>120".to_string());
        devlog = true;
    }
    if changed_files.len() >= CHANGED_FILES_THRESHOLD {
        reasons.push("changed_files>6".to_string());
        devlog = true;
    }
    if was_error {
        reasons.push("run-error".to_string());
        devlog = true;
        rejected_approach = true;
        rejected_reason = Some(RejectedReason::RunError);
    }

    let boundary_files: Vec<String> = changed_files
        .iter()
        .filter(|f| BOUNDARY_PREFIXES.iter().any(|p| f.starts_with(p)))
        .cloned()
        .collect();
    let adr = !boundary_files.is_empty();
    if adr {
        reasons.push("boundary-modules-touched".to_string());
    }

    if !was_error {
        let lowered = assistant_response.to_lowercase();
        if DIRECTION_CHANGE_MARKERS.iter().any(|m| lowered.contains(m)) {
            rejected_approach = true;
            rejected_reason = Some(RejectedReason::DirectionChange);
        }
    }

    let response_prefix: String = assistant_response
        .chars()
        .take(160)
        .collect::<String>()
        .to_lowercase();
    let event_fingerprint = sha256_fields(&[
        head_commit,
        changed_files_hash,
        &diff_lines.to_string(),
        &was_error.to_string(),
        &response_prefix,
    ]);

    DetectedEvents {
        devlog,
        adr,
        rejected_approach,
        rejected_reason,
        reasons,
        boundary_files,
        event_fingerprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_diff_fires_devlog_with_reason() {
        let out = detect_events("abc", "cfh", &[], 150, "looks good", false);
        assert!(out.devlog);
        assert!(out.reasons.contains(&"diff>120".to_string()));
        assert!(!out.adr);
        assert!(!out.rejected_approach);
    }

    #[test]
    fn run_error_fires_devlog_and_rejected() {
        let out = detect_events("abc", "cfh", &[], 10, "it crashed", true);
        assert!(out.devlog);
        assert!(out.rejected_approach);
        assert_eq!(out.rejected_reason, Some(RejectedReason::RunError));
        assert!(out.reasons.contains(&"run-error".to_string()));
    }

    #[test]
    fn boundary_files_fire_adr() {
        let files = vec!["src/main/lib/db/schema.rs".to_string()];
        let out = detect_events("abc", "cfh", &files, 5, "fine", false);
        assert!(out.adr);
        assert_eq!(out.boundary_files, files);
        assert!(out.reasons.contains(&"boundary-modules-touched".to_string()));
    }

    #[test]
    fn direction_change_marker_without_error() {
        let out = detect_events("abc", "cfh", &[], 5, "Instead, let's pivot to a different design", false);
        assert!(out.rejected_approach);
        assert_eq!(out.rejected_reason, Some(RejectedReason::DirectionChange));
    }

    #[test]
    fn quiet_turn_fires_nothing() {
        let out = detect_events("abc", "cfh", &["a.rs".to_string()], 5, "done", false);
        assert!(!out.devlog);
        assert!(!out.adr);
        assert!(!out.rejected_approach);
        assert!(out.reasons.is_empty());
    }

    #[test]
    fn fingerprint_is_sensitive_to_was_error() {
        let a = detect_events("abc", "cfh", &[], 5, "ok", false).event_fingerprint;
        let b = detect_events("abc", "cfh", &[], 5, "ok", true).event_fingerprint;
        assert_ne!(a, b);
    }
}
