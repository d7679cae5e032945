//! Delta Pack builder (spec §4.7).

use crate::git::RepoState;
use crate::hashing::clamp_by_bytes;
use crate::session_messages::SessionMessageStore;
use regex::Regex;
use std::sync::LazyLock;

const OBJECTIVE_CLAMP: usize = 200;
const DIGEST_MAX_LINES: usize = 40;
const DIGEST_CLAMP: usize = 2_000;
const RECENT_MESSAGES: usize = 12;
const CHANGED_FILES_LIMIT: usize = 20;

static FAILURE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fail|failed|error|exception|assert").unwrap());

/// First non-blank line of `prompt`, clamped to 200 bytes (spec §4.7).
pub fn objective_line(prompt: &str) -> String {
    let line = prompt.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    clamp_by_bytes(line, OBJECTIVE_CLAMP)
}

/// Read the last 12 stored messages, collect text parts, keep lines
/// matching `/fail|failed|error|exception|assert/i`, take the last 40,
/// clamp to 2,000 bytes. Empty string if none match.
pub fn failing_test_digest(session_store: &dyn SessionMessageStore, sub_session_id: &str) -> String {
    let messages = session_store.recent_messages(sub_session_id, RECENT_MESSAGES);
    let mut matching: Vec<String> = Vec::new();
    for message in &messages {
        for line in message.text_content().lines() {
            if FAILURE_PATTERN.is_match(line) {
                matching.push(line.to_string());
            }
        }
    }
    let start = matching.len().saturating_sub(DIGEST_MAX_LINES);
    let joined = matching[start..].join("\n");
    if joined.is_empty() {
        String::new()
    } else {
        clamp_by_bytes(&joined, DIGEST_CLAMP)
    }
}

/// Previously persisted delta-relevant fields from `SessionState`, or
/// `None` on the sub-session's first `apply` (spec §4.7 "first run").
pub struct PriorDelta<'a> {
    pub last_changed_files_hash: &'a str,
}

/// Build the Delta Pack body (without the envelope label — the assembler
/// adds that).
pub fn build_delta_pack(
    repo_state: &RepoState,
    prompt: &str,
    diff_snippet: &str,
    failing_test_digest: &str,
    prior: Option<PriorDelta>,
) -> String {
    let objective = objective_line(prompt);
    let changed_files: Vec<&str> = repo_state
        .changed_files
        .iter()
        .take(CHANGED_FILES_LIMIT)
        .map(String::as_str)
        .collect();

    let mut out = String::new();

    match prior {
        None => {
            out.push_str("first_run: true\n");
            out.push_str(&format!("objective: {objective}\n"));
            push_changed_files(&mut out, &changed_files);
            push_failing_test_digest(&mut out, failing_test_digest);
            push_diff_block(&mut out, diff_snippet);
        }
        Some(prior) if prior.last_changed_files_hash == repo_state.changed_files_hash => {
            out.push_str("repo_delta: unchanged\n");
            out.push_str(&format!("objective: {objective}\n"));
            push_failing_test_digest(&mut out, failing_test_digest);
        }
        Some(_) => {
            out.push_str("repo_delta: changed\n");
            out.push_str(&format!("objective: {objective}\n"));
            push_changed_files(&mut out, &changed_files);
            push_failing_test_digest(&mut out, failing_test_digest);
            push_diff_block(&mut out, diff_snippet);
        }
    }

    out.trim_end().to_string()
}

fn push_changed_files(out: &mut String, changed_files: &[&str]) {
    if changed_files.is_empty() {
        out.push_str("changed_files: (none)\n");
        return;
    }
    out.push_str("changed_files:\n");
    for f in changed_files {
        out.push_str(&format!("- {f}\n"));
    }
}

fn push_failing_test_digest(out: &mut String, digest: &str) {
    if digest.is_empty() {
        out.push_str("failing_test_digest: (none)\n");
    } else {
        out.push_str(&format!("failing_test_digest:\n{digest}\n"));
    }
}

fn push_diff_block(out: &mut String, diff_snippet: &str) {
    out.push_str("diff:\n");
    out.push_str(diff_snippet);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_state(hash: &str, files: &[&str]) -> RepoState {
        RepoState {
            head_commit: "abc123".to_string(),
            changed_files: files.iter().map(|s| s.to_string()).collect(),
            changed_files_hash: hash.to_string(),
        }
    }

    #[test]
    fn first_run_form_has_first_run_true_and_diff() {
        let state = repo_state("h1", &["a.rs"]);
        let out = build_delta_pack(&state, "Do the thing\nmore", "diff body", "", None);
        assert!(out.starts_with("first_run: true"));
        assert!(out.contains("objective: Do the thing"));
        assert!(out.contains("- a.rs"));
        assert!(out.contains("diff:\ndiff body"));
    }

    #[test]
    fn unchanged_form_omits_diff_and_changed_files() {
        let state = repo_state("h1", &["a.rs"]);
        let prior = PriorDelta {
            last_changed_files_hash: "h1",
        };
        let out = build_delta_pack(&state, "Do the thing", "diff body", "", Some(prior));
        assert!(out.starts_with("repo_delta: unchanged"));
        assert!(!out.contains("diff:"));
        assert!(!out.contains("changed_files"));
    }

    #[test]
    fn changed_form_includes_diff_and_changed_files() {
        let state = repo_state("h2", &["a.rs", "b.rs"]);
        let prior = PriorDelta {
            last_changed_files_hash: "h1",
        };
        let out = build_delta_pack(&state, "Do the thing", "diff body", "", Some(prior));
        assert!(out.starts_with("repo_delta: changed"));
        assert!(out.contains("diff:\ndiff body"));
        assert!(out.contains("- a.rs"));
        assert!(out.contains("- b.rs"));
    }

    #[test]
    fn objective_takes_first_non_blank_line_clamped() {
        assert_eq!(objective_line("\n\n  hello world  \nsecond line"), "hello world");
        let long = "x".repeat(500);
        assert!(objective_line(&long).len() <= OBJECTIVE_CLAMP);
    }

    #[test]
    fn failing_test_digest_filters_and_empty_when_no_matches() {
        use crate::session_messages::{Message, SessionMode, SqliteSessionStore};
        let store = SqliteSessionStore::open_in_memory().unwrap();
        store.ensure("sess1", "chat1", SessionMode::Agent);
        store.append_message("sess1", Message::assistant_text("all good here\nnothing to see"));
        assert_eq!(failing_test_digest(&store, "sess1"), "");

        store.append_message("sess1", Message::assistant_text("test_foo FAILED: assertion error"));
        let digest = failing_test_digest(&store, "sess1");
        assert!(digest.contains("FAILED"));
    }
}
