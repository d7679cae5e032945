//! Rehydrate action (spec §4.14): replaces a session's message log with a
//! single synthetic carry-over message.

use crate::hashing::clamp_by_bytes;
use crate::session_messages::{Message, SessionMessageStore};
use crate::store::ContinuityStore;

const MAX_ARTIFACTS: usize = 6;
const ARTIFACT_LINE_CLAMP: usize = 180;
const LATEST_PROMPT_CLAMP: usize = 600;

/// Perform the rehydrate effect on the session message log. A no-op if the
/// sub-session record doesn't exist (spec §4.14 step 1).
pub fn rehydrate(
    session_store: &dyn SessionMessageStore,
    store: &dyn ContinuityStore,
    sub_session_id: &str,
    session_mode_label: &str,
    reasons: &[String],
    latest_user_prompt: &str,
    now: i64,
) {
    let Some(sub_session) = session_store.load(sub_session_id) else {
        return;
    };

    let artifacts = store.recent_artifacts_any_type(sub_session_id, MAX_ARTIFACTS);

    let reasons_line = if reasons.is_empty() {
        "governor-pressure".to_string()
    } else {
        reasons.join(";")
    };

    let mut text = String::new();
    text.push_str("[1CODE_CONTINUITY_REHYDRATE]\n");
    text.push_str(&format!("mode: {session_mode_label}\n"));
    text.push_str(&format!("reasons: {reasons_line}\n"));
    for artifact in &artifacts {
        let first_line = artifact
            .content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        let clamped = clamp_by_bytes(first_line, ARTIFACT_LINE_CLAMP);
        text.push_str(&format!("- {}: {clamped}\n", artifact.artifact_type));
    }
    text.push_str(&format!(
        "latest_user_prompt: {}",
        clamp_by_bytes(latest_user_prompt, LATEST_PROMPT_CLAMP)
    ));

    session_store.replace_messages(sub_session_id, vec![Message::assistant_text(text)]);
    session_store.touch_parent_chat(&sub_session.chat_id, now);
}
