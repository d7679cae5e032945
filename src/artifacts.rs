//! Artifact writer (spec §4.11): durable memory artifacts, de-duplicated by
//! event fingerprint.

use crate::store::ContinuityStore;
use crate::store::models::{Artifact, ArtifactStatus, ArtifactType, Provenance};
use uuid::Uuid;

const DEDUP_WINDOW: usize = 12;

/// Insert a new draft artifact of `artifact_type` for `sub_session_id`
/// unless one with the same `event_fingerprint` already exists among the
/// last 12 artifacts of that `(sub_session_id, type)` (spec §4.11, §8
/// property 10).
pub fn write_if_new(
    store: &dyn ContinuityStore,
    sub_session_id: &str,
    artifact_type: ArtifactType,
    event_fingerprint: &str,
    content: &str,
    created_by: &str,
    now: i64,
) {
    let type_str = artifact_type.as_str();
    let recent = store.recent_artifacts(sub_session_id, type_str, DEDUP_WINDOW);
    if recent
        .iter()
        .any(|a| a.provenance.event_fingerprint == event_fingerprint)
    {
        return;
    }

    let artifact = Artifact {
        id: Uuid::new_v4().to_string(),
        sub_session_id: sub_session_id.to_string(),
        artifact_type: type_str.to_string(),
        content: content.to_string(),
        status: ArtifactStatus::Draft.as_str().to_string(),
        provenance: Provenance {
            event_fingerprint: event_fingerprint.to_string(),
            created_by: created_by.to_string(),
        },
        created_at: now,
        updated_at: now,
    };
    store.insert_artifact(&artifact);
}
