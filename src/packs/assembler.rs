//! Pack assembler (spec §4.8): concatenates the sub-packs into a labeled
//! envelope in fixed section order, clamps the whole composite to budget,
//! and decides between the full and delta-only envelope forms.
//!
//! The envelope section labels and their order are part of the external
//! contract (spec §6) — downstream prompts and test expectations depend on
//! the exact strings.

use crate::hashing::clamp_by_bytes;

pub const LABEL_STATE_IDS: &str = "[1CODE_CONTINUITY_STATE_IDS]";
pub const LABEL_ANCHOR: &str = "[1CODE_CONTINUITY_ANCHOR]";
pub const LABEL_CONTEXT: &str = "[1CODE_CONTINUITY_CONTEXT]";
pub const LABEL_PLAN_CONTRACT: &str = "[1CODE_PLAN_CONTRACT]";
pub const LABEL_DELTA: &str = "[1CODE_CONTINUITY_DELTA]";
pub const LABEL_OBJECTIVE: &str = "[1CODE_OBJECTIVE]";
pub const LABEL_USER_REQUEST: &str = "[1CODE_USER_REQUEST]";

/// The four ids rendered in the `STATE_IDS` block (spec §4.8 step 2, 3).
/// Any field left `None` renders as `none`.
#[derive(Debug, Clone, Default)]
pub struct StateIds {
    pub anchor_pack_id: Option<String>,
    pub context_pack_id: Option<String>,
    pub plan_contract_id: Option<String>,
    pub delta_pack_id: Option<String>,
}

impl StateIds {
    pub fn render(&self) -> String {
        format!(
            "anchorPackId: {}\ncontextPackId: {}\nplanContractId: {}\ndeltaPackId: {}",
            self.anchor_pack_id.as_deref().unwrap_or("none"),
            self.context_pack_id.as_deref().unwrap_or("none"),
            self.plan_contract_id.as_deref().unwrap_or("none"),
            self.delta_pack_id.as_deref().unwrap_or("none"),
        )
    }
}

fn render_section(label: &str, body: &str) -> String {
    if body.is_empty() {
        label.to_string()
    } else {
        format!("{label}\n{body}")
    }
}

/// Assemble the full (anchor + context + delta) composite on a cache miss,
/// clamped to `max_pack_bytes`. The `USER_REQUEST` section carries no body
/// of its own — the caller appends `"\n\n" + prompt` after this result
/// (spec §4.8: "ends with `[1CODE_USER_REQUEST]` followed by the prompt").
#[allow(clippy::too_many_arguments)]
pub fn assemble_full_envelope(
    state_ids: &StateIds,
    anchor: &str,
    context: &str,
    plan_contract: Option<&str>,
    delta: &str,
    objective: &str,
    max_pack_bytes: usize,
) -> String {
    let mut sections = vec![
        render_section(LABEL_STATE_IDS, &state_ids.render()),
        render_section(LABEL_ANCHOR, anchor),
        render_section(LABEL_CONTEXT, context),
    ];
    if let Some(plan_contract) = plan_contract {
        sections.push(render_section(LABEL_PLAN_CONTRACT, plan_contract));
    }
    sections.push(render_section(LABEL_DELTA, delta));
    sections.push(render_section(LABEL_OBJECTIVE, objective));
    sections.push(LABEL_USER_REQUEST.to_string());

    let composite = sections.join("\n\n");
    clamp_by_bytes(&composite, max_pack_bytes)
}

/// Assemble the delta-only composite used on a repeat `apply` against the
/// same `ProtocolState` cache key (spec §4.8 step 4, "Hit" sub-case).
pub fn assemble_delta_only_envelope(state_ids: &StateIds, delta: &str, objective: &str) -> String {
    let sections = vec![
        render_section(LABEL_STATE_IDS, &state_ids.render()),
        render_section(LABEL_DELTA, delta),
        render_section(LABEL_OBJECTIVE, objective),
        LABEL_USER_REQUEST.to_string(),
    ];
    sections.join("\n\n")
}

/// Compose the final outbound prompt from an envelope (cached, freshly
/// built, or delta-only) and the original prompt.
pub fn compose_final_prompt(envelope: &str, prompt: &str) -> String {
    format!("{envelope}\n\n{prompt}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_envelope_has_sections_in_fixed_order() {
        let ids = StateIds {
            anchor_pack_id: Some("aid".to_string()),
            context_pack_id: Some("cid".to_string()),
            plan_contract_id: None,
            delta_pack_id: Some("did".to_string()),
        };
        let envelope = assemble_full_envelope(&ids, "anchor body", "context body", None, "delta body", "obj", 100_000);
        let state_ids_pos = envelope.find(LABEL_STATE_IDS).unwrap();
        let anchor_pos = envelope.find(LABEL_ANCHOR).unwrap();
        let context_pos = envelope.find(LABEL_CONTEXT).unwrap();
        let delta_pos = envelope.find(LABEL_DELTA).unwrap();
        let objective_pos = envelope.find(LABEL_OBJECTIVE).unwrap();
        let user_request_pos = envelope.find(LABEL_USER_REQUEST).unwrap();
        assert!(state_ids_pos < anchor_pos);
        assert!(anchor_pos < context_pos);
        assert!(context_pos < delta_pos);
        assert!(delta_pos < objective_pos);
        assert!(objective_pos < user_request_pos);
        assert!(envelope.ends_with(LABEL_USER_REQUEST));
        assert!(!envelope.contains(LABEL_PLAN_CONTRACT));
    }

    #[test]
    fn plan_contract_section_appears_between_context_and_delta_when_present() {
        let ids = StateIds::default();
        let envelope = assemble_full_envelope(&ids, "a", "c", Some("plan body"), "d", "obj", 100_000);
        let context_pos = envelope.find(LABEL_CONTEXT).unwrap();
        let plan_pos = envelope.find(LABEL_PLAN_CONTRACT).unwrap();
        let delta_pos = envelope.find(LABEL_DELTA).unwrap();
        assert!(context_pos < plan_pos);
        assert!(plan_pos < delta_pos);
    }

    #[test]
    fn full_envelope_clamps_to_budget() {
        let ids = StateIds::default();
        let huge = "x".repeat(100_000);
        let envelope = assemble_full_envelope(&ids, &huge, &huge, None, &huge, "obj", 5_000);
        assert!(envelope.len() <= 5_000);
    }

    #[test]
    fn delta_only_envelope_omits_anchor_and_context() {
        let ids = StateIds::default();
        let envelope = assemble_delta_only_envelope(&ids, "delta body", "obj");
        assert!(!envelope.contains(LABEL_ANCHOR));
        assert!(!envelope.contains(LABEL_CONTEXT));
        assert!(envelope.starts_with(LABEL_STATE_IDS));
        assert!(envelope.ends_with(LABEL_USER_REQUEST));
    }

    #[test]
    fn missing_state_ids_render_as_none() {
        let ids = StateIds::default();
        let rendered = ids.render();
        assert_eq!(
            rendered,
            "anchorPackId: none\ncontextPackId: none\nplanContractId: none\ndeltaPackId: none"
        );
    }

    #[test]
    fn compose_final_prompt_appends_blank_line_then_prompt() {
        let composed = compose_final_prompt("ENVELOPE", "the original prompt");
        assert_eq!(composed, "ENVELOPE\n\nthe original prompt");
    }

    #[test]
    fn full_envelope_format_is_stable() {
        let ids = StateIds {
            anchor_pack_id: Some("aid1".to_string()),
            context_pack_id: Some("cid1".to_string()),
            plan_contract_id: None,
            delta_pack_id: Some("did1".to_string()),
        };
        let envelope = assemble_full_envelope(
            &ids,
            "Anchor body line",
            "Context body line",
            None,
            "Delta body line",
            "Fix the bug",
            100_000,
        );
        insta::assert_snapshot!(envelope, @r###"
        [1CODE_CONTINUITY_STATE_IDS]
        anchorPackId: aid1
        contextPackId: cid1
        planContractId: none
        deltaPackId: did1

        [1CODE_CONTINUITY_ANCHOR]
        Anchor body line

        [1CODE_CONTINUITY_CONTEXT]
        Context body line

        [1CODE_CONTINUITY_DELTA]
        Delta body line

        [1CODE_OBJECTIVE]
        Fix the bug

        [1CODE_USER_REQUEST]
        "###);
    }

    #[test]
    fn delta_only_envelope_format_is_stable() {
        let ids = StateIds {
            anchor_pack_id: Some("aid1".to_string()),
            context_pack_id: Some("cid1".to_string()),
            plan_contract_id: None,
            delta_pack_id: Some("did2".to_string()),
        };
        let envelope = assemble_delta_only_envelope(&ids, "Delta body line", "Fix the bug");
        insta::assert_snapshot!(envelope, @r###"
        [1CODE_CONTINUITY_STATE_IDS]
        anchorPackId: aid1
        contextPackId: cid1
        planContractId: none
        deltaPackId: did2

        [1CODE_CONTINUITY_DELTA]
        Delta body line

        [1CODE_OBJECTIVE]
        Fix the bug

        [1CODE_USER_REQUEST]
        "###);
    }
}
