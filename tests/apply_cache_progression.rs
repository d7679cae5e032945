//! Exercises `apply`'s cache-key progression across consecutive turns of
//! the same sub-session, and across a second sub-session that reuses an
//! already-cached pack.

use continuity_core::session_messages::{SessionMode, SqliteSessionStore};
use continuity_core::store::SqliteStore;
use continuity_core::telemetry::TracingTelemetrySink;
use continuity_core::{ApplyInput, Engine, Provider};
use serial_test::serial;

fn active_engine() -> Engine {
    Engine::new(
        Box::new(SqliteStore::open_in_memory().unwrap()),
        Box::new(SqliteSessionStore::open_in_memory().unwrap()),
        Box::new(TracingTelemetrySink),
    )
}

fn apply_input<'a>(sub_session_id: &'a str, prompt: &'a str, dir: &'a std::path::Path) -> ApplyInput<'a> {
    ApplyInput {
        sub_session_id,
        cwd: dir,
        project_path: None,
        prompt,
        mode: SessionMode::Agent,
        provider: Provider::Claude,
    }
}

#[test]
#[serial]
fn first_apply_misses_then_second_and_third_collapse_to_delta_only() {
    std::env::set_var("CONTINUITY_CONTINUITY_MODE", "active");
    let engine = active_engine();
    let dir = tempfile::tempdir().unwrap();
    let prompt = "Investigate the failing checkout flow";

    let first = smol::block_on(engine.apply(apply_input("sess1", prompt, dir.path())));
    assert!(!first.cache_hit);
    assert_eq!(first.reused_percent, 35);
    assert!(first.prompt_out.contains("[1CODE_CONTINUITY_ANCHOR]"));
    assert!(first.prompt_out.contains("[1CODE_CONTINUITY_CONTEXT]"));
    assert!(first.prompt_out.ends_with(prompt));

    let second = smol::block_on(engine.apply(apply_input("sess1", prompt, dir.path())));
    assert!(second.cache_hit);
    assert_eq!(second.reused_percent, 95);
    assert!(!second.prompt_out.contains("[1CODE_CONTINUITY_ANCHOR]"));
    assert!(second.prompt_out.contains("[1CODE_CONTINUITY_DELTA]"));

    let third = smol::block_on(engine.apply(apply_input("sess1", prompt, dir.path())));
    assert!(third.cache_hit);
    assert_eq!(third.reused_percent, 95);

    std::env::remove_var("CONTINUITY_CONTINUITY_MODE");
}

#[test]
#[serial]
fn second_sub_session_reusing_cached_pack_gets_seventy_five_percent() {
    std::env::set_var("CONTINUITY_CONTINUITY_MODE", "active");
    let engine = active_engine();
    let dir = tempfile::tempdir().unwrap();
    let prompt = "Investigate the failing checkout flow";

    let _ = smol::block_on(engine.apply(apply_input("sess1", prompt, dir.path())));
    let other_session = smol::block_on(engine.apply(apply_input("sess2", prompt, dir.path())));

    assert!(other_session.cache_hit);
    assert_eq!(other_session.reused_percent, 75);
    assert!(other_session.prompt_out.contains("[1CODE_CONTINUITY_ANCHOR]"));

    std::env::remove_var("CONTINUITY_CONTINUITY_MODE");
}

#[test]
#[serial]
fn passive_mode_cache_miss_returns_original_prompt_but_still_persists_cache() {
    std::env::set_var("CONTINUITY_CONTINUITY_MODE", "passive");
    let engine = active_engine();
    let dir = tempfile::tempdir().unwrap();
    let prompt = "Summarize recent commits";

    let out = smol::block_on(engine.apply(apply_input("sess1", prompt, dir.path())));
    assert_eq!(out.prompt_out, prompt);
    assert!(!out.cache_hit);
    assert!(out.context_pack_id.is_some());

    std::env::remove_var("CONTINUITY_CONTINUITY_MODE");
}
