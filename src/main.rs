//! `continuity-debug`: a diagnostic CLI that exercises the Continuity
//! Engine against a real repository on disk, in the style of the teacher's
//! `git-ai debug` report (`commands/debug.rs`). Not part of the external
//! contract (§6) — the dispatcher links against `continuity_core` directly.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use continuity_core::config::EngineConfig;
use continuity_core::session_messages::{SessionMode, SqliteSessionStore};
use continuity_core::store::SqliteStore;
use continuity_core::telemetry::TracingTelemetrySink;
use continuity_core::{ApplyInput, Engine, Provider, RecordRunOutcomeInput};

#[derive(Parser)]
#[command(name = "continuity-debug", about = "Diagnostics for the Continuity Engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one apply + record_run_outcome cycle against a repository and
    /// print a diagnostic report.
    Report {
        /// Repository to probe. Defaults to the current directory.
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// SQLite store path. Defaults to an in-memory database.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Prompt to run through `apply`.
        #[arg(long, default_value = "Describe the current state of this repository")]
        prompt: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report { repo, store, prompt } => {
            let report = smol::block_on(build_report(&repo, store.as_deref(), &prompt));
            println!("{report}");
        }
    }
}

async fn build_report(repo: &std::path::Path, store_path: Option<&std::path::Path>, prompt: &str) -> String {
    let store: Box<dyn continuity_core::store::ContinuityStore> = match store_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                return format!("continuity-debug report\nerror: failed to open store at {}: {err}", path.display());
            }
        },
        None => Box::new(SqliteStore::open_in_memory().expect("in-memory sqlite store")),
    };
    let session_store = SqliteSessionStore::open_in_memory().expect("in-memory sqlite session store");
    session_store.ensure("continuity-debug", "continuity-debug-chat", SessionMode::Agent);

    let engine = Engine::new(store, Box::new(session_store), Box::new(TracingTelemetrySink));

    let apply_started = std::time::Instant::now();
    let apply_out = engine
        .apply(ApplyInput {
            sub_session_id: "continuity-debug",
            cwd: repo,
            project_path: None,
            prompt,
            mode: SessionMode::Agent,
            provider: Provider::Claude,
        })
        .await;
    let apply_elapsed = apply_started.elapsed();

    let outcome_started = std::time::Instant::now();
    let outcome = engine
        .record_run_outcome(RecordRunOutcomeInput {
            sub_session_id: "continuity-debug",
            cwd: repo,
            project_path: None,
            provider: Provider::Claude,
            mode: SessionMode::Agent,
            prompt,
            assistant_response: "diagnostic run, no real provider response",
            injected_bytes: Some(apply_out.injected_bytes as i64),
            was_error: Some(false),
        })
        .await;
    let outcome_elapsed = outcome_started.elapsed();

    let report = engine.report("continuity-debug", repo).await;
    let config = EngineConfig::from_env();

    let mut out = String::new();
    let _ = writeln!(out, "continuity-debug report");
    let _ = writeln!(out, "Generated (UTC): {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(out);

    let _ = writeln!(out, "== Config ==");
    let _ = writeln!(out, "mode: {:?}", config.mode);
    let _ = writeln!(out, "token_mode: {:?}", config.token_mode);
    let _ = writeln!(out, "artifact_policy: {:?}", config.artifact_policy);
    let _ = writeln!(out, "memory_branch: {}", config.memory_branch);
    let _ = writeln!(out);

    let _ = writeln!(out, "== apply ==");
    let _ = writeln!(out, "elapsed: {}", humantime::format_duration(apply_elapsed));
    let _ = writeln!(out, "cache_hit: {}", apply_out.cache_hit);
    let _ = writeln!(out, "reused_percent: {}", apply_out.reused_percent);
    let _ = writeln!(out, "injected_bytes: {}", apply_out.injected_bytes);
    let _ = writeln!(out, "anchorPackId: {}", apply_out.anchor_pack_id.as_deref().unwrap_or("none"));
    let _ = writeln!(out, "contextPackId: {}", apply_out.context_pack_id.as_deref().unwrap_or("none"));
    let _ = writeln!(out, "deltaPackId: {}", apply_out.delta_pack_id.as_deref().unwrap_or("none"));
    let _ = writeln!(out);

    let _ = writeln!(out, "== record_run_outcome ==");
    let _ = writeln!(out, "elapsed: {}", humantime::format_duration(outcome_elapsed));
    let _ = writeln!(out, "action: {}", outcome.action);
    let _ = writeln!(out, "reasons: {}", outcome.reasons.join(","));
    let _ = writeln!(out);

    let _ = writeln!(out, "== report ==");
    match &report.session_state {
        Some(state) => {
            let _ = writeln!(out, "turns_since_snapshot: {}", state.turns_since_snapshot);
            let _ = writeln!(out, "total_injected_bytes: {}", state.total_injected_bytes);
            let _ = writeln!(
                out,
                "last_snapshot_at: {}",
                state
                    .last_snapshot_at
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
        }
        None => {
            let _ = writeln!(out, "session_state: none (no prior apply/record_run_outcome for this sub-session)");
        }
    }
    let _ = writeln!(out, "governor_action: {}", report.governor_decision.action.as_str());
    let _ = writeln!(out, "governor_reasons: {}", report.governor_decision.reasons.join(","));
    let _ = writeln!(
        out,
        "last_cache_key: {}",
        report.last_cache_key.as_deref().unwrap_or("none")
    );
    let _ = writeln!(
        out,
        "cached_pack_bytes: {}",
        report
            .cached_pack_bytes
            .map(|b| b.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    let _ = writeln!(out, "hot_cache_pack_entries: {}", report.cache_stats.pack_entries);
    let _ = writeln!(out, "hot_cache_file_summary_entries: {}", report.cache_stats.file_summary_entries);
    let _ = writeln!(out, "hot_cache_search_entries: {}", report.cache_stats.search_entries);
    let _ = writeln!(out, "hot_cache_tracked_sub_sessions: {}", report.cache_stats.tracked_sub_sessions);

    out
}
