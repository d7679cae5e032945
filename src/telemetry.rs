//! Telemetry sink (spec §6 "Telemetry sink"): fire-and-forget events the
//! engine emits so a dispatcher can wire up whatever metrics pipeline it
//! already has. Grounded on the teacher's `metrics::record` /
//! `observability::log_metrics` pair, minus the envelope-upload machinery
//! (out of scope per §1) — here it's just `tracing::info!` spans.

use tracing::info;

/// Fields attached to a `pack_metrics` event (spec §4.8).
#[derive(Debug, Clone)]
pub struct PackMetrics {
    pub sub_session_id: String,
    pub cache_hit: bool,
    pub injected_bytes: usize,
    pub reused_percent: u8,
}

/// Fields attached to a `governor_action` event (spec §4.10).
#[derive(Debug, Clone)]
pub struct GovernorActionEvent {
    pub sub_session_id: String,
    pub action: String,
    pub reasons: Vec<String>,
}

/// Fields attached to a `safeguard` event (spec §4.12).
#[derive(Debug, Clone)]
pub struct SafeguardEvent {
    pub sub_session_id: String,
    pub outcome: String,
    pub current_branch: String,
    pub memory_branch: String,
}

pub trait TelemetrySink: Send + Sync {
    fn pack_metrics(&self, event: &PackMetrics);
    fn governor_action(&self, event: &GovernorActionEvent);
    fn safeguard(&self, event: &SafeguardEvent);
}

/// Default sink: structured `tracing::info!` events, observable without
/// being surfaced to the caller (spec §7).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn pack_metrics(&self, event: &PackMetrics) {
        info!(
            sub_session_id = %event.sub_session_id,
            cache_hit = event.cache_hit,
            injected_bytes = event.injected_bytes,
            reused_percent = event.reused_percent,
            "pack_metrics"
        );
    }

    fn governor_action(&self, event: &GovernorActionEvent) {
        info!(
            sub_session_id = %event.sub_session_id,
            action = %event.action,
            reasons = %event.reasons.join(","),
            "governor_action"
        );
    }

    fn safeguard(&self, event: &SafeguardEvent) {
        info!(
            sub_session_id = %event.sub_session_id,
            outcome = %event.outcome,
            current_branch = %event.current_branch,
            memory_branch = %event.memory_branch,
            "safeguard"
        );
    }
}
