//! Continuity Engine: a deterministic pre-run context assembler and
//! post-run governor wrapping each turn of a coding-assistant session.
//!
//! The two public operations, [`engine::Engine::apply`] and
//! [`engine::Engine::record_run_outcome`], are infallible by design — every
//! internal failure degrades to a conservative default rather than
//! surfacing to the caller.

pub mod artifacts;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod git;
pub mod governor;
pub mod hashing;
pub mod keywords;
pub mod packs;
pub mod rehydrate;
pub mod safeguard;
pub mod session_messages;
pub mod store;
pub mod summary;
pub mod telemetry;

pub use engine::{
    ApplyInput, ApplyOutput, Engine, Provider, RecordRunOutcomeInput, RecordRunOutcomeOutput, ReportOutput,
};
pub use error::ContinuityError;
