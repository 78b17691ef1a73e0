// patternloop-coach/src/lib.rs
// ============================================================================
// Module: PatternLoop Real-Time Coaching Controller
// Description: The per-session cooperative loop that consumes streamed
//              frame/audio measurements, evaluates DirectorPack invariants,
//              and delivers cooled-down interventions (§4.7).
// Purpose: Own the runtime side of coaching: session bucketing and domain
//          shapes live in patternloop-core; this crate owns the live loop,
//          its rule-evaluation seam, and its delivery sinks.
// Dependencies: patternloop-core, tokio
// ============================================================================

//! ## Overview
//! `patternloop-coach` wires a [`source::FrameSource`] or live channel, a
//! [`evaluator::RuleEvaluator`], and a [`sink::InterventionSink`] into one
//! [`session::SessionLoop`] per live session. It has no knowledge of how a
//! session's frames are actually captured or how coach lines reach a
//! client — those are supplied by the host process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod evaluator;
pub mod events;
pub mod session;
pub mod sink;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use evaluator::EvaluatorError;
pub use evaluator::RuleCompliance;
pub use evaluator::RuleEvaluator;
pub use evaluator::ThresholdEvaluator;
pub use events::AudioChunk;
pub use events::FrameSample;
pub use events::InboundEvent;
pub use session::SessionConfig;
pub use session::SessionLoop;
pub use session::SessionSummary;
pub use sink::CallbackSink;
pub use sink::ChannelSink;
pub use sink::CoachMessage;
pub use sink::InterventionSink;
pub use sink::LogSink;
pub use sink::SinkError;
pub use source::FileSource;
pub use source::FrameSource;
pub use source::InlineSource;
pub use source::SourceError;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}
