// patternloop-coach/src/events.rs
// ============================================================================
// Module: Session Input Events
// Description: The frame/audio measurements a client streams into a live
//              coaching session, plus the event envelope the session loop
//              consumes.
// Purpose: Give the session loop and its rule evaluator a shared,
//          transport-agnostic vocabulary for inbound session data.
// Dependencies: patternloop_core::SessionId, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! Clients stream measurements rather than raw media: a vision pipeline
//! upstream of this crate reduces each video frame to named numeric
//! measurements (e.g. `"face_area_ratio"`, `"crop_margin_px"`) that a
//! [`crate::evaluator::RuleEvaluator`] checks against a `DnaInvariant`. Audio
//! chunks are reduced the same way (e.g. `"hook_word_count"`,
//! `"silence_ratio"`). `BTreeMap` keeps measurement iteration order
//! deterministic, which matters for reproducible evaluator traces.

use std::collections::BTreeMap;

use patternloop_core::SessionId;

/// A single reduced video frame streamed into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    /// The session this frame belongs to.
    pub session_id: SessionId,
    /// Milliseconds elapsed since session start.
    pub elapsed_ms: u64,
    /// Monotonically increasing frame index within the session.
    pub frame_index: u64,
    /// Named numeric measurements extracted from this frame.
    pub measurements: BTreeMap<String, f64>,
}

/// A single reduced audio chunk streamed into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// The session this chunk belongs to.
    pub session_id: SessionId,
    /// Milliseconds elapsed since session start.
    pub elapsed_ms: u64,
    /// Named numeric measurements extracted from this chunk.
    pub measurements: BTreeMap<String, f64>,
}

/// A single inbound item the session loop selects over.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A reduced video frame.
    Frame(FrameSample),
    /// A reduced audio chunk.
    Audio(AudioChunk),
    /// The client ended the session before it finished naturally.
    Cancel,
}
