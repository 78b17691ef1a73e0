// patternloop-coach/src/source/mod.rs
// ============================================================================
// Module: Session Frame Sources
// Description: Inbound-event producers for a live coaching session.
// Purpose: Let the session loop consume frame/audio events from a variety
//          of inputs (a recorded file, an inline fixture) behind one trait,
//          so tests and replay tooling can drive the loop without a live
//          client.
// Dependencies: patternloop_core::SessionId, crate::events, serde_json
// ============================================================================

//! ## Overview
//! [`FrameSource`] is the inbound counterpart to
//! [`crate::sink::InterventionSink`]: it hands the session loop a sequence
//! of [`crate::events::InboundEvent`]s. Production deployments feed the loop
//! from a live stream through a `tokio::mpsc::Sender` directly and have no
//! need for a `FrameSource`; it exists for replay, fixtures, and tests,
//! where the input is already fully formed before the session starts.

pub mod file;
pub mod inline;

pub use file::FileSource;
pub use inline::InlineSource;

use thiserror::Error;

use crate::events::InboundEvent;

/// Errors a [`FrameSource`] can surface while producing events.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying input could not be read.
    #[error("source io error: {0}")]
    Io(String),
    /// An event record could not be decoded.
    #[error("source decode error: {0}")]
    Decode(String),
}

/// Produces the ordered sequence of inbound events for one session.
pub trait FrameSource {
    /// Returns the full ordered event sequence.
    ///
    /// # Errors
    /// Returns [`SourceError`] when the input cannot be read or decoded.
    fn events(&self) -> Result<Vec<InboundEvent>, SourceError>;
}
