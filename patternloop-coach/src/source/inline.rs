// patternloop-coach/src/source/inline.rs
// ============================================================================
// Module: Inline Frame Source
// Description: In-memory frame source for fixtures and unit tests.
// Purpose: Let tests drive the session loop from a literal event sequence
//          with no file or channel involved.
// Dependencies: crate::events
// ============================================================================

//! ## Overview
//! [`InlineSource`] wraps a `Vec<InboundEvent>` built directly by the
//! caller. It never fails: [`FrameSource::events`] simply clones the stored
//! sequence.

use crate::events::InboundEvent;
use crate::source::FrameSource;
use crate::source::SourceError;

/// In-memory frame source backed by a literal event sequence.
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    /// The events this source returns.
    events: Vec<InboundEvent>,
}

impl InlineSource {
    /// Creates an inline source from a literal event sequence.
    #[must_use]
    pub const fn new(events: Vec<InboundEvent>) -> Self {
        Self { events }
    }
}

impl FrameSource for InlineSource {
    fn events(&self) -> Result<Vec<InboundEvent>, SourceError> {
        Ok(self.events.clone())
    }
}
