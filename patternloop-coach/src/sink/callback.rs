// patternloop-coach/src/sink/callback.rs
// ============================================================================
// Module: Callback Intervention Sink
// Description: Callback-based sink for synchronous delivery.
// Purpose: Invoke a user-provided function with each fired intervention.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`CallbackSink`] is the embedding seam: a host process that already owns
//! its own client transport (a websocket handler, a test harness) supplies a
//! closure and the session loop calls it directly, with no channel or log
//! in between.

use std::sync::Arc;

use patternloop_core::CoachingIntervention;
use patternloop_core::SessionId;

use crate::sink::InterventionSink;
use crate::sink::SinkError;

/// Callback handler signature used by [`CallbackSink`].
type CallbackHandler = dyn Fn(&SessionId, &CoachingIntervention) -> Result<(), SinkError> + Send + Sync;

/// Callback-based intervention sink.
#[derive(Clone)]
pub struct CallbackSink {
    /// Handler invoked with the session id and fired intervention.
    handler: Arc<CallbackHandler>,
}

impl CallbackSink {
    /// Creates a callback sink from a handler function.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&SessionId, &CoachingIntervention) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        Self { handler: Arc::new(handler) }
    }
}

impl InterventionSink for CallbackSink {
    fn deliver(
        &self,
        session_id: &SessionId,
        intervention: &CoachingIntervention,
    ) -> Result<(), SinkError> {
        (self.handler)(session_id, intervention)
    }
}
