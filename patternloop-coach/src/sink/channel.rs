// patternloop-coach/src/sink/channel.rs
// ============================================================================
// Module: Channel Intervention Sink
// Description: Channel-based sink for asynchronous delivery to a client
//              transport owned by another task.
// Purpose: Hand off a fired intervention to a tokio mpsc receiver.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! [`ChannelSink`] delivers interventions by sending a [`CoachMessage`] into
//! a `tokio::sync::mpsc` channel. Delivery is non-blocking: a full or closed
//! channel surfaces as [`SinkError::DeliveryFailed`] rather than stalling
//! the session loop.

use tokio::sync::mpsc::Sender;

use patternloop_core::CoachingIntervention;
use patternloop_core::SessionId;

use crate::sink::CoachMessage;
use crate::sink::InterventionSink;
use crate::sink::SinkError;

/// Channel-based intervention sink.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    /// Sender used to hand off rendered coach messages.
    sender: Sender<CoachMessage>,
}

impl ChannelSink {
    /// Creates a channel sink that sends into `sender`.
    #[must_use]
    pub fn new(sender: Sender<CoachMessage>) -> Self {
        Self { sender }
    }
}

impl InterventionSink for ChannelSink {
    fn deliver(
        &self,
        session_id: &SessionId,
        intervention: &CoachingIntervention,
    ) -> Result<(), SinkError> {
        let message = CoachMessage { session_id: session_id.clone(), intervention: intervention.clone() };
        self.sender.try_send(message).map_err(|err| SinkError::DeliveryFailed(err.to_string()))
    }
}
