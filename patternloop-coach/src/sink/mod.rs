// patternloop-coach/src/sink/mod.rs
// ============================================================================
// Module: Intervention Delivery Sinks
// Description: The outbound side of a coaching session — delivering a fired
//              CoachingIntervention to whatever is showing the client a
//              live coach line.
// Purpose: Decouple the session loop from the transport a given deployment
//          uses to reach the client (log, channel, callback).
// Dependencies: patternloop_core::{CoachingIntervention, SessionId}
// ============================================================================

//! ## Overview
//! A session loop never talks to a client transport directly. It calls
//! [`InterventionSink::deliver`] once per fired intervention; the sink
//! decides how (or whether) that reaches the outside world. Three
//! implementations are provided: [`log::LogSink`] for audit trails,
//! [`channel::ChannelSink`] for an async consumer on the other end of a
//! `tokio::mpsc` channel, and [`callback::CallbackSink`] for embedding the
//! controller in a process that already owns its own client transport.

pub mod callback;
pub mod channel;
pub mod log;

pub use callback::CallbackSink;
pub use channel::ChannelSink;
pub use log::LogSink;

use patternloop_core::CoachingIntervention;
use patternloop_core::SessionId;
use thiserror::Error;

/// Errors a sink can surface when delivery fails.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The delivery channel is closed or full past its backlog limit.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// Writing an audit record failed.
    #[error("log write failed: {0}")]
    LogWriteFailed(String),
}

/// A rendered coach line ready for delivery to a session's client.
#[derive(Debug, Clone)]
pub struct CoachMessage {
    /// The session this message belongs to.
    pub session_id: SessionId,
    /// The intervention being delivered.
    pub intervention: CoachingIntervention,
}

/// Delivers a fired intervention to a session's client.
pub trait InterventionSink: Send + Sync {
    /// Delivers `intervention` for `session_id`.
    ///
    /// # Errors
    /// Returns [`SinkError`] when delivery could not be completed.
    fn deliver(
        &self,
        session_id: &SessionId,
        intervention: &CoachingIntervention,
    ) -> Result<(), SinkError>;
}

impl<T: InterventionSink + ?Sized> InterventionSink for std::sync::Arc<T> {
    fn deliver(
        &self,
        session_id: &SessionId,
        intervention: &CoachingIntervention,
    ) -> Result<(), SinkError> {
        (**self).deliver(session_id, intervention)
    }
}
