// patternloop-coach/src/sink/log.rs
// ============================================================================
// Module: Logging Intervention Sink
// Description: Log-only sink for audit-grade intervention records.
// Purpose: Persist a delivery record for every fired intervention without
//          requiring a live client transport.
// Dependencies: serde_json, std
// ============================================================================

//! ## Overview
//! [`LogSink`] writes one JSON line per intervention and never fails on the
//! intervention's behalf based on transport state; it only fails if the
//! underlying writer does.

use std::io::Write;
use std::sync::Mutex;

use patternloop_core::CoachingIntervention;
use patternloop_core::SessionId;
use serde_json::json;

use crate::sink::InterventionSink;
use crate::sink::SinkError;

/// Log-only intervention sink.
pub struct LogSink<W: Write + Send> {
    /// Output writer for log records.
    writer: Mutex<W>,
}

impl<W: Write + Send> LogSink<W> {
    /// Creates a log sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

impl<W: Write + Send> InterventionSink for LogSink<W> {
    fn deliver(
        &self,
        session_id: &SessionId,
        intervention: &CoachingIntervention,
    ) -> Result<(), SinkError> {
        let record = json!({
            "session_id": session_id.as_str(),
            "rule_id": intervention.rule_id,
            "confidence": intervention.confidence,
            "elapsed_ms": intervention.elapsed_ms,
            "message": intervention.message,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SinkError::LogWriteFailed("log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        drop(guard);
        Ok(())
    }
}
