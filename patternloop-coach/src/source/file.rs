// patternloop-coach/src/source/file.rs
// ============================================================================
// Module: File Frame Source
// Description: Reads a recorded session as newline-delimited JSON events.
// Purpose: Let replay tooling and integration tests drive the session loop
//          from a captured recording rather than a live stream.
// Dependencies: std, serde_json
// ============================================================================

//! ## Overview
//! [`FileSource`] reads one JSON object per line, each shaped like
//! `{"kind": "frame", "elapsed_ms": 1200, "frame_index": 3, "measurements": {...}}`,
//! `{"kind": "audio", "elapsed_ms": 1200, "measurements": {...}}`, or
//! `{"kind": "cancel"}`, and parses them into [`InboundEvent`]s for a single
//! session id supplied at construction time. Size posture: the whole file is
//! read into memory, matching the bounded size of a captured recording; it
//! is not meant for open-ended live streams.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use patternloop_core::SessionId;
use serde::Deserialize;

use crate::events::AudioChunk;
use crate::events::FrameSample;
use crate::events::InboundEvent;
use crate::source::FrameSource;
use crate::source::SourceError;

/// One line of a recorded session file.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RecordedEvent {
    /// A recorded frame.
    Frame {
        /// Milliseconds elapsed since session start.
        elapsed_ms: u64,
        /// Frame index within the session.
        frame_index: u64,
        /// Named measurements.
        measurements: BTreeMap<String, f64>,
    },
    /// A recorded audio chunk.
    Audio {
        /// Milliseconds elapsed since session start.
        elapsed_ms: u64,
        /// Named measurements.
        measurements: BTreeMap<String, f64>,
    },
    /// A recorded cancellation.
    Cancel,
}

/// File-backed frame source reading newline-delimited JSON event records.
#[derive(Debug, Clone)]
pub struct FileSource {
    /// Path to the recording.
    path: PathBuf,
    /// The session these events are attributed to.
    session_id: SessionId,
}

impl FileSource {
    /// Creates a file source reading `path`, attributing every event to `session_id`.
    pub fn new(path: impl AsRef<Path>, session_id: SessionId) -> Self {
        Self { path: path.as_ref().to_path_buf(), session_id }
    }
}

impl FrameSource for FileSource {
    fn events(&self) -> Result<Vec<InboundEvent>, SourceError> {
        let contents =
            fs::read_to_string(&self.path).map_err(|err| SourceError::Io(err.to_string()))?;
        let mut events = Vec::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let recorded: RecordedEvent = serde_json::from_str(trimmed)
                .map_err(|err| SourceError::Decode(err.to_string()))?;
            events.push(match recorded {
                RecordedEvent::Frame { elapsed_ms, frame_index, measurements } => {
                    InboundEvent::Frame(FrameSample {
                        session_id: self.session_id.clone(),
                        elapsed_ms,
                        frame_index,
                        measurements,
                    })
                }
                RecordedEvent::Audio { elapsed_ms, measurements } => {
                    InboundEvent::Audio(AudioChunk {
                        session_id: self.session_id.clone(),
                        elapsed_ms,
                        measurements,
                    })
                }
                RecordedEvent::Cancel => InboundEvent::Cancel,
            });
        }
        Ok(events)
    }
}
