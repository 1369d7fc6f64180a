//! Line-delimited JSON seam to the detection and rendering collaborators.
//!
//! The detection collaborator writes one JSON object per line: a single
//! `gallery` message first, then one `frame` message per captured frame,
//! and optionally `stop` for a user-initiated quit. Decisions go back out
//! as one JSON line per frame for the rendering collaborator. End of input
//! is the camera-gone condition and ends the session; a malformed line is
//! logged and skipped, never fatal.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use crate::gallery::GalleryEntry;
use crate::pipeline::{DecisionSink, DetectedFace, FaceDecision, FaceStream};

/// Messages from the detection collaborator.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Enrollment embeddings, sent once before the first frame.
    Gallery { entries: Vec<GalleryEntry> },
    /// All faces detected in one captured frame.
    Frame { faces: Vec<DetectedFace> },
    /// User-initiated shutdown.
    Stop,
}

/// Messages to the rendering collaborator.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Decisions { faces: Vec<DecisionMessage> },
}

/// One face decision plus the ready-made label text the renderer draws.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionMessage {
    pub label: String,
    #[serde(flatten)]
    pub decision: FaceDecision,
}

/// Face feed over a line-oriented reader (stdin in production).
pub struct StdioSource<R> {
    input: R,
    line: String,
    pending: Option<Vec<DetectedFace>>,
    ended: bool,
}

impl<R: BufRead> StdioSource<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
            pending: None,
            ended: false,
        }
    }

    /// Read the gallery handshake. A stream that opens with a frame
    /// instead gets an empty gallery (every face will resolve to unknown)
    /// and that first frame is kept for the session.
    pub fn handshake(&mut self) -> Vec<GalleryEntry> {
        match self.next_message() {
            Some(InboundMessage::Gallery { entries }) => entries,
            Some(InboundMessage::Frame { faces }) => {
                tracing::warn!("stream opened without a gallery message");
                self.pending = Some(faces);
                Vec::new()
            }
            Some(InboundMessage::Stop) | None => {
                self.ended = true;
                Vec::new()
            }
        }
    }

    /// Next well-formed message; `None` at end of input or on a dead
    /// reader.
    fn next_message(&mut self) -> Option<InboundMessage> {
        loop {
            self.line.clear();
            match self.input.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "collaborator input failed");
                    return None;
                }
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(message) => return Some(message),
                Err(error) => {
                    tracing::warn!(%error, "skipping malformed collaborator message");
                }
            }
        }
    }
}

impl<R: BufRead> FaceStream for StdioSource<R> {
    fn next_faces(&mut self) -> Option<Vec<DetectedFace>> {
        if self.ended {
            return None;
        }
        if let Some(faces) = self.pending.take() {
            return Some(faces);
        }
        loop {
            match self.next_message() {
                Some(InboundMessage::Frame { faces }) => return Some(faces),
                Some(InboundMessage::Gallery { .. }) => {
                    tracing::warn!("ignoring gallery message after session start");
                }
                Some(InboundMessage::Stop) | None => {
                    self.ended = true;
                    return None;
                }
            }
        }
    }
}

/// Decision feed over a line-oriented writer (stdout in production).
pub struct StdioSink<W> {
    output: W,
}

impl<W: Write> StdioSink<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }
}

impl<W: Write> DecisionSink for StdioSink<W> {
    fn present(&mut self, decisions: &[FaceDecision]) -> ControlFlow<()> {
        let message = OutboundMessage::Decisions {
            faces: decisions
                .iter()
                .map(|decision| DecisionMessage {
                    label: decision.label(),
                    decision: decision.clone(),
                })
                .collect(),
        };
        let mut line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!(%error, "failed to serialize decisions");
                return ControlFlow::Continue(());
            }
        };
        line.push('\n');

        let written = self
            .output
            .write_all(line.as_bytes())
            .and_then(|_| self.output.flush());
        if let Err(error) = written {
            tracing::warn!(%error, "rendering collaborator went away");
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}
