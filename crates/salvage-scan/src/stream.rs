//! Detection driver: scanner + assembler + tracker behind one surface.
//!
//! [`ArtifactDetector`] is the synchronous facade collaborators feed chunks
//! into; [`run_detection`] drives a whole chunk [`Stream`] through it, which
//! is how a completion transport connects without the core fetching anything
//! itself.

use futures_core::Stream;
use tokio_stream::StreamExt;

use salvage_types::{Artifact, SessionConfig};

use crate::assembler::ArtifactAssembler;
use crate::events::{DetectionEvent, DetectionEmitter};
use crate::scanner::StreamScanner;
use crate::session::SessionTracker;

/// One detection pipeline for one session.
pub struct ArtifactDetector {
    scanner: StreamScanner,
    assembler: ArtifactAssembler,
    tracker: SessionTracker,
}

impl ArtifactDetector {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            scanner: StreamScanner::new(),
            assembler: ArtifactAssembler::new(),
            tracker: SessionTracker::new(config),
        }
    }

    /// Must be called before streaming a new message. Guarantees no scan
    /// state bleeds across conversational turns; tracked artifacts persist
    /// for the session.
    pub fn reset(&mut self, message_id: impl Into<String>) {
        self.scanner.reset();
        self.assembler.reset(message_id);
    }

    /// Feed the next chunk; returns the detection events it produced.
    pub fn feed(&mut self, chunk: &str) -> Vec<DetectionEvent> {
        let mut out = Vec::new();
        for ev in self.scanner.feed(chunk) {
            out.extend(self.assembler.observe(&ev));
        }
        self.track(&out);
        out
    }

    /// The message stream is complete.
    pub fn finish(&mut self) -> Vec<DetectionEvent> {
        let mut out = Vec::new();
        for ev in self.scanner.finish() {
            out.extend(self.assembler.observe(&ev));
        }
        out.extend(self.assembler.finish());
        self.track(&out);
        out
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    fn track(&mut self, events: &[DetectionEvent]) {
        for event in events {
            match event {
                DetectionEvent::ArtifactOpened { identifier, .. } => {
                    if !identifier.is_empty() {
                        self.tracker.open(identifier);
                    }
                }
                DetectionEvent::ArtifactClosed { artifact } => {
                    self.tracker.complete(artifact.clone());
                }
                _ => {}
            }
        }
    }
}

/// Drive one message's chunk stream through a detector, forwarding every
/// event to `emitter`. Returns the completed artifacts in stream order.
pub async fn run_detection<S>(
    detector: &mut ArtifactDetector,
    message_id: &str,
    mut chunks: S,
    emitter: &DetectionEmitter,
) -> Vec<Artifact>
where
    S: Stream<Item = String> + Unpin,
{
    detector.reset(message_id);
    let mut artifacts = Vec::new();

    while let Some(chunk) = chunks.next().await {
        for event in detector.feed(&chunk) {
            if let DetectionEvent::ArtifactClosed { artifact } = &event {
                artifacts.push(artifact.clone());
            }
            emitter.emit(event);
        }
    }
    for event in detector.finish() {
        if let DetectionEvent::ArtifactClosed { artifact } = &event {
            artifacts.push(artifact.clone());
        }
        emitter.emit(event);
    }

    tracing::debug!(message = %message_id, count = artifacts.len(), "message detection complete");
    artifacts
}
