//! Detection event system for observability.
//!
//! Emits [`DetectionEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! external observers (the preview panel, loggers, etc.) can follow artifact
//! detection progress without coupling to the scanner internals.

use serde::{Deserialize, Serialize};

use salvage_types::{Artifact, ArtifactKind};

/// Events emitted while a message stream is scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectionEvent {
    /// A block's open tag was recognized — enough data to show a placeholder
    /// before the body completes.
    ArtifactOpened {
        identifier: String,
        kind: Option<ArtifactKind>,
        title: String,
    },
    /// A file section grew. `content` is the content accumulated so far,
    /// which is what an optimistic preview renders.
    ArtifactProgress {
        identifier: String,
        path: String,
        content: String,
    },
    /// A block closed and validated into an immutable [`Artifact`].
    ArtifactClosed { artifact: Artifact },
    /// A block closed but failed validation. Diagnostic only — the stream
    /// continues.
    ArtifactMalformed {
        identifier: String,
        reasons: Vec<String>,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct DetectionEmitter {
    sender: tokio::sync::broadcast::Sender<DetectionEvent>,
}

impl DetectionEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: DetectionEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DetectionEvent> {
        self.sender.subscribe()
    }
}

impl Default for DetectionEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
