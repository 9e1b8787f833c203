//! Bounded per-session artifact tracking.
//!
//! A session holds at most a fixed number of artifacts. When the cap is
//! exceeded, the oldest **completed** artifact's state is evicted — never an
//! in-progress one, which may still receive content or recovery attention.

use salvage_types::{Artifact, SessionConfig};

#[derive(Debug)]
struct TrackedEntry {
    identifier: String,
    /// `None` while the block is still streaming.
    artifact: Option<Artifact>,
}

/// Insertion-ordered artifact registry with a fixed capacity.
#[derive(Debug)]
pub struct SessionTracker {
    cap: usize,
    entries: Vec<TrackedEntry>,
}

impl SessionTracker {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cap: config.max_tracked_artifacts,
            entries: Vec::new(),
        }
    }

    /// Begin tracking an in-progress block. Reopening a known identifier
    /// resets its entry — the newer block supersedes the older value.
    pub fn open(&mut self, identifier: &str) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.identifier == identifier)
        {
            entry.artifact = None;
            return;
        }
        self.entries.push(TrackedEntry {
            identifier: identifier.to_string(),
            artifact: None,
        });
        self.enforce_cap();
    }

    /// Record a completed artifact, superseding any prior value under the
    /// same identifier.
    pub fn complete(&mut self, artifact: Artifact) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.identifier == artifact.identifier)
        {
            Some(entry) => entry.artifact = Some(artifact),
            None => {
                self.entries.push(TrackedEntry {
                    identifier: artifact.identifier.clone(),
                    artifact: Some(artifact),
                });
                self.enforce_cap();
            }
        }
    }

    /// The current artifact for an identifier, if it has completed.
    pub fn get(&self, identifier: &str) -> Option<&Artifact> {
        self.entries
            .iter()
            .find(|e| e.identifier == identifier)
            .and_then(|e| e.artifact.as_ref())
    }

    /// `true` while the identifier is tracked but not yet completed.
    pub fn is_in_progress(&self, identifier: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.identifier == identifier && e.artifact.is_none())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked identifiers, oldest first.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.identifier.as_str())
    }

    fn enforce_cap(&mut self) {
        while self.entries.len() > self.cap {
            // Oldest completed entry goes first. If everything is still in
            // progress the tracker temporarily exceeds the cap rather than
            // discarding live state.
            match self.entries.iter().position(|e| e.artifact.is_some()) {
                Some(idx) => {
                    let evicted = self.entries.remove(idx);
                    tracing::debug!(identifier = %evicted.identifier, "evicted completed artifact at capacity");
                }
                None => break,
            }
        }
    }
}
