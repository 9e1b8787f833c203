//! Shared types, errors, and configuration for the Salvage artifact pipeline.
//!
//! This crate provides the foundational types used across the other Salvage crates:
//! - `SalvageError` — unified error taxonomy
//! - `Artifact` — an immutable, fully-assembled artifact block
//! - `RecoveryRequest` / `RecoveryResult` — the recovery pipeline's input and verdict
//! - `RecoveryConfig` / `SessionConfig` — tunable knobs with reference defaults

use serde::{Deserialize, Serialize};

/// Marker recorded as the winning "strategy" when the AI-assisted repair
/// stage produced the accepted payload.
pub const AI_REPAIR_STRATEGY: &str = "ai_repair";

/// Unified error type for all Salvage subsystems.
#[derive(Debug, thiserror::Error)]
pub enum SalvageError {
    // === Scanner / tag grammar errors ===
    #[error("Tag parse error at line {line}, col {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
        source_snippet: Option<String>,
    },

    // === Detection errors ===
    #[error("Artifact '{identifier}' failed validation: {}", .reasons.join(", "))]
    MalformedArtifact {
        identifier: String,
        reasons: Vec<String>,
    },

    // === Recovery errors ===
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    #[error("Recovery exhausted for artifact '{identifier}' after {attempts} attempts")]
    RecoveryExhausted { identifier: String, attempts: usize },

    #[error("Recovery disabled for artifact '{identifier}', retry in {retry_in_ms}ms")]
    BreakerOpen {
        identifier: String,
        retry_in_ms: u64,
    },

    // === Oracle errors ===
    #[error("Oracle '{oracle}' timed out after {timeout_ms}ms")]
    OracleTimeout { oracle: String, timeout_ms: u64 },

    #[error("Oracle '{oracle}' error: {message}")]
    OracleFault { oracle: String, message: String },

    // === Generic ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SalvageError {
    /// Returns `true` if recovery was categorically refused by the breaker,
    /// as opposed to attempted and exhausted. The UI messages these
    /// differently ("disabled", not "failed").
    pub fn is_breaker_open(&self) -> bool {
        matches!(self, SalvageError::BreakerOpen { .. })
    }

    /// Returns `true` if the error is local to one strategy or oracle call
    /// and the recovery chain may continue past it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SalvageError::StrategyFailed { .. }
                | SalvageError::OracleTimeout { .. }
                | SalvageError::OracleFault { .. }
        )
    }
}

/// A convenience alias for `Result<T, SalvageError>`.
pub type Result<T> = std::result::Result<T, SalvageError>;

// ---------------------------------------------------------------------------
// Artifact — immutable once assembled
// ---------------------------------------------------------------------------

/// Content category of an artifact block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Component,
    Markup,
    Styling,
    Data,
    Diagram,
    Other(String),
}

impl ArtifactKind {
    /// Parse a `kind` attribute value. Unknown values are preserved as
    /// [`ArtifactKind::Other`] rather than rejected.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "component" => ArtifactKind::Component,
            "markup" => ArtifactKind::Markup,
            "styling" => ArtifactKind::Styling,
            "data" => ArtifactKind::Data,
            "diagram" => ArtifactKind::Diagram,
            other => ArtifactKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ArtifactKind::Component => "component",
            ArtifactKind::Markup => "markup",
            ArtifactKind::Styling => "styling",
            ArtifactKind::Data => "data",
            ArtifactKind::Diagram => "diagram",
            ArtifactKind::Other(s) => s,
        }
    }
}

/// One `(path, content)` payload file of an artifact, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

/// A declared external dependency, e.g. `recharts@2.12`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
}

impl Dependency {
    /// Parse a comma-separated `name@version` list. The version segment is
    /// optional; empty entries are skipped.
    pub fn parse_list(s: &str) -> Vec<Dependency> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.rsplit_once('@') {
                Some((name, version)) if !name.is_empty() && !version.is_empty() => Dependency {
                    name: name.to_string(),
                    version: Some(version.to_string()),
                },
                _ => Dependency {
                    name: part.to_string(),
                    version: None,
                },
            })
            .collect()
    }
}

/// How an artifact was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactOrigin {
    /// A well-formed block with open/close markers.
    Block,
    /// A bare fenced code section recognized by the best-effort fallback
    /// detector. Lower confidence; still previewable.
    BareFence,
}

/// An immutable, fully-assembled artifact.
///
/// Created exactly once per observed closing boundary. A corrected payload
/// produced by recovery becomes a *new* `Artifact` value associated with the
/// same identifier — never an in-place edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub identifier: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub description: Option<String>,
    pub files: Vec<FileEntry>,
    pub dependencies: Vec<Dependency>,
    pub origin: ArtifactOrigin,
    pub confidence: f32,
}

impl Artifact {
    /// The first payload file — the one a preview renders.
    pub fn primary_file(&self) -> Option<&FileEntry> {
        self.files.first()
    }

    /// Replace the primary file's content with a corrected payload,
    /// producing a new `Artifact` under the same identifier.
    pub fn with_corrected_payload(&self, payload: impl Into<String>) -> Artifact {
        let mut next = self.clone();
        if let Some(entry) = next.files.first_mut() {
            entry.content = payload.into();
        }
        next
    }
}

// ---------------------------------------------------------------------------
// RecoveryRequest — input to the recovery pipeline
// ---------------------------------------------------------------------------

/// One failure event reported by the rendering host. Ephemeral — constructed
/// per failure, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequest {
    /// Artifact identity the failing payload belongs to.
    pub identifier: String,
    /// The payload that failed to execute.
    pub payload: String,
    /// Raw error text from the rendering host.
    pub error_text: String,
    /// Surrounding transcript text that may contain correction material
    /// (a styling block or data block referenced but not bundled).
    pub context: String,
}

impl RecoveryRequest {
    pub fn new(
        identifier: impl Into<String>,
        payload: impl Into<String>,
        error_text: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            payload: payload.into(),
            error_text: error_text.into(),
            context: context.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryResult — the verdict returned to the rendering host
// ---------------------------------------------------------------------------

/// One attempted strategy, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub strategy: String,
    pub passed: bool,
    pub reason: String,
}

/// Breaker phase reported alongside a verdict so the UI can distinguish
/// "auto-repair temporarily disabled" from "repair failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerFlag {
    Closed,
    HalfOpen,
    Open,
}

/// The outcome of one recovery run.
///
/// Invariant: `success` implies `payload` is present and `confidence` met the
/// configured acceptance threshold; failure implies `payload` is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    /// Winning strategy name, or [`AI_REPAIR_STRATEGY`] for the repair stage.
    pub strategy: Option<String>,
    pub confidence: f32,
    pub payload: Option<String>,
    /// Every evaluated strategy, in order, with pass/fail and reason.
    pub attempts: Vec<AttemptRecord>,
    pub elapsed_ms: u64,
    pub breaker: BreakerFlag,
}

impl RecoveryResult {
    /// A successful verdict carrying the corrected payload.
    pub fn succeeded(
        strategy: impl Into<String>,
        confidence: f32,
        payload: impl Into<String>,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            success: true,
            strategy: Some(strategy.into()),
            confidence,
            payload: Some(payload.into()),
            attempts,
            elapsed_ms: 0,
            breaker: BreakerFlag::Closed,
        }
    }

    /// An exhausted verdict: every strategy and the repair stage failed.
    pub fn failed(attempts: Vec<AttemptRecord>) -> Self {
        Self {
            success: false,
            strategy: None,
            confidence: 0.0,
            payload: None,
            attempts,
            elapsed_ms: 0,
            breaker: BreakerFlag::Closed,
        }
    }

    /// A disabled verdict: the breaker refused to run recovery at all.
    /// Carries zero attempts.
    pub fn disabled() -> Self {
        Self {
            success: false,
            strategy: None,
            confidence: 0.0,
            payload: None,
            attempts: Vec::new(),
            elapsed_ms: 0,
            breaker: BreakerFlag::Open,
        }
    }

    /// Human-readable `strategy → outcome` lines suitable for direct display.
    pub fn summary(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|a| {
                if a.passed {
                    format!("{} → succeeded", a.strategy)
                } else {
                    format!("{} → failed ({})", a.strategy, a.reason)
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable knobs for the recovery pipeline. The defaults match the reference
/// behavior; the thresholds are product decisions, not structural constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryConfig {
    /// Minimum confidence for a strategy or repair result to be accepted.
    pub accept_threshold: f32,
    /// Consecutive failures per identity before the breaker opens.
    pub failure_threshold: u32,
    /// Cooldown before an open breaker permits a probe (milliseconds).
    pub reset_timeout_ms: u64,
    /// Upper bound on the doubling cooldown (milliseconds).
    pub reset_timeout_cap_ms: u64,
    /// Budget for a single oracle call (milliseconds).
    pub attempt_timeout_ms: u64,
    /// Hard wall-clock budget for one whole recovery run (milliseconds).
    pub total_budget_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 0.7,
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            reset_timeout_cap_ms: 240_000,
            attempt_timeout_ms: 10_000,
            total_budget_ms: 30_000,
        }
    }
}

/// Per-session detection limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Upper bound on concurrently tracked artifacts. Exceeding it evicts the
    /// oldest completed artifact's state, never an in-progress one.
    pub max_tracked_artifacts: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tracked_artifacts: 10,
        }
    }
}
