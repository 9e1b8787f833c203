//! Collaborator-supplied oracle boundaries.
//!
//! The core never bundles or executes payloads itself and never talks to a
//! model. Both capabilities arrive as opaque async traits: the sandboxed host
//! reports whether a payload runs, and the repair service proposes a
//! confidence-scored correction. The core inspects only the outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use salvage_types::Result;

/// Outcome of one sandboxed render attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderVerdict {
    pub ok: bool,
    pub error_text: Option<String>,
}

impl RenderVerdict {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error_text: None,
        }
    }

    pub fn failed(error_text: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_text: Some(error_text.into()),
        }
    }
}

/// The sandboxed rendering host, as a pass/fail black box.
#[async_trait]
pub trait ExecutionOracle: Send + Sync {
    async fn attempt_render(&self, payload: &str) -> Result<RenderVerdict>;
}

/// A proposed correction from the AI-assisted repair service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairProposal {
    pub success: bool,
    pub payload: Option<String>,
    pub confidence: f32,
    pub explanation: String,
}

/// The AI-assisted repair service. Rate and result limiting are the
/// collaborator's concern, not this core's.
#[async_trait]
pub trait RepairOracle: Send + Sync {
    async fn request_fix(
        &self,
        payload: &str,
        error_text: &str,
        context: &str,
    ) -> Result<RepairProposal>;
}
