//! End-to-end recovery tests: detect an artifact from a chunked stream, fail
//! it in a mock rendering host, and drive the full recovery pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use salvage_recovery::{
    CircuitBreaker, ExecutionOracle, RecoveryOrchestrator, RenderVerdict, RepairOracle,
    RepairProposal, StrategyExecutor, SystemClock,
};
use salvage_scan::{ArtifactDetector, DetectionEvent};
use salvage_types::{
    Artifact, BreakerFlag, RecoveryConfig, RecoveryRequest, SessionConfig, AI_REPAIR_STRATEGY,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A sandbox stand-in: payloads that still reference an unresolvable module
/// import fail; everything else renders.
struct ModuleAwareHost;

#[async_trait]
impl ExecutionOracle for ModuleAwareHost {
    async fn attempt_render(&self, payload: &str) -> salvage_types::Result<RenderVerdict> {
        if payload.contains(".module.css\"") || payload.contains(".module.css'") {
            Ok(RenderVerdict::failed(
                "Error: Cannot resolve './Card.module.css'",
            ))
        } else {
            Ok(RenderVerdict::ok())
        }
    }
}

struct CountingRepair {
    calls: Arc<AtomicUsize>,
    proposal: RepairProposal,
}

#[async_trait]
impl RepairOracle for CountingRepair {
    async fn request_fix(
        &self,
        _payload: &str,
        _error_text: &str,
        _context: &str,
    ) -> salvage_types::Result<RepairProposal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.proposal.clone())
    }
}

fn detect(transcript: &str, chunk_size: usize) -> Vec<Artifact> {
    let mut detector = ArtifactDetector::new(&SessionConfig::default());
    detector.reset("msg");
    let mut artifacts = Vec::new();
    let chars: Vec<char> = transcript.chars().collect();
    for chunk in chars.chunks(chunk_size) {
        let s: String = chunk.iter().collect();
        for event in detector.feed(&s) {
            if let DetectionEvent::ArtifactClosed { artifact } = event {
                artifacts.push(artifact);
            }
        }
    }
    for event in detector.finish() {
        if let DetectionEvent::ArtifactClosed { artifact } = event {
            artifacts.push(artifact);
        }
    }
    artifacts
}

fn orchestrator_with_host(config: RecoveryConfig) -> RecoveryOrchestrator {
    let breaker = CircuitBreaker::with_clock(&config, Arc::new(SystemClock));
    let executor =
        StrategyExecutor::with_default_chain(config).with_render_oracle(Arc::new(ModuleAwareHost));
    RecoveryOrchestrator::new(executor, breaker)
}

// ---------------------------------------------------------------------------
// Scenario 1: detect, fail in the host, repair via styling-module conversion
// ---------------------------------------------------------------------------

const TRANSCRIPT: &str = concat!(
    "Here you go:\n",
    "<artifact identifier=\"card\" kind=\"component\" title=\"Card\">\n",
    "<file path=\"Card.jsx\">import styles from \"./Card.module.css\";\n",
    "export default function Card() {\n",
    "  return <div className={styles.card}>hello</div>;\n",
    "}\n",
    "</file>\n",
    "<file path=\"Card.module.css\">.card { background-color: blue; }\n",
    "</file>\n",
    "</artifact>\n"
);

#[tokio::test]
async fn detected_artifact_recovers_via_css_modules() {
    init_tracing();
    // Detect from an awkwardly chunked stream.
    let artifacts = detect(TRANSCRIPT, 5);
    assert_eq!(artifacts.len(), 1);
    let artifact = &artifacts[0];
    let payload = artifact.files[0].content.clone();

    // The sandboxed host rejects the payload.
    let host = ModuleAwareHost;
    let verdict = host.attempt_render(&payload).await.unwrap();
    assert!(!verdict.ok);

    // Recovery: the styling block travels in the request context, exactly as
    // the surrounding transcript would.
    let request = RecoveryRequest::new(
        artifact.identifier.clone(),
        payload,
        verdict.error_text.unwrap(),
        artifact.files[1].content.clone(),
    );
    let orch = orchestrator_with_host(RecoveryConfig::default());
    let result = orch.recover(&request).await;

    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("css_modules"));
    assert!(result.confidence >= 0.7);
    assert_eq!(result.breaker, BreakerFlag::Closed);

    // The sole attempted-and-succeeded entry.
    assert_eq!(result.attempts.len(), 1);
    assert!(result.attempts[0].passed);
    assert_eq!(result.attempts[0].strategy, "css_modules");

    // The corrected payload carries the inline lookup and renders now.
    let fixed = result.payload.unwrap();
    assert!(fixed.contains("card: { backgroundColor: 'blue' }"));
    assert!(!fixed.contains(".module.css"));
    assert!(host.attempt_render(&fixed).await.unwrap().ok);

    // A corrected payload becomes a new Artifact under the same identifier.
    let corrected = artifact.with_corrected_payload(fixed);
    assert_eq!(corrected.identifier, artifact.identifier);
    assert_ne!(corrected.files[0].content, artifact.files[0].content);
}

// ---------------------------------------------------------------------------
// Scenario 2: strict priority order, then AI repair
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exhaustion_walks_priorities_before_ai_repair() {
    // No imports, no styling or data blocks anywhere: every strategy is
    // either inapplicable or has nothing to remove.
    let request = RecoveryRequest::new(
        "stubborn",
        "export default function Stubborn() { return <p className=\"x\">hi</p>; }",
        "render exploded with no useful details",
        "just conversational text, nothing extractable",
    );

    let repair_calls = Arc::new(AtomicUsize::new(0));
    let config = RecoveryConfig::default();
    let executor = StrategyExecutor::with_default_chain(config.clone())
        .with_repair_oracle(Arc::new(CountingRepair {
            calls: repair_calls.clone(),
            proposal: RepairProposal {
                success: true,
                payload: Some(
                    "export default function Stubborn() { return <p>hi</p>; }".to_string(),
                ),
                confidence: 0.85,
                explanation: "dropped the broken class reference".into(),
            },
        }));
    let orch = RecoveryOrchestrator::new(executor, CircuitBreaker::new(&config));

    let result = orch.recover(&request).await;

    // All four strategies were evaluated in strict priority order first.
    let order: Vec<&str> = result
        .attempts
        .iter()
        .map(|a| a.strategy.as_str())
        .collect();
    assert_eq!(
        order,
        vec![
            "css_modules",
            "style_injection",
            "data_inlining",
            "import_removal",
            AI_REPAIR_STRATEGY,
        ]
    );
    assert_eq!(repair_calls.load(Ordering::SeqCst), 1);
    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some(AI_REPAIR_STRATEGY));

    // Human-readable summary lines for direct display.
    let summary = result.summary();
    assert_eq!(summary.len(), 5);
    assert!(summary[0].starts_with("css_modules → failed"));
    assert!(summary[4].starts_with("ai_repair → succeeded"));
}

// ---------------------------------------------------------------------------
// Scenario 3: the fallback removes the import, rest byte-for-byte unchanged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fallback_removes_import_and_preserves_rest() {
    let rest = concat!(
        "export default function Report() {\n",
        "  const value = compute();\n",
        "  return <b>{value}</b>;\n",
        "}\n"
    );
    let payload = format!("import {{ compute }} from \"./analytics-util\";\n{rest}");
    let request = RecoveryRequest::new(
        "report",
        payload,
        "Error: Cannot find module './analytics-util'",
        "no styling, no data, nothing to mine",
    );

    let config = RecoveryConfig::default();
    let orch = RecoveryOrchestrator::new(
        StrategyExecutor::with_default_chain(config.clone()),
        CircuitBreaker::new(&config),
    );
    let result = orch.recover(&request).await;

    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("import_removal"));
    // Everything but the import survives byte-for-byte.
    assert_eq!(result.payload.unwrap(), rest);

    // The higher-priority strategies were all evaluated and inapplicable.
    let order: Vec<&str> = result
        .attempts
        .iter()
        .map(|a| a.strategy.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["css_modules", "style_injection", "data_inlining", "import_removal"]
    );
    assert!(result.attempts[3].passed);
}

// ---------------------------------------------------------------------------
// Scenario 4: data inlining wins when the context carries JSON
// ---------------------------------------------------------------------------

#[tokio::test]
async fn data_import_inlines_from_context() {
    let request = RecoveryRequest::new(
        "plot",
        "import data from \"./series.json\";\nexport default () => <i>{data.points.length}</i>;\n",
        "Cannot resolve './series.json'",
        "The series data:\n```json\n{\"points\": [3, 1, 4, 1, 5]}\n```",
    );

    let config = RecoveryConfig::default();
    let orch = RecoveryOrchestrator::new(
        StrategyExecutor::with_default_chain(config.clone()),
        CircuitBreaker::new(&config),
    );
    let result = orch.recover(&request).await;

    assert!(result.success);
    assert_eq!(result.strategy.as_deref(), Some("data_inlining"));
    let fixed = result.payload.unwrap();
    assert!(fixed.starts_with("const data = {"));
    assert!(!fixed.contains("series.json"));
}

// ---------------------------------------------------------------------------
// Scenario 5: repeated failure trips the breaker; the verdict says disabled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_failures_disable_recovery_distinctly() {
    init_tracing();
    // Nothing recoverable and no repair oracle: every attempt fails.
    let request = RecoveryRequest::new(
        "doomed",
        "completely opaque payload with no imports",
        "inscrutable failure",
        "",
    );
    let config = RecoveryConfig {
        failure_threshold: 3,
        ..RecoveryConfig::default()
    };
    let orch = RecoveryOrchestrator::new(
        StrategyExecutor::with_default_chain(config.clone()),
        CircuitBreaker::new(&config),
    );

    for i in 0..3 {
        let result = orch.recover(&request).await;
        assert!(!result.success, "attempt {i} should fail");
        // Exhaustion carries the attempt log.
        assert!(!result.attempts.is_empty());
    }
    assert_eq!(orch.breaker_phase("doomed").await, BreakerFlag::Open);

    // Breaker-open is surfaced distinctly from exhaustion: zero attempts,
    // Open flag, so the UI can say "disabled" rather than "failed".
    let disabled = orch.recover(&request).await;
    assert!(!disabled.success);
    assert!(disabled.attempts.is_empty());
    assert_eq!(disabled.breaker, BreakerFlag::Open);

    // Other artifacts in the session are unaffected.
    let healthy = RecoveryRequest::new(
        "fine",
        "import x from \"./x\";\nconst keep = 1;\n",
        "Cannot find module './x'",
        "",
    );
    let result = orch.recover(&healthy).await;
    assert!(result.success);
}
