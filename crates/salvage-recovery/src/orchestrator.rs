//! Top-level recovery entry point.
//!
//! `recover` is the single door: consult the breaker, run the executor, feed
//! the outcome back, return the verdict. Each call counts as exactly one
//! attempt against the breaker — callers must not call it speculatively.

use salvage_types::{BreakerFlag, RecoveryConfig, RecoveryRequest, RecoveryResult};

use crate::breaker::{Admission, CircuitBreaker};
use crate::executor::StrategyExecutor;

pub struct RecoveryOrchestrator {
    executor: StrategyExecutor,
    breaker: tokio::sync::Mutex<CircuitBreaker>,
}

impl RecoveryOrchestrator {
    pub fn new(executor: StrategyExecutor, breaker: CircuitBreaker) -> Self {
        Self {
            executor,
            breaker: tokio::sync::Mutex::new(breaker),
        }
    }

    /// An orchestrator with the built-in strategy chain and a system-clock
    /// breaker. Oracles are attached via [`StrategyExecutor`] construction.
    pub fn with_defaults(config: RecoveryConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self::new(StrategyExecutor::with_default_chain(config), breaker)
    }

    /// Attempt recovery for one failure report.
    ///
    /// Cancellation-safe with respect to breaker bookkeeping: dropping the
    /// returned future before completion records neither success nor failure.
    pub async fn recover(&self, request: &RecoveryRequest) -> RecoveryResult {
        let admission = self.breaker.lock().await.admit(&request.identifier);

        match admission {
            Admission::Refused { retry_in } => {
                tracing::info!(
                    identifier = %request.identifier,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "recovery disabled by circuit breaker"
                );
                RecoveryResult::disabled()
            }
            Admission::Allowed | Admission::Probe => {
                if admission == Admission::Probe {
                    tracing::info!(identifier = %request.identifier, "running half-open probe");
                }

                let mut result = self.executor.execute(request).await;

                let mut breaker = self.breaker.lock().await;
                breaker.record(&request.identifier, result.success);
                result.breaker = breaker.phase(&request.identifier);
                result
            }
        }
    }

    /// Cooperative cancellation: a caller that dropped an in-flight
    /// `recover` future for this identity releases any probe slot it held.
    pub async fn cancel(&self, identifier: &str) {
        self.breaker.lock().await.release_probe(identifier);
    }

    /// Current breaker phase for an identity, for UI messaging.
    pub async fn breaker_phase(&self, identifier: &str) -> BreakerFlag {
        self.breaker.lock().await.phase(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{Clock, SystemClock};
    use crate::strategy::{ResolutionStrategy, StrategyChain, StrategyOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    struct Scripted {
        succeed: Arc<std::sync::atomic::AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl ResolutionStrategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        fn priority(&self) -> i32 {
            100
        }
        fn can_handle(&self, _request: &RecoveryRequest) -> bool {
            true
        }
        fn apply(&self, _request: &RecoveryRequest) -> StrategyOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed.load(Ordering::SeqCst) {
                StrategyOutcome::applied("fixed", 0.9, vec![])
            } else {
                StrategyOutcome::rejected("scripted failure")
            }
        }
    }

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Instant::now()),
            })
        }
        fn advance(&self, delta: Duration) {
            *self.now.lock().unwrap() += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    fn config() -> RecoveryConfig {
        RecoveryConfig {
            failure_threshold: 2,
            reset_timeout_ms: 1_000,
            ..RecoveryConfig::default()
        }
    }

    fn orchestrator(
        succeed: Arc<std::sync::atomic::AtomicBool>,
        calls: Arc<AtomicUsize>,
        clock: Arc<dyn Clock>,
    ) -> RecoveryOrchestrator {
        let mut chain = StrategyChain::new();
        chain.register(Scripted { succeed, calls });
        let cfg = config();
        let breaker = CircuitBreaker::with_clock(&cfg, clock);
        RecoveryOrchestrator::new(StrategyExecutor::new(chain, cfg), breaker)
    }

    fn request() -> RecoveryRequest {
        RecoveryRequest::new("art-1", "const x = 1;", "boom", "")
    }

    #[tokio::test]
    async fn successful_recovery_returns_executor_verdict() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(succeed, calls.clone(), Arc::new(SystemClock));

        let result = orch.recover(&request()).await;
        assert!(result.success);
        assert_eq!(result.breaker, BreakerFlag::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn threshold_failures_open_breaker_and_short_circuit() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(succeed, calls.clone(), Arc::new(SystemClock));

        // Two failures reach the threshold.
        let r1 = orch.recover(&request()).await;
        assert!(!r1.success);
        assert_eq!(r1.breaker, BreakerFlag::Closed);
        let r2 = orch.recover(&request()).await;
        assert!(!r2.success);
        assert_eq!(r2.breaker, BreakerFlag::Open);

        // Third call is refused before the executor runs: zero attempts.
        let r3 = orch.recover(&request()).await;
        assert!(!r3.success);
        assert!(r3.attempts.is_empty());
        assert_eq!(r3.breaker, BreakerFlag::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn probe_success_after_timeout_closes_breaker() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = ManualClock::new();
        let orch = orchestrator(succeed.clone(), calls.clone(), clock.clone());

        orch.recover(&request()).await;
        orch.recover(&request()).await;
        assert_eq!(orch.breaker_phase("art-1").await, BreakerFlag::Open);

        // Cooldown elapses; the probe is allowed and succeeds.
        clock.advance(Duration::from_millis(1_000));
        succeed.store(true, Ordering::SeqCst);
        let probe = orch.recover(&request()).await;
        assert!(probe.success);
        assert_eq!(probe.breaker, BreakerFlag::Closed);
        assert_eq!(orch.breaker_phase("art-1").await, BreakerFlag::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn probe_failure_reopens_breaker() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = ManualClock::new();
        let orch = orchestrator(succeed, calls.clone(), clock.clone());

        orch.recover(&request()).await;
        orch.recover(&request()).await;
        clock.advance(Duration::from_millis(1_000));

        let probe = orch.recover(&request()).await;
        assert!(!probe.success);
        assert_eq!(probe.breaker, BreakerFlag::Open);
        // Refused again immediately after.
        let refused = orch.recover(&request()).await;
        assert!(refused.attempts.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn one_artifact_cannot_block_another() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(succeed.clone(), calls, Arc::new(SystemClock));

        orch.recover(&request()).await;
        orch.recover(&request()).await;
        assert_eq!(orch.breaker_phase("art-1").await, BreakerFlag::Open);

        succeed.store(true, Ordering::SeqCst);
        let other = RecoveryRequest::new("art-2", "const y = 2;", "boom", "");
        let result = orch.recover(&other).await;
        assert!(result.success);
        assert_eq!(result.breaker, BreakerFlag::Closed);
    }

    #[tokio::test]
    async fn cancel_releases_probe_slot() {
        let succeed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = ManualClock::new();
        let orch = orchestrator(succeed.clone(), calls, clock.clone());

        orch.recover(&request()).await;
        orch.recover(&request()).await;
        clock.advance(Duration::from_millis(1_000));

        // Simulate a probe admission whose work was cancelled: the slot is
        // released without recording an outcome.
        {
            let mut breaker = orch.breaker.lock().await;
            assert_eq!(breaker.admit("art-1"), Admission::Probe);
        }
        orch.cancel("art-1").await;

        // The next caller gets the probe and can close the breaker.
        succeed.store(true, Ordering::SeqCst);
        let result = orch.recover(&request()).await;
        assert!(result.success);
        assert_eq!(result.breaker, BreakerFlag::Closed);
    }
}
