//! Per-identity circuit breaker for the recovery pipeline.
//!
//! State is keyed strictly by artifact identity so one misbehaving artifact
//! cannot block recovery for others in the same session. Wall-clock time
//! enters only through the injectable [`Clock`], which keeps the
//! state-machine tests deterministic — no real sleeps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use salvage_types::{BreakerFlag, RecoveryConfig};

/// Time source for `Open` → `HalfOpen` transitions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The production clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Verdict of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed — run normally.
    Allowed,
    /// Breaker half-open — exactly one probe attempt is granted.
    Probe,
    /// Breaker open — recovery is categorically refused.
    Refused { retry_in: Duration },
}

#[derive(Debug)]
struct BreakerEntry {
    phase: BreakerFlag,
    consecutive_failures: u32,
    /// When the breaker last opened. Meaningful only while `Open`.
    opened_at: Instant,
    /// Current cooldown; doubles on failed probes up to the cap.
    cooldown: Duration,
    /// When the in-flight half-open probe started, if one exists.
    probe_started: Option<Instant>,
}

/// Per-identity breaker bank.
pub struct CircuitBreaker {
    entries: HashMap<String, BreakerEntry>,
    threshold: u32,
    base_cooldown: Duration,
    cooldown_cap: Duration,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RecoveryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            threshold: config.failure_threshold,
            base_cooldown: Duration::from_millis(config.reset_timeout_ms),
            cooldown_cap: Duration::from_millis(config.reset_timeout_cap_ms),
            clock,
        }
    }

    /// May recovery run for this identity right now?
    pub fn admit(&mut self, identifier: &str) -> Admission {
        let now = self.clock.now();
        let base = self.base_cooldown;
        let entry = self.entry(identifier, now);

        match entry.phase {
            BreakerFlag::Closed => Admission::Allowed,
            BreakerFlag::Open => {
                let deadline = entry.opened_at + entry.cooldown;
                if now >= deadline {
                    entry.phase = BreakerFlag::HalfOpen;
                    entry.probe_started = Some(now);
                    tracing::info!(identifier, "breaker half-open, granting probe");
                    Admission::Probe
                } else {
                    Admission::Refused {
                        retry_in: deadline.saturating_duration_since(now),
                    }
                }
            }
            BreakerFlag::HalfOpen => match entry.probe_started {
                None => {
                    entry.probe_started = Some(now);
                    Admission::Probe
                }
                // A probe that never reported back within a full cooldown is
                // considered abandoned (e.g. cancelled mid-flight); grant a
                // fresh one rather than refusing forever.
                Some(started) if now >= started + base => {
                    entry.probe_started = Some(now);
                    tracing::debug!(identifier, "stale probe superseded");
                    Admission::Probe
                }
                Some(_) => Admission::Refused {
                    retry_in: Duration::ZERO,
                },
            },
        }
    }

    /// Record a completed attempt's outcome. Cancelled attempts must simply
    /// not be recorded — they count as neither success nor failure.
    pub fn record(&mut self, identifier: &str, success: bool) {
        if success {
            self.record_success(identifier);
        } else {
            self.record_failure(identifier);
        }
    }

    pub fn record_success(&mut self, identifier: &str) {
        let now = self.clock.now();
        let base = self.base_cooldown;
        let entry = self.entry(identifier, now);
        match entry.phase {
            BreakerFlag::HalfOpen => {
                tracing::info!(identifier, "probe succeeded, breaker closed");
                entry.phase = BreakerFlag::Closed;
                entry.consecutive_failures = 0;
                entry.cooldown = base;
                entry.probe_started = None;
            }
            BreakerFlag::Closed => {
                entry.consecutive_failures = 0;
            }
            BreakerFlag::Open => {}
        }
    }

    pub fn record_failure(&mut self, identifier: &str) {
        let now = self.clock.now();
        let threshold = self.threshold;
        let cap = self.cooldown_cap;
        let entry = self.entry(identifier, now);
        match entry.phase {
            BreakerFlag::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= threshold {
                    tracing::warn!(
                        identifier,
                        failures = entry.consecutive_failures,
                        "failure threshold reached, breaker open"
                    );
                    entry.phase = BreakerFlag::Open;
                    entry.opened_at = now;
                }
            }
            BreakerFlag::HalfOpen => {
                entry.consecutive_failures += 1;
                entry.phase = BreakerFlag::Open;
                entry.opened_at = now;
                entry.cooldown = (entry.cooldown * 2).min(cap);
                entry.probe_started = None;
                tracing::warn!(
                    identifier,
                    cooldown_ms = entry.cooldown.as_millis() as u64,
                    "probe failed, breaker re-opened with backoff"
                );
            }
            BreakerFlag::Open => {
                entry.opened_at = now;
            }
        }
    }

    /// Release an admitted probe slot without recording an outcome
    /// (cooperative cancellation). The breaker returns to grantable
    /// half-open; the cooldown does not restart.
    pub fn release_probe(&mut self, identifier: &str) {
        if let Some(entry) = self.entries.get_mut(identifier) {
            if entry.phase == BreakerFlag::HalfOpen {
                entry.probe_started = None;
            }
        }
    }

    /// Current phase for an identity. Unknown identities read as `Closed`.
    pub fn phase(&self, identifier: &str) -> BreakerFlag {
        self.entries
            .get(identifier)
            .map(|e| e.phase)
            .unwrap_or(BreakerFlag::Closed)
    }

    pub fn failure_count(&self, identifier: &str) -> u32 {
        self.entries
            .get(identifier)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0)
    }

    fn entry(&mut self, identifier: &str, now: Instant) -> &mut BreakerEntry {
        let base = self.base_cooldown;
        self.entries
            .entry(identifier.to_string())
            .or_insert_with(|| BreakerEntry {
                phase: BreakerFlag::Closed,
                consecutive_failures: 0,
                opened_at: now,
                cooldown: base,
                probe_started: None,
            })
    }
}
