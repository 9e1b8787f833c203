//! Strategy executor: strict priority order, first qualifying success wins.
//!
//! Strategies are evaluated in descending priority. The first whose
//! `can_handle` passes is applied; a success at or above the acceptance
//! threshold stops execution immediately — lower-priority strategies are
//! never invoked after a success. When every strategy is exhausted the
//! executor escalates to the AI-repair oracle. Oracle calls run under a
//! per-attempt timeout and the whole run under a wall-clock budget; exceeding
//! either is a recorded failure, never a hang.

use std::sync::Arc;
use std::time::{Duration, Instant};

use salvage_types::{
    AttemptRecord, RecoveryConfig, RecoveryRequest, RecoveryResult, AI_REPAIR_STRATEGY,
};

use crate::oracle::{ExecutionOracle, RepairOracle};
use crate::strategy::{default_chain, StrategyChain};

pub struct StrategyExecutor {
    chain: StrategyChain,
    config: RecoveryConfig,
    render: Option<Arc<dyn ExecutionOracle>>,
    repair: Option<Arc<dyn RepairOracle>>,
}

impl StrategyExecutor {
    pub fn new(chain: StrategyChain, config: RecoveryConfig) -> Self {
        Self {
            chain,
            config,
            render: None,
            repair: None,
        }
    }

    /// An executor with the four built-in strategies.
    pub fn with_default_chain(config: RecoveryConfig) -> Self {
        Self::new(default_chain(), config)
    }

    /// Verify qualifying transforms against the rendering host before
    /// accepting them.
    pub fn with_render_oracle(mut self, oracle: Arc<dyn ExecutionOracle>) -> Self {
        self.render = Some(oracle);
        self
    }

    /// Escalate to AI-assisted repair after strategy exhaustion.
    pub fn with_repair_oracle(mut self, oracle: Arc<dyn RepairOracle>) -> Self {
        self.repair = Some(oracle);
        self
    }

    /// Run the chain against one failure report.
    pub async fn execute(&self, request: &RecoveryRequest) -> RecoveryResult {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.total_budget_ms);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for strategy in self.chain.iter() {
            if started.elapsed() >= budget {
                tracing::warn!(
                    identifier = %request.identifier,
                    strategy = strategy.name(),
                    "recovery budget exhausted before strategy could run"
                );
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason: "recovery budget exhausted".to_string(),
                });
                continue;
            }
            if !strategy.can_handle(request) {
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason: "not applicable".to_string(),
                });
                continue;
            }

            tracing::info!(
                identifier = %request.identifier,
                strategy = strategy.name(),
                priority = strategy.priority(),
                "applying strategy"
            );
            let outcome = strategy.apply(request);

            if !outcome.success {
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason: outcome
                        .error
                        .unwrap_or_else(|| "strategy produced no result".to_string()),
                });
                continue;
            }
            let Some(payload) = outcome.payload else {
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason: "strategy reported success without a payload".to_string(),
                });
                continue;
            };
            if outcome.confidence < self.config.accept_threshold {
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason: format!(
                        "confidence {:.2} below threshold {:.2}",
                        outcome.confidence, self.config.accept_threshold
                    ),
                });
                continue;
            }
            if let Err(reason) = self.verify(&payload).await {
                attempts.push(AttemptRecord {
                    strategy: strategy.name().to_string(),
                    passed: false,
                    reason,
                });
                continue;
            }

            // First qualifying success terminates the chain — hard invariant.
            attempts.push(AttemptRecord {
                strategy: strategy.name().to_string(),
                passed: true,
                reason: String::new(),
            });
            let mut result =
                RecoveryResult::succeeded(strategy.name(), outcome.confidence, payload, attempts);
            result.elapsed_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        // Every strategy exhausted — escalate to AI-assisted repair.
        if let Some(record) = self.try_repair(request, started, budget, &mut attempts).await {
            return record;
        }

        tracing::warn!(
            identifier = %request.identifier,
            attempts = attempts.len(),
            "recovery exhausted"
        );
        let mut result = RecoveryResult::failed(attempts);
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        result
    }

    /// Run the AI-repair stage. Returns a final result on acceptance, or
    /// records the failure into `attempts` and returns `None`.
    async fn try_repair(
        &self,
        request: &RecoveryRequest,
        started: Instant,
        budget: Duration,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Option<RecoveryResult> {
        let repair = self.repair.as_ref()?;

        if started.elapsed() >= budget {
            attempts.push(AttemptRecord {
                strategy: AI_REPAIR_STRATEGY.to_string(),
                passed: false,
                reason: "recovery budget exhausted".to_string(),
            });
            return None;
        }

        let timeout = Duration::from_millis(self.config.attempt_timeout_ms);
        tracing::info!(identifier = %request.identifier, "escalating to AI-assisted repair");
        let proposal = match tokio::time::timeout(
            timeout,
            repair.request_fix(&request.payload, &request.error_text, &request.context),
        )
        .await
        {
            Err(_elapsed) => {
                attempts.push(AttemptRecord {
                    strategy: AI_REPAIR_STRATEGY.to_string(),
                    passed: false,
                    reason: format!("timed out after {}ms", self.config.attempt_timeout_ms),
                });
                return None;
            }
            Ok(Err(e)) => {
                attempts.push(AttemptRecord {
                    strategy: AI_REPAIR_STRATEGY.to_string(),
                    passed: false,
                    reason: format!("repair oracle error: {e}"),
                });
                return None;
            }
            Ok(Ok(proposal)) => proposal,
        };

        let reason = if !proposal.success {
            Some(if proposal.explanation.is_empty() {
                "repair unavailable".to_string()
            } else {
                proposal.explanation.clone()
            })
        } else if proposal.confidence < self.config.accept_threshold {
            Some(format!(
                "confidence {:.2} below threshold {:.2}",
                proposal.confidence, self.config.accept_threshold
            ))
        } else {
            None
        };
        if let Some(reason) = reason {
            attempts.push(AttemptRecord {
                strategy: AI_REPAIR_STRATEGY.to_string(),
                passed: false,
                reason,
            });
            return None;
        }

        let Some(payload) = proposal.payload else {
            attempts.push(AttemptRecord {
                strategy: AI_REPAIR_STRATEGY.to_string(),
                passed: false,
                reason: "repair returned no payload".to_string(),
            });
            return None;
        };
        if !structurally_sound(&payload) {
            attempts.push(AttemptRecord {
                strategy: AI_REPAIR_STRATEGY.to_string(),
                passed: false,
                reason: "repaired payload failed the structural sanity check".to_string(),
            });
            return None;
        }
        if let Err(reason) = self.verify(&payload).await {
            attempts.push(AttemptRecord {
                strategy: AI_REPAIR_STRATEGY.to_string(),
                passed: false,
                reason,
            });
            return None;
        }

        attempts.push(AttemptRecord {
            strategy: AI_REPAIR_STRATEGY.to_string(),
            passed: true,
            reason: String::new(),
        });
        let mut result = RecoveryResult::succeeded(
            AI_REPAIR_STRATEGY,
            proposal.confidence,
            payload,
            std::mem::take(attempts),
        );
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        Some(result)
    }

    /// Check a transformed payload against the execution oracle, when one is
    /// configured. Timeouts and oracle faults read as strategy failures.
    async fn verify(&self, payload: &str) -> Result<(), String> {
        let Some(render) = self.render.as_ref() else {
            return Ok(());
        };
        let timeout = Duration::from_millis(self.config.attempt_timeout_ms);
        match tokio::time::timeout(timeout, render.attempt_render(payload)).await {
            Err(_elapsed) => Err(format!(
                "render verification timed out after {}ms",
                self.config.attempt_timeout_ms
            )),
            Ok(Err(e)) => Err(format!("render oracle error: {e}")),
            Ok(Ok(verdict)) if verdict.ok => Ok(()),
            Ok(Ok(verdict)) => Err(format!(
                "transformed payload still fails: {}",
                verdict.error_text.unwrap_or_else(|| "unknown error".to_string())
            )),
        }
    }
}

/// Basic structural sanity: non-empty, with brackets, braces, and parens
/// balanced outside string literals and comments.
pub fn structurally_sound(payload: &str) -> bool {
    if payload.trim().is_empty() {
        return false;
    }
    let mut stack: Vec<char> = Vec::new();
    let mut chars = payload.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                let quote = c;
                while let Some(s) = chars.next() {
                    if s == '\\' {
                        chars.next();
                    } else if s == quote {
                        break;
                    } else if s == '\n' && quote != '`' {
                        // Unterminated single-line string — stop scanning it.
                        break;
                    }
                }
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for n in chars.by_ref() {
                        if n == '\n' {
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for n in chars.by_ref() {
                        if prev == '*' && n == '/' {
                            break;
                        }
                        prev = n;
                    }
                }
                _ => {}
            },
            '(' => stack.push(')'),
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ')' | ']' | '}' => {
                if stack.pop() != Some(c) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}
