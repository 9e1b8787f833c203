//! Priority-ordered payload recovery with circuit-breaker bounded retries.
//!
//! This crate implements the recovery half of the Salvage core: the
//! resolution strategy chain, the executor that runs it with first-success
//! termination and AI-repair escalation, the per-identity circuit breaker
//! that guarantees the loop terminates, and the orchestrator collaborators
//! call with a failure report.

pub mod breaker;
pub mod css;
pub mod executor;
pub mod oracle;
pub mod orchestrator;
pub mod strategies;
pub mod strategy;

pub use breaker::{Admission, CircuitBreaker, Clock, SystemClock};
pub use css::{camel_case, find_css_block, find_json_block, parse_css, CssDeclaration, CssRule};
pub use executor::{structurally_sound, StrategyExecutor};
pub use oracle::{ExecutionOracle, RenderVerdict, RepairOracle, RepairProposal};
pub use orchestrator::RecoveryOrchestrator;
pub use strategies::{
    CssModulesStrategy, DataInliningStrategy, ImportRemovalStrategy, StyleInjectionStrategy,
};
pub use strategy::{default_chain, DynStrategy, ResolutionStrategy, StrategyChain, StrategyOutcome};
