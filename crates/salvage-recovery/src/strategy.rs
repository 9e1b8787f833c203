//! Resolution strategy trait, dynamic dispatch wrapper, and the ordered chain.

use salvage_types::RecoveryRequest;

// ---------------------------------------------------------------------------
// ResolutionStrategy trait
// ---------------------------------------------------------------------------

/// Result of applying one strategy to a failing payload.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub success: bool,
    pub payload: Option<String>,
    pub confidence: f32,
    /// Human-readable notes on what was changed.
    pub change_log: Vec<String>,
    pub error: Option<String>,
}

impl StrategyOutcome {
    /// A successful transformation.
    pub fn applied(payload: impl Into<String>, confidence: f32, change_log: Vec<String>) -> Self {
        Self {
            success: true,
            payload: Some(payload.into()),
            confidence,
            change_log,
            error: None,
        }
    }

    /// The strategy could not produce a usable payload.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            confidence: 0.0,
            change_log: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

/// A pure transformation paired with an applicability check, ordered by
/// priority. Strategies never perform I/O; everything they need arrives in
/// the [`RecoveryRequest`].
pub trait ResolutionStrategy: Send + Sync {
    /// Stable name recorded in attempt logs (e.g. "css_modules").
    fn name(&self) -> &str;

    /// Evaluation order: higher runs first.
    fn priority(&self) -> i32;

    /// Cheap applicability predicate, checked before `apply`.
    fn can_handle(&self, request: &RecoveryRequest) -> bool;

    /// Attempt the transformation.
    fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome;
}

// ---------------------------------------------------------------------------
// DynStrategy — object-safe wrapper
// ---------------------------------------------------------------------------

pub struct DynStrategy(Box<dyn ResolutionStrategy>);

impl DynStrategy {
    pub fn new(strategy: impl ResolutionStrategy + 'static) -> Self {
        Self(Box::new(strategy))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn priority(&self) -> i32 {
        self.0.priority()
    }

    pub fn can_handle(&self, request: &RecoveryRequest) -> bool {
        self.0.can_handle(request)
    }

    pub fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome {
        self.0.apply(request)
    }
}

// ---------------------------------------------------------------------------
// StrategyChain
// ---------------------------------------------------------------------------

/// Strategies held in strict descending priority order.
pub struct StrategyChain {
    strategies: Vec<DynStrategy>,
}

impl StrategyChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Insert a strategy, keeping the chain sorted by descending priority.
    /// Equal priorities keep registration order.
    pub fn register(&mut self, strategy: impl ResolutionStrategy + 'static) {
        let wrapped = DynStrategy::new(strategy);
        let at = self
            .strategies
            .iter()
            .position(|s| s.priority() < wrapped.priority())
            .unwrap_or(self.strategies.len());
        self.strategies.insert(at, wrapped);
    }

    /// Strategies in evaluation order (highest priority first).
    pub fn iter(&self) -> impl Iterator<Item = &DynStrategy> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in chain: styling-module conversion (100), direct styling
/// injection (90), structured-data inlining (80), import removal (10).
pub fn default_chain() -> StrategyChain {
    let mut chain = StrategyChain::new();
    chain.register(crate::strategies::CssModulesStrategy);
    chain.register(crate::strategies::StyleInjectionStrategy);
    chain.register(crate::strategies::DataInliningStrategy);
    chain.register(crate::strategies::ImportRemovalStrategy);
    chain
}
