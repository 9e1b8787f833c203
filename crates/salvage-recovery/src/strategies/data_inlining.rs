//! Priority 80: rewrite a structured-data import into an inlined literal.
//!
//! `import data from "./points.json"` with a JSON block in context becomes
//! `const data = { ... };`. The literal round-trips through `serde_json`, so
//! nested structure, arrays, and primitive types are preserved exactly.

use salvage_types::RecoveryRequest;

use crate::css::find_json_block;
use crate::strategy::{ResolutionStrategy, StrategyOutcome};

use super::json_import_re;

const CONFIDENCE: f32 = 0.85;

pub struct DataInliningStrategy;

impl ResolutionStrategy for DataInliningStrategy {
    fn name(&self) -> &str {
        "data_inlining"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn can_handle(&self, request: &RecoveryRequest) -> bool {
        json_import_re().is_match(&request.payload) && find_json_block(&request.context).is_some()
    }

    fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome {
        let re = json_import_re();
        let Some(cap) = re.captures(&request.payload) else {
            return StrategyOutcome::rejected("payload has no structured-data import");
        };
        let binding = cap[1].to_string();
        let specifier = cap[2].to_string();

        let Some(block) = find_json_block(&request.context) else {
            return StrategyOutcome::rejected("no structured-data block found in context");
        };
        let value: serde_json::Value = match serde_json::from_str(&block) {
            Ok(v) => v,
            Err(e) => {
                return StrategyOutcome::rejected(format!("data block failed to parse: {e}"))
            }
        };

        // JSON is valid JS literal syntax; pretty-printing keeps it readable.
        let literal = match serde_json::to_string_pretty(&value) {
            Ok(s) => s,
            Err(e) => return StrategyOutcome::rejected(format!("data re-serialization failed: {e}")),
        };
        let declaration = format!("const {binding} = {literal};\n");

        let matched = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let transformed = request.payload.replacen(matched, &declaration, 1);
        tracing::debug!(specifier = %specifier, "structured-data import inlined");
        StrategyOutcome::applied(
            transformed,
            CONFIDENCE,
            vec![format!(
                "inlined data import '{specifier}' as a literal constant"
            )],
        )
    }
}
