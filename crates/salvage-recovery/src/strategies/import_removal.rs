//! Priority 10: the always-applicable fallback — remove the offending
//! import statement(s) entirely, leaving the rest of the payload untouched.
//!
//! Imports named in the host's error text go first. When the error names
//! none, every relative import is removed instead; package imports stay —
//! the sandbox resolves registry dependencies itself.

use std::ops::Range;

use salvage_types::RecoveryRequest;

use crate::strategy::{ResolutionStrategy, StrategyOutcome};

const CONFIDENCE: f32 = 0.7;

/// `import ... from "<specifier>";` — the lazy middle spans multi-line
/// binding lists, which contain neither quotes nor semicolons.
fn from_import_re() -> regex::Regex {
    regex::Regex::new(r#"(?m)^[ \t]*import\s[^;'"]*?from\s*['"]([^'"]+)['"]\s*;?[ \t]*\r?\n?"#)
        .unwrap()
}

/// `import "<specifier>";` — side-effect form.
fn side_effect_import_re() -> regex::Regex {
    regex::Regex::new(r#"(?m)^[ \t]*import\s*['"]([^'"]+)['"]\s*;?[ \t]*\r?\n?"#).unwrap()
}

#[derive(Debug)]
struct ImportStatement {
    range: Range<usize>,
    specifier: String,
}

fn import_statements(payload: &str) -> Vec<ImportStatement> {
    let mut found: Vec<ImportStatement> = Vec::new();
    for re in [from_import_re(), side_effect_import_re()] {
        for cap in re.captures_iter(payload) {
            let m = match cap.get(0) {
                Some(m) => m,
                None => continue,
            };
            // The two patterns overlap on neither form, but guard anyway.
            if found.iter().any(|s| s.range.start == m.start()) {
                continue;
            }
            found.push(ImportStatement {
                range: m.range(),
                specifier: cap[1].to_string(),
            });
        }
    }
    found.sort_by_key(|s| s.range.start);
    found
}

/// Quoted module specifiers mentioned in the host's error text.
fn specifiers_in_error(error_text: &str) -> Vec<String> {
    let quoted = regex::Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();
    quoted
        .captures_iter(error_text)
        .map(|c| c[1].to_string())
        .collect()
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

pub struct ImportRemovalStrategy;

impl ResolutionStrategy for ImportRemovalStrategy {
    fn name(&self) -> &str {
        "import_removal"
    }

    fn priority(&self) -> i32 {
        10
    }

    /// The fallback always volunteers; `apply` decides whether there is
    /// anything to remove.
    fn can_handle(&self, _request: &RecoveryRequest) -> bool {
        true
    }

    fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome {
        let statements = import_statements(&request.payload);
        if statements.is_empty() {
            return StrategyOutcome::rejected("payload has no import statements to remove");
        }

        let blamed = specifiers_in_error(&request.error_text);
        let mut doomed: Vec<&ImportStatement> = statements
            .iter()
            .filter(|s| blamed.iter().any(|b| *b == s.specifier))
            .collect();
        if doomed.is_empty() {
            doomed = statements.iter().filter(|s| is_relative(&s.specifier)).collect();
        }
        if doomed.is_empty() {
            return StrategyOutcome::rejected(
                "error text names no imports and none are relative",
            );
        }

        // Splice the survivors back together; everything between removed
        // spans is byte-for-byte unchanged.
        let mut transformed = String::with_capacity(request.payload.len());
        let mut cursor = 0;
        let mut change_log = Vec::new();
        for stmt in &doomed {
            transformed.push_str(&request.payload[cursor..stmt.range.start]);
            cursor = stmt.range.end;
            change_log.push(format!("removed import '{}'", stmt.specifier));
        }
        transformed.push_str(&request.payload[cursor..]);

        tracing::debug!(removed = doomed.len(), "offending imports removed");
        StrategyOutcome::applied(transformed, CONFIDENCE, change_log)
    }
}
