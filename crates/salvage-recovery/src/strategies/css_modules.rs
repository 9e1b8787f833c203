//! Priority 100: rewrite a styling-module import into an inline style lookup.
//!
//! `import styles from "./Card.module.css"` with `.card { background-color:
//! blue; }` in context becomes `const styles = { card: { backgroundColor:
//! 'blue' } };` — every hyphenated declaration name camelCased, keyed by
//! selector name, so `styles.card` accessors keep working without the module.

use salvage_types::RecoveryRequest;

use crate::css::{self, CssRule};
use crate::strategy::{ResolutionStrategy, StrategyOutcome};

use super::css_module_import_re;

const CONFIDENCE: f32 = 0.9;

pub struct CssModulesStrategy;

impl ResolutionStrategy for CssModulesStrategy {
    fn name(&self) -> &str {
        "css_modules"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn can_handle(&self, request: &RecoveryRequest) -> bool {
        css_module_import_re().is_match(&request.payload)
            && css::find_css_block(&request.context)
                .map(|block| css::parse_css(&block).is_ok())
                .unwrap_or(false)
    }

    fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome {
        let re = css_module_import_re();
        let Some(cap) = re.captures(&request.payload) else {
            return StrategyOutcome::rejected("payload has no styling-module import");
        };
        let binding = cap[1].to_string();
        let specifier = cap[2].to_string();

        let Some(block) = css::find_css_block(&request.context) else {
            return StrategyOutcome::rejected("no styling block found in context");
        };
        let rules = match css::parse_css(&block) {
            Ok(rules) => rules,
            Err(e) => {
                return StrategyOutcome::rejected(format!("styling block failed to parse: {e}"))
            }
        };

        let mut change_log = vec![format!(
            "replaced styling-module import '{specifier}' with an inline style lookup"
        )];
        let Some(lookup) = build_lookup(&binding, &rules, &mut change_log) else {
            return StrategyOutcome::rejected("styling block has no usable class selectors");
        };

        let matched = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let transformed = request.payload.replacen(matched, &lookup, 1);
        tracing::debug!(specifier = %specifier, "styling-module import converted");
        StrategyOutcome::applied(transformed, CONFIDENCE, change_log)
    }
}

/// Build the `const <binding> = { ... };` lookup object, one key per class
/// selector. Returns `None` when no selector maps to a key.
fn build_lookup(binding: &str, rules: &[CssRule], change_log: &mut Vec<String>) -> Option<String> {
    let mut entries = Vec::new();
    let mut seen = Vec::new();

    for rule in rules {
        let Some(key) = class_key(&rule.selector) else {
            change_log.push(format!("skipped selector '{}'", rule.selector));
            continue;
        };
        if seen.contains(&key) {
            change_log.push(format!(
                "skipped duplicate selector '.{key}' ({})",
                rule.selector
            ));
            continue;
        }

        let props: Vec<String> = rule
            .declarations
            .iter()
            .map(|d| format!("{}: {}", css::camel_case(&d.property), js_value(&d.value)))
            .collect();
        change_log.push(format!("mapped selector '{}' to {binding}.{key}", rule.selector));
        entries.push(format!("  {}: {{ {} }},", js_key(&key), props.join(", ")));
        seen.push(key);
    }

    if entries.is_empty() {
        return None;
    }
    Some(format!("const {binding} = {{\n{}\n}};\n", entries.join("\n")))
}

/// The lookup key for a selector: its last simple token when that token is a
/// class, pseudo-classes stripped. Non-class selectors have no accessor form.
fn class_key(selector: &str) -> Option<String> {
    let token = selector.split_whitespace().last()?;
    let token = token.split(':').next()?;
    let name = token.strip_prefix('.')?;
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Some(name.to_string())
    } else {
        None
    }
}

/// Quote the key when it is not a valid JS identifier.
fn js_key(key: &str) -> String {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid {
        key.to_string()
    } else {
        format!("'{key}'")
    }
}

/// CSS values become string literals; bare numbers stay numeric.
fn js_value(value: &str) -> String {
    if value.parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
