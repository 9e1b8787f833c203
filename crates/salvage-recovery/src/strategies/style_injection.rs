//! Priority 90: inject a context styling block directly.
//!
//! Applies when the payload references class names informally — no module
//! import to convert — but a styling block exists in context. The block is
//! prepended as a runtime `<style>` injection so the class names resolve.

use salvage_types::RecoveryRequest;

use crate::css;
use crate::strategy::{ResolutionStrategy, StrategyOutcome};

use super::css_module_import_re;

const CONFIDENCE: f32 = 0.8;

/// Element id the injected tag is registered under, so repeated renders of
/// the same payload stay idempotent.
const STYLE_TAG_ID: &str = "injected-component-css";

pub struct StyleInjectionStrategy;

impl ResolutionStrategy for StyleInjectionStrategy {
    fn name(&self) -> &str {
        "style_injection"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn can_handle(&self, request: &RecoveryRequest) -> bool {
        if css_module_import_re().is_match(&request.payload) {
            // A module import means the higher-priority conversion owns this.
            return false;
        }
        let references_classes =
            request.payload.contains("className=") || request.payload.contains("class=");
        references_classes
            && css::find_css_block(&request.context)
                .map(|block| css::parse_css(&block).is_ok())
                .unwrap_or(false)
    }

    fn apply(&self, request: &RecoveryRequest) -> StrategyOutcome {
        let Some(block) = css::find_css_block(&request.context) else {
            return StrategyOutcome::rejected("no styling block found in context");
        };
        if let Err(e) = css::parse_css(&block) {
            return StrategyOutcome::rejected(format!("styling block failed to parse: {e}"));
        }

        let escaped = block
            .replace('\\', "\\\\")
            .replace('`', "\\`")
            .replace("${", "\\${");
        let preamble = [
            format!("const injectedCss = `{escaped}`;"),
            format!(
                "if (typeof document !== \"undefined\" && !document.getElementById(\"{STYLE_TAG_ID}\")) {{"
            ),
            "  const styleTag = document.createElement(\"style\");".to_string(),
            format!("  styleTag.id = \"{STYLE_TAG_ID}\";"),
            "  styleTag.textContent = injectedCss;".to_string(),
            "  document.head.appendChild(styleTag);".to_string(),
            "}".to_string(),
            String::new(),
            String::new(),
        ]
        .join("\n");

        tracing::debug!(bytes = block.len(), "styling block injected directly");
        StrategyOutcome::applied(
            format!("{preamble}{}", request.payload),
            CONFIDENCE,
            vec![format!(
                "injected {} byte styling block as a runtime <style> tag",
                block.len()
            )],
        )
    }
}
