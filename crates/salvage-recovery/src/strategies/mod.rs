//! The built-in resolution strategies, one module per transform.

pub mod css_modules;
pub mod data_inlining;
pub mod import_removal;
pub mod style_injection;

pub use css_modules::CssModulesStrategy;
pub use data_inlining::DataInliningStrategy;
pub use import_removal::ImportRemovalStrategy;
pub use style_injection::StyleInjectionStrategy;

/// Matches a default-style import of a CSS module:
/// `import styles from "./Card.module.css";`
pub(crate) fn css_module_import_re() -> regex::Regex {
    regex::Regex::new(
        r#"(?m)^[ \t]*import\s+([A-Za-z_$][\w$]*)\s+from\s+['"]([^'"]+\.module\.css)['"]\s*;?[ \t]*\r?\n?"#,
    )
    .unwrap()
}

/// Matches a default-style import of a JSON data file:
/// `import data from "./points.json";`
pub(crate) fn json_import_re() -> regex::Regex {
    regex::Regex::new(
        r#"(?m)^[ \t]*import\s+([A-Za-z_$][\w$]*)\s+from\s+['"]([^'"]+\.json)['"]\s*;?[ \t]*\r?\n?"#,
    )
    .unwrap()
}
