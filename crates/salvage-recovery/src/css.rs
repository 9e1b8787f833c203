//! CSS block parsing and correction-material mining.
//!
//! Strategies need two things from the surrounding transcript text: a styling
//! block referenced by the failing payload, and structured data referenced by
//! an import. Both live here. The CSS parser is a byte-cursor parser over
//! selectors and declaration lists; mining is pattern-directed, not a general
//! analyzer.

use salvage_types::{Result, SalvageError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    /// Raw selector text, trimmed (e.g. `.card`, `#root`, `.a:hover`).
    pub selector: String,
    pub declarations: Vec<CssDeclaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.input.len()
                && self.input.as_bytes()[self.pos].is_ascii_whitespace()
            {
                self.pos += 1;
            }
            // Block comments (/* ... */)
            if self.remaining().starts_with("/*") {
                self.pos += 2;
                while self.pos + 1 < self.input.len() {
                    if &self.input[self.pos..self.pos + 2] == "*/" {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            // Line comments sneak in from model output even though CSS has none.
            if self.remaining().starts_with("//") {
                while self.pos < self.input.len() && self.input.as_bytes()[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn error(&self, message: String) -> SalvageError {
        let consumed = &self.input[..self.pos];
        let line = consumed.chars().filter(|&c| c == '\n').count() + 1;
        let col = consumed
            .rfind('\n')
            .map(|i| self.pos - i)
            .unwrap_or(self.pos + 1);
        SalvageError::ParseError {
            line,
            col,
            message,
            source_snippet: None,
        }
    }

    fn parse_selector(&mut self) -> Result<String> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input.as_bytes()[self.pos];
            if c == b'{' || c == b'}' {
                break;
            }
            self.pos += 1;
        }
        let selector = self.input[start..self.pos].trim();
        if selector.is_empty() {
            return Err(self.error("expected selector".to_string()));
        }
        Ok(selector.to_string())
    }

    fn parse_property(&mut self) -> Result<String> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input.as_bytes()[self.pos];
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected property name".to_string()));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_value(&mut self) -> Result<String> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        while self.pos < self.input.len() {
            let c = self.input.as_bytes()[self.pos];
            if c == b';' || c == b'}' {
                break;
            }
            self.pos += 1;
        }
        let val = self.input[start..self.pos].trim();
        if val.is_empty() {
            return Err(self.error("expected property value".to_string()));
        }
        Ok(val.to_string())
    }

    fn expect(&mut self, ch: u8) -> Result<()> {
        self.skip_whitespace_and_comments();
        match self.peek() {
            Some(c) if c == ch => {
                self.pos += 1;
                Ok(())
            }
            other => Err(self.error(format!(
                "expected '{}', found '{}'",
                ch as char,
                other.map(|c| c as char).unwrap_or('\0')
            ))),
        }
    }

    fn parse_rule(&mut self) -> Result<CssRule> {
        let selector = self.parse_selector()?;
        self.expect(b'{')?;

        let mut declarations = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                None => return Err(self.error("unexpected end of input in rule body".to_string())),
                _ => {
                    let property = self.parse_property()?;
                    self.expect(b':')?;
                    let value = self.parse_value()?;
                    declarations.push(CssDeclaration { property, value });
                    self.skip_whitespace_and_comments();
                    if self.peek() == Some(b';') {
                        self.pos += 1;
                    }
                }
            }
        }

        Ok(CssRule {
            selector,
            declarations,
        })
    }

    fn parse_rules(&mut self) -> Result<Vec<CssRule>> {
        let mut rules = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                break;
            }
            rules.push(self.parse_rule()?);
        }
        if rules.is_empty() {
            return Err(self.error("styling block contains no rules".to_string()));
        }
        Ok(rules)
    }
}

/// Parse a CSS block into rules.
pub fn parse_css(input: &str) -> Result<Vec<CssRule>> {
    Parser::new(input).parse_rules()
}

/// Convert a hyphenated declaration name to its camel-cased accessor form:
/// `background-color` → `backgroundColor`, `-webkit-transition` →
/// `WebkitTransition`.
pub fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper_next = false;
    for c in property.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Context mining
// ---------------------------------------------------------------------------

/// Find a styling block in surrounding transcript text: a ```css fence first,
/// then any contiguous run of rule-shaped regions. Returns the raw CSS text.
pub fn find_css_block(context: &str) -> Option<String> {
    let fence = regex::Regex::new(r"(?ms)^```(?:css|scss)[ \t]*\r?\n(.*?)^```[ \t]*$").unwrap();
    if let Some(cap) = fence.captures(context) {
        let body = cap.get(1).map(|m| m.as_str().trim())?;
        if parse_css(body).is_ok() {
            return Some(body.to_string());
        }
    }

    // Bare rules outside a fence. Single-level blocks only — pattern-directed.
    let rule = regex::Regex::new(
        r"(?s)[.#]?[A-Za-z][\w:-]*(?:\s*[,>\s]\s*[.#]?[A-Za-z][\w:-]*)*\s*\{[^{}]*\}",
    )
    .unwrap();
    let joined: Vec<&str> = rule.find_iter(context).map(|m| m.as_str()).collect();
    if joined.is_empty() {
        return None;
    }
    let candidate = joined.join("\n");
    match parse_css(&candidate) {
        Ok(_) => Some(candidate),
        Err(_) => None,
    }
}

/// Find a structured-data block in surrounding text: a ```json fence first,
/// then the first balanced object/array that parses as JSON.
pub fn find_json_block(context: &str) -> Option<String> {
    let fence = regex::Regex::new(r"(?ms)^```json[ \t]*\r?\n(.*?)^```[ \t]*$").unwrap();
    if let Some(cap) = fence.captures(context) {
        let body = cap.get(1).map(|m| m.as_str().trim())?;
        if serde_json::from_str::<serde_json::Value>(body).is_ok() {
            return Some(body.to_string());
        }
    }

    let mut tried = 0;
    for (idx, c) in context.char_indices() {
        if c != '{' && c != '[' {
            continue;
        }
        if let Some(span) = balanced_json_span(&context[idx..]) {
            if serde_json::from_str::<serde_json::Value>(span).is_ok() {
                return Some(span.to_string());
            }
        }
        tried += 1;
        if tried >= 8 {
            break;
        }
    }
    None
}

/// The shortest balanced `{...}`/`[...]` prefix of `text`, honoring JSON
/// string syntax.
fn balanced_json_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..idx + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
