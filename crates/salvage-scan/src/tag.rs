//! Grammar for complete `<artifact ...>` and `<file ...>` open tags.
//!
//! The scanner hands this module the full tag text once it has observed the
//! closing `>`; parsing here is batch, never incremental. Attribute values are
//! quoted (single or double) with backslash escapes, appear in any order, and
//! duplicate names resolve last-wins. Required-attribute validation is the
//! assembler's job, not the grammar's — a tag with no attributes still parses.

use serde::{Deserialize, Serialize};

use winnow::ascii::multispace0;
use winnow::combinator::{alt, repeat};
use winnow::token::{literal, take_while};
use winnow::{ModalResult, Parser};

use salvage_types::{ArtifactKind, Dependency, SalvageError};

/// Everything the open tag declares about a block, before its body arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub identifier: String,
    /// `None` when the `kind` attribute is absent or empty.
    pub kind: Option<ArtifactKind>,
    pub title: String,
    pub description: Option<String>,
    pub dependencies: Vec<Dependency>,
}

/// Whitespace consumer (including newlines).
fn ws<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    multispace0.parse_next(input)
}

/// Parse an attribute name: [A-Za-z_][A-Za-z0-9_-]*
fn attr_name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1, |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        }),
    )
        .take()
        .parse_next(input)
}

/// Parse a quoted attribute value (single or double quotes) with escape support.
fn quoted_value(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let mut s = String::new();
    loop {
        let c = winnow::token::any.parse_next(input)?;
        if c == quote {
            break;
        }
        if c == '\\' {
            let esc = winnow::token::any.parse_next(input)?;
            match esc {
                'n' => s.push('\n'),
                't' => s.push('\t'),
                '\\' => s.push('\\'),
                other if other == quote => s.push(quote),
                other => {
                    s.push('\\');
                    s.push(other);
                }
            }
        } else {
            s.push(c);
        }
    }
    Ok(s)
}

/// Parse a single attribute: name '=' quoted-value.
fn attr(input: &mut &str) -> ModalResult<(String, String)> {
    let _ = ws.parse_next(input)?;
    let name = attr_name.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '='.parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let value = quoted_value.parse_next(input)?;
    Ok((name.to_string(), value))
}

/// Parse the attribute list and closing '>' after a tag's opening marker.
fn attrs_then_close(input: &mut &str) -> ModalResult<Vec<(String, String)>> {
    let attrs: Vec<(String, String)> = repeat(0.., attr).parse_next(input)?;
    let _ = ws.parse_next(input)?;
    let _ = '>'.parse_next(input)?;
    Ok(attrs)
}

fn artifact_tag(input: &mut &str) -> ModalResult<Vec<(String, String)>> {
    let _ = literal("<artifact").parse_next(input)?;
    attrs_then_close(input)
}

fn file_tag(input: &mut &str) -> ModalResult<Vec<(String, String)>> {
    let _ = literal("<file").parse_next(input)?;
    attrs_then_close(input)
}

fn offset_to_line_col(input: &str, remaining_len: usize) -> (usize, usize) {
    let consumed = input.len().saturating_sub(remaining_len);
    let prefix = &input[..consumed.min(input.len())];
    let line = prefix.chars().filter(|&c| c == '\n').count() + 1;
    let col = prefix
        .rfind('\n')
        .map(|i| consumed - i)
        .unwrap_or(consumed + 1);
    (line, col)
}

fn to_parse_error(
    tag: &str,
    remaining_len: usize,
    err: impl std::fmt::Display,
) -> SalvageError {
    let (line, col) = offset_to_line_col(tag, remaining_len);
    let snippet: String = tag[tag.len() - remaining_len..].chars().take(40).collect();
    SalvageError::ParseError {
        line,
        col,
        message: format!("{err}"),
        source_snippet: if snippet.is_empty() {
            None
        } else {
            Some(snippet)
        },
    }
}

/// Fold a raw attribute list into a map-like lookup, last occurrence winning.
fn last_value<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Parse a complete `<artifact ...>` open tag into a [`BlockHeader`].
pub fn parse_artifact_tag(tag: &str) -> salvage_types::Result<BlockHeader> {
    let mut remaining = tag;
    let attrs = artifact_tag
        .parse_next(&mut remaining)
        .map_err(|e| to_parse_error(tag, remaining.len(), e))?;

    let kind = last_value(&attrs, "kind")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ArtifactKind::parse);
    let description = last_value(&attrs, "description")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let dependencies = last_value(&attrs, "dependencies")
        .map(Dependency::parse_list)
        .unwrap_or_default();

    Ok(BlockHeader {
        identifier: last_value(&attrs, "identifier").unwrap_or("").to_string(),
        kind,
        title: last_value(&attrs, "title").unwrap_or("").to_string(),
        description,
        dependencies,
    })
}

/// Parse a complete `<file ...>` open tag, returning its `path` attribute
/// (empty when absent — the assembler rejects the section later).
pub fn parse_file_tag(tag: &str) -> salvage_types::Result<String> {
    let mut remaining = tag;
    let attrs = file_tag
        .parse_next(&mut remaining)
        .map_err(|e| to_parse_error(tag, remaining.len(), e))?;
    Ok(last_value(&attrs, "path").unwrap_or("").to_string())
}
