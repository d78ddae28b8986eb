//! Text helpers shared by the SQL-like adapters.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"--[^\n]*").unwrap());
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Drop `-- line` and `/* block */` comments.
pub(crate) fn strip_comments(source: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(source, " ");
    LINE_COMMENT.replace_all(&without_blocks, "").into_owned()
}

/// Split `source` on `separator` wherever it is outside quotes and
/// parentheses/angle brackets. Empty pieces are dropped; pieces are trimmed.
pub(crate) fn split_top_level(source: &str, separator: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for c in source.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '<' => {
                depth += 1;
                current.push(c);
            }
            ')' | '>' => {
                depth -= 1;
                current.push(c);
            }
            c if c == separator && depth == 0 => {
                let piece = current.trim();
                if !piece.is_empty() {
                    pieces.push(piece.to_string());
                }
                current.clear();
            }
            c => current.push(c),
        }
    }

    let piece = current.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
    pieces
}

/// Split `(body) trailing` at the parenthesis matching the leading one.
///
/// `source` must start with `(`; returns `None` when it does not or when the
/// parentheses never balance.
pub(crate) fn parenthesized(source: &str) -> Option<(&str, &str)> {
    if !source.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in source.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&source[1..i], source[i + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    None
}

/// First two words of a statement, for error messages.
pub(crate) fn statement_head(statement: &str) -> String {
    statement
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}
