//! Rule grammar parser
//!
//! Turns `key=value,key=value,...` text into a [`RawRule`]. Parsing is
//! best-effort: a token without `=` is skipped, an unknown key is ignored,
//! and field contents are not checked (see [`crate::validators`]).
//!
//! Recognised keys (case-sensitive):
//!
//! | key                     | field         |
//! |-------------------------|---------------|
//! | `action`                | action        |
//! | `source`                | source        |
//! | `destination`, `dest`   | destination   |
//! | `port`, `dport`         | port          |
//! | `protocol`              | protocol      |
//! | `interface`, `i`        | interface     |
//! | `comment`               | comment       |
//!
//! A value may be wrapped in one matching pair of `"` or `'`; inside the
//! quotes a `,` is literal and surrounding whitespace is kept. Unquoted
//! values are trimmed.

use crate::core::rule::RawRule;
use tracing::debug;

/// Parses a rule string. Never fails; an empty string yields an empty rule.
///
/// ```
/// use pfw::core::parser::parse;
///
/// let raw = parse("action=DROP, source=10.0.0.0/8, comment=\"ssh, lan\"");
/// assert_eq!(raw.action, "DROP");
/// assert_eq!(raw.source, "10.0.0.0/8");
/// assert_eq!(raw.comment, "ssh, lan");
/// ```
pub fn parse(text: &str) -> RawRule {
    let mut rule = RawRule::default();

    for token in split_tokens(text) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let Some((key, value)) = token.split_once('=') else {
            debug!("Skipping malformed rule token: {token:?}");
            continue;
        };
        let value = unquote(value.trim()).to_string();

        match key {
            "action" => rule.action = value,
            "source" => rule.source = value,
            "destination" | "dest" => rule.destination = value,
            "port" | "dport" => rule.port = value,
            "protocol" => rule.protocol = value,
            "interface" | "i" => rule.interface = value,
            "comment" => rule.comment = value,
            _ => debug!("Ignoring unknown rule key: {key:?}"),
        }
    }

    rule
}

/// Splits on commas that are not inside a quoted value.
///
/// A quote only opens when it is the first non-blank character after `=`,
/// so apostrophes inside unquoted text stay literal.
fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut after_equals = false;

    for (idx, c) in text.char_indices() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            ',' => {
                tokens.push(&text[start..idx]);
                start = idx + 1;
                after_equals = false;
            }
            '=' if !after_equals => after_equals = true,
            '"' | '\'' if after_equals && text[..idx].trim_end().ends_with('=') => {
                quote = Some(c);
            }
            _ => {}
        }
    }
    tokens.push(&text[start..]);
    tokens
}

/// Strips one matching pair of surrounding quotes.
fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
