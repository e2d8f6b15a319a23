//! Ticker universe parsing.

use std::collections::HashSet;

const HEADER_TOKENS: &[&str] = &["SYMBOL", "SYMBOLS", "TICKER", "TICKERS"];

/// Trim and uppercase a symbol. `None` when empty, starting with `.`, or
/// containing characters outside `A-Z 0-9 . - ^`.
///
/// The result doubles as a snapshot file stem, so it never holds a path
/// separator.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || symbol.len() > 12 || symbol.starts_with('.') {
        return None;
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));
    valid.then_some(symbol)
}

/// Parse a ticker list separated by commas, whitespace or newlines.
///
/// `#` starts a comment running to end of line. Header tokens and invalid
/// symbols are dropped; duplicates keep their first position.
pub fn parse_tickers(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for line in raw.lines() {
        let line = line.split('#').next().unwrap_or_default();
        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            let Some(symbol) = normalize_symbol(token) else {
                continue;
            };
            if HEADER_TOKENS.contains(&symbol.as_str()) {
                continue;
            }
            if seen.insert(symbol.clone()) {
                out.push(symbol);
            }
        }
    }
    out
}
