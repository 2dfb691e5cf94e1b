//! Expression normalisation and tokenising.

use crate::domain::TimeUnit;

/// Keep ASCII letters, digits and spaces; upper-case; collapse runs of spaces.
///
/// `"1 day at 14:30:00"` becomes `"1 DAY AT 143000"`.
pub(crate) fn normalize(expression: &str) -> String {
    let cleaned: String = expression
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_uppercase())
            } else if c.is_whitespace() {
                Some(' ')
            } else {
                None
            }
        })
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalise, then split into tokens, prefixing an implicit `1` when the
/// expression opens with a bare unit word (`"DAY"` means `"1 DAY"`).
pub(crate) fn tokenize(expression: &str) -> Vec<String> {
    let normalized = normalize(expression);
    let mut tokens: Vec<String> = normalized.split_whitespace().map(String::from).collect();

    if tokens
        .first()
        .is_some_and(|first| TimeUnit::from_word(first).is_some())
    {
        tokens.insert(0, "1".to_string());
    }
    tokens
}
