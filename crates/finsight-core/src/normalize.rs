//! Company-name normalization for alias matching.
//!
//! Two views of a raw entity string: the literal form (uppercased,
//! punctuation-free — how tickers are matched) and the cleaned form
//! (NFKC-folded, lowercased, legal suffixes stripped — how company
//! names are matched).

use unicode_normalization::UnicodeNormalization;

/// Legal suffixes stripped when cleaning a company name.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "llc",
    "ltd",
    "limited",
    "plc",
    "co",
    "company",
    "holdings",
    "group",
];

/// Literal form: uppercase, punctuation dropped, whitespace collapsed.
/// `"  brk.b "` → `"BRKB"`; `"aapl"` → `"AAPL"`.
pub fn literal_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Cleaned form: NFKC fold, lowercase, punctuation to spaces, legal
/// suffixes dropped, whitespace collapsed.
/// `"Apple, Inc."` → `"apple"`; `"Alphabet Inc. Class A"` → `"alphabet class a"`.
pub fn cleaned_key(s: &str) -> String {
    let folded: String = s.nfkc().collect();
    let spaced: String = folded
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    spaced
        .split_whitespace()
        .filter(|t| !LEGAL_SUFFIXES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}
