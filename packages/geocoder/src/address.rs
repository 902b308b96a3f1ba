//! Address normalization for cache keys.
//!
//! Reporters type the same place many ways: `"123 Main St"`,
//! `"  123  MAIN st "`. All of these normalize to the same key so the
//! geocoding provider is only asked once.

/// Normalizes an address: trim, collapse runs of whitespace to a single
/// space, and lowercase.
///
/// Returns an empty string for blank input.
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
