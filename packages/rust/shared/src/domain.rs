//! Domain normalization and niche-key derivation.
//!
//! Both functions produce the keys used for diversity tracking, so they must
//! be stable: the same input always maps to the same key.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A set of normalized domain strings.
pub type DomainSet = HashSet<String>;

/// Normalize a URL or bare domain into a comparison key.
///
/// Lowercases, strips any `http(s)://` schemes and leading `www.` labels, and
/// drops everything from the first `/`, `?`, `#`, or `:` (port) onward.
/// Missing or blank input yields the empty string. Idempotent.
pub fn normalize_domain(input: &str) -> String {
    let lowered = input.to_ascii_lowercase();

    let mut rest = lowered.as_str();
    loop {
        let before = rest;
        rest = rest.trim();
        if let Some(r) = rest.strip_prefix("https://") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("http://") {
            rest = r;
        }
        while let Some(r) = rest.strip_prefix("www.") {
            rest = r;
        }
        if rest == before {
            break;
        }
    }

    let host_end = rest.find(['/', '?', '#', ':']).unwrap_or(rest.len());

    rest[..host_end]
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Normalize an optional website, treating `None` as the empty domain.
pub fn normalize_website(website: Option<&str>) -> String {
    website.map(normalize_domain).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// NicheKey
// ---------------------------------------------------------------------------

/// Stable key clustering free-text queries that describe the same market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NicheKey(String);

/// Words that carry no market meaning in a discovery query.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "for", "of", "in", "on", "to", "with", "companies", "company",
    "startups", "startup", "businesses", "business", "firms", "providers", "top", "best",
];

/// Key used when a query has no meaningful tokens left.
const GENERAL_NICHE: &str = "general";

impl NicheKey {
    /// Derive the niche key for a free-text query.
    ///
    /// Case, punctuation, word order, stop-words, and simple plurals do not
    /// affect the result: "Logistics SaaS companies" and "saas for logistic"
    /// map to the same key.
    pub fn from_query(query: &str) -> Self {
        let lowered = query.to_lowercase();
        let mut tokens: Vec<String> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .filter(|t| !STOP_WORDS.contains(t))
            .map(singularize)
            .collect();

        tokens.sort();
        tokens.dedup();

        if tokens.is_empty() {
            Self(GENERAL_NICHE.to_string())
        } else {
            Self(tokens.join("-"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NicheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip a single trailing `s` from words longer than three characters.
///
/// Words ending in `ss`, `us`, `is`, or `as` (class, status, analysis, saas)
/// are left alone.
fn singularize(token: &str) -> String {
    let keep = ["ss", "us", "is", "as"];
    if token.chars().count() > 3 && token.ends_with('s') && !keep.iter().any(|k| token.ends_with(k)) {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}
