//! Generality ranking for registry candidates.
//!
//! When a search returns several packages, the most *general* server for
//! the application should win: `chrome` over `chrome-google-search-api`.
//! The score is purely positional, not a probability.

use crate::domain::models::ToolServerDescriptor;

/// Keywords that mark a package as narrower than the app itself.
const DEPRIORITIZED_KEYWORDS: &[&str] = &[
    "api",
    "extension",
    "plugin",
    "specific",
    "manager",
    "tool",
    "client",
    "wrapper",
    "sdk",
    "helper",
    "integration",
    "connector",
];

/// Score one candidate against the normalised query.
pub fn generality_score(query: &str, candidate: &ToolServerDescriptor) -> i64 {
    let mut score: i64 = 0;
    let package = candidate.package_name.to_lowercase();

    // Strip the namespace, penalising scoped and org-qualified names.
    let stem = if let Some(rest) = package.strip_prefix('@') {
        score -= 150;
        rest.split_once('/').map_or(rest, |(_, s)| s)
    } else if let Some((_, rest)) = package.split_once('/') {
        score -= 100;
        rest
    } else {
        package.as_str()
    };

    // Match quality between stem and query.
    if stem == query {
        score += 1000;
    } else if stem.starts_with(&format!("{query}-")) || stem.starts_with(&format!("{query}_")) {
        score += 700;
    } else if stem.ends_with(&format!("-{query}")) || stem.ends_with(&format!("_{query}")) {
        score += 600;
    } else if stem.contains(query) {
        score += 300;
    }

    if candidate.server_name.to_lowercase() == query {
        score += 900;
    }

    if candidate.validated {
        score += 200;
    }

    for keyword in DEPRIORITIZED_KEYWORDS {
        if stem.contains(keyword) {
            score -= 200;
        }
    }

    // Position of the query within the stem's tokens: trailing qualifiers
    // after the query cost 50 each; a query buried as an infix costs 30
    // per extra token.
    let tokens: Vec<&str> = stem
        .split(['-', '_', '.', '/'])
        .filter(|t| !t.is_empty())
        .collect();
    let n = tokens.len();
    if let Some(k) = tokens.iter().position(|t| *t == query) {
        score -= 50 * (n - k - 1) as i64;
    } else if stem.contains(query) {
        score -= 30 * n.saturating_sub(1) as i64;
    }

    score -= 2 * (stem.len() as i64 - 8).max(0);
    score -= 10 * stem.chars().filter(|c| matches!(c, '-' | '_' | '.')).count() as i64;

    if has_version_suffix(stem) {
        score -= 50;
    }

    score
}

/// Pick the highest-scoring candidate; ties break lexicographically on
/// package name. `None` only for an empty slate.
pub fn pick_best(
    query: &str,
    mut candidates: Vec<ToolServerDescriptor>,
) -> Option<ToolServerDescriptor> {
    if candidates.len() < 2 {
        return candidates.pop();
    }
    candidates.sort_by(|a, b| {
        generality_score(query, b)
            .cmp(&generality_score(query, a))
            .then_with(|| a.package_name.cmp(&b.package_name))
    });
    candidates.into_iter().next()
}

/// Matches a trailing `-v?\d+` version marker, e.g. `server-2` or `api-v3`.
fn has_version_suffix(stem: &str) -> bool {
    let trimmed = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == stem.len() {
        return false;
    }
    let trimmed = trimmed.strip_suffix(['v', 'V']).unwrap_or(trimmed);
    trimmed.ends_with('-')
}
