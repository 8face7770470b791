//! Query name variants for registry searches.

use crate::domain::models::normalize_app_name;

/// Built-in aliases for common applications whose process name differs
/// from how registries list their tooling.
const ALIASES: &[(&str, &[&str])] = &[
    ("chrome", &["chrome", "chromium", "browser", "google-chrome"]),
    ("msedge", &["edge", "browser"]),
    ("firefox", &["firefox", "browser", "mozilla"]),
    ("code", &["vscode", "visual-studio-code"]),
    ("explorer", &["files", "file-manager"]),
    ("outlook", &["outlook", "email", "mail"]),
    ("slack", &["slack", "chat"]),
    ("spotify", &["spotify", "music"]),
    ("terminal", &["terminal", "shell"]),
];

/// Expand a raw process name into the search variants the cascade tries:
/// the normalised name, the name with a trailing `.exe` stripped, and any
/// built-in aliases. Deduplicated, order preserved.
pub fn name_variants(raw: &str) -> Vec<String> {
    let normalized = normalize_app_name(raw);
    let mut variants = vec![normalized.clone()];

    if let Some(stripped) = normalized.strip_suffix(".exe") {
        variants.push(stripped.to_string());
    }

    for (key, expansions) in ALIASES {
        if variants.iter().any(|v| v == key) {
            variants.extend(expansions.iter().map(|e| (*e).to_string()));
        }
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| !v.is_empty() && seen.insert(v.clone()));
    variants
}

/// The canonical query used for ranking: the first (most literal) variant.
pub fn canonical_query(raw: &str) -> String {
    let normalized = normalize_app_name(raw);
    normalized
        .strip_suffix(".exe")
        .map_or(normalized.clone(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exe_suffix_is_stripped_case_insensitively() {
        let variants = name_variants("Notepad.EXE");
        assert_eq!(variants[0], "notepad.exe");
        assert_eq!(variants[1], "notepad");
    }

    #[test]
    fn aliases_expand_after_stripping() {
        let variants = name_variants("chrome.exe");
        assert!(variants.contains(&"chromium".to_string()));
        assert!(variants.contains(&"browser".to_string()));
    }

    #[test]
    fn variants_are_deduplicated_in_order() {
        let variants = name_variants("chrome");
        let first = variants.iter().position(|v| v == "chrome").unwrap();
        assert_eq!(first, 0);
        assert_eq!(
            variants.iter().filter(|v| v.as_str() == "chrome").count(),
            1
        );
    }

    #[test]
    fn canonical_query_drops_exe() {
        assert_eq!(canonical_query("Code.exe"), "code");
        assert_eq!(canonical_query("notes"), "notes");
    }
}
