//! URL slug helpers shared by organizations, workspaces and projects.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

/// Slugs longer than this are truncated before a suffix is appended.
pub const MAX_SLUG_LEN: usize = 50;

lazy_static! {
    static ref NON_SLUG_CHARS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    static ref VALID_SLUG: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Lowercases `input` and collapses every run of characters outside `[a-z0-9]`
/// into a single `-`. Returns `fallback` when nothing usable remains.
pub fn slugify(input: &str, fallback: &str) -> String {
    let lowered = input.trim().to_lowercase();
    let replaced = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let mut slug = replaced.trim_matches('-').to_string();

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }

    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= MAX_SLUG_LEN + 8 && VALID_SLUG.is_match(slug)
}

/// `base` for attempt 0, `base-1`, `base-2`, ... afterwards.
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Picks the first of `base`, `base-1`, `base-2`, ... that is not in `taken`.
pub fn next_available<S: AsRef<str>>(base: &str, taken: &[S]) -> String {
    let taken: HashSet<&str> = taken.iter().map(AsRef::as_ref).collect();
    (0..)
        .map(|attempt| with_suffix(base, attempt))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Acme Corp — R&D  ", "org"), "acme-corp-r-d");
        assert_eq!(slugify("Already-slugged", "org"), "already-slugged");
    }

    #[test]
    fn slugify_uses_fallback_for_symbols_only() {
        assert_eq!(slugify("!!!", "workspace"), "workspace");
        assert_eq!(slugify("", "project"), "project");
    }

    #[test]
    fn slugify_truncates_long_names() {
        let slug = slugify(&"a".repeat(80), "x");
        assert_eq!(slug.len(), MAX_SLUG_LEN);
    }

    #[test]
    fn next_available_skips_taken_suffixes() {
        let taken = vec!["web", "web-1", "web-3"];
        assert_eq!(next_available("web", &taken), "web-2");
        assert_eq!(next_available("api", &taken), "api");
    }

    #[test]
    fn valid_slug_rules() {
        assert!(is_valid_slug("mobile-app-2"));
        assert!(!is_valid_slug("Mobile"));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("double--dash"));
    }
}
