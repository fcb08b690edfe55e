use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// URL-safe slug: lower-case, every run outside `[a-z0-9]` becomes one hyphen,
/// no leading or trailing hyphen.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    NON_SLUG_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_collapses() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(slugify("  Multi   Space  "), "multi-space");
    }

    #[test]
    fn non_ascii_is_dropped() {
        assert_eq!(slugify("Café Über 2025"), "caf-ber-2025");
    }

    #[test]
    fn nothing_sluggable() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }
}
