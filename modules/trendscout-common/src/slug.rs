use regex::Regex;
use std::sync::LazyLock;

static NON_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HYPHENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").unwrap());

const MAX_SLUG_CHARS: usize = 60;

/// URL slug for a title: lowercase, `[a-z0-9-]` only, single hyphens, at
/// most 60 characters. Edge whitespace is hyphenated, not trimmed.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = NON_SLUG_RE.replace_all(&lower, "");
    let hyphenated = WHITESPACE_RE.replace_all(&stripped, "-");
    let collapsed = HYPHENS_RE.replace_all(&hyphenated, "-");
    collapsed.chars().take(MAX_SLUG_CHARS).collect()
}
