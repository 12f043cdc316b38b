use std::sync::LazyLock;

static NON_WORD_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\W+").expect("non-word regex is valid"));

/// Canonical form used for every fuzzy comparison: runs of non-word
/// characters collapse to one space, then trim and lowercase.
pub fn normalize(text: &str) -> String {
    NON_WORD_RE.replace_all(text, " ").trim().to_lowercase()
}
