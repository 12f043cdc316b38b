//! Approximate string matching on a 0-100 scale.
//!
//! The score is a weighted ratio: plain edit similarity, token-sorted and
//! token-set similarity for strings of comparable length, and best-window
//! (partial) variants when one string is much longer than the other.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

use super::normalize::normalize;

/// Scale applied to token-based scores.
const UNBASE_SCALE: f64 = 0.95;
/// Length ratio at which partial (best-window) scoring kicks in.
const PARTIAL_LENGTH_RATIO: f64 = 1.5;
/// Length ratio beyond which partial scores are heavily discounted.
const LONG_LENGTH_RATIO: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub candidate: String,
    pub score: u8,
}

impl MatchResult {
    /// Acceptance is strict: a score equal to the threshold is rejected.
    pub fn accepted(&self, threshold: u8) -> bool {
        self.score > threshold
    }
}

/// Best-scoring candidate for `fragment`. Ties go to the earliest candidate.
///
/// Returns `None` for an empty candidate list; callers report that as an
/// empty vocabulary rather than a failed match.
pub fn best_match(fragment: &str, candidates: &[String]) -> Option<MatchResult> {
    let mut best: Option<MatchResult> = None;
    for candidate in candidates {
        let score = weighted_ratio(fragment, candidate);
        let better = best.as_ref().map_or(true, |b| score > b.score);
        if better {
            best = Some(MatchResult {
                candidate: candidate.clone(),
                score,
            });
            if score == 100 {
                break;
            }
        }
    }
    best
}

/// Weighted similarity of two strings after normalization, 0-100.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let p1 = normalize(a);
    let p2 = normalize(b);
    if p1.is_empty() || p2.is_empty() {
        return 0;
    }

    let base = ratio(&p1, &p2);
    let (len1, len2) = (p1.chars().count() as f64, p2.chars().count() as f64);
    let len_ratio = len1.max(len2) / len1.min(len2);

    let score = if len_ratio < PARTIAL_LENGTH_RATIO {
        base.max(token_sort_ratio(&p1, &p2) * UNBASE_SCALE)
            .max(token_set_ratio(&p1, &p2) * UNBASE_SCALE)
    } else {
        let partial_scale = if len_ratio < LONG_LENGTH_RATIO { 0.9 } else { 0.6 };
        base.max(partial_ratio(&p1, &p2) * partial_scale)
            .max(partial_token_sort_ratio(&p1, &p2) * UNBASE_SCALE * partial_scale)
            .max(partial_token_set_ratio(&p1, &p2) * UNBASE_SCALE * partial_scale)
    };

    score.round().clamp(0.0, 100.0) as u8
}

/// Edit similarity scaled to 0-100.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    100.0 * normalized_levenshtein(a, b)
}

/// Best `ratio` of the shorter string against every equal-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if short.is_empty() {
        return 0.0;
    }
    if long.contains(short) {
        return 100.0;
    }

    let long_chars: Vec<char> = long.chars().collect();
    let width = short.chars().count();
    let mut best = 0.0_f64;
    for start in 0..=(long_chars.len() - width) {
        let window: String = long_chars[start..start + width].iter().collect();
        best = best.max(ratio(short, &window));
    }
    best
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, ratio)
}

fn partial_token_sort_ratio(a: &str, b: &str) -> f64 {
    partial_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn partial_token_set_ratio(a: &str, b: &str) -> f64 {
    token_set_with(a, b, partial_ratio)
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Compares the shared tokens against each side's full token set.
fn token_set_with(a: &str, b: &str, scorer: fn(&str, &str) -> f64) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection = join(set_a.intersection(&set_b));
    let rest_a = join(set_a.difference(&set_b));
    let rest_b = join(set_b.difference(&set_a));

    let combined_a = format!("{} {}", intersection, rest_a).trim().to_string();
    let combined_b = format!("{} {}", intersection, rest_b).trim().to_string();

    scorer(&intersection, &combined_a)
        .max(scorer(&intersection, &combined_b))
        .max(scorer(&combined_a, &combined_b))
}

fn join<S: AsRef<str>>(tokens: impl Iterator<Item = S>) -> String {
    tokens
        .map(|t| t.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| normalize(n)).collect()
    }

    #[test]
    fn test_exact_match_scores_100() {
        let candidates = vocab(&["City Hospital", "Riverside Hospital", "Sunshine Hospital"]);
        for c in &candidates {
            let m = best_match(c, &candidates).unwrap();
            assert_eq!(m.candidate, *c);
            assert_eq!(m.score, 100);
        }
    }

    #[test]
    fn test_misspelling_scores_88() {
        assert_eq!(weighted_ratio("sunshine hsptal", "sunshine hospital"), 88);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            ("sunshine hsptal", "sunshine hospital"),
            ("apollo", "apollo hospital"),
            ("global med", "medsupply inc"),
        ];
        for (a, b) in pairs {
            assert_eq!(weighted_ratio(a, b), weighted_ratio(b, a));
        }
    }

    #[test]
    fn test_partial_match_for_short_fragment() {
        // "apollo" is a whole window of "apollo hospital": 100 * 0.9.
        assert_eq!(weighted_ratio("apollo", "apollo hospital"), 90);
    }

    #[test]
    fn test_token_order_is_discounted_not_ignored() {
        let score = weighted_ratio("hospital city", "city hospital");
        assert_eq!(score, 95);
    }

    #[test]
    fn test_unrelated_strings_score_low() {
        assert!(weighted_ratio("apollo", "riverside hospital") <= 80);
        assert!(weighted_ratio("xyz clinic", "city hospital") <= 80);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(weighted_ratio("", "city hospital"), 0);
        assert_eq!(weighted_ratio("city hospital", "  ?? "), 0);
    }

    #[test]
    fn test_best_match_ties_go_to_first_candidate() {
        let candidates = vec!["gloves".to_string(), "gloves".to_string(), "masks".to_string()];
        let m = best_match("gloves", &candidates).unwrap();
        assert_eq!(m.candidate, "gloves");

        let candidates = vec!["glove a".to_string(), "glove b".to_string()];
        let first = best_match("glove", &candidates).unwrap();
        assert_eq!(first.candidate, "glove a");
    }

    #[test]
    fn test_best_match_empty_vocabulary() {
        assert!(best_match("city hospital", &[]).is_none());
    }

    #[test]
    fn test_acceptance_is_strict() {
        let m = MatchResult {
            candidate: "x".into(),
            score: 80,
        };
        assert!(!m.accepted(80));
        assert!(MatchResult { score: 81, ..m }.accepted(80));
    }
}
