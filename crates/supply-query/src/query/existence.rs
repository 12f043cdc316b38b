use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::matching::{best_match, normalize};
use crate::table::SupplyTable;

static EXISTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:is\s+there\b\s*)?(?:(?:a|an|the)\b\s*)?(?:hospital\s+(?:named|called)\b\s*)?(.*)$")
        .expect("existence regex is valid")
});

/// Answer to "does hospital X exist". Both outcomes report the best candidate and score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceAnswer {
    Found { candidate: String, score: u8 },
    NotFound { fragment: String, candidate: String, score: u8 },
    NoFragment,
    VocabularyEmpty,
}

impl ExistenceAnswer {
    pub fn exists(&self) -> bool {
        matches!(self, ExistenceAnswer::Found { .. })
    }
}

impl fmt::Display for ExistenceAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExistenceAnswer::Found { candidate, score } => {
                write!(f, "Hospital '{}' found (score={}).", candidate, score)
            }
            ExistenceAnswer::NotFound {
                fragment,
                candidate,
                score,
            } => write!(
                f,
                "No hospital matched '{}' (best: '{}', score={})",
                fragment, candidate, score
            ),
            ExistenceAnswer::NoFragment => f.write_str("No hospital name found."),
            ExistenceAnswer::VocabularyEmpty => {
                f.write_str("No hospital names in the supply log to match against.")
            }
        }
    }
}

/// Normalized hospital fragment of an existence question, if any.
pub fn existence_fragment(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    let raw = EXISTENCE_RE
        .captures(&lowered)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());
    let fragment = normalize(raw);
    (!fragment.is_empty()).then_some(fragment)
}

#[derive(Debug, Clone, Copy)]
pub struct ExistenceChecker {
    accept_above: u8,
}

impl ExistenceChecker {
    pub fn new(accept_above: u8) -> Self {
        Self { accept_above }
    }

    pub fn check(&self, table: &SupplyTable, query: &str) -> ExistenceAnswer {
        let Some(fragment) = existence_fragment(query) else {
            return ExistenceAnswer::NoFragment;
        };
        let vocabulary = table.distinct(|r| normalize(&r.hospital_name));
        let Some(best) = best_match(&fragment, &vocabulary) else {
            return ExistenceAnswer::VocabularyEmpty;
        };

        tracing::debug!(%fragment, candidate = %best.candidate, score = best.score, "Existence check");
        if best.accepted(self.accept_above) {
            ExistenceAnswer::Found {
                candidate: best.candidate,
                score: best.score,
            }
        } else {
            ExistenceAnswer::NotFound {
                fragment,
                candidate: best.candidate,
                score: best.score,
            }
        }
    }
}
