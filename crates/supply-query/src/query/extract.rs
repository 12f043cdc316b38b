//! Constraint extraction.
//!
//! Every probe is an independent named rule over the lowercased query. Rules
//! never see each other's output; `extract` runs all of them and merges what
//! fired into one `QueryConstraints`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::QueryConstraints;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word regex is valid"));
static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:above|greater\s+than|more\s+than|over)\s+(\d+)").expect("quantity regex is valid")
});
static PEOPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpeople(?:\s+per\s+week)?\s*(?:(?:above|more\s+than|greater\s+than|over)\s*)?(\d+)")
        .expect("people regex is valid")
});
static WASTAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bwastage(?:\s+(?:above|more\s+than|greater\s+than|over))?\s*(\d+)")
        .expect("wastage regex is valid")
});
static SEVERITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bseverity\s*(?:(?:is|of|level|=)\s*)?(high|medium|low|\d+)\b")
        .expect("severity regex is valid")
});
static LAST_N_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:last|recent)\s+(\d+)").expect("last-n regex is valid"));

const ENTRY_COUNT_PHRASES: [&str; 7] = [
    "no of entries",
    "number of entries",
    "how many entries",
    "how many rows",
    "number of rows",
    "total entries",
    "total rows",
];

/// Punctuation that ends a clause. Apostrophes, hyphens and periods stay
/// inside names ("St. Mary's").
const CLAUSE_BREAKS: &[char] = &[',', ';', ':', '?', '!', '(', ')', '"'];

const HOSPITAL_LEAD_INS: [&str; 5] = ["in", "from", "at", "of", "by"];
/// Lead-ins that open a hospital name with no "hospital" token. "of" is left
/// out here since it introduces supply names ("orders of gloves").
const FALLBACK_LEAD_INS: [&str; 4] = ["in", "at", "from", "by"];
const DETAIL_ANCHORS: [&str; 7] = ["in", "of", "at", "from", "for", "about", "details"];
const SUPPLY_LEAD_INS: [&str; 2] = ["for", "of"];

/// Words that end a name fragment.
const QUALIFIERS: [&str; 20] = [
    "with", "where", "having", "quantity", "wastage", "severity", "people", "above", "greater",
    "more", "over", "last", "recent", "supplied", "and", "for", "in", "at", "from", "to",
];
const SUPPLIER_EXTRA_STOPS: [&str; 6] = ["of", "supplies", "provides", "provided", "is", "was"];
const SUPPLY_EXTRA_STOPS: [&str; 2] = ["by", "of"];
const HOSPITAL_EXTRA_STOPS: [&str; 2] = ["by", "of"];

const SUPPLIER_GUARD_WORDS: [&str; 3] = ["hospital", "bought", "received"];
const SUPPLY_FILLERS: [&str; 5] = [
    "supplies",
    "supply",
    "all supplies",
    "any supplies",
    "the supplies",
];

/// A single value a rule pulled out of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    EntryCount,
    /// `None` when the query asks for details but names no hospital.
    HospitalDetails(Option<String>),
    Hospital(String),
    Supplier(String),
    Supply(String),
    MinQuantity(u64),
    MinPeoplePerWeek(u64),
    MinWastage(u64),
    Severity(String),
    LastN(usize),
}

pub struct ExtractionRule {
    pub name: &'static str,
    pub probe: fn(&str) -> Option<Constraint>,
}

/// All probes. Order does not affect the merged result.
pub const RULES: &[ExtractionRule] = &[
    ExtractionRule { name: "entry_count", probe: entry_count },
    ExtractionRule { name: "hospital_details", probe: hospital_details },
    ExtractionRule { name: "hospital", probe: hospital },
    ExtractionRule { name: "supplier", probe: supplier },
    ExtractionRule { name: "supply", probe: supply },
    ExtractionRule { name: "quantity", probe: quantity },
    ExtractionRule { name: "people_per_week", probe: people_per_week },
    ExtractionRule { name: "wastage", probe: wastage },
    ExtractionRule { name: "severity", probe: severity },
    ExtractionRule { name: "last_n", probe: last_n },
];

/// Run every rule over `query` and merge the results.
pub fn extract(query: &str) -> QueryConstraints {
    let q = query.to_lowercase();
    let mut constraints = QueryConstraints::default();
    for rule in RULES {
        if let Some(constraint) = (rule.probe)(&q) {
            tracing::debug!(rule = rule.name, constraint = ?constraint, "Extraction rule fired");
            constraints.merge(constraint);
        }
    }
    constraints
}

impl QueryConstraints {
    pub fn merge(&mut self, constraint: Constraint) {
        match constraint {
            Constraint::EntryCount => self.entry_count = true,
            Constraint::HospitalDetails(fragment) => self.hospital_details = Some(fragment),
            Constraint::Hospital(fragment) => self.hospital = Some(fragment),
            Constraint::Supplier(fragment) => self.supplier = Some(fragment),
            Constraint::Supply(fragment) => self.supply = Some(fragment),
            Constraint::MinQuantity(n) => self.min_quantity = Some(n),
            Constraint::MinPeoplePerWeek(n) => self.min_people_per_week = Some(n),
            Constraint::MinWastage(n) => self.min_wastage = Some(n),
            Constraint::Severity(level) => self.severity = Some(level),
            Constraint::LastN(n) => self.last_n = Some(n),
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    word: &'a str,
    /// Clause punctuation separates this token from the previous one.
    break_before: bool,
}

fn tokenize(q: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut prev_end = 0;
    for m in WORD_RE.find_iter(q) {
        let gap = &q[prev_end..m.start()];
        tokens.push(Token {
            word: m.as_str(),
            break_before: !tokens.is_empty() && gap.contains(CLAUSE_BREAKS),
        });
        prev_end = m.end();
    }
    tokens
}

/// Words from `start` up to punctuation or a stop word.
fn fragment_from(tokens: &[Token<'_>], start: usize, stops: &[&[&str]]) -> Option<String> {
    let mut words = Vec::new();
    for (offset, token) in tokens.iter().skip(start).enumerate() {
        if offset > 0 && token.break_before {
            break;
        }
        if stops.iter().any(|list| list.contains(&token.word)) {
            break;
        }
        words.push(token.word);
    }
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn has_word(text: &str, word: &str) -> bool {
    text.split_whitespace().any(|w| w == word)
}

fn parse_number<T: std::str::FromStr>(re: &Regex, q: &str) -> Option<T> {
    re.captures(q)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn entry_count(q: &str) -> Option<Constraint> {
    ENTRY_COUNT_PHRASES
        .iter()
        .any(|p| q.contains(p))
        .then_some(Constraint::EntryCount)
}

/// Name anchored on the first standalone "hospital" token, walking back to the
/// nearest lead-in or the word "details".
fn hospital_details(q: &str) -> Option<Constraint> {
    if !(q.contains("details") && q.contains("hospital")) {
        return None;
    }

    let tokens = tokenize(q);
    let Some(anchor) = tokens.iter().position(|t| t.word == "hospital") else {
        return Some(Constraint::HospitalDetails(None));
    };

    let mut start = anchor;
    while start > 0
        && !tokens[start].break_before
        && !DETAIL_ANCHORS.contains(&tokens[start - 1].word)
    {
        start -= 1;
    }

    if start == anchor {
        return Some(Constraint::HospitalDetails(None));
    }

    let name = tokens[start..=anchor]
        .iter()
        .map(|t| t.word)
        .collect::<Vec<_>>()
        .join(" ");
    Some(Constraint::HospitalDetails(Some(name)))
}

fn is_hospital_lead_in(tokens: &[Token<'_>], i: usize) -> bool {
    let word = tokens[i].word;
    if !HOSPITAL_LEAD_INS.contains(&word) {
        return false;
    }
    // "supplied by" and "from supplier" introduce suppliers.
    if word == "by" && i > 0 && tokens[i - 1].word == "supplied" {
        return false;
    }
    if word == "from" && tokens.get(i + 1).is_some_and(|t| t.word == "supplier") {
        return false;
    }
    true
}

fn hospital(q: &str) -> Option<Constraint> {
    let tokens = tokenize(q);
    let lead_ins: Vec<usize> = (0..tokens.len())
        .filter(|&i| is_hospital_lead_in(&tokens, i))
        .collect();

    // Closest lead-in before a "hospital" token, same clause.
    if let Some(anchor) = tokens.iter().position(|t| t.word == "hospital") {
        let closest = lead_ins.iter().rev().find(|&&i| {
            i + 1 < anchor && tokens[i + 1..=anchor].iter().skip(1).all(|t| !t.break_before)
        });
        if let Some(&i) = closest {
            let name = tokens[i + 1..=anchor]
                .iter()
                .map(|t| t.word)
                .collect::<Vec<_>>()
                .join(" ");
            return Some(Constraint::Hospital(name));
        }
    }

    lead_ins
        .iter()
        .filter(|&&i| FALLBACK_LEAD_INS.contains(&tokens[i].word))
        .find_map(|&i| fragment_from(&tokens, i + 1, &[&QUALIFIERS, &HOSPITAL_EXTRA_STOPS]))
        .map(Constraint::Hospital)
}

fn supplier(q: &str) -> Option<Constraint> {
    let tokens = tokenize(q);
    let mut start = None;
    for i in 0..tokens.len() {
        let next = tokens.get(i + 1).map(|t| t.word);
        match (tokens[i].word, next) {
            ("supplied", Some("by")) | ("from", Some("supplier")) => {
                start = Some(i + 2);
                break;
            }
            ("supplier", _) => {
                start = Some(i + 1);
                break;
            }
            _ => {}
        }
    }

    let fragment = fragment_from(&tokens, start?, &[&QUALIFIERS, &SUPPLIER_EXTRA_STOPS])?;
    if SUPPLIER_GUARD_WORDS.iter().any(|w| fragment.contains(w)) {
        tracing::debug!(fragment = %fragment, "Supplier fragment names a hospital-side phrase, ignoring");
        return None;
    }
    Some(Constraint::Supplier(fragment))
}

fn supply(q: &str) -> Option<Constraint> {
    let tokens = tokenize(q);
    (0..tokens.len())
        .filter(|&i| SUPPLY_LEAD_INS.contains(&tokens[i].word))
        .filter_map(|i| fragment_from(&tokens, i + 1, &[&QUALIFIERS, &SUPPLY_EXTRA_STOPS]))
        .find(|fragment| !has_word(fragment, "hospital") && !SUPPLY_FILLERS.contains(&fragment.as_str()))
        .map(Constraint::Supply)
}

/// Comparator + number, unless the comparator belongs to a wastage or
/// people-per-week clause.
fn quantity(q: &str) -> Option<Constraint> {
    QUANTITY_RE
        .captures_iter(q)
        .filter(|c| {
            let before = q[..c.get(0).map_or(0, |m| m.start())].trim_end();
            !(before.ends_with("wastage") || before.ends_with("people") || before.ends_with("week"))
        })
        .find_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        .map(Constraint::MinQuantity)
}

fn people_per_week(q: &str) -> Option<Constraint> {
    parse_number(&PEOPLE_RE, q).map(Constraint::MinPeoplePerWeek)
}

fn wastage(q: &str) -> Option<Constraint> {
    parse_number(&WASTAGE_RE, q).map(Constraint::MinWastage)
}

fn severity(q: &str) -> Option<Constraint> {
    SEVERITY_RE
        .captures(q)
        .and_then(|c| c.get(1))
        .map(|m| Constraint::Severity(m.as_str().to_string()))
}

fn last_n(q: &str) -> Option<Constraint> {
    parse_number(&LAST_N_RE, q).map(Constraint::LastN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rule: fn(&str) -> Option<Constraint>, query: &str) -> Option<Constraint> {
        rule(&query.to_lowercase())
    }

    #[test]
    fn test_entry_count_phrases() {
        assert_eq!(run(entry_count, "What is the number of entries?"), Some(Constraint::EntryCount));
        assert_eq!(run(entry_count, "how many rows are there"), Some(Constraint::EntryCount));
        assert_eq!(run(entry_count, "total entries for city hospital"), Some(Constraint::EntryCount));
        assert_eq!(run(entry_count, "how many gloves"), None);
    }

    #[test]
    fn test_hospital_details_fragment() {
        assert_eq!(
            run(hospital_details, "details of Apollo Hospital"),
            Some(Constraint::HospitalDetails(Some("apollo hospital".into())))
        );
        assert_eq!(
            run(hospital_details, "show me details for St. Mary's Hospital above 100"),
            Some(Constraint::HospitalDetails(Some("st mary s hospital".into())))
        );
        assert_eq!(
            run(hospital_details, "give details green valley hospital"),
            Some(Constraint::HospitalDetails(Some("green valley hospital".into())))
        );
        assert_eq!(
            run(hospital_details, "details of all hospitals"),
            Some(Constraint::HospitalDetails(None))
        );
        assert_eq!(run(hospital_details, "supplies in city hospital"), None);
    }

    #[test]
    fn test_hospital_fragment_anchored_on_hospital_token() {
        assert_eq!(
            run(hospital, "last 5 transactions in City Hospital"),
            Some(Constraint::Hospital("city hospital".into()))
        );
        assert_eq!(
            run(hospital, "supplies of gloves in city hospital"),
            Some(Constraint::Hospital("city hospital".into()))
        );
        assert_eq!(
            run(hospital, "what did riverside hospital get"),
            None
        );
    }

    #[test]
    fn test_hospital_fragment_from_locative_lead_in() {
        assert_eq!(
            run(hospital, "supplies in Sunshine Hsptal"),
            Some(Constraint::Hospital("sunshine hsptal".into()))
        );
        assert_eq!(
            run(hospital, "supplies at sunshine hsptal with quantity above 100"),
            Some(Constraint::Hospital("sunshine hsptal".into()))
        );
        assert_eq!(run(hospital, "hospitals with quantity above 100"), None);
        assert_eq!(run(hospital, "quantity of syringes above 100"), None);
    }

    #[test]
    fn test_hospital_fragment_after_by() {
        assert_eq!(
            run(hospital, "gloves received by Apollo"),
            Some(Constraint::Hospital("apollo".into()))
        );
        assert_eq!(
            run(hospital, "supplies delivered to hospitals by Sunshin"),
            Some(Constraint::Hospital("sunshin".into()))
        );
        assert_eq!(run(hospital, "orders of gloves above 100"), None);
    }

    #[test]
    fn test_supplier_lead_ins_are_not_hospital_lead_ins() {
        assert_eq!(run(hospital, "gloves supplied by medsupply"), None);
        assert_eq!(run(hospital, "orders from supplier global med"), None);
    }

    #[test]
    fn test_supplier_fragment() {
        assert_eq!(
            run(supplier, "gloves supplied by MedSupply Inc. above 100"),
            Some(Constraint::Supplier("medsupply inc".into()))
        );
        assert_eq!(
            run(supplier, "orders from supplier Global Med in city hospital"),
            Some(Constraint::Supplier("global med".into()))
        );
        assert_eq!(
            run(supplier, "supplier careplus"),
            Some(Constraint::Supplier("careplus".into()))
        );
    }

    #[test]
    fn test_supplier_guard_rejects_hospital_side_phrases() {
        assert_eq!(run(supplier, "supplied by city hospital"), None);
        assert_eq!(run(supplier, "supplier bought gloves"), None);
        assert_eq!(run(supplier, "supplier received items"), None);
    }

    #[test]
    fn test_supply_fragment() {
        assert_eq!(
            run(supply, "quantity of surgical masks greater than 10"),
            Some(Constraint::Supply("surgical masks".into()))
        );
        assert_eq!(
            run(supply, "orders for gloves in city hospital"),
            Some(Constraint::Supply("gloves".into()))
        );
        assert_eq!(
            run(supply, "stock of oxygen tanks"),
            Some(Constraint::Supply("oxygen tanks".into()))
        );
    }

    #[test]
    fn test_supply_fillers_and_hospital_names_are_absent() {
        assert_eq!(run(supply, "list of all supplies in city hospital"), None);
        assert_eq!(run(supply, "quantity for supplies"), None);
        assert_eq!(run(supply, "details of apollo hospital"), None);
        assert_eq!(
            run(supply, "list of supplies for gloves"),
            Some(Constraint::Supply("gloves".into()))
        );
    }

    #[test]
    fn test_quantity_threshold() {
        assert_eq!(run(quantity, "hospitals with quantity above 100"), Some(Constraint::MinQuantity(100)));
        assert_eq!(run(quantity, "more than 25 gloves"), Some(Constraint::MinQuantity(25)));
        assert_eq!(run(quantity, "greater than 7"), Some(Constraint::MinQuantity(7)));
        assert_eq!(run(quantity, "wastage above 5"), None);
        assert_eq!(run(quantity, "people per week over 300"), None);
        assert_eq!(
            run(quantity, "wastage above 5 and quantity over 50"),
            Some(Constraint::MinQuantity(50))
        );
    }

    #[test]
    fn test_people_and_wastage_thresholds() {
        assert_eq!(run(people_per_week, "people per week above 400"), Some(Constraint::MinPeoplePerWeek(400)));
        assert_eq!(run(people_per_week, "people 250"), Some(Constraint::MinPeoplePerWeek(250)));
        assert_eq!(run(wastage, "wastage more than 10"), Some(Constraint::MinWastage(10)));
        assert_eq!(run(wastage, "wastage 3"), Some(Constraint::MinWastage(3)));
        assert_eq!(run(wastage, "wastage is high"), None);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(run(severity, "severity high"), Some(Constraint::Severity("high".into())));
        assert_eq!(run(severity, "Severity is Medium"), Some(Constraint::Severity("medium".into())));
        assert_eq!(run(severity, "severity 3 supplies"), Some(Constraint::Severity("3".into())));
        assert_eq!(run(severity, "severity unknown"), None);
    }

    #[test]
    fn test_last_n() {
        assert_eq!(run(last_n, "last 5 transactions"), Some(Constraint::LastN(5)));
        assert_eq!(run(last_n, "most recent 3 orders"), Some(Constraint::LastN(3)));
        assert_eq!(run(last_n, "last transactions"), None);
    }

    #[test]
    fn test_extract_merges_independent_rules() {
        let c = extract("Gloves supplied by MedSupply in City Hospital with quantity above 100 severity high");
        assert_eq!(c.supplier.as_deref(), Some("medsupply"));
        assert_eq!(c.hospital.as_deref(), Some("city hospital"));
        assert_eq!(c.min_quantity, Some(100));
        assert_eq!(c.severity.as_deref(), Some("high"));
        assert!(!c.entry_count);
        assert!(c.hospital_details.is_none());
    }

    #[test]
    fn test_extract_is_order_independent() {
        let query = "last 3 orders of gloves in city hospital with wastage above 2 and people above 100";
        let forward = extract(query);

        let q = query.to_lowercase();
        let mut reversed = QueryConstraints::default();
        for rule in RULES.iter().rev() {
            if let Some(c) = (rule.probe)(&q) {
                reversed.merge(c);
            }
        }
        assert_eq!(forward, reversed);
        assert_eq!(forward.last_n, Some(3));
        assert_eq!(forward.min_wastage, Some(2));
        assert_eq!(forward.min_people_per_week, Some(100));
        assert_eq!(forward.min_quantity, None);
    }
}
