//! Structured answering: extracted constraints applied to the supply table
//! as an ordered filter pipeline.

use std::fmt;

use tracing::debug;

use super::extract::extract;
use super::render::render_rows;
use crate::matching::{best_match, normalize};
use crate::table::{distinct_values, SupplyTable, TableError, TableSource};
use crate::types::{Entity, QueryConstraints, SupplyRecord};

/// Default acceptance threshold for fuzzy matches.
pub const DEFAULT_ACCEPT_ABOVE: u8 = 80;

/// Result of a structured query. No-match conditions are variants, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Rows(Vec<SupplyRecord>),
    Count(usize),
    Rejected {
        entity: Entity,
        fragment: String,
        candidate: String,
        score: u8,
    },
    Empty,
    VocabularyEmpty(Entity),
    NoFragment,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Rows(rows) => match render_rows(rows) {
                Ok(table) => f.write_str(&table),
                Err(e) => write!(f, "Failed to render {} rows: {}", rows.len(), e),
            },
            Answer::Count(n) => write!(f, "Total number of entries in the supply log: {}", n),
            Answer::Rejected {
                entity,
                fragment,
                candidate,
                score,
            } => write!(
                f,
                "No {} matched '{}' (best: '{}', score={})",
                entity, fragment, candidate, score
            ),
            Answer::Empty => f.write_str("No matching results. Try refining your query."),
            Answer::VocabularyEmpty(entity) => {
                write!(f, "No {} names in the supply log to match against.", entity)
            }
            Answer::NoFragment => f.write_str("No hospital name found for details request."),
        }
    }
}

/// Row predicate from a numeric threshold or severity constraint.
///
/// These filters commute: any application order yields the same rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    MinQuantity(u64),
    MinPeoplePerWeek(u64),
    MinWastage(u64),
    Severity(String),
}

impl RowFilter {
    pub fn from_constraints(c: &QueryConstraints) -> Vec<RowFilter> {
        let mut filters = Vec::new();
        if let Some(n) = c.min_quantity {
            filters.push(RowFilter::MinQuantity(n));
        }
        if let Some(n) = c.min_people_per_week {
            filters.push(RowFilter::MinPeoplePerWeek(n));
        }
        if let Some(n) = c.min_wastage {
            filters.push(RowFilter::MinWastage(n));
        }
        if let Some(level) = &c.severity {
            filters.push(RowFilter::Severity(level.trim().to_lowercase()));
        }
        filters
    }

    pub fn keeps(&self, row: &SupplyRecord) -> bool {
        match self {
            RowFilter::MinQuantity(n) => row.quantity_supplied >= *n,
            RowFilter::MinPeoplePerWeek(n) => row.people_per_week >= *n,
            RowFilter::MinWastage(n) => row.weekly_wastage >= *n,
            RowFilter::Severity(level) => row.severity.trim().to_lowercase() == *level,
        }
    }
}

fn hospital_key(row: &SupplyRecord) -> String {
    normalize(&row.hospital_name)
}

fn supplier_key(row: &SupplyRecord) -> String {
    normalize(&row.supplier_name)
}

fn supply_key(row: &SupplyRecord) -> String {
    row.supply_name.to_lowercase()
}

#[derive(Debug, Clone, Copy)]
pub struct StructuredResolver {
    accept_above: u8,
}

impl Default for StructuredResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ACCEPT_ABOVE)
    }
}

impl StructuredResolver {
    pub fn new(accept_above: u8) -> Self {
        Self { accept_above }
    }

    pub fn accept_above(&self) -> u8 {
        self.accept_above
    }

    /// Extract constraints from `query` and resolve them against `table`.
    pub fn answer(&self, table: &SupplyTable, query: &str) -> Answer {
        let constraints = extract(query);
        debug!(?constraints, "Extracted constraints");
        self.resolve(table, &constraints)
    }

    pub fn resolve(&self, table: &SupplyTable, c: &QueryConstraints) -> Answer {
        match self.pipeline(table, c) {
            Ok(answer) | Err(answer) => answer,
        }
    }

    /// `Err` carries an answer that ends the pipeline early.
    fn pipeline(&self, table: &SupplyTable, c: &QueryConstraints) -> Result<Answer, Answer> {
        if c.entry_count {
            return Ok(Answer::Count(table.len()));
        }

        let mut rows: Vec<&SupplyRecord> = table.records().iter().collect();

        if let Some(details) = &c.hospital_details {
            let fragment = details.as_deref().ok_or(Answer::NoFragment)?;
            let hospital = self.match_entity(Entity::Hospital, fragment, &rows, hospital_key)?;
            debug!(%hospital, "Hospital details");
            let matched: Vec<SupplyRecord> = rows
                .into_iter()
                .filter(|r| hospital_key(r) == hospital)
                .cloned()
                .collect();
            return Ok(finish(matched));
        }

        if let Some(fragment) = &c.supplier {
            let supplier = self.match_entity(Entity::Supplier, fragment, &rows, supplier_key)?;
            rows.retain(|r| supplier_key(r) == supplier);
            debug!(%supplier, remaining = rows.len(), "Supplier filter");
        }

        if let Some(fragment) = &c.hospital {
            let hospital = self.match_entity(Entity::Hospital, fragment, &rows, hospital_key)?;
            rows.retain(|r| hospital_key(r) == hospital);
            if let Some(n) = c.last_n {
                let skip = rows.len().saturating_sub(n);
                rows.drain(..skip);
            }
            debug!(%hospital, last_n = ?c.last_n, remaining = rows.len(), "Hospital filter");
            if rows.is_empty() {
                return Err(Answer::Empty);
            }
        }

        if let Some(fragment) = &c.supply {
            let supply = self.match_entity(Entity::Supply, fragment, &rows, supply_key)?;
            rows.retain(|r| supply_key(r) == supply);
            debug!(%supply, remaining = rows.len(), "Supply filter");
        }

        for filter in RowFilter::from_constraints(c) {
            rows.retain(|r| filter.keeps(r));
            debug!(?filter, remaining = rows.len(), "Row filter");
        }

        Ok(finish(rows.into_iter().cloned().collect()))
    }

    /// Fuzzy-match `fragment` against the vocabulary of the current rows.
    fn match_entity(
        &self,
        entity: Entity,
        fragment: &str,
        rows: &[&SupplyRecord],
        key: fn(&SupplyRecord) -> String,
    ) -> Result<String, Answer> {
        let vocabulary = distinct_values(rows.iter().copied(), key);
        let fragment = normalize(fragment);
        let best = best_match(&fragment, &vocabulary).ok_or(Answer::VocabularyEmpty(entity))?;

        if best.accepted(self.accept_above) {
            debug!(%entity, %fragment, candidate = %best.candidate, score = best.score, "Match accepted");
            Ok(best.candidate)
        } else {
            debug!(%entity, %fragment, candidate = %best.candidate, score = best.score, "Match rejected");
            Err(Answer::Rejected {
                entity,
                fragment,
                candidate: best.candidate,
                score: best.score,
            })
        }
    }
}

fn finish(rows: Vec<SupplyRecord>) -> Answer {
    if rows.is_empty() {
        Answer::Empty
    } else {
        Answer::Rows(rows)
    }
}

/// Load the table fresh and answer one structured query.
pub fn answer_structured(
    source: &dyn TableSource,
    resolver: &StructuredResolver,
    query: &str,
) -> Result<Answer, TableError> {
    let table = source.load()?;
    Ok(resolver.answer(&table, query))
}
