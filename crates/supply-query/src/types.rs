use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One row of the supply log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyRecord {
    pub hospital_name: String,
    pub supply_name: String,
    pub supplier_name: String,
    pub quantity_supplied: u64,
    pub weekly_wastage: u64,
    /// Ordinal (1-5) or label (low/medium/high), kept as written in the log.
    pub severity: String,
    pub people_per_week: u64,
    #[serde(default)]
    pub hashcode: String,
}

impl SupplyRecord {
    /// Document text used both for hashing and for the retrieval index.
    pub fn content(&self) -> String {
        format!(
            "Hospital: {}, Supply: {}, Supplier: {}, Quantity: {}, Wastage: {}, Severity: {}, People/Week: {}",
            self.hospital_name,
            self.supply_name,
            self.supplier_name,
            self.quantity_supplied,
            self.weekly_wastage,
            self.severity,
            self.people_per_week
        )
    }

    /// Content-derived identifier. Stable for identical rows.
    pub fn compute_hashcode(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Assign a hashcode if the row has none. Existing hashcodes are never replaced.
    pub fn ensure_hashcode(&mut self) {
        if self.hashcode.trim().is_empty() {
            self.hashcode = self.compute_hashcode();
        }
    }
}

/// Entity columns that take part in fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Hospital,
    Supplier,
    Supply,
}

impl Entity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hospital => "hospital",
            Self::Supplier => "supplier",
            Self::Supply => "supply",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured constraints pulled out of a single query. Discarded after use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryConstraints {
    pub entry_count: bool,
    /// `Some(None)` when a details request names no hospital.
    pub hospital_details: Option<Option<String>>,
    pub hospital: Option<String>,
    pub supplier: Option<String>,
    pub supply: Option<String>,
    pub min_quantity: Option<u64>,
    pub min_people_per_week: Option<u64>,
    pub min_wastage: Option<u64>,
    pub severity: Option<String>,
    pub last_n: Option<usize>,
}

impl QueryConstraints {
    /// True when any probe other than the two intents fired.
    pub fn has_filters(&self) -> bool {
        self.hospital.is_some()
            || self.supplier.is_some()
            || self.supply.is_some()
            || self.min_quantity.is_some()
            || self.min_people_per_week.is_some()
            || self.min_wastage.is_some()
            || self.severity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SupplyRecord {
        SupplyRecord {
            hospital_name: "City Hospital".into(),
            supply_name: "Gloves".into(),
            supplier_name: "MedSupply Inc.".into(),
            quantity_supplied: 120,
            weekly_wastage: 4,
            severity: "high".into(),
            people_per_week: 300,
            hashcode: String::new(),
        }
    }

    #[test]
    fn test_content_lists_every_column() {
        let content = record().content();
        assert_eq!(
            content,
            "Hospital: City Hospital, Supply: Gloves, Supplier: MedSupply Inc., Quantity: 120, Wastage: 4, Severity: high, People/Week: 300"
        );
    }

    #[test]
    fn test_hashcode_is_stable_and_content_derived() {
        let a = record();
        let mut b = record();
        assert_eq!(a.compute_hashcode(), b.compute_hashcode());
        assert_eq!(a.compute_hashcode().len(), 64);

        b.quantity_supplied = 121;
        assert_ne!(a.compute_hashcode(), b.compute_hashcode());
    }

    #[test]
    fn test_ensure_hashcode_keeps_existing() {
        let mut r = record();
        r.hashcode = "abc123".into();
        r.ensure_hashcode();
        assert_eq!(r.hashcode, "abc123");

        let mut fresh = record();
        fresh.ensure_hashcode();
        assert_eq!(fresh.hashcode, fresh.compute_hashcode());
    }
}
