use std::sync::Arc;

use arrow_array::{Array, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{ArrowError, DataType, Field, Schema};

use crate::types::SupplyRecord;

/// Columns shown to the user, in display order.
pub const DISPLAY_COLUMNS: [&str; 7] = [
    "hospital_name",
    "supply_name",
    "supplier_name",
    "quantity_supplied",
    "weekly_wastage",
    "severity",
    "people_per_week",
];

fn display_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(DISPLAY_COLUMNS[0], DataType::Utf8, false),
        Field::new(DISPLAY_COLUMNS[1], DataType::Utf8, false),
        Field::new(DISPLAY_COLUMNS[2], DataType::Utf8, false),
        Field::new(DISPLAY_COLUMNS[3], DataType::UInt64, false),
        Field::new(DISPLAY_COLUMNS[4], DataType::UInt64, false),
        Field::new(DISPLAY_COLUMNS[5], DataType::Utf8, false),
        Field::new(DISPLAY_COLUMNS[6], DataType::UInt64, false),
    ]))
}

/// Build a record batch of the display columns.
pub fn to_record_batch(rows: &[SupplyRecord]) -> Result<RecordBatch, ArrowError> {
    let strings = |f: fn(&SupplyRecord) -> &str| {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>())) as Arc<dyn Array>
    };
    let numbers = |f: fn(&SupplyRecord) -> u64| {
        Arc::new(UInt64Array::from(rows.iter().map(f).collect::<Vec<_>>())) as Arc<dyn Array>
    };

    RecordBatch::try_new(
        display_schema(),
        vec![
            strings(|r| r.hospital_name.as_str()),
            strings(|r| r.supply_name.as_str()),
            strings(|r| r.supplier_name.as_str()),
            numbers(|r| r.quantity_supplied),
            numbers(|r| r.weekly_wastage),
            strings(|r| r.severity.as_str()),
            numbers(|r| r.people_per_week),
        ],
    )
}

/// Render rows as an ASCII table.
pub fn render_rows(rows: &[SupplyRecord]) -> Result<String, ArrowError> {
    let batch = to_record_batch(rows)?;
    Ok(arrow::util::pretty::pretty_format_batches(&[batch])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::fixtures;

    #[test]
    fn test_batch_has_display_columns_only() {
        let table = fixtures::sample_table();
        let batch = to_record_batch(table.records()).unwrap();
        assert_eq!(batch.num_rows(), table.len());
        assert_eq!(batch.num_columns(), DISPLAY_COLUMNS.len());
        let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, DISPLAY_COLUMNS);
    }

    #[test]
    fn test_rendered_table_contains_values_in_order() {
        let table = fixtures::sample_table();
        let text = render_rows(&table.records()[..2]).unwrap();
        assert!(text.contains("hospital_name"));
        assert!(text.contains("people_per_week"));
        let city = text.find("City Hospital").unwrap();
        let riverside = text.find("Riverside Hospital").unwrap();
        assert!(city < riverside);
        assert!(!text.contains(&table.records()[0].hashcode));
    }
}
