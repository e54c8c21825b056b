//! Search Engine
//!
//! Read-only filtering over a catalog snapshot. Result order preserves the
//! collection's insertion order.

use crate::sanitize::normalize_barcode;
use crate::store::{CustomBarcodeRecord, ItemRecord};

/// What a record exposes to the matcher.
pub trait Searchable {
    fn display_name(&self) -> &str;
    /// Empty for collections without a description column.
    fn description(&self) -> &str;
    fn barcode_value(&self) -> &str;
}

impl Searchable for ItemRecord {
    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn barcode_value(&self) -> &str {
        &self.barcode_value
    }
}

impl Searchable for CustomBarcodeRecord {
    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn description(&self) -> &str {
        ""
    }
    fn barcode_value(&self) -> &str {
        &self.barcode_value
    }
}

/// Filter a snapshot by free-text query.
///
/// An empty query returns everything. A record matches when the query is a
/// case-insensitive substring of the name or description, when the
/// numerically normalized query equals the stored barcode value exactly, or
/// when the raw query is a substring of the raw barcode value.
pub fn filter<'a, T: Searchable>(records: &'a [T], query: &str) -> Vec<&'a T> {
    let query = query.trim();
    if query.is_empty() {
        return records.iter().collect();
    }

    let needle = query.to_lowercase();
    let normalized = query
        .parse::<f64>()
        .is_ok()
        .then(|| normalize_barcode(query));

    records
        .iter()
        .filter(|record| {
            record.display_name().to_lowercase().contains(&needle)
                || record.description().to_lowercase().contains(&needle)
                || normalized.as_deref() == Some(record.barcode_value())
                || record.barcode_value().contains(query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;

    fn item(name: &str, description: &str, barcode: &str) -> ItemRecord {
        ItemRecord {
            display_name: name.to_string(),
            description: description.to_string(),
            barcode_value: barcode.to_string(),
            artifact_id: sanitize(name),
        }
    }

    fn fixture() -> Vec<ItemRecord> {
        vec![
            item("Widget A", "small widget", "500.00"),
            item("Gadget B", "alternate name: doohickey", "ABC-1"),
            item("Widget C", "", "12345.00"),
        ]
    }

    #[test]
    fn test_empty_query_returns_all_in_order() {
        let records = fixture();
        let hits = filter(&records, "");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].display_name, "Widget A");
        assert_eq!(hits[2].display_name, "Widget C");
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let records = fixture();
        let hits = filter(&records, "widget");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_description_match() {
        let records = fixture();
        let hits = filter(&records, "doohickey");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Gadget B");
    }

    #[test]
    fn test_numeric_query_normalized_for_exact_barcode_match() {
        let records = fixture();
        // "500" normalizes to "500.00" which equals the stored value
        let hits = filter(&records, "500");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Widget A");
    }

    #[test]
    fn test_raw_substring_fallback_on_barcode() {
        let records = fixture();
        let hits = filter(&records, "BC-1");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name, "Gadget B");
    }

    #[test]
    fn test_barcode_fallback_compares_raw_bytes() {
        // Name and description match stays case-insensitive; the barcode
        // fallback does not fold case.
        let records = fixture();
        assert!(filter(&records, "abc").is_empty());
    }

    #[test]
    fn test_no_match_returns_empty() {
        let records = fixture();
        assert!(filter(&records, "zzz").is_empty());
    }
}
