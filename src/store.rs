//! Catalog Store - CSV File as the Database
//!
//! Two operations only: `load_all` and `replace_all`. No row-level in-place
//! mutation exists; every replace goes through a temporary file in the same
//! directory followed by an atomic rename, so no observer ever sees a
//! half-written store.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::sanitize::sanitize;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed catalog file: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalog schema mismatch in {path}: expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// A row type stored in one CSV collection.
pub trait TabularRecord: Sized {
    /// Full column set, in order, written on every replace. Trailing
    /// entries beyond `SIGNIFICANT` are reserved/legacy and round-trip as
    /// empty strings.
    const COLUMNS: &'static [&'static str];

    /// How many leading columns a file must match to be accepted. Legacy
    /// files are allowed to name their reserved trailing columns anything.
    const SIGNIFICANT: usize;

    fn to_row(&self) -> Vec<String>;
    fn from_row(row: &csv::StringRecord) -> Self;

    fn display_name(&self) -> &str;
    fn barcode_value(&self) -> &str;
    fn artifact_id(&self) -> &str;
}

/// Primary catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub display_name: String,
    pub description: String,
    /// Stored exactly as normalized at creation; never mutated in place.
    pub barcode_value: String,
    /// Join key to the two artifact files. Derived from the display name
    /// once; re-derivation on load is deterministic and yields the same
    /// value.
    pub artifact_id: String,
}

impl TabularRecord for ItemRecord {
    const COLUMNS: &'static [&'static str] = &[
        "Item Name",
        "Item Description / Alternate Names",
        "Barcode Number",
        "Reserved 1",
        "Reserved 2",
    ];
    const SIGNIFICANT: usize = 3;

    fn to_row(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.description.clone(),
            self.barcode_value.clone(),
        ]
    }

    fn from_row(row: &csv::StringRecord) -> Self {
        let display_name = row.get(0).unwrap_or_default().trim().to_string();
        let artifact_id = sanitize(&display_name);
        Self {
            display_name,
            description: row.get(1).unwrap_or_default().trim().to_string(),
            barcode_value: row.get(2).unwrap_or_default().trim().to_string(),
            artifact_id,
        }
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn barcode_value(&self) -> &str {
        &self.barcode_value
    }
    fn artifact_id(&self) -> &str {
        &self.artifact_id
    }
}

/// Secondary collection: ad hoc barcodes without a description, with an
/// independent lifecycle (supports bulk clear).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomBarcodeRecord {
    pub display_name: String,
    pub barcode_value: String,
    pub artifact_id: String,
}

impl TabularRecord for CustomBarcodeRecord {
    const COLUMNS: &'static [&'static str] =
        &["Item Name", "Barcode Number", "Reserved 1", "Reserved 2"];
    const SIGNIFICANT: usize = 2;

    fn to_row(&self) -> Vec<String> {
        vec![self.display_name.clone(), self.barcode_value.clone()]
    }

    fn from_row(row: &csv::StringRecord) -> Self {
        let display_name = row.get(0).unwrap_or_default().trim().to_string();
        let artifact_id = sanitize(&display_name);
        Self {
            display_name,
            barcode_value: row.get(1).unwrap_or_default().trim().to_string(),
            artifact_id,
        }
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }
    fn barcode_value(&self) -> &str {
        &self.barcode_value
    }
    fn artifact_id(&self) -> &str {
        &self.artifact_id
    }
}

/// One CSV-backed collection.
pub struct CsvStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: TabularRecord> CsvStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a header-only file if the store does not exist yet.
    pub fn ensure_initialized(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            self.replace_all(&[])?;
        }
        Ok(())
    }

    pub fn load_all(&self) -> Result<Vec<T>, StorageError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let significant = &T::COLUMNS[..T::SIGNIFICANT];
        let found: Vec<&str> = headers.iter().take(T::SIGNIFICANT).collect();
        if found != *significant {
            return Err(StorageError::SchemaMismatch {
                path: self.path.clone(),
                expected: significant.iter().map(|s| s.to_string()).collect(),
                found: found.iter().map(|s| s.to_string()).collect(),
            });
        }

        let mut records = Vec::new();
        for row in reader.records() {
            records.push(T::from_row(&row?));
        }
        Ok(records)
    }

    /// Replace the whole collection atomically (temp file + rename).
    pub fn replace_all(&self, records: &[T]) -> Result<(), StorageError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(T::COLUMNS)?;
        for record in records {
            let mut row = record.to_row();
            row.resize(T::COLUMNS.len(), String::new());
            writer.write_record(&row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

/// Write bytes to `path` via a sibling temporary file and rename, never
/// leaving a partial file behind. Shared by the store and both artifact
/// writers.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(name: &str, description: &str, barcode: &str) -> ItemRecord {
        ItemRecord {
            display_name: name.to_string(),
            description: description.to_string(),
            barcode_value: barcode.to_string(),
            artifact_id: sanitize(name),
        }
    }

    #[test]
    fn test_ensure_initialized_writes_header_only_file() {
        let dir = TempDir::new().unwrap();
        let store: CsvStore<ItemRecord> = CsvStore::new(dir.path().join("items.csv"));
        store.ensure_initialized().unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("Item Name,"));
        assert_eq!(store.load_all().unwrap().len(), 0);
    }

    #[test]
    fn test_replace_and_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store: CsvStore<ItemRecord> = CsvStore::new(dir.path().join("items.csv"));

        let records = vec![
            item("Widget A", "first", "500.00"),
            item("Widget B", "", "ABC-1"),
            item("Widget C", "third, with comma", "7.00"),
        ];
        store.replace_all(&records).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(&path, "Name,Something Else,Code\nx,y,z\n").unwrap();

        let store: CsvStore<ItemRecord> = CsvStore::new(&path);
        let err = store.load_all().unwrap_err();
        assert!(matches!(err, StorageError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_legacy_trailing_columns_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.csv");
        std::fs::write(
            &path,
            "Item Name,Item Description / Alternate Names,Barcode Number,Qty,Price\nWidget A,old row,500.00,3,1.50\n",
        )
        .unwrap();

        let store: CsvStore<ItemRecord> = CsvStore::new(&path);
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].artifact_id, "Widget_A");
        assert_eq!(loaded[0].barcode_value, "500.00");
    }

    #[test]
    fn test_custom_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store: CsvStore<CustomBarcodeRecord> = CsvStore::new(dir.path().join("custom.csv"));
        let record = CustomBarcodeRecord {
            display_name: "Shelf Tag".to_string(),
            barcode_value: "42.00".to_string(),
            artifact_id: "Shelf_Tag".to_string(),
        };
        store.replace_all(std::slice::from_ref(&record)).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record]);
    }
}
