//! Catalog Synchronizer - Single Entry Point
//!
//! Keeps the tabular records and the filesystem artifacts from diverging.
//! CRITICAL ordering: on add, both artifacts are produced BEFORE the row is
//! appended. A failed fetch or render leaves the store untouched; at worst
//! an orphaned artifact file remains, which is non-corrupting and cleaned
//! up by the next regeneration.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::barcode::{BarcodeImageProvider, BarcodeRenderer, FetchError, HttpBarcodeRenderer};
use crate::config::Config;
use crate::label::{LabelCompositor, RenderError};
use crate::sanitize::{normalize_barcode, sanitize};
use crate::search;
use crate::store::{CsvStore, CustomBarcodeRecord, ItemRecord, StorageError, TabularRecord};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("missing required field: {0}")]
    Validation(&'static str),

    #[error("an entry with artifact id '{0}' already exists")]
    Duplicate(String),

    #[error("barcode fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("label rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("catalog storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Delete of an unknown entry is a reportable no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

/// Where one collection keeps its three pieces of state.
#[derive(Debug, Clone)]
pub struct CollectionPaths {
    pub store_path: PathBuf,
    pub barcode_dir: PathBuf,
    pub label_dir: PathBuf,
}

/// Filesystem layout for both collections.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub items: CollectionPaths,
    pub custom: CollectionPaths,
}

impl DataLayout {
    /// Conventional layout under a single data root.
    pub fn under(root: &Path) -> Self {
        Self {
            items: CollectionPaths {
                store_path: root.join("items.csv"),
                barcode_dir: root.join("barcode_images"),
                label_dir: root.join("labels"),
            },
            custom: CollectionPaths {
                store_path: root.join("custom_barcodes.csv"),
                barcode_dir: root.join("custom_barcode_images"),
                label_dir: root.join("custom_labels"),
            },
        }
    }
}

/// Both artifact locations for one record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPaths {
    pub barcode: PathBuf,
    pub label: PathBuf,
}

/// Per-row outcome of a bulk regeneration pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationReport {
    pub regenerated: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<RegenerationFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationFailure {
    pub display_name: String,
    pub reason: String,
}

struct Collection<T> {
    store: CsvStore<T>,
    barcode_dir: PathBuf,
    label_dir: PathBuf,
}

impl<T: TabularRecord> Collection<T> {
    fn prepare(paths: CollectionPaths) -> Result<Self, CatalogError> {
        std::fs::create_dir_all(&paths.barcode_dir).map_err(StorageError::Io)?;
        std::fs::create_dir_all(&paths.label_dir).map_err(StorageError::Io)?;
        if let Some(parent) = paths.store_path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
        let store = CsvStore::new(paths.store_path);
        store.ensure_initialized()?;
        Ok(Self {
            store,
            barcode_dir: paths.barcode_dir,
            label_dir: paths.label_dir,
        })
    }

    fn artifacts(&self, artifact_id: &str) -> ArtifactPaths {
        ArtifactPaths {
            barcode: BarcodeImageProvider::artifact_path(&self.barcode_dir, artifact_id),
            label: LabelCompositor::artifact_path(&self.label_dir, artifact_id),
        }
    }
}

/// The synchronizer - sole owner of record lifetime for both collections.
pub struct LabelPipeline {
    provider: BarcodeImageProvider,
    compositor: LabelCompositor,
    items: Collection<ItemRecord>,
    custom: Collection<CustomBarcodeRecord>,
    /// Serializes mutations; reads go lock-free against the last complete
    /// store file (replace is an atomic rename).
    write_lock: Mutex<()>,
}

impl LabelPipeline {
    /// Bootstrap directories and stores, resolve the template once, and
    /// wire the given renderer in.
    pub fn open(
        config: &Config,
        layout: DataLayout,
        renderer: Box<dyn BarcodeRenderer>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            provider: BarcodeImageProvider::new(renderer),
            compositor: LabelCompositor::new(&config.label)?,
            items: Collection::prepare(layout.items)?,
            custom: Collection::prepare(layout.custom)?,
            write_lock: Mutex::new(()),
        })
    }

    /// Production wiring: remote HTTP barcode rendering per `config.fetch`.
    pub fn open_http(config: &Config, layout: DataLayout) -> Result<Self, CatalogError> {
        let renderer = HttpBarcodeRenderer::new(&config.fetch)?;
        Self::open(config, layout, Box::new(renderer))
    }

    pub fn add_item(
        &self,
        display_name: &str,
        description: &str,
        barcode_value: &str,
    ) -> Result<ItemRecord, CatalogError> {
        let description = description.trim().to_string();
        self.add_to(&self.items, display_name, barcode_value, |name, barcode, id| {
            ItemRecord {
                display_name: name,
                description,
                barcode_value: barcode,
                artifact_id: id,
            }
        })
    }

    pub fn add_custom(
        &self,
        display_name: &str,
        barcode_value: &str,
    ) -> Result<CustomBarcodeRecord, CatalogError> {
        self.add_to(&self.custom, display_name, barcode_value, |name, barcode, id| {
            CustomBarcodeRecord {
                display_name: name,
                barcode_value: barcode,
                artifact_id: id,
            }
        })
    }

    pub fn delete_item(&self, display_name: &str) -> Result<DeleteOutcome, CatalogError> {
        self.delete_from(&self.items, display_name)
    }

    pub fn delete_custom(&self, display_name: &str) -> Result<DeleteOutcome, CatalogError> {
        self.delete_from(&self.custom, display_name)
    }

    pub fn search_items(&self, query: &str) -> Result<Vec<ItemRecord>, CatalogError> {
        let records = self.items.store.load_all()?;
        Ok(search::filter(&records, query).into_iter().cloned().collect())
    }

    pub fn search_custom(&self, query: &str) -> Result<Vec<CustomBarcodeRecord>, CatalogError> {
        let records = self.custom.store.load_all()?;
        Ok(search::filter(&records, query).into_iter().cloned().collect())
    }

    /// Empty the custom collection, removing every row's artifacts
    /// best-effort. Returns how many records were cleared.
    pub fn clear_custom(&self) -> Result<usize, CatalogError> {
        let _guard = self.lock();
        let records = self.custom.store.load_all()?;
        for record in &records {
            let paths = self.custom.artifacts(&record.artifact_id);
            remove_artifact(&paths.barcode);
            remove_artifact(&paths.label);
        }
        self.custom.store.replace_all(&[])?;
        Ok(records.len())
    }

    /// Re-produce both artifacts for every item row, continuing past
    /// per-row failures. Rows without a name or barcode are skipped.
    pub fn regenerate_items(&self) -> Result<RegenerationReport, CatalogError> {
        self.regenerate_in(&self.items)
    }

    pub fn regenerate_custom(&self) -> Result<RegenerationReport, CatalogError> {
        self.regenerate_in(&self.custom)
    }

    pub fn item_artifacts(&self, artifact_id: &str) -> ArtifactPaths {
        self.items.artifacts(artifact_id)
    }

    pub fn custom_artifacts(&self, artifact_id: &str) -> ArtifactPaths {
        self.custom.artifacts(artifact_id)
    }

    fn add_to<T, F>(
        &self,
        collection: &Collection<T>,
        display_name: &str,
        barcode_value: &str,
        build: F,
    ) -> Result<T, CatalogError>
    where
        T: TabularRecord + Clone,
        F: FnOnce(String, String, String) -> T,
    {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(CatalogError::Validation("display name"));
        }
        let barcode_value = barcode_value.trim();
        if barcode_value.is_empty() {
            return Err(CatalogError::Validation("barcode value"));
        }

        let artifact_id = sanitize(display_name);
        // Early duplicate rejection before any network work. Covers both a
        // re-added name and a distinct name colliding after sanitization.
        let collides = collection
            .store
            .load_all()?
            .iter()
            .any(|r| r.artifact_id() == artifact_id);
        if collides {
            return Err(CatalogError::Duplicate(artifact_id));
        }

        let normalized = normalize_barcode(barcode_value);

        // External side effects stay outside the write lock so a slow fetch
        // cannot stall unrelated mutations.
        let barcode_path =
            self.provider
                .fetch(&normalized, &artifact_id, &collection.barcode_dir)?;
        self.compositor
            .compose(&barcode_path, display_name, &artifact_id, &collection.label_dir)?;

        let record = build(display_name.to_string(), normalized, artifact_id.clone());

        let _guard = self.lock();
        let mut records = collection.store.load_all()?;
        // Re-check under the lock; a concurrent add may have won the race.
        if records.iter().any(|r| r.artifact_id() == artifact_id) {
            return Err(CatalogError::Duplicate(artifact_id));
        }
        records.push(record.clone());
        collection.store.replace_all(&records)?;
        Ok(record)
    }

    fn delete_from<T: TabularRecord>(
        &self,
        collection: &Collection<T>,
        display_name: &str,
    ) -> Result<DeleteOutcome, CatalogError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Ok(DeleteOutcome::NotFound);
        }
        let target_id = sanitize(display_name);

        let _guard = self.lock();
        let mut records = collection.store.load_all()?;
        let Some(pos) = records
            .iter()
            .position(|r| r.display_name() == display_name || r.artifact_id() == target_id)
        else {
            return Ok(DeleteOutcome::NotFound);
        };

        // Best-effort cleanup; a missing or unremovable artifact never
        // blocks row removal.
        let paths = collection.artifacts(records[pos].artifact_id());
        remove_artifact(&paths.barcode);
        remove_artifact(&paths.label);

        records.remove(pos);
        collection.store.replace_all(&records)?;
        Ok(DeleteOutcome::Removed)
    }

    fn regenerate_in<T: TabularRecord>(
        &self,
        collection: &Collection<T>,
    ) -> Result<RegenerationReport, CatalogError> {
        let records = collection.store.load_all()?;
        let mut report = RegenerationReport::default();

        for record in &records {
            let name = record.display_name();
            if name.is_empty() || record.barcode_value().is_empty() {
                report.skipped.push(if name.is_empty() {
                    record.barcode_value().to_string()
                } else {
                    name.to_string()
                });
                continue;
            }

            let result = self
                .provider
                .fetch(
                    record.barcode_value(),
                    record.artifact_id(),
                    &collection.barcode_dir,
                )
                .map_err(CatalogError::from)
                .and_then(|barcode_path| {
                    self.compositor
                        .compose(
                            &barcode_path,
                            name,
                            record.artifact_id(),
                            &collection.label_dir,
                        )
                        .map_err(CatalogError::from)
                });

            match result {
                Ok(_) => report.regenerated.push(name.to_string()),
                Err(e) => report.failed.push(RegenerationFailure {
                    display_name: name.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        Ok(report)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove artifact")
        }
    }
}
