//! LabelForge Core - Barcode Catalog & Print Label Compositor
//!
//! # The Five Laws (Non-Negotiable)
//! 1. The CSV Is The Database
//! 2. Artifacts Before Rows
//! 3. Replace, Never Patch In Place
//! 4. Identifiers Are Derived Once
//! 5. Cleanup Is Best-Effort, Removal Is Not

pub mod barcode;
pub mod config;
pub mod label;
pub mod pipeline;
pub mod sanitize;
pub mod search;
pub mod store;

pub use barcode::{BarcodeImageProvider, BarcodeRenderer, FetchError, HttpBarcodeRenderer, SyntheticBarcodeRenderer};
pub use config::{Config, FetchSettings, LabelTemplate};
pub use label::{LabelCompositor, RenderError};
pub use pipeline::{
    CatalogError, CollectionPaths, DataLayout, DeleteOutcome, LabelPipeline, RegenerationReport,
};
pub use sanitize::{normalize_barcode, sanitize};
pub use store::{CsvStore, CustomBarcodeRecord, ItemRecord, StorageError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
