//! Barcode Image Provider
//!
//! Acquisition is behind the `BarcodeRenderer` capability trait so the
//! compositor and synchronizer can be exercised without network access.
//! Persistence is keyed by artifact id, not barcode value, so renaming an
//! item never forces a re-fetch.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{GrayImage, Luma};
use thiserror::Error;

use crate::config::FetchSettings;
use crate::sanitize::normalize_barcode;
use crate::store::write_atomic;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),

    #[error("barcode request failed for '{value}': {source}")]
    Request {
        value: String,
        source: reqwest::Error,
    },

    #[error("barcode service returned {status} for '{value}'")]
    Status {
        value: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to encode synthetic barcode: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to store barcode image: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces raw barcode image bytes for a normalized barcode value.
pub trait BarcodeRenderer: Send + Sync {
    fn render(&self, barcode_value: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production renderer: GET `{base}/{encoded-value}` with a bounded timeout.
pub struct HttpBarcodeRenderer {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpBarcodeRenderer {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl BarcodeRenderer for HttpBarcodeRenderer {
    fn render(&self, barcode_value: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(barcode_value));
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| FetchError::Request {
                value: barcode_value.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                value: barcode_value.to_string(),
                status,
            });
        }

        let bytes = response.bytes().map_err(|source| FetchError::Request {
            value: barcode_value.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Deterministic offline renderer: a synthetic stripe pattern derived from
/// the barcode value. Not scannable; exists for tests and air-gapped runs.
pub struct SyntheticBarcodeRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticBarcodeRenderer {
    fn default() -> Self {
        Self {
            width: 360,
            height: 120,
        }
    }
}

impl BarcodeRenderer for SyntheticBarcodeRenderer {
    fn render(&self, barcode_value: &str) -> Result<Vec<u8>, FetchError> {
        let mut img = GrayImage::from_pixel(self.width, self.height, Luma([255]));

        // FNV-1a over the value seeds the stripe sequence.
        let mut seed: u64 = 0xcbf29ce484222325;
        for byte in barcode_value.bytes() {
            seed ^= byte as u64;
            seed = seed.wrapping_mul(0x100000001b3);
        }

        let mut state = seed;
        let mut x = 0u32;
        while x < self.width {
            let bar_width = 1 + ((state >> 1) & 0b11) as u32;
            if state & 1 == 1 {
                for dx in 0..bar_width {
                    let px = x + dx;
                    if px >= self.width {
                        break;
                    }
                    for y in 0..self.height {
                        img.put_pixel(px, y, Luma([0]));
                    }
                }
            }
            x += bar_width;
            state = state.rotate_right(5) ^ seed;
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// Renders and persists barcode rasters under a collection's barcode
/// directory. Re-fetching the same artifact id overwrites in place.
pub struct BarcodeImageProvider {
    renderer: Box<dyn BarcodeRenderer>,
}

impl BarcodeImageProvider {
    pub fn new(renderer: Box<dyn BarcodeRenderer>) -> Self {
        Self { renderer }
    }

    /// Path a fetched raster lands at, without fetching.
    pub fn artifact_path(dir: &Path, artifact_id: &str) -> PathBuf {
        dir.join(format!("{artifact_id}.png"))
    }

    /// Normalize the barcode value, acquire its raster, and write it
    /// atomically; a failed fetch produces no partial file. Normalization
    /// is idempotent, so callers holding an already-normalized value pass
    /// through unchanged.
    pub fn fetch(
        &self,
        barcode_value: &str,
        artifact_id: &str,
        dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let normalized = normalize_barcode(barcode_value);
        let bytes = self.renderer.render(&normalized)?;
        let path = Self::artifact_path(dir, artifact_id);
        write_atomic(&path, &bytes)?;
        tracing::info!(artifact_id, path = %path.display(), "stored barcode raster");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_synthetic_renderer_deterministic() {
        let renderer = SyntheticBarcodeRenderer::default();
        let a = renderer.render("500.00").unwrap();
        let b = renderer.render("500.00").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, renderer.render("501.00").unwrap());
    }

    #[test]
    fn test_synthetic_renderer_produces_decodable_png() {
        let renderer = SyntheticBarcodeRenderer::default();
        let bytes = renderer.render("ABC-1").unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 360);
        assert_eq!(decoded.height(), 120);
    }

    #[test]
    fn test_fetch_persists_keyed_by_artifact_id() {
        let dir = TempDir::new().unwrap();
        let provider = BarcodeImageProvider::new(Box::new(SyntheticBarcodeRenderer::default()));

        let path = provider.fetch("500.00", "Widget_A", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Widget_A.png"));
        assert!(path.exists());

        // Overwrite is idempotent
        let again = provider.fetch("500.00", "Widget_A", dir.path()).unwrap();
        assert_eq!(path, again);
    }

    #[derive(Clone, Default)]
    struct RecordingRenderer {
        seen: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl BarcodeRenderer for RecordingRenderer {
        fn render(&self, barcode_value: &str) -> Result<Vec<u8>, FetchError> {
            self.seen.lock().unwrap().push(barcode_value.to_string());
            SyntheticBarcodeRenderer::default().render(barcode_value)
        }
    }

    #[test]
    fn test_fetch_normalizes_numeric_values_before_rendering() {
        let dir = TempDir::new().unwrap();
        let recorder = RecordingRenderer::default();
        let provider = BarcodeImageProvider::new(Box::new(recorder.clone()));

        provider.fetch("12345", "Widget_C", dir.path()).unwrap();
        provider.fetch("500.00", "Widget_A", dir.path()).unwrap();
        provider.fetch("ABC-1", "Gadget_B", dir.path()).unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["12345.00", "500.00", "ABC-1"]);
    }

    struct FailingRenderer;

    impl BarcodeRenderer for FailingRenderer {
        fn render(&self, barcode_value: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Status {
                value: barcode_value.to_string(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            })
        }
    }

    #[test]
    fn test_failed_fetch_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let provider = BarcodeImageProvider::new(Box::new(FailingRenderer));

        let err = provider.fetch("500.00", "Widget_A", dir.path());
        assert!(err.is_err());
        assert!(!dir.path().join("Widget_A.png").exists());
    }
}
