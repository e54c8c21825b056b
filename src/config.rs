//! Configuration - Immutable, Resolved Once
//!
//! Replaces the original pile of module-level constants with one value
//! constructed at process start and passed explicitly into each component.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Physical label template plus font settings for the compositor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelTemplate {
    #[serde(default = "default_width_mm")]
    pub width_mm: f64,
    #[serde(default = "default_height_mm")]
    pub height_mm: f64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Margin around the barcode region.
    #[serde(default = "default_padding_mm")]
    pub padding_mm: f64,
    /// Fraction of canvas height reserved for the item name at the bottom.
    #[serde(default = "default_text_fraction")]
    pub text_height_fraction: f64,
    /// Horizontal margin the fitted text must respect.
    #[serde(default = "default_text_padding_h_mm")]
    pub text_padding_h_mm: f64,
    /// Minimum offset of the text below the text region's top edge.
    #[serde(default = "default_text_padding_v_mm")]
    pub text_padding_v_mm: f64,
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,
    #[serde(default = "default_base_font_size")]
    pub base_font_size: f32,
    /// Auto-fit floor; the size search never goes below this.
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,
    #[serde(default = "default_font_size_step")]
    pub font_size_step: f32,
}

fn default_width_mm() -> f64 { 50.0 }
fn default_height_mm() -> f64 { 25.0 }
fn default_dpi() -> u32 { 300 }
fn default_padding_mm() -> f64 { 0.5 }
fn default_text_fraction() -> f64 { 1.0 / 3.0 }
fn default_text_padding_h_mm() -> f64 { 2.0 }
fn default_text_padding_v_mm() -> f64 { 3.0 }
fn default_font_path() -> PathBuf { PathBuf::from("assets/DejaVuSansMono.ttf") }
fn default_base_font_size() -> f32 { 80.0 }
fn default_min_font_size() -> f32 { 8.0 }
fn default_font_size_step() -> f32 { 2.0 }

impl Default for LabelTemplate {
    fn default() -> Self {
        Self {
            width_mm: default_width_mm(),
            height_mm: default_height_mm(),
            dpi: default_dpi(),
            padding_mm: default_padding_mm(),
            text_height_fraction: default_text_fraction(),
            text_padding_h_mm: default_text_padding_h_mm(),
            text_padding_v_mm: default_text_padding_v_mm(),
            font_path: default_font_path(),
            base_font_size: default_base_font_size(),
            min_font_size: default_min_font_size(),
            font_size_step: default_font_size_step(),
        }
    }
}

impl LabelTemplate {
    /// Convert a physical length to pixels at this template's resolution.
    pub fn mm_to_px(&self, mm: f64) -> u32 {
        ((mm / 25.4) * self.dpi as f64).round() as u32
    }
}

/// Remote barcode rendering service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSettings {
    /// Base URL; the encoded barcode value is appended as one path segment.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://barcodeapi.org/api/code128".to_string()
}
fn default_timeout_secs() -> u64 { 10 }

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub label: LabelTemplate,
    #[serde(default)]
    pub fetch: FetchSettings,
}

impl Config {
    /// Load from a JSON file, filling omitted fields with defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_to_px_rounds() {
        let template = LabelTemplate::default();
        // 50 mm at 300 dpi = 590.55... px
        assert_eq!(template.mm_to_px(50.0), 591);
        assert_eq!(template.mm_to_px(25.0), 295);
        assert_eq!(template.mm_to_px(0.0), 0);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.label.dpi, 300);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert!((config.label.text_height_fraction - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_partial_override() {
        let config: Config =
            serde_json::from_str(r#"{"label": {"dpi": 203, "widthMm": 40}}"#).unwrap();
        assert_eq!(config.label.dpi, 203);
        assert_eq!(config.label.width_mm, 40.0);
        // Untouched fields keep their defaults
        assert_eq!(config.label.height_mm, 25.0);
    }
}
