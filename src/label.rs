//! Label Compositor
//!
//! Lays a barcode raster and an item name onto a fixed-size canvas resolved
//! from a physical template (mm + DPI). The barcode keeps its aspect ratio
//! and is never distorted; the name is auto-fit by a bounded font-size
//! search with an explicit floor.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::imageops::FilterType;
use image::{GrayImage, Luma};
use thiserror::Error;

use crate::config::LabelTemplate;
use crate::store::write_atomic;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font resource {path} could not be loaded: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("degenerate label geometry: {0}")]
    DegenerateGeometry(String),

    #[error("unreadable barcode raster {path}: {source}")]
    BarcodeRaster {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("'{text}' does not fit the label at minimum font size {min_size}")]
    TextOverflow { text: String, min_size: f32 },

    #[error("failed to encode label: {0}")]
    Encode(image::ImageError),

    #[error("failed to write label: {0}")]
    Io(#[from] std::io::Error),
}

/// Pixel geometry resolved once from the physical template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    /// Height of the reserved bottom text region.
    pub text_height: u32,
    pub text_pad_h: u32,
    pub text_pad_v: u32,
    /// Box available to the barcode in the top region.
    pub barcode_box_w: u32,
    pub barcode_box_h: u32,
}

impl Geometry {
    pub fn resolve(template: &LabelTemplate) -> Result<Self, RenderError> {
        let width = template.mm_to_px(template.width_mm);
        let height = template.mm_to_px(template.height_mm);
        let padding = template.mm_to_px(template.padding_mm);
        let text_height = (height as f64 * template.text_height_fraction) as u32;
        let text_pad_h = template.mm_to_px(template.text_padding_h_mm);
        let text_pad_v = template.mm_to_px(template.text_padding_v_mm);

        let barcode_box_w = width
            .checked_sub(2 * padding)
            .filter(|w| *w > 0)
            .ok_or_else(|| {
                RenderError::DegenerateGeometry(format!(
                    "canvas width {width}px leaves no room after {padding}px padding"
                ))
            })?;
        let barcode_box_h = height
            .checked_sub(text_height)
            .and_then(|h| h.checked_sub(2 * padding))
            .filter(|h| *h > 0)
            .ok_or_else(|| {
                RenderError::DegenerateGeometry(format!(
                    "canvas height {height}px leaves no barcode region above the text"
                ))
            })?;
        if width.checked_sub(2 * text_pad_h).filter(|w| *w > 0).is_none() {
            return Err(RenderError::DegenerateGeometry(format!(
                "text margin {text_pad_h}px exceeds canvas width {width}px"
            )));
        }

        Ok(Self {
            width,
            height,
            padding,
            text_height,
            text_pad_h,
            text_pad_v,
            barcode_box_w,
            barcode_box_h,
        })
    }
}

/// Bounded font-size search: decrement from `base` by `step` until
/// `measure(size)` fits in `max_width` or the `min` floor is reached.
/// Returns `None` when even the floor size does not fit.
pub(crate) fn fit_font_size(
    base: f32,
    min: f32,
    step: f32,
    max_width: f32,
    measure: impl Fn(f32) -> f32,
) -> Option<f32> {
    let mut size = base.max(min);
    loop {
        if measure(size) <= max_width {
            return Some(size);
        }
        if size <= min {
            return None;
        }
        size = (size - step).max(min);
    }
}

fn text_width(font: &FontVec, size: f32, text: &str) -> f32 {
    let scaled = font.as_scaled(PxScale::from(size));
    let mut width = 0.0;
    let mut prev: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    width
}

#[derive(Debug)]
pub struct LabelCompositor {
    geometry: Geometry,
    font: FontVec,
    base_font_size: f32,
    min_font_size: f32,
    font_size_step: f32,
}

impl LabelCompositor {
    pub fn new(template: &LabelTemplate) -> Result<Self, RenderError> {
        let geometry = Geometry::resolve(template)?;

        if template.min_font_size <= 0.0
            || template.font_size_step <= 0.0
            || template.base_font_size < template.min_font_size
        {
            return Err(RenderError::DegenerateGeometry(format!(
                "font sizes base={} min={} step={} do not describe a bounded search",
                template.base_font_size, template.min_font_size, template.font_size_step
            )));
        }

        let bytes = std::fs::read(&template.font_path).map_err(|e| RenderError::Font {
            path: template.font_path.clone(),
            reason: e.to_string(),
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| RenderError::Font {
            path: template.font_path.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            geometry,
            font,
            base_font_size: template.base_font_size,
            min_font_size: template.min_font_size,
            font_size_step: template.font_size_step,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Path a composed label lands at, without composing.
    pub fn artifact_path(dir: &Path, artifact_id: &str) -> PathBuf {
        dir.join(format!("{artifact_id}_label.png"))
    }

    /// Compose barcode + name into the label canvas and persist it
    /// atomically under `out_dir`, keyed by artifact id.
    pub fn compose(
        &self,
        barcode_path: &Path,
        display_name: &str,
        artifact_id: &str,
        out_dir: &Path,
    ) -> Result<PathBuf, RenderError> {
        let barcode = image::open(barcode_path)
            .map_err(|source| RenderError::BarcodeRaster {
                path: barcode_path.to_path_buf(),
                source,
            })?
            .into_luma8();

        let g = &self.geometry;
        let mut canvas = GrayImage::from_pixel(g.width, g.height, Luma([255]));
        self.paste_barcode(&mut canvas, &barcode);
        self.draw_name(&mut canvas, display_name)?;

        let path = Self::artifact_path(out_dir, artifact_id);
        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(RenderError::Encode)?;
        write_atomic(&path, &bytes)?;
        tracing::info!(artifact_id, path = %path.display(), "composed label");
        Ok(path)
    }

    /// Isotropic fit into the top barcode box, centered horizontally and
    /// flush to the top padding, thresholded to black/white.
    fn paste_barcode(&self, canvas: &mut GrayImage, barcode: &GrayImage) {
        let g = &self.geometry;
        let scale = f64::min(
            g.barcode_box_w as f64 / barcode.width() as f64,
            g.barcode_box_h as f64 / barcode.height() as f64,
        );
        let new_w = ((barcode.width() as f64 * scale).round() as u32)
            .clamp(1, g.barcode_box_w);
        let new_h = ((barcode.height() as f64 * scale).round() as u32)
            .clamp(1, g.barcode_box_h);
        let resized = image::imageops::resize(barcode, new_w, new_h, FilterType::Lanczos3);

        let x0 = (g.width - new_w) / 2;
        let y0 = g.padding;
        for (x, y, pixel) in resized.enumerate_pixels() {
            let value = if pixel[0] < 128 { 0 } else { 255 };
            canvas.put_pixel(x0 + x, y0 + y, Luma([value]));
        }
    }

    /// Auto-fit the name and draw it centered in the bottom text region.
    fn draw_name(&self, canvas: &mut GrayImage, text: &str) -> Result<(), RenderError> {
        let g = &self.geometry;
        let max_width = (g.width - 2 * g.text_pad_h) as f32;

        let size = fit_font_size(
            self.base_font_size,
            self.min_font_size,
            self.font_size_step,
            max_width,
            |s| text_width(&self.font, s, text),
        )
        .ok_or_else(|| RenderError::TextOverflow {
            text: text.to_string(),
            min_size: self.min_font_size,
        })?;

        let scaled = self.font.as_scaled(PxScale::from(size));
        let fitted_width = text_width(&self.font, size, text);
        let text_h = scaled.ascent() - scaled.descent();

        let text_x = ((g.width as f32 - fitted_width) / 2.0).max(0.0);
        let region_top = (g.height - g.text_height) as f32;
        let centered_y = region_top + (g.text_height as f32 - text_h) / 2.0;
        let text_y = centered_y.max(region_top + g.text_pad_v as f32);
        let baseline = text_y + scaled.ascent();

        let mut caret_x = text_x;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = prev {
                caret_x += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(size, point(caret_x, baseline));
            caret_x += scaled.h_advance(id);
            prev = Some(id);

            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    if coverage > 0.5
                        && px >= 0
                        && py >= 0
                        && (px as u32) < canvas.width()
                        && (py as u32) < canvas.height()
                    {
                        canvas.put_pixel(px as u32, py as u32, Luma([0]));
                    }
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_resolves_default_template() {
        let g = Geometry::resolve(&LabelTemplate::default()).unwrap();
        // 50x25 mm at 300 dpi
        assert_eq!(g.width, 591);
        assert_eq!(g.height, 295);
        assert_eq!(g.text_height, 98);
        assert!(g.barcode_box_w > 0 && g.barcode_box_h > 0);
        assert_eq!(g.barcode_box_w, g.width - 2 * g.padding);
    }

    #[test]
    fn test_geometry_rejects_degenerate_canvas() {
        let template = LabelTemplate {
            height_mm: 1.0,
            text_height_fraction: 0.9,
            ..Default::default()
        };
        let err = Geometry::resolve(&template).unwrap_err();
        assert!(matches!(err, RenderError::DegenerateGeometry(_)));
    }

    #[test]
    fn test_geometry_rejects_oversized_padding() {
        let template = LabelTemplate {
            padding_mm: 30.0,
            ..Default::default()
        };
        assert!(Geometry::resolve(&template).is_err());
    }

    #[test]
    fn test_fit_returns_base_when_it_fits() {
        let fitted = fit_font_size(80.0, 8.0, 2.0, 1000.0, |s| s * 2.0);
        assert_eq!(fitted, Some(80.0));
    }

    #[test]
    fn test_fit_shrinks_to_satisfy_width() {
        // width grows linearly with size; 100 max -> size 10 fits exactly
        let fitted = fit_font_size(80.0, 8.0, 2.0, 100.0, |s| s * 10.0).unwrap();
        assert!(fitted <= 10.0 && fitted >= 8.0);
    }

    #[test]
    fn test_fit_fails_at_floor_instead_of_looping() {
        let fitted = fit_font_size(80.0, 8.0, 2.0, 50.0, |s| s * 10.0);
        assert_eq!(fitted, None);
    }

    #[test]
    fn test_fit_handles_base_below_floor() {
        let fitted = fit_font_size(4.0, 8.0, 2.0, 1000.0, |s| s);
        assert_eq!(fitted, Some(8.0));
    }

    #[test]
    fn test_compositor_rejects_missing_font() {
        let template = LabelTemplate {
            font_path: "does/not/exist.ttf".into(),
            ..Default::default()
        };
        let err = LabelCompositor::new(&template).unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
    }

    #[test]
    fn test_compositor_rejects_unbounded_search_config() {
        let template = LabelTemplate {
            font_size_step: 0.0,
            ..Default::default()
        };
        let err = LabelCompositor::new(&template).unwrap_err();
        assert!(matches!(err, RenderError::DegenerateGeometry(_)));
    }
}
