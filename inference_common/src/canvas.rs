//! Raster implementation of [`Renderer`] on top of `image` + `imageproc`.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use anyhow::{Context, Result};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotate::{BoxRect, Label, Renderer, LABEL_FONT_PX};
use crate::class_colors::Rgb;
use crate::video_meta::VideoMeta;

/// Average glyph advance relative to the font size, used to size label
/// backgrounds when no font could be loaded.
const FALLBACK_ADVANCE: f32 = 0.55;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Transparent RGBA overlay surface.
pub struct ImageCanvas {
    surface: RgbaImage,
    font: Option<FontArc>,
}

impl ImageCanvas {
    /// Without a font, label backgrounds are still drawn (sized from an
    /// estimated text width) but the text itself is skipped.
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            surface: RgbaImage::new(0, 0),
            font,
        }
    }

    pub fn load_font(path: &Path) -> Result<FontArc> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read font {path:?}"))?;
        FontArc::try_from_vec(bytes).map_err(|e| anyhow::anyhow!("Invalid font {path:?}: {e}"))
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Blends the overlay over `frame`, returning the annotated image.
    pub fn composite_onto(&self, frame: &RgbImage) -> RgbImage {
        let mut base = DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
        image::imageops::overlay(&mut base, &self.surface, 0, 0);
        DynamicImage::ImageRgba8(base).to_rgb8()
    }

    fn scale() -> PxScale {
        PxScale::from(LABEL_FONT_PX)
    }

    /// Clips `rect` to the surface grown by `margin` on every side, then
    /// rounds to pixels. `None` when nothing of it is left.
    fn clip(&self, rect: BoxRect, margin: f32) -> Option<Rect> {
        if ![rect.x, rect.y, rect.width, rect.height].iter().all(|v| v.is_finite()) {
            return None;
        }
        let (width, height) = self.surface.dimensions();
        let left = rect.x.max(-margin);
        let top = rect.y.max(-margin);
        let right = (rect.x + rect.width).min(width as f32 + margin);
        let bottom = (rect.y + rect.height).min(height as f32 + margin);
        if right <= left || bottom <= top {
            return None;
        }
        let w = (right - left).round().max(1.0) as u32;
        let h = (bottom - top).round().max(1.0) as u32;
        Some(Rect::at(left.round() as i32, top.round() as i32).of_size(w, h))
    }

    fn measure(&self, text: &str) -> f32 {
        match &self.font {
            Some(font) => text_size(Self::scale(), font, text).0 as f32,
            None => text.chars().count() as f32 * LABEL_FONT_PX * FALLBACK_ADVANCE,
        }
    }
}

fn rgba(color: Rgb) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 0xFF])
}

impl Renderer for ImageCanvas {
    fn resize(&mut self, dims: VideoMeta) {
        if self.surface.dimensions() != (dims.width, dims.height) {
            self.surface = RgbaImage::new(dims.width, dims.height);
        }
    }

    fn clear(&mut self) {
        for px in self.surface.pixels_mut() {
            *px = TRANSPARENT;
        }
    }

    fn draw_box(&mut self, rect: BoxRect, color: Rgb, line_width: u32) {
        if !rect.is_drawable() {
            log::trace!("skipping degenerate box {rect:?}");
            return;
        }
        // Edges pushed past the margin land off-surface and draw nothing.
        let Some(clipped) = self.clip(rect, line_width as f32) else {
            log::trace!("skipping off-surface box {rect:?}");
            return;
        };
        let (x, y) = (clipped.left(), clipped.top());
        let (w, h) = (clipped.width() as i32, clipped.height() as i32);

        // The stroke is centered on the outline, like a canvas strokeRect.
        let half = (line_width / 2) as i32;
        for offset in -half..=(line_width as i32 - 1 - half) {
            let (ow, oh) = (w + 2 * offset, h + 2 * offset);
            if ow <= 0 || oh <= 0 {
                continue;
            }
            let outline = Rect::at(x - offset, y - offset).of_size(ow as u32, oh as u32);
            draw_hollow_rect_mut(&mut self.surface, outline, rgba(color));
        }
    }

    fn draw_label(&mut self, label: &Label) {
        let bg = label.background_rect(self.measure(&label.text));
        // The text sits inside its background, so both go together.
        let Some(background) = self.clip(bg, 0.0) else {
            return;
        };
        draw_filled_rect_mut(&mut self.surface, background, rgba(label.background));

        let Some(font) = &self.font else {
            return;
        };
        // imageproc positions text by its top edge, not its baseline.
        let (origin_x, baseline_y) = label.baseline_origin();
        let ascent = font.as_scaled(Self::scale()).ascent();
        draw_text_mut(
            &mut self.surface,
            rgba(label.foreground),
            origin_x.round() as i32,
            (baseline_y - ascent).round() as i32,
            Self::scale(),
            font,
            &label.text,
        );
    }
}
