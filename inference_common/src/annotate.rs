//! Overlay renderer: maps detections onto a drawing surface aligned 1:1 with
//! the source video.

use crate::class_colors::{ColorPolicy, Rgb, LABEL_TEXT_COLOR};
use crate::classification::Detection;
use crate::video_meta::VideoMeta;

pub const BOX_LINE_WIDTH: u32 = 3;
pub const LABEL_FONT_PX: f32 = 20.0;
pub const LABEL_HEIGHT: f32 = 30.0;
/// Added to the measured text width for the label background.
pub const LABEL_PADDING: f32 = 10.0;
/// Text inset from the box's left edge, and baseline lift from its top edge.
pub const LABEL_TEXT_INSET: f32 = 5.0;

/// Axis-aligned rectangle in surface pixels. Width/height may be zero or
/// negative for malformed boxes; renderers skip those.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxRect {
    pub fn from_corners([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    pub fn is_drawable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// A label anchored at the top-left corner of its detection box.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub background: Rgb,
    pub foreground: Rgb,
}

impl Label {
    /// Background sits directly above the box, sized to the text.
    pub fn background_rect(&self, text_width: f32) -> BoxRect {
        BoxRect {
            x: self.anchor_x,
            y: self.anchor_y - LABEL_HEIGHT,
            width: text_width + LABEL_PADDING,
            height: LABEL_HEIGHT,
        }
    }

    /// Left end of the text baseline.
    pub fn baseline_origin(&self) -> (f32, f32) {
        (
            self.anchor_x + LABEL_TEXT_INSET,
            self.anchor_y - LABEL_TEXT_INSET,
        )
    }
}

/// Drawing capability the overlay renders through.
pub trait Renderer {
    /// Sizes the surface to the video's native dimensions.
    fn resize(&mut self, dims: VideoMeta);
    /// Makes the whole surface transparent.
    fn clear(&mut self);
    /// Strokes the outline of `rect`.
    fn draw_box(&mut self, rect: BoxRect, color: Rgb, line_width: u32);
    /// Fills the label background (measured text width + padding) and draws
    /// the text on top of it.
    fn draw_label(&mut self, label: &Label);
}

/// Draws `detections` in order; later ones land on top of earlier ones.
///
/// The output depends only on `dims` and `detections`: the surface is resized
/// and cleared on every call, so an empty list leaves it blank.
pub fn render_detections<R: Renderer + ?Sized>(
    renderer: &mut R,
    dims: VideoMeta,
    detections: &[Detection],
    colors: &ColorPolicy,
) {
    renderer.resize(dims);
    renderer.clear();

    for det in detections {
        let color = colors.overlay_color(&det.class_name);
        let rect = BoxRect::from_corners(det.bbox);
        renderer.draw_box(rect, color, BOX_LINE_WIDTH);
        renderer.draw_label(&Label {
            text: det.label(),
            anchor_x: rect.x,
            anchor_y: rect.y,
            background: color,
            foreground: LABEL_TEXT_COLOR,
        });
    }
    log::trace!("rendered {} detections onto {}x{}", detections.len(), dims.width, dims.height);
}
