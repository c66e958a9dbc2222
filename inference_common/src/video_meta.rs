use image::GenericImageView;
use serde::{Deserialize, Serialize};

/// Native pixel dimensions of the live video source.
///
/// Detection coordinates are expressed in this space, so the overlay surface
/// is always sized to it rather than to any displayed size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
}

impl VideoMeta {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of<I: GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// A source that hasn't produced its first frame reports zero dimensions;
    /// zero-sized rasters must never be captured or encoded.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimensions_are_invalid() {
        assert!(!VideoMeta::default().is_valid());
        assert!(!VideoMeta::new(640, 0).is_valid());
        assert!(VideoMeta::new(640, 480).is_valid());
        assert_eq!(VideoMeta::of(&image::RgbImage::new(3, 2)), VideoMeta::new(3, 2));
    }
}
