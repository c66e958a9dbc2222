//! Fixed class-name to display-color lookup.

/// An sRGB color.
pub type Rgb = [u8; 3];

/// Label text is always drawn in white over the class-colored background.
pub const LABEL_TEXT_COLOR: Rgb = [0xFF, 0xFF, 0xFF];

#[derive(Debug, Clone, Copy)]
pub struct ClassColor {
    pub class_name: &'static str,
    /// Box and label background on the video overlay.
    pub overlay: Rgb,
    /// Bar color in the summary panel.
    pub panel: Rgb,
}

/// Immutable class color table with fallbacks for unknown classes.
#[derive(Debug)]
pub struct ColorPolicy {
    entries: &'static [ClassColor],
    fallback_overlay: Rgb,
    fallback_panel: Rgb,
}

/// Colors for the waste classes the service is trained on.
pub static COLOR_POLICY: ColorPolicy = ColorPolicy {
    entries: &[
        ClassColor {
            class_name: "bottle",
            overlay: [0x00, 0x00, 0xFF],
            panel: [0x25, 0x63, 0xEB],
        },
        ClassColor {
            class_name: "can",
            overlay: [0x00, 0xFF, 0xFF],
            panel: [0x22, 0xD3, 0xEE],
        },
        ClassColor {
            class_name: "carton",
            overlay: [0xF0, 0xF0, 0xF0],
            panel: [0xE5, 0xE7, 0xEB],
        },
        ClassColor {
            class_name: "cup",
            overlay: [0x00, 0xE5, 0xC0],
            panel: [0x2D, 0xD4, 0xBF],
        },
        ClassColor {
            class_name: "paper",
            overlay: [0x1A, 0x23, 0x7E],
            panel: [0x1E, 0x3A, 0x8A],
        },
    ],
    fallback_overlay: [0x00, 0xFF, 0x00],
    fallback_panel: [0x22, 0xC5, 0x5E],
};

impl ColorPolicy {
    fn lookup(&self, class_name: &str) -> Option<&ClassColor> {
        self.entries.iter().find(|entry| entry.class_name == class_name)
    }

    pub fn overlay_color(&self, class_name: &str) -> Rgb {
        self.lookup(class_name)
            .map_or(self.fallback_overlay, |entry| entry.overlay)
    }

    pub fn panel_color(&self, class_name: &str) -> Rgb {
        self.lookup(class_name)
            .map_or(self.fallback_panel, |entry| entry.panel)
    }
}
