//! Types and rendering shared by the live classification client: the
//! classifier's result model, class colors, frame encoding, the overlay
//! renderer and the summary view.

pub mod annotate;
pub mod canvas;
pub mod class_colors;
pub mod classification;
pub mod frame_meta;
pub mod result_log;
pub mod summary;
pub mod video_meta;
