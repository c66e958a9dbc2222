//! Fans one classification result out to the overlay, the optional
//! annotated-frame file, the result log and the summary view.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use image::RgbImage;
use inference_common::annotate::render_detections;
use inference_common::canvas::ImageCanvas;
use inference_common::class_colors::COLOR_POLICY;
use inference_common::classification::ClassificationResult;
use inference_common::result_log::{ResultLog, ResultRecord};
use inference_common::summary::SummaryView;
use inference_common::video_meta::VideoMeta;
use tracing::{debug, info, warn};

pub struct Presenter {
    canvas: ImageCanvas,
    overlay_output: Option<PathBuf>,
    result_log: Option<ResultLog>,
}

impl Presenter {
    /// A missing or unreadable font only disables label text.
    pub fn new(
        font_path: Option<&Path>,
        overlay_output: Option<PathBuf>,
        result_log: Option<&Path>,
    ) -> Result<Self> {
        let font = font_path.and_then(|path| match ImageCanvas::load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("{e:#}; labels will be drawn without text");
                None
            }
        });
        let result_log = result_log.map(ResultLog::open).transpose()?;

        Ok(Self {
            canvas: ImageCanvas::new(font),
            overlay_output,
            result_log,
        })
    }

    /// Redraws the overlay for `frame` and returns the annotated copy.
    /// Failures draw nothing, which clears the previous overlay.
    pub fn annotate(&mut self, result: &ClassificationResult, frame: &RgbImage) -> RgbImage {
        render_detections(
            &mut self.canvas,
            VideoMeta::of(frame),
            result.detections(),
            &COLOR_POLICY,
        );
        self.canvas.composite_onto(frame)
    }

    /// Handles one received result. `frame` is the snapshot it was computed
    /// from, if one is still available.
    pub fn present(
        &mut self,
        session_id: &str,
        result: &ClassificationResult,
        frame: Option<&RgbImage>,
    ) -> SummaryView {
        match frame.filter(|f| VideoMeta::of(*f).is_valid()) {
            Some(frame) => {
                let annotated = self.annotate(result, frame);
                if let Some(path) = &self.overlay_output {
                    if let Err(e) = save(&annotated, path) {
                        warn!("{e:#}");
                    }
                }
            }
            None => debug!("No frame to draw the overlay on"),
        }

        if let Some(log) = self.result_log.as_mut() {
            let record = ResultRecord {
                session_id: session_id.to_string(),
                seq: result.seq(),
                received_at: Utc::now(),
                result: result.clone(),
            };
            if let Err(e) = log.append(&record) {
                warn!("Failed to append to result log: {e:#}");
            }
        }

        let view = SummaryView::from_result(result, &COLOR_POLICY);
        match &view {
            SummaryView::Error(message) => warn!("Classification failed: {message}"),
            SummaryView::Empty => info!("No objects detected"),
            SummaryView::Breakdown(breakdown) => {
                let classes: Vec<String> = breakdown
                    .classes
                    .iter()
                    .map(|row| format!("{}={}", row.class_name, row.count))
                    .collect();
                info!("{} objects: {}", breakdown.total_objects, classes.join(", "));
            }
        }
        view
    }

    #[cfg(test)]
    fn overlay(&self) -> &ImageCanvas {
        &self.canvas
    }
}

pub fn save(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("Failed to write annotated frame to {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_common::classification::{Classification, Detection};

    fn bottles() -> ClassificationResult {
        Classification::from_detections(vec![
            Detection::new("bottle", 0.92, [10.0, 10.0, 50.0, 50.0]),
            Detection::new("bottle", 0.81, [60.0, 10.0, 90.0, 40.0]),
        ])
        .into()
    }

    #[test]
    fn test_present_writes_overlay_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = dir.path().join("latest.png");
        let log = dir.path().join("results.jsonl");
        let mut presenter = Presenter::new(None, Some(overlay.clone()), Some(&log)).unwrap();
        let frame = RgbImage::from_pixel(100, 60, image::Rgb([20, 20, 20]));

        let view = presenter.present("session", &bottles().with_seq(3), Some(&frame));
        let SummaryView::Breakdown(breakdown) = view else {
            panic!("expected a breakdown");
        };
        assert_eq!(breakdown.classes[0].bar_percent, 40);

        let written = image::open(&overlay).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (100, 60));
        assert_eq!(*written.get_pixel(10, 30), image::Rgb([0, 0, 255]));

        let lines = std::fs::read_to_string(&log).unwrap();
        let record: ResultRecord = serde_json::from_str(lines.trim()).unwrap();
        assert_eq!(record.seq, Some(3));
        assert_eq!(record.session_id, "session");
    }

    #[test]
    fn test_error_clears_overlay() {
        let mut presenter = Presenter::new(None, None, None).unwrap();
        let frame = RgbImage::new(100, 60);
        presenter.present("s", &bottles(), Some(&frame));
        assert!(presenter.overlay().surface().pixels().any(|px| px[3] != 0));

        let failure = ClassificationResult::failure("Could not decode image");
        let view = presenter.present("s", &failure, Some(&frame));
        assert_eq!(view, SummaryView::Error("Could not decode image".into()));
        assert!(presenter.overlay().surface().pixels().all(|px| px[3] == 0));
    }

    #[test]
    fn test_missing_font_is_not_fatal() {
        let mut presenter =
            Presenter::new(Some(Path::new("/no/such/font.ttf")), None, None).unwrap();
        // Label backgrounds are still drawn without text.
        presenter.present("s", &bottles(), Some(&RgbImage::new(100, 60)));
        assert!(presenter.overlay().surface().pixels().any(|px| px[3] != 0));
    }
}
