//! Result summary view: per-class counts and the top detections of one
//! result, computed as a plain value so any front end can draw it.

use std::fmt::Write;

use crate::class_colors::{ColorPolicy, Rgb};
use crate::classification::{format_confidence, ClassificationResult};

/// How many detections the ranked list shows.
pub const TOP_DETECTIONS: usize = 5;
/// Bar percent per counted object.
pub const BAR_PERCENT_PER_OBJECT: u32 = 20;
pub const EMPTY_MESSAGE: &str = "No objects detected";

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryView {
    /// Only the error message is shown.
    Error(String),
    /// Neutral state for a result with no objects.
    Empty,
    Breakdown(Breakdown),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub total_objects: u32,
    pub classes: Vec<ClassRow>,
    pub top_detections: Vec<RankedDetection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassRow {
    pub class_name: String,
    pub count: u32,
    /// Share of the full bar width, `0..=100`.
    pub bar_percent: u32,
    pub color: Rgb,
}

impl ClassRow {
    pub fn count_label(&self) -> String {
        if self.count == 1 {
            "1 item".to_string()
        } else {
            format!("{} items", self.count)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedDetection {
    /// 1-based position in the result's own order.
    pub rank: usize,
    pub class_name: String,
    pub confidence: String,
}

/// `min(count * 20, 100)`.
pub fn bar_percent(count: u32) -> u32 {
    count.saturating_mul(BAR_PERCENT_PER_OBJECT).min(100)
}

impl SummaryView {
    /// Error beats everything, then a zero total, then the full breakdown.
    pub fn from_result(result: &ClassificationResult, colors: &ColorPolicy) -> Self {
        let cls = match result {
            ClassificationResult::Failed(err) => return Self::Error(err.error.clone()),
            ClassificationResult::Detected(cls) => cls,
        };
        if cls.total_objects == 0 {
            return Self::Empty;
        }

        let classes = cls
            .class_counts
            .iter()
            .map(|(name, count)| ClassRow {
                class_name: name.to_string(),
                count,
                bar_percent: bar_percent(count),
                color: colors.panel_color(name),
            })
            .collect();

        // The service's ordering is authoritative; no re-sorting here.
        let top_detections = cls
            .detected_objects
            .iter()
            .take(TOP_DETECTIONS)
            .enumerate()
            .map(|(idx, det)| RankedDetection {
                rank: idx + 1,
                class_name: det.class_name.clone(),
                confidence: format_confidence(det.confidence),
            })
            .collect();

        Self::Breakdown(Breakdown {
            total_objects: cls.total_objects,
            classes,
            top_detections,
        })
    }

    /// Plain-text rendering, 20 bar cells per full width.
    pub fn to_text(&self) -> String {
        let breakdown = match self {
            Self::Error(message) => return format!("Error: {message}"),
            Self::Empty => return EMPTY_MESSAGE.to_string(),
            Self::Breakdown(breakdown) => breakdown,
        };

        let mut out = String::new();
        let _ = writeln!(out, "Detection Results");
        let _ = writeln!(out, "Total objects: {}", breakdown.total_objects);
        let _ = writeln!(out, "Objects by Type:");
        for row in &breakdown.classes {
            let cells = (row.bar_percent / 5) as usize;
            let _ = writeln!(
                out,
                "  {:<12} [{:<20}] {:>3}%  {}",
                row.class_name,
                "#".repeat(cells),
                row.bar_percent,
                row.count_label()
            );
        }
        let _ = writeln!(out, "Top Detections:");
        for det in &breakdown.top_detections {
            let _ = writeln!(out, "  {}. {:<12} {}", det.rank, det.class_name, det.confidence);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_colors::COLOR_POLICY;
    use crate::classification::{Classification, ClassCounts, Detection};

    fn bottle_result() -> ClassificationResult {
        serde_json::from_str(
            r#"{"total_objects":2,"class_counts":{"bottle":2},"detected_objects":[
                {"bbox":[10,10,50,50],"class":"bottle","confidence":0.92},
                {"bbox":[60,10,90,40],"class":"bottle","confidence":0.81}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_bar_width_is_clamped() {
        assert_eq!(bar_percent(1), 20);
        assert_eq!(bar_percent(5), 100);
        assert_eq!(bar_percent(6), 100);
        assert_eq!(bar_percent(0), 0);
        assert_eq!(bar_percent(u32::MAX), 100);
    }

    #[test]
    fn test_bottle_scenario() {
        let view = SummaryView::from_result(&bottle_result(), &COLOR_POLICY);
        let SummaryView::Breakdown(breakdown) = view else {
            panic!("expected a breakdown");
        };
        assert_eq!(breakdown.total_objects, 2);
        assert_eq!(
            breakdown.classes,
            vec![ClassRow {
                class_name: "bottle".into(),
                count: 2,
                bar_percent: 40,
                color: [0x25, 0x63, 0xEB],
            }]
        );
        assert_eq!(breakdown.classes[0].count_label(), "2 items");
        let ranked: Vec<_> = breakdown
            .top_detections
            .iter()
            .map(|d| (d.rank, d.class_name.as_str(), d.confidence.as_str()))
            .collect();
        assert_eq!(ranked, vec![(1, "bottle", "92.0%"), (2, "bottle", "81.0%")]);
    }

    #[test]
    fn test_error_suppresses_breakdown() {
        let result = ClassificationResult::failure("Could not decode image");
        let view = SummaryView::from_result(&result, &COLOR_POLICY);
        assert_eq!(view, SummaryView::Error("Could not decode image".into()));
        assert_eq!(view.to_text(), "Error: Could not decode image");
    }

    #[test]
    fn test_zero_total_is_empty_even_with_stray_detections() {
        let result = ClassificationResult::Detected(Classification {
            total_objects: 0,
            class_counts: ClassCounts::new(),
            detected_objects: vec![Detection::new("cup", 0.3, [0.0; 4])],
            seq: None,
        });
        let view = SummaryView::from_result(&result, &COLOR_POLICY);
        assert_eq!(view, SummaryView::Empty);
        assert_eq!(view.to_text(), EMPTY_MESSAGE);
    }

    #[test]
    fn test_top_list_is_truncated_and_not_resorted() {
        let confidences = [0.1, 0.9, 0.5, 0.7, 0.3, 0.99, 0.2];
        let dets = confidences
            .iter()
            .map(|c| Detection::new("can", *c, [0.0; 4]))
            .collect();
        let result = ClassificationResult::Detected(Classification::from_detections(dets));

        let SummaryView::Breakdown(breakdown) = SummaryView::from_result(&result, &COLOR_POLICY)
        else {
            panic!("expected a breakdown");
        };
        let shown: Vec<_> = breakdown
            .top_detections
            .iter()
            .map(|d| d.confidence.as_str())
            .collect();
        assert_eq!(shown, vec!["10.0%", "90.0%", "50.0%", "70.0%", "30.0%"]);
        assert_eq!(breakdown.classes[0].bar_percent, 100);
        assert_eq!(breakdown.classes[0].count_label(), "7 items");
    }

    #[test]
    fn test_view_is_pure() {
        let result = bottle_result();
        let first = SummaryView::from_result(&result, &COLOR_POLICY);
        let second = SummaryView::from_result(&result, &COLOR_POLICY);
        assert_eq!(first, second);
        assert_eq!(first.to_text(), second.to_text());
        assert!(first.to_text().contains("bottle       [########            ]  40%  2 items"));
    }

    #[test]
    fn test_single_item_label() {
        let row = ClassRow {
            class_name: "cup".into(),
            count: 1,
            bar_percent: 20,
            color: [0; 3],
        };
        assert_eq!(row.count_label(), "1 item");
    }
}
