//! Result model returned by the remote classifier, both over the live
//! session and from the one-shot upload endpoint.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One classified object within a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` in the source video's native pixel space.
    pub bbox: [f32; 4],
    #[serde(rename = "class")]
    pub class_name: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            bbox,
            class_name: class_name.into(),
            confidence,
        }
    }

    /// Overlay label, e.g. `bottle: 92.0%`.
    pub fn label(&self) -> String {
        format!("{}: {}", self.class_name, format_confidence(self.confidence))
    }
}

/// Formats a `[0, 1]` confidence as a percentage with one decimal place.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.1}%", confidence * 100.0)
}

/// Per-class counts, kept in the order the classifier reported them.
///
/// On the wire this is a plain JSON object; the order of its keys is what
/// the summary view iterates in, so it can't be a `HashMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts(Vec<(String, u32)>);

impl ClassCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn get(&self, class_name: &str) -> Option<u32> {
        self.0
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, count)| *count)
    }

    /// Sets the count for `class_name`, keeping its original position if it
    /// was already present.
    pub fn insert(&mut self, class_name: impl Into<String>, count: u32) {
        let class_name = class_name.into();
        match self.0.iter_mut().find(|(name, _)| *name == class_name) {
            Some(entry) => entry.1 = count,
            None => self.0.push((class_name, count)),
        }
    }

    /// Tallies detections by class, in first-seen order.
    pub fn tally<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> Self {
        let mut counts = Self::new();
        for det in detections {
            let current = counts.get(&det.class_name).unwrap_or(0);
            counts.insert(det.class_name.clone(), current + 1);
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ClassCounts {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (name, count) in iter {
            counts.insert(name, count);
        }
        counts
    }
}

impl Serialize for ClassCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, count) in &self.0 {
            map.serialize_entry(name, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ClassCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = ClassCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of class name to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ClassCounts, A::Error> {
                let mut counts = ClassCounts::new();
                while let Some((name, count)) = access.next_entry::<String, u32>()? {
                    counts.insert(name, count);
                }
                Ok(counts)
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

/// Successful classification of one frame or uploaded image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub total_objects: u32,
    #[serde(default)]
    pub class_counts: ClassCounts,
    #[serde(default)]
    pub detected_objects: Vec<Detection>,
    /// Sequence number of the frame this answers, when the service echoes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl Classification {
    /// Builds a classification whose counts are derived from `detections`.
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        Self {
            total_objects: detections.len() as u32,
            class_counts: ClassCounts::tally(&detections),
            detected_objects: detections,
            seq: None,
        }
    }
}

/// The classifier could not process the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// Decoded response to one frame: an error indicator or detections.
///
/// A payload carrying an `error` field is always treated as a failure, even
/// if it also carries counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    Failed(ClassificationError),
    Detected(Classification),
}

impl ClassificationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failed(ClassificationError {
            error: message.into(),
            seq: None,
        })
    }

    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Failed(err) => err.seq,
            Self::Detected(cls) => cls.seq,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        match &mut self {
            Self::Failed(err) => err.seq = Some(seq),
            Self::Detected(cls) => cls.seq = Some(seq),
        }
        self
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(err) => Some(&err.error),
            Self::Detected(_) => None,
        }
    }

    /// Detections to draw; empty for failures.
    pub fn detections(&self) -> &[Detection] {
        match self {
            Self::Failed(_) => &[],
            Self::Detected(cls) => &cls.detected_objects,
        }
    }
}

impl From<Classification> for ClassificationResult {
    fn from(cls: Classification) -> Self {
        Self::Detected(cls)
    }
}
