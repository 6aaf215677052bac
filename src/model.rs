use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Text of one PDF page, as produced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// Axis-aligned rectangle in page space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self { x0, top, x1, bottom }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Overlap with `other`, or `None` when the two don't intersect.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let b = BBox {
            x0: self.x0.max(other.x0),
            top: self.top.max(other.top),
            x1: self.x1.min(other.x1),
            bottom: self.bottom.min(other.bottom),
        };
        (b.width() > 0.0 && b.height() > 0.0).then_some(b)
    }
}

/// A diagram cropped out of a page and saved as an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRegion {
    pub page_number: u32,
    pub bbox: BBox,
    pub width: f32,
    pub height: f32,
    pub asset_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub number: u32,
    pub label: String,
    pub text: String,
    /// Partition range in document text. Contiguous across questions.
    pub span: Range<usize>,
    pub diagram_asset_paths: Vec<String>,
    pub has_diagram: bool,
}

impl Question {
    pub fn new(number: u32, label: impl Into<String>, text: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            number,
            label: label.into(),
            text: text.into(),
            span,
            diagram_asset_paths: Vec::new(),
            has_diagram: false,
        }
    }

    pub fn attach_diagram(&mut self, asset_path: impl Into<String>) {
        self.diagram_asset_paths.push(asset_path.into());
        self.has_diagram = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "JEE")]
    Jee,
    #[serde(rename = "NEET")]
    Neet,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Jee => "JEE",
            ExamType::Neet => "NEET",
            ExamType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Mathematics,
    Physics,
    Chemistry,
    Biology,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final output of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub page_count: usize,
    pub exam_type: ExamType,
    pub subject: Subject,
    pub questions: Vec<Question>,
    pub image_count: usize,
    pub full_text: String,
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_intersection() {
        let a = BBox::new(0.0, 0.0, 100.0, 100.0);
        let b = BBox::new(50.0, 60.0, 150.0, 160.0);
        assert_eq!(a.intersection(&b), Some(BBox::new(50.0, 60.0, 100.0, 100.0)));
        assert_eq!(a.intersection(&BBox::new(100.0, 0.0, 200.0, 10.0)), None);
    }

    #[test]
    fn attach_diagram_sets_flag() {
        let mut q = Question::new(4, "Q.4", "Find x", 0..10);
        assert!(!q.has_diagram);
        q.attach_diagram("out/diagram_p1_i0.png");
        assert!(q.has_diagram);
        assert_eq!(q.diagram_asset_paths, vec!["out/diagram_p1_i0.png"]);
    }

    #[test]
    fn enums_serialize_as_wire_names() {
        assert_eq!(serde_json::to_string(&ExamType::Jee).unwrap(), "\"JEE\"");
        assert_eq!(serde_json::to_string(&Subject::Unknown).unwrap(), "\"UNKNOWN\"");
        assert_eq!(serde_json::to_string(&Subject::Physics).unwrap(), "\"Physics\"");
    }
}
