use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::model::{ExamType, Subject};

/// Something worth reporting during an extraction run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PageScanned { page: u32, images: usize },
    ImageFiltered { page: u32, index: usize, width: f32, height: f32 },
    ImageSaved { page: u32, index: usize, path: PathBuf },
    ImageSkipped { page: u32, index: usize, reason: String },
    PageLimitReached { limit: usize, total: usize },
    BoundariesDetected { candidates: usize, questions: usize },
    NoBoundaries,
    DiagramsAssociated { associated: usize, unassociated: usize },
    Classified { exam_type: ExamType, subject: Subject },
}

pub trait DiagnosticsSink {
    fn record(&self, event: Event);
}

/// Forwards events to the `tracing` subscriber.
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: Event) {
        match event {
            Event::PageScanned { page, images } => {
                info!("Page {}: {} image object(s)", page, images)
            }
            Event::ImageFiltered { page, index, width, height } => debug!(
                "Page {} image {}: {:.0}x{:.0} below size threshold, skipped",
                page, index, width, height
            ),
            Event::ImageSaved { page, index, path } => {
                info!("Page {} image {}: saved {}", page, index, path.display())
            }
            Event::ImageSkipped { page, index, reason } => {
                warn!("Page {} image {}: {}", page, index, reason)
            }
            Event::PageLimitReached { limit, total } => {
                warn!("PDF has {} pages, processing first {} only", total, limit)
            }
            Event::BoundariesDetected { candidates, questions } => info!(
                "{} boundary candidates resolved to {} questions",
                candidates, questions
            ),
            Event::NoBoundaries => info!("No question markers found, treating paper as one question"),
            Event::DiagramsAssociated { associated, unassociated } => info!(
                "Associated {} diagram(s), {} left unassociated",
                associated, unassociated
            ),
            Event::Classified { exam_type, subject } => {
                info!("Detected exam={}, subject={}", exam_type, subject)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(Event::NoBoundaries);
        sink.record(Event::PageScanned { page: 2, images: 1 });
        assert_eq!(
            sink.events(),
            vec![Event::NoBoundaries, Event::PageScanned { page: 2, images: 1 }]
        );
    }
}
