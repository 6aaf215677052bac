pub mod associate;
pub mod boundaries;
pub mod classify;
pub mod resolver;

use crate::diagnostics::{DiagnosticsSink, Event};
use crate::model::Question;
use boundaries::BoundaryMatcher;

/// Two-pass segmentation: matchers → candidates → resolved question spans.
pub fn segment_questions(
    text: &str,
    matchers: &[Box<dyn BoundaryMatcher>],
    sink: &dyn DiagnosticsSink,
) -> Vec<Question> {
    let candidates = boundaries::scan_all(text, matchers);
    if candidates.is_empty() {
        sink.record(Event::NoBoundaries);
    }
    let total = candidates.len();
    let questions = resolver::resolve(text, candidates);
    if total > 0 {
        sink.record(Event::BoundariesDetected { candidates: total, questions: questions.len() });
    }
    questions
}

// ── Tests ──
