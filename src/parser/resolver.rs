use std::collections::HashSet;

use super::boundaries::BoundaryCandidate;
use crate::model::Question;

pub const FALLBACK_LABEL: &str = "Full Paper";

/// Turn raw boundary candidates into questions whose spans partition `text`.
///
/// Candidates are ordered by position and deduplicated per question number,
/// keeping the earliest occurrence. Spans follow document order of the
/// survivors, so out-of-order numbering can never produce overlaps. The first
/// span absorbs any preamble before the first marker; the question text itself
/// is the trimmed body between the marker and the next boundary.
pub fn resolve(text: &str, mut candidates: Vec<BoundaryCandidate>) -> Vec<Question> {
    if candidates.is_empty() {
        return vec![Question::new(0, FALLBACK_LABEL, text.trim(), 0..text.len())];
    }

    // Stable: equal offsets keep matcher registration order.
    candidates.sort_by_key(|c| c.start);
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.question_number));

    let ends = candidates
        .iter()
        .skip(1)
        .map(|c| c.start)
        .chain(std::iter::once(text.len()));

    candidates
        .iter()
        .zip(ends)
        .enumerate()
        .map(|(i, (c, end))| {
            let span_start = if i == 0 { 0 } else { c.start };
            let body_start = c.match_end.min(end);
            Question::new(
                c.question_number,
                c.label.clone(),
                text[body_start..end].trim(),
                span_start..end,
            )
        })
        .collect()
}

// ── Tests ──
