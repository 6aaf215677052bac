use crate::model::{ExamType, Subject};

const JEE_SIGNALS: &[&str] = &["jee main", "jee advanced", "jee mains", "iit jee", "jee (main)"];
const NEET_SIGNALS: &[&str] = &["neet", "neet-ug", "neet ug", "national eligibility"];
const BIOLOGY_HINTS: &[&str] = &["biology", "botany", "zoology"];

/// Checked in order; the first subject with any hit wins.
const SUBJECT_KEYWORDS: &[(Subject, &[&str])] = &[
    (Subject::Mathematics, &["mathematics", "maths", "math", "sr-mathematics"]),
    (Subject::Physics, &["physics", "sr-physics"]),
    (Subject::Chemistry, &["chemistry", "sr-chemistry"]),
    (Subject::Biology, &["biology", "botany", "zoology", "sr-biology"]),
];

/// JEE vs NEET by how many signal phrases of each appear. Ties fall back to
/// biology keywords, which only NEET papers carry.
pub fn classify_exam_type(text: &str) -> ExamType {
    let lower = text.to_lowercase();
    let score = |signals: &[&str]| signals.iter().filter(|s| lower.contains(*s)).count();

    let jee = score(JEE_SIGNALS);
    let neet = score(NEET_SIGNALS);
    if jee > neet {
        return ExamType::Jee;
    }
    if neet > jee {
        return ExamType::Neet;
    }

    if BIOLOGY_HINTS.iter().any(|h| lower.contains(h)) {
        ExamType::Neet
    } else {
        ExamType::Unknown
    }
}

pub fn classify_subject(text: &str) -> Subject {
    let lower = text.to_lowercase();
    SUBJECT_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(subject, _)| *subject)
        .unwrap_or(Subject::Unknown)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jee_wins_on_signals() {
        assert_eq!(classify_exam_type("JEE Main 2024 - Shift 1 (IIT JEE pattern)"), ExamType::Jee);
    }

    #[test]
    fn neet_wins_on_signals() {
        assert_eq!(classify_exam_type("NEET-UG 2023, National Eligibility cum Entrance Test"), ExamType::Neet);
    }

    #[test]
    fn tie_falls_back_to_biology() {
        assert_eq!(classify_exam_type("Section B: Botany"), ExamType::Neet);
        assert_eq!(classify_exam_type("ZOOLOGY paper"), ExamType::Neet);
    }

    #[test]
    fn tie_with_signals_on_both_sides() {
        // one JEE phrase, one NEET phrase, no biology
        assert_eq!(classify_exam_type("jee advanced or neet?"), ExamType::Unknown);
    }

    #[test]
    fn nothing_matches() {
        assert_eq!(classify_exam_type("Weekly practice test"), ExamType::Unknown);
    }

    #[test]
    fn subject_priority_prefers_mathematics() {
        assert_eq!(classify_subject("Mathematics and Physics combined"), Subject::Mathematics);
        assert_eq!(classify_subject("PHYSICS + CHEMISTRY"), Subject::Physics);
    }

    #[test]
    fn subject_variants() {
        assert_eq!(classify_subject("SR-CHEMISTRY weekend test"), Subject::Chemistry);
        assert_eq!(classify_subject("Zoology section"), Subject::Biology);
        assert_eq!(classify_subject("Maths"), Subject::Mathematics);
        assert_eq!(classify_subject("General aptitude"), Subject::Unknown);
    }
}
