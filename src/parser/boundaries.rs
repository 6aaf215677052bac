use std::sync::LazyLock;

use regex::Regex;

// "Q.1", "Q:1", "Q. 1", "Q.12)". Spacing is only allowed after the punctuation,
// so "charges q 1 and q 2" stays prose.
static Q_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bQ(?:[.:][ \t]*)?(\d{1,3})\b[.):]?").unwrap());
// "Q1"
static Q_TIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bQ(\d{1,3})\b[.):]?").unwrap());
// "Question 3", "Question No. 3:"
static QUESTION_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bQuestion[ \t]*(?:No\.?[ \t]*)?(\d{1,3})\b[.):]?").unwrap()
});
// "7." or "7)" opening a line, followed by whitespace (so "3.14" and "x7." never match)
static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(\d{1,3})[.)](?:\s|$)").unwrap());

/// A place in the document text where a question may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryCandidate {
    pub question_number: u32,
    pub label: String,
    /// Byte offset of the marker.
    pub start: usize,
    /// Byte offset just past the marker, where the question body begins.
    pub match_end: usize,
}

/// One numbering convention. Matchers run independently and may report
/// overlapping candidates; the resolver sorts that out.
pub trait BoundaryMatcher {
    fn name(&self) -> &'static str;
    fn scan(&self, text: &str) -> Vec<BoundaryCandidate>;
}

/// Regex-backed matcher. Capture group 1 must be the question number.
pub struct PatternMatcher {
    name: &'static str,
    re: &'static Regex,
}

impl PatternMatcher {
    pub fn new(name: &'static str, re: &'static Regex) -> Self {
        Self { name, re }
    }
}

impl BoundaryMatcher for PatternMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn scan(&self, text: &str) -> Vec<BoundaryCandidate> {
        self.re
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let question_number = caps[1].parse().ok()?;
                Some(BoundaryCandidate {
                    question_number,
                    label: normalize_label(whole.as_str()),
                    start: whole.start(),
                    match_end: whole.end(),
                })
            })
            .collect()
    }
}

/// The built-in conventions, in evaluation order. Order only matters as the
/// tie-break when two conventions report the same number at the same offset.
pub fn default_matchers() -> Vec<Box<dyn BoundaryMatcher>> {
    vec![
        Box::new(PatternMatcher::new("q_punct", &Q_PUNCT_RE)),
        Box::new(PatternMatcher::new("q_tight", &Q_TIGHT_RE)),
        Box::new(PatternMatcher::new("question_word", &QUESTION_WORD_RE)),
        Box::new(PatternMatcher::new("bare_number", &BARE_NUMBER_RE)),
    ]
}

/// Run every matcher over `text` and concatenate what they find.
pub fn scan_all(text: &str, matchers: &[Box<dyn BoundaryMatcher>]) -> Vec<BoundaryCandidate> {
    matchers.iter().flat_map(|m| m.scan(text)).collect()
}

fn normalize_label(marker: &str) -> String {
    marker
        .trim()
        .trim_end_matches(['.', ')', ':'])
        .trim_end()
        .to_string()
}

// ── Tests ──
