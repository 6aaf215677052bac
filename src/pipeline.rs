use std::path::Path;

use crate::diagnostics::{DiagnosticsSink, Event, TracingSink};
use crate::error::Result;
use crate::images::{self, DEFAULT_MIN_IMAGE_SIZE, DEFAULT_RENDER_DPI};
use crate::model::{DocumentResult, ExamType, Page, Subject};
use crate::parser::associate::{self, AssociationStrategy, LastLabelOnPage};
use crate::parser::boundaries::{default_matchers, BoundaryMatcher};
use crate::parser::{classify, segment_questions};
use crate::pdf::{AssetWriter, DirAssetWriter, LopdfBackend, PdfBackend};

/// Papers longer than this are cut short unless the caller lifts the cap.
pub const DEFAULT_MAX_PAGES: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Decoration filter: minimum width and height of a diagram, in page units.
    pub min_image_size: f32,
    pub render_dpi: u32,
    /// Stop after this many pages. `None` processes every page.
    pub max_pages: Option<usize>,
    /// Pages whose text is classified for the subject. 0 means the whole paper.
    pub header_pages: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_image_size: DEFAULT_MIN_IMAGE_SIZE,
            render_dpi: DEFAULT_RENDER_DPI,
            max_pages: Some(DEFAULT_MAX_PAGES),
            header_pages: 3,
        }
    }
}

pub struct Extractor<B> {
    backend: B,
    options: ExtractOptions,
    matchers: Vec<Box<dyn BoundaryMatcher>>,
    strategy: Box<dyn AssociationStrategy>,
}

impl<B: PdfBackend> Extractor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            options: ExtractOptions::default(),
            matchers: default_matchers(),
            strategy: Box::new(LastLabelOnPage),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn BoundaryMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn AssociationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Text → questions, pages → diagrams, diagrams → questions, then classify.
    pub fn run(
        &self,
        pdf_path: &Path,
        writer: &dyn AssetWriter,
        sink: &dyn DiagnosticsSink,
    ) -> Result<DocumentResult> {
        let document = self.backend.open(pdf_path)?;
        let mut source_pages = document.pages();
        if let Some(limit) = self.options.max_pages {
            if source_pages.len() > limit {
                sink.record(Event::PageLimitReached { limit, total: source_pages.len() });
                source_pages.truncate(limit);
            }
        }

        let pages = source_pages
            .iter()
            .map(|p| {
                Ok(Page {
                    page_number: p.number(),
                    text: p.extract_text()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let full_text = pages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");

        let mut questions = segment_questions(&full_text, &self.matchers, sink);

        let regions = images::locate_images(
            &source_pages,
            self.options.min_image_size,
            self.options.render_dpi,
            writer,
            sink,
        );
        let association = self.strategy.associate(&regions, &questions, &pages);
        let attached = associate::apply(&association, &regions, &mut questions);
        sink.record(Event::DiagramsAssociated {
            associated: attached,
            unassociated: regions.len() - attached,
        });

        let (exam_type, subject) = classify_document(&pages, self.options.header_pages);
        sink.record(Event::Classified { exam_type, subject });

        Ok(DocumentResult {
            page_count: pages.len(),
            exam_type,
            subject,
            questions,
            image_count: regions.len(),
            full_text,
        })
    }
}

/// Exam type from the whole paper, subject from its first `header_pages`
/// pages (all pages when 0).
pub fn classify_document(pages: &[Page], header_pages: usize) -> (ExamType, Subject) {
    let join = |n: usize| pages.iter().take(n).map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");
    let take = if header_pages == 0 { pages.len() } else { header_pages };
    (
        classify::classify_exam_type(&join(pages.len())),
        classify::classify_subject(&join(take)),
    )
}

/// Run the whole engine over one PDF with the lopdf backend, writing diagrams
/// into `asset_output_dir` and logging through `tracing`.
pub fn process_document(pdf_path: &Path, asset_output_dir: &Path) -> Result<DocumentResult> {
    Extractor::new(LopdfBackend).run(pdf_path, &DirAssetWriter::new(asset_output_dir), &TracingSink)
}

// ── Tests ──
