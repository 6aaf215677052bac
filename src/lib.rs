//! Exam paper extraction: splits PDF text into numbered questions, crops the
//! diagrams out of each page and attaches them to the question they illustrate,
//! then tags the paper with an exam type and subject.

pub mod diagnostics;
pub mod error;
pub mod images;
pub mod model;
pub mod parser;
pub mod pdf;
pub mod pipeline;

pub use diagnostics::{DiagnosticsSink, Event, RecordingSink, TracingSink};
pub use error::{ExtractError, Result};
pub use model::{BBox, DocumentResult, ExamType, ImageRegion, Page, Question, Subject};
pub use pipeline::{process_document, ExtractOptions, Extractor};
