use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The input could not be parsed as a PDF at all. Fatal.
    #[error("failed to open document {path}: {reason}")]
    DocumentOpen { path: PathBuf, reason: String },

    /// Text extraction failed for a page. Fatal.
    #[error("failed to extract text from page {page}: {reason}")]
    PageText { page: u32, reason: String },

    /// A single image region could not be rendered. Recorded and skipped.
    #[error("failed to render image {index} on page {page}: {reason}")]
    ImageRender { page: u32, index: usize, reason: String },

    /// A rendered raster could not be encoded or written. Recorded and skipped.
    #[error("failed to write asset {name}: {reason}")]
    AssetWrite { name: String, reason: String },
}

impl ExtractError {
    pub fn render(page: u32, index: usize, reason: impl ToString) -> Self {
        ExtractError::ImageRender { page, index, reason: reason.to_string() }
    }

    pub fn asset(name: &str, reason: impl ToString) -> Self {
        ExtractError::AssetWrite { name: name.to_string(), reason: reason.to_string() }
    }
}
