//! Boundary to the PDF parser. The engine only sees these traits; the
//! lopdf-backed implementation lives in [`lopdf_backend`].

pub mod assets;
pub mod lopdf_backend;

use std::path::Path;

use image::DynamicImage;
use thiserror::Error;

use crate::error::Result;
use crate::model::BBox;

pub use assets::{AssetWriter, DirAssetWriter, MemoryAssetWriter};
pub use lopdf_backend::LopdfBackend;

/// An image placed on a page, in top-left-origin page coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObject {
    pub name: String,
    pub bbox: BBox,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no image under region {0:?}")]
    NoImageInRegion(BBox),
    #[error("unsupported image encoding: {0}")]
    Unsupported(String),
    #[error("malformed image: {0}")]
    Malformed(String),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    #[error(transparent)]
    Decode(#[from] image::ImageError),
}

pub trait SourcePage {
    /// 1-based page number.
    fn number(&self) -> u32;
    fn extract_text(&self) -> Result<String>;
    fn images(&self) -> std::result::Result<Vec<ImageObject>, RenderError>;
    /// Raster of an arbitrary page rectangle at `dpi` (72 = one pixel per unit).
    fn render_region(&self, bbox: &BBox, dpi: u32) -> std::result::Result<DynamicImage, RenderError>;
}

pub trait SourceDocument {
    fn pages(&self) -> Vec<Box<dyn SourcePage + '_>>;
}

/// Opens documents. Dropping the returned handle releases it.
pub trait PdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceDocument>>;
}

/// Pixel size of `bbox` rendered at `dpi`, never below 1x1.
pub fn scaled_size(bbox: &BBox, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    let w = (bbox.width() * scale).round().max(1.0) as u32;
    let h = (bbox.height() * scale).round().max(1.0) as u32;
    (w, h)
}

// ── Tests ──
