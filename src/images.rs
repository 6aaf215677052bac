use std::io::Cursor;
use std::path::PathBuf;

use image::ImageFormat;

use crate::diagnostics::{DiagnosticsSink, Event};
use crate::error::{ExtractError, Result};
use crate::model::{BBox, ImageRegion};
use crate::pdf::{AssetWriter, SourcePage};

/// Anything smaller than this on either side is a logo, bullet or rule line.
pub const DEFAULT_MIN_IMAGE_SIZE: f32 = 50.0;
pub const DEFAULT_RENDER_DPI: u32 = 200;

pub fn asset_name(page: u32, index: usize) -> String {
    format!("diagram_p{}_i{}.png", page, index)
}

/// Find the diagrams on every page, render each one and hand it to `writer`.
///
/// A failure on one image is recorded and skipped; it never stops the run.
pub fn locate_images(
    pages: &[Box<dyn SourcePage + '_>],
    min_size: f32,
    dpi: u32,
    writer: &dyn AssetWriter,
    sink: &dyn DiagnosticsSink,
) -> Vec<ImageRegion> {
    let mut regions = Vec::new();

    for page in pages {
        let number = page.number();
        let objects = match page.images() {
            Ok(objects) => objects,
            Err(e) => {
                sink.record(Event::ImageSkipped { page: number, index: 0, reason: e.to_string() });
                continue;
            }
        };
        sink.record(Event::PageScanned { page: number, images: objects.len() });

        for (index, object) in objects.iter().enumerate() {
            let bbox = object.bbox;
            if bbox.width() < min_size || bbox.height() < min_size {
                sink.record(Event::ImageFiltered {
                    page: number,
                    index,
                    width: bbox.width(),
                    height: bbox.height(),
                });
                continue;
            }

            match save_region(page.as_ref(), index, &bbox, dpi, writer) {
                Ok(asset_path) => {
                    sink.record(Event::ImageSaved { page: number, index, path: asset_path.clone() });
                    regions.push(ImageRegion {
                        page_number: number,
                        bbox,
                        width: bbox.width(),
                        height: bbox.height(),
                        asset_path,
                    });
                }
                Err(e) => {
                    sink.record(Event::ImageSkipped { page: number, index, reason: e.to_string() });
                }
            }
        }
    }

    regions
}

fn save_region(
    page: &dyn SourcePage,
    index: usize,
    bbox: &BBox,
    dpi: u32,
    writer: &dyn AssetWriter,
) -> Result<PathBuf> {
    let number = page.number();
    let raster = page
        .render_region(bbox, dpi)
        .map_err(|e| ExtractError::render(number, index, e))?;

    let name = asset_name(number, index);
    let mut png = Vec::new();
    raster
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ExtractError::asset(&name, e))?;
    writer.write_image(&png, &name)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::pdf::lopdf_backend::tests::build_pdf;
    use crate::pdf::lopdf_backend::LopdfDocument;
    use crate::pdf::{MemoryAssetWriter, SourceDocument};

    fn locate(content: &[u8]) -> (Vec<ImageRegion>, MemoryAssetWriter, RecordingSink) {
        let doc = LopdfDocument::from_bytes(&build_pdf(content)).unwrap();
        let writer = MemoryAssetWriter::new();
        let sink = RecordingSink::new();
        let regions = locate_images(&doc.pages(), DEFAULT_MIN_IMAGE_SIZE, 72, &writer, &sink);
        (regions, writer, sink)
    }

    #[test]
    fn narrow_image_filtered() {
        let (regions, writer, sink) = locate(b"q 49 0 0 1000 10 10 cm /Im0 Do Q");
        assert!(regions.is_empty());
        assert!(writer.names().is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::ImageFiltered { page: 1, index: 0, .. })));
    }

    #[test]
    fn threshold_is_inclusive() {
        let (regions, writer, _) = locate(b"q 50 0 0 50 10 10 cm /Im0 Do Q");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].width, 50.0);
        assert_eq!(regions[0].height, 50.0);
        assert_eq!(writer.names(), vec!["diagram_p1_i0.png"]);
    }

    #[test]
    fn index_counts_filtered_objects() {
        // first placement is a bullet, second a diagram
        let (regions, writer, _) =
            locate(b"q 10 0 0 10 0 0 cm /Im0 Do Q q 200 0 0 100 50 400 cm /Im0 Do Q");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].asset_path, PathBuf::from("memory/diagram_p1_i1.png"));
        assert_eq!(writer.names(), vec!["diagram_p1_i1.png"]);
    }

    #[test]
    fn saved_asset_is_png_of_region() {
        let (_, writer, _) = locate(b"q 100 0 0 60 0 0 cm /Im0 Do Q");
        let png = writer.get("diagram_p1_i0.png").unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 60));
    }

    #[test]
    fn nested_decoration_does_not_replace_diagram() {
        let (regions, writer, _) =
            locate(b"q 10 0 0 10 100 100 cm /Im0 Do Q q 300 0 0 300 50 50 cm /Im0 Do Q");
        assert_eq!(regions.len(), 1);
        let png = writer.get("diagram_p1_i1.png").unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    struct FailingWriter;

    impl AssetWriter for FailingWriter {
        fn write_image(&self, _png: &[u8], name: &str) -> Result<PathBuf> {
            Err(ExtractError::asset(name, "disk full"))
        }
    }

    #[test]
    fn write_failure_skips_image_only() {
        let doc = LopdfDocument::from_bytes(&build_pdf(
            b"q 100 0 0 100 0 0 cm /Im0 Do Q q 100 0 0 100 200 200 cm /Im0 Do Q",
        ))
        .unwrap();
        let sink = RecordingSink::new();
        let regions = locate_images(&doc.pages(), DEFAULT_MIN_IMAGE_SIZE, 72, &FailingWriter, &sink);
        assert!(regions.is_empty());
        let skipped = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::ImageSkipped { .. }))
            .count();
        assert_eq!(skipped, 2);
    }
}
