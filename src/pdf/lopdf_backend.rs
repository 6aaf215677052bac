//! lopdf-backed [`PdfBackend`].
//!
//! Text comes from lopdf's own page text extraction. Image placement is
//! recovered by interpreting the page content stream: the graphics state
//! stack (`q`/`Q`), matrix concatenation (`cm`) and `Do` on image XObjects.
//! Form XObjects are followed with their `/Matrix` applied.

use std::cell::OnceCell;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::{scaled_size, ImageObject, PdfBackend, RenderError, SourceDocument, SourcePage};
use crate::error::{ExtractError, Result};
use crate::model::BBox;

const MAX_FORM_DEPTH: usize = 8;
const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceDocument>> {
        let inner = Document::load(path).map_err(|e| ExtractError::DocumentOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(LopdfDocument::new(inner)))
    }
}

pub struct LopdfDocument {
    inner: Document,
    /// (1-based page number, page object)
    page_ids: Vec<(u32, ObjectId)>,
}

impl LopdfDocument {
    pub fn new(inner: Document) -> Self {
        let page_ids = inner.get_pages().into_iter().collect();
        Self { inner, page_ids }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(bytes).map_err(|e| ExtractError::DocumentOpen {
            path: "<memory>".into(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(inner))
    }
}

impl SourceDocument for LopdfDocument {
    fn pages(&self) -> Vec<Box<dyn SourcePage + '_>> {
        self.page_ids
            .iter()
            .map(|&(number, id)| {
                Box::new(LopdfPage { doc: &self.inner, number, id, placements: OnceCell::new() })
                    as Box<dyn SourcePage + '_>
            })
            .collect()
    }
}

pub struct LopdfPage<'a> {
    doc: &'a Document,
    number: u32,
    id: ObjectId,
    placements: OnceCell<Vec<Placement>>,
}

impl SourcePage for LopdfPage<'_> {
    fn number(&self) -> u32 {
        self.number
    }

    fn extract_text(&self) -> Result<String> {
        self.doc
            .extract_text(&[self.number])
            .map_err(|e| ExtractError::PageText { page: self.number, reason: e.to_string() })
    }

    fn images(&self) -> std::result::Result<Vec<ImageObject>, RenderError> {
        Ok(self.placements()?.iter().map(|p| p.object.clone()).collect())
    }

    /// Renders the image placed exactly at `bbox` when there is one, otherwise
    /// the image covering most of it. Earlier placements win ties.
    fn render_region(&self, bbox: &BBox, dpi: u32) -> std::result::Result<DynamicImage, RenderError> {
        let mut best: Option<(&Placement, bool, f32)> = None;
        for p in self.placements()? {
            let Some(overlap) = p.object.bbox.intersection(bbox) else { continue };
            let exact = p.object.bbox == *bbox;
            let area = overlap.width() * overlap.height();
            let better = match best {
                None => true,
                Some((_, best_exact, best_area)) => (exact, area) > (best_exact, best_area),
            };
            if better {
                best = Some((p, exact, area));
            }
        }
        let (placement, _, _) = best.ok_or(RenderError::NoImageInRegion(*bbox))?;

        let stream = self.doc.get_object(placement.stream_id)?.as_stream()?;
        let full = decode_image(self.doc, stream)?;

        let region = placement
            .object
            .bbox
            .intersection(bbox)
            .ok_or(RenderError::NoImageInRegion(*bbox))?;
        let cropped = crop_to(&full, &placement.object.bbox, &region);
        let (w, h) = scaled_size(&region, dpi);
        Ok(cropped.resize_exact(w, h, image::imageops::FilterType::Lanczos3))
    }
}

struct Placement {
    object: ImageObject,
    stream_id: ObjectId,
}

impl LopdfPage<'_> {
    /// Image placements in paint order, walked once per page.
    fn placements(&self) -> std::result::Result<&[Placement], RenderError> {
        if let Some(cached) = self.placements.get() {
            return Ok(cached.as_slice());
        }
        let walked = self.walk_placements()?;
        Ok(self.placements.get_or_init(|| walked).as_slice())
    }

    fn walk_placements(&self) -> std::result::Result<Vec<Placement>, RenderError> {
        let media = self.media_box();
        let content = self.doc.get_and_decode_page_content(self.id)?;
        let resources = self.resources()?;

        let mut found = Vec::new();
        walk(self.doc, &content.operations, resources, Matrix::IDENTITY, 0, &mut found);

        Ok(found
            .into_iter()
            .map(|(name, stream_id, ctm)| {
                let (min_x, min_y, max_x, max_y) = ctm.unit_square_bounds();
                Placement {
                    object: ImageObject {
                        name,
                        bbox: BBox::new(
                            min_x - media[0],
                            media[3] - max_y,
                            max_x - media[0],
                            media[3] - min_y,
                        ),
                    },
                    stream_id,
                }
            })
            .collect())
    }

    fn media_box(&self) -> [f32; 4] {
        let Some(obj) = inherited(self.doc, self.id, b"MediaBox") else {
            return LETTER;
        };
        let Ok(arr) = resolve(self.doc, obj).and_then(Object::as_array) else {
            return LETTER;
        };
        let nums: Vec<f32> = arr.iter().filter_map(number).collect();
        match nums.as_slice() {
            [x0, y0, x1, y1] => [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)],
            _ => LETTER,
        }
    }

    fn resources(&self) -> std::result::Result<&Dictionary, RenderError> {
        static EMPTY: std::sync::LazyLock<Dictionary> = std::sync::LazyLock::new(Dictionary::new);
        match inherited(self.doc, self.id, b"Resources") {
            Some(obj) => Ok(resolve(self.doc, obj)?.as_dict()?),
            None => Ok(&EMPTY),
        }
    }
}

// ── Content stream walk ──

/// Collects (xobject name, stream id, CTM at `Do`) for every painted image.
fn walk(
    doc: &Document,
    ops: &[Operation],
    resources: &Dictionary,
    base: Matrix,
    depth: usize,
    found: &mut Vec<(String, ObjectId, Matrix)>,
) {
    let mut ctm = base;
    let mut stack = Vec::new();

    for op in ops {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    ctm = m.concat(&ctm);
                }
            }
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some((id, stream)) = xobject(doc, resources, name) else {
                    continue;
                };
                match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                    Ok(b"Image") => {
                        found.push((String::from_utf8_lossy(name).into_owned(), id, ctm));
                    }
                    Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                        let Ok(bytes) = stream_bytes(stream) else { continue };
                        let Ok(form) = Content::decode(&bytes) else { continue };
                        let form_matrix = stream
                            .dict
                            .get(b"Matrix")
                            .and_then(Object::as_array)
                            .ok()
                            .and_then(|a| Matrix::from_operands(a))
                            .unwrap_or(Matrix::IDENTITY);
                        let form_resources = stream
                            .dict
                            .get(b"Resources")
                            .and_then(|r| resolve(doc, r))
                            .and_then(Object::as_dict)
                            .unwrap_or(resources);
                        walk(
                            doc,
                            &form.operations,
                            form_resources,
                            form_matrix.concat(&ctm),
                            depth + 1,
                            found,
                        );
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn xobject<'a>(doc: &'a Document, resources: &'a Dictionary, name: &[u8]) -> Option<(ObjectId, &'a Stream)> {
    let xobjects = resolve(doc, resources.get(b"XObject").ok()?).ok()?.as_dict().ok()?;
    let id = xobjects.get(name).ok()?.as_reference().ok()?;
    let stream = doc.get_object(id).ok()?.as_stream().ok()?;
    Some((id, stream))
}

/// Row-vector affine matrix `[a b c d e f]`, as PDF writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let nums: Vec<f32> = operands.iter().filter_map(number).collect();
        let m: [f32; 6] = nums.try_into().ok()?;
        Some(Matrix(m))
    }

    /// `self × other`: apply `self` first, then `other`.
    fn concat(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Bounds of the unit square (image space) in user space.
    fn unit_square_bounds(&self) -> (f32, f32, f32, f32) {
        let corners = [self.apply(0.0, 0.0), self.apply(1.0, 0.0), self.apply(0.0, 1.0), self.apply(1.0, 1.0)];
        corners.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

// ── Image decoding ──

fn decode_image(doc: &Document, stream: &Stream) -> std::result::Result<DynamicImage, RenderError> {
    let filters = filter_names(stream);
    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") if filters.len() == 1 => {
            return Ok(image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)?);
        }
        Some(b"DCTDecode" | b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode") => {
            let name = filters.last().map(|f| String::from_utf8_lossy(f).into_owned()).unwrap_or_default();
            return Err(RenderError::Unsupported(name));
        }
        _ => {}
    }

    let dim = |key: &[u8]| -> std::result::Result<u32, RenderError> {
        let v = stream.dict.get(key).and_then(Object::as_i64)?;
        u32::try_from(v).map_err(|_| RenderError::Malformed(format!("bad {}", String::from_utf8_lossy(key))))
    };
    let width = dim(b"Width")?;
    let height = dim(b"Height")?;
    let bpc = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bpc != 8 {
        return Err(RenderError::Unsupported(format!("{} bits per component", bpc)));
    }

    let channels = color_channels(doc, stream)?;
    let mut raw = stream_bytes(stream)?;
    let needed = (width as usize) * (height as usize) * channels;
    if raw.len() < needed {
        return Err(RenderError::Malformed(format!(
            "expected {} bytes of samples, got {}",
            needed,
            raw.len()
        )));
    }
    raw.truncate(needed);

    let malformed = || RenderError::Malformed("sample buffer size mismatch".into());
    match channels {
        1 => Ok(DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or_else(malformed)?)),
        3 => Ok(DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or_else(malformed)?)),
        _ => {
            let rgb = raw
                .chunks_exact(4)
                .flat_map(|px| {
                    let k = 255 - px[3] as u16;
                    [0, 1, 2].map(|i| ((255 - px[i] as u16) * k / 255) as u8)
                })
                .collect();
            Ok(DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb).ok_or_else(malformed)?))
        }
    }
}

fn color_channels(doc: &Document, stream: &Stream) -> std::result::Result<usize, RenderError> {
    let Ok(cs) = stream.dict.get(b"ColorSpace") else {
        return Err(RenderError::Malformed("missing ColorSpace".into()));
    };
    let cs = resolve(doc, cs)?;
    let name = match cs {
        Object::Name(n) => n.clone(),
        Object::Array(arr) => {
            let family = arr.first().and_then(|o| o.as_name().ok()).unwrap_or_default();
            if family == b"ICCBased" {
                let n = arr
                    .get(1)
                    .and_then(|o| resolve(doc, o).ok())
                    .and_then(|o| o.as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                return match n {
                    Some(n @ (1 | 3 | 4)) => Ok(n as usize),
                    _ => Err(RenderError::Unsupported("ICCBased colour space".into())),
                };
            }
            family.to_vec()
        }
        _ => return Err(RenderError::Malformed("bad ColorSpace".into())),
    };
    match name.as_slice() {
        b"DeviceGray" | b"CalGray" => Ok(1),
        b"DeviceRGB" | b"CalRGB" => Ok(3),
        b"DeviceCMYK" => Ok(4),
        other => Err(RenderError::Unsupported(String::from_utf8_lossy(other).into_owned())),
    }
}

fn filter_names(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec)).collect(),
        _ => Vec::new(),
    }
}

fn stream_bytes(stream: &Stream) -> std::result::Result<Vec<u8>, RenderError> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// Cut `region` (page space) out of an image that fills `placed` on the page.
fn crop_to(image: &DynamicImage, placed: &BBox, region: &BBox) -> DynamicImage {
    let sx = image.width() as f32 / placed.width();
    let sy = image.height() as f32 / placed.height();
    let x = ((region.x0 - placed.x0) * sx).floor().max(0.0) as u32;
    let y = ((region.top - placed.top) * sy).floor().max(0.0) as u32;
    let w = ((region.width() * sx).ceil() as u32).clamp(1, image.width().saturating_sub(x).max(1));
    let h = ((region.height() * sy).ceil() as u32).clamp(1, image.height().saturating_sub(y).max(1));
    image.crop_imm(x, y, w, h)
}

// ── Object helpers ──

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> lopdf::Result<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

/// Look `key` up on the page dictionary, then up the `/Parent` chain.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;

    /// One Letter page. `content` is the raw page content stream; `Im0` is a
    /// 2x2 RGB image and `F1` is Helvetica.
    pub(crate) fn build_pdf(content: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let pixels = vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 0];
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2i64,
                "Height" => 2i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            pixels,
        ));
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn first_page_images(content: &[u8]) -> Vec<ImageObject> {
        let doc = LopdfDocument::from_bytes(&build_pdf(content)).unwrap();
        let pages = doc.pages();
        pages[0].images().unwrap()
    }

    #[test]
    fn image_bbox_from_cm() {
        let images = first_page_images(b"q 200 0 0 150 100 300 cm /Im0 Do Q");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "Im0");
        // y flipped against the inherited 792pt MediaBox
        assert_eq!(images[0].bbox, BBox::new(100.0, 342.0, 300.0, 492.0));
    }

    #[test]
    fn graphics_state_restored_after_q() {
        let images = first_page_images(
            b"q 2 0 0 2 0 0 cm q 50 0 0 50 10 10 cm /Im0 Do Q Q q 60 0 0 40 0 0 cm /Im0 Do Q",
        );
        assert_eq!(images.len(), 2);
        // inner cm is scaled by the outer 2x
        assert_eq!(images[0].bbox, BBox::new(20.0, 672.0, 120.0, 772.0));
        assert_eq!(images[1].bbox, BBox::new(0.0, 752.0, 60.0, 792.0));
    }

    #[test]
    fn unknown_xobject_ignored() {
        assert!(first_page_images(b"q 100 0 0 100 0 0 cm /Missing Do Q").is_empty());
    }

    #[test]
    fn render_region_scales_to_dpi() {
        let doc = LopdfDocument::from_bytes(&build_pdf(b"q 200 0 0 150 100 300 cm /Im0 Do Q")).unwrap();
        let pages = doc.pages();
        let bbox = pages[0].images().unwrap()[0].bbox;
        let raster = pages[0].render_region(&bbox, 144).unwrap();
        assert_eq!((raster.width(), raster.height()), (400, 300));
    }

    #[test]
    fn render_region_prefers_exact_placement_over_nested_one() {
        // a 10pt bullet painted first, inside a 300pt diagram
        let doc = LopdfDocument::from_bytes(&build_pdf(
            b"q 10 0 0 10 100 100 cm /Im0 Do Q q 300 0 0 300 50 50 cm /Im0 Do Q",
        ))
        .unwrap();
        let pages = doc.pages();
        let images = pages[0].images().unwrap();
        assert_eq!(images.len(), 2);

        let diagram = pages[0].render_region(&images[1].bbox, 72).unwrap();
        assert_eq!((diagram.width(), diagram.height()), (300, 300));
        let bullet = pages[0].render_region(&images[0].bbox, 72).unwrap();
        assert_eq!((bullet.width(), bullet.height()), (10, 10));
    }

    #[test]
    fn render_region_falls_back_to_largest_overlap() {
        let doc = LopdfDocument::from_bytes(&build_pdf(
            b"q 20 0 0 20 0 0 cm /Im0 Do Q q 200 0 0 200 0 0 cm /Im0 Do Q",
        ))
        .unwrap();
        let pages = doc.pages();
        // bottom-left 100pt square, covered fully by the big image only
        let region = BBox::new(0.0, 692.0, 100.0, 792.0);
        let raster = pages[0].render_region(&region, 72).unwrap();
        assert_eq!((raster.width(), raster.height()), (100, 100));
    }

    #[test]
    fn render_region_without_image_fails() {
        let doc = LopdfDocument::from_bytes(&build_pdf(b"q 200 0 0 150 100 300 cm /Im0 Do Q")).unwrap();
        let pages = doc.pages();
        let err = pages[0].render_region(&BBox::new(0.0, 0.0, 10.0, 10.0), 72).unwrap_err();
        assert!(matches!(err, RenderError::NoImageInRegion(_)));
    }

    #[test]
    fn page_text_extracted() {
        let doc = LopdfDocument::from_bytes(&build_pdf(b"BT /F1 12 Tf 72 700 Td (Q.1 Find x) Tj ET")).unwrap();
        let pages = doc.pages();
        assert_eq!(pages[0].number(), 1);
        assert!(pages[0].extract_text().unwrap().contains("Q.1 Find x"));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        assert!(matches!(
            LopdfDocument::from_bytes(b"not a pdf"),
            Err(ExtractError::DocumentOpen { .. })
        ));
    }

    #[test]
    fn backend_open_missing_file() {
        let err = LopdfBackend.open(Path::new("/nonexistent/paper.pdf")).err().unwrap();
        assert!(matches!(err, ExtractError::DocumentOpen { .. }));
    }

    #[test]
    fn matrix_concat_applies_left_first() {
        let scale = Matrix([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let shift = Matrix([1.0, 0.0, 0.0, 1.0, 10.0, 5.0]);
        assert_eq!(scale.concat(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.concat(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }
}
