use std::path::{Path, PathBuf};
use std::sync::Arc;

use hayro::hayro_interpret::font::Glyph;
use hayro::hayro_interpret::util::{PageExt, RectExt};
use hayro::hayro_interpret::{
    BlendMode, ClipPath, Context, Device, GlyphDrawMode, Image, InterpreterSettings, Paint,
    PathDrawMode, SoftMask, interpret_page,
};
use hayro::hayro_syntax::Pdf;
use hayro::hayro_syntax::page::Page;
use kurbo::{Affine, BezPath, Point, Rect, Shape};

use crate::error::{AppError, AppResult};
use crate::layout::{OriginConvention, PageGeometry, PageLayout, TextFragment};

use super::traits::PageTextExtractor;
use super::{calculate_doc_id, check_regular_file};

pub struct PdfDoc {
    path: PathBuf,
    doc_id: u64,
    pdf: Pdf,
}

impl PageTextExtractor for PdfDoc {
    fn path(&self) -> &Path {
        &self.path
    }

    fn doc_id(&self) -> u64 {
        self.doc_id
    }

    fn page_count(&self) -> usize {
        PdfDoc::page_count(self)
    }

    fn page_geometry(&self, page: usize) -> AppResult<PageGeometry> {
        let (width, height) = self.page_ref(page)?.render_dimensions();
        Ok(PageGeometry::new(page, f64::from(width), f64::from(height)))
    }

    fn page_layout(&self, page: usize) -> AppResult<PageLayout> {
        let page_geometry = self.page_geometry(page)?;
        let fragments = collect_fragments(self.page_ref(page)?);
        log::debug!(
            "extracted {} fragments from page {page} of {}",
            fragments.len(),
            self.path.display()
        );

        Ok(PageLayout {
            page: page_geometry,
            convention: OriginConvention::TopLeftBaseline,
            fragments,
        })
    }
}

impl PdfDoc {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        check_regular_file(path, "pdf")?;

        let bytes = std::fs::read(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read pdf: {}", path.display()))
        })?;
        if !bytes.starts_with(b"%PDF-") {
            return Err(AppError::invalid_argument(
                "input is not a valid PDF header",
            ));
        }

        let doc_id = calculate_doc_id(path, bytes.len());
        let pdf = Pdf::new(Arc::new(bytes))
            .map_err(|_| AppError::invalid_argument("failed to parse PDF with hayro"))?;

        Ok(Self {
            path: path.to_path_buf(),
            doc_id,
            pdf,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pdf.pages().len()
    }

    fn page_ref(&self, page: usize) -> AppResult<&Page<'_>> {
        self.pdf
            .pages()
            .get(page)
            .ok_or(AppError::invalid_argument("page index is out of range"))
    }
}

fn collect_fragments(page: &Page<'_>) -> Vec<TextFragment> {
    let mut context = Context::new(
        page.initial_transform(true),
        page.intersected_crop_box().to_kurbo(),
        page.xref(),
        InterpreterSettings::default(),
    );
    let mut device = FragmentCollector::default();
    interpret_page(page, &mut context, &mut device);
    device.finish()
}

/// One glyph as placed on the page: ink extent along x, baseline and font size in y.
#[derive(Debug, Clone, Copy)]
struct PlacedGlyph {
    left: f64,
    right: f64,
    baseline: f64,
    font_size: f64,
}

/// Glyphs of one run that share a baseline and sit next to each other.
struct OpenFragment {
    text: String,
    left: f64,
    right: f64,
    baseline: f64,
    font_size: f64,
}

impl OpenFragment {
    // Anchored on the baseline with the font size as height, so every run on
    // a line shares one top edge regardless of which letters it contains.
    fn into_fragment(self) -> TextFragment {
        TextFragment::new(
            self.text,
            self.left,
            self.baseline,
            self.font_size,
            self.right - self.left,
        )
    }
}

#[derive(Default)]
struct FragmentCollector {
    fragments: Vec<TextFragment>,
    open: Option<OpenFragment>,
    last_glyph: Option<(char, i32, i32)>,
}

impl FragmentCollector {
    fn finish(mut self) -> Vec<TextFragment> {
        self.close();
        self.fragments
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            self.fragments.push(open.into_fragment());
        }
    }

    fn push_glyph(&mut self, ch: char, glyph: PlacedGlyph) {
        if let Some(open) = self.open.as_mut()
            && continues_run(open, &glyph)
        {
            open.text.push(ch);
            open.left = open.left.min(glyph.left);
            open.right = open.right.max(glyph.right);
            open.font_size = open.font_size.max(glyph.font_size);
            return;
        }

        self.close();
        self.open = Some(OpenFragment {
            text: ch.to_string(),
            left: glyph.left,
            right: glyph.right,
            baseline: glyph.baseline,
            font_size: glyph.font_size,
        });
    }

    fn is_duplicate_glyph(&self, ch: char, x: f64, y: f64) -> bool {
        self.last_glyph == Some((ch, quantize_coord(x), quantize_coord(y)))
    }

    fn set_last_glyph(&mut self, ch: char, x: f64, y: f64) {
        self.last_glyph = Some((ch, quantize_coord(x), quantize_coord(y)));
    }
}

fn continues_run(open: &OpenFragment, glyph: &PlacedGlyph) -> bool {
    let size = open
        .font_size
        .max(glyph.font_size)
        .max(MIN_GLYPH_HEIGHT);
    if (glyph.baseline - open.baseline).abs() > size * BASELINE_SHIFT_RATIO {
        return false;
    }

    let gap = glyph.left - open.right;
    gap <= size * WORD_GAP_RATIO && gap >= -size * OVERLAP_RATIO
}

// Space glyphs have empty outlines and Type3 glyphs have none we can measure;
// both collapse to a zero-size box at the glyph origin.
fn glyph_bounds(
    glyph: &Glyph<'_>,
    transform: Affine,
    glyph_transform: Affine,
    origin: Point,
) -> Rect {
    let outline: Option<BezPath> = match glyph {
        Glyph::Outline(outline_glyph) => Some(outline_glyph.outline()),
        Glyph::Type3(_) => None,
    };

    match outline {
        Some(path) if !path.elements().is_empty() => {
            (transform * (glyph_transform * path)).bounding_box()
        }
        _ => Rect::from_points(origin, origin),
    }
}

// Glyph space spans GLYPH_UNITS_PER_EM units per em, so the device length of
// the transformed em along y is the rendered font size.
fn font_size(full_transform: Affine) -> f64 {
    let [_, _, c, d, _, _] = full_transform.as_coeffs();
    c.hypot(d) * GLYPH_UNITS_PER_EM
}

impl<'a> Device<'a> for FragmentCollector {
    fn set_soft_mask(&mut self, _mask: Option<SoftMask<'a>>) {}

    fn set_blend_mode(&mut self, _blend_mode: BlendMode) {}

    fn draw_path(
        &mut self,
        _path: &BezPath,
        _transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &PathDrawMode,
    ) {
    }

    fn push_clip_path(&mut self, _clip_path: &ClipPath) {}

    fn push_transparency_group(
        &mut self,
        _opacity: f32,
        _mask: Option<SoftMask<'a>>,
        _blend_mode: BlendMode,
    ) {
    }

    fn draw_glyph(
        &mut self,
        glyph: &Glyph<'a>,
        transform: Affine,
        glyph_transform: Affine,
        _paint: &Paint<'a>,
        _draw_mode: &GlyphDrawMode,
    ) {
        let Some(ch) = glyph.as_unicode() else {
            return;
        };
        if ch == '\n' || ch == '\r' {
            return;
        }

        let origin = (transform * glyph_transform) * Point::ORIGIN;
        if self.is_duplicate_glyph(ch, origin.x, origin.y) {
            return;
        }
        self.set_last_glyph(ch, origin.x, origin.y);

        let bounds = glyph_bounds(glyph, transform, glyph_transform, origin);
        self.push_glyph(
            ch,
            PlacedGlyph {
                left: bounds.x0.min(origin.x),
                right: bounds.x1.max(origin.x),
                baseline: origin.y,
                font_size: font_size(transform * glyph_transform),
            },
        );
    }

    fn draw_image(&mut self, _image: Image<'a, '_>, _transform: Affine) {}

    fn pop_clip_path(&mut self) {}

    fn pop_transparency_group(&mut self) {}
}

fn quantize_coord(value: f64) -> i32 {
    (value * 100.0).round() as i32
}

const GLYPH_UNITS_PER_EM: f64 = 1000.0;
const MIN_GLYPH_HEIGHT: f64 = 1.0;
const BASELINE_SHIFT_RATIO: f64 = 0.5;
const WORD_GAP_RATIO: f64 = 0.25;
const OVERLAP_RATIO: f64 = 0.5;
