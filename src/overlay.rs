use kurbo::{Affine, Rect, Vec2};
use serde::Serialize;

use crate::config::OverlayConfig;
use crate::error::AppResult;
use crate::highlight::HighlightRect;
use crate::layout::PageGeometry;

/// Display transform from page space (scale 1) to screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::scaled(1.0)
    }
}

impl Viewport {
    pub fn scaled(scale: f64) -> Self {
        Self {
            scale,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn affine(&self) -> Affine {
        Affine::translate(Vec2::new(self.offset_x, self.offset_y)) * Affine::scale(self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for ScreenRect {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
        }
    }
}

/// Placement as percentages of the page size, for layouts that stretch pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl HighlightRect {
    pub fn to_screen(&self, viewport: Viewport) -> ScreenRect {
        viewport
            .affine()
            .transform_rect_bbox(self.to_kurbo())
            .into()
    }

    pub fn to_percent(&self) -> PercentRect {
        PercentRect {
            left: percent_of(self.x, self.page_width),
            top: percent_of(self.y, self.page_height),
            width: percent_of(self.width, self.page_width),
            height: percent_of(self.height, self.page_height),
        }
    }
}

fn percent_of(value: f64, total: f64) -> f64 {
    if total > 0.0 { value / total * 100.0 } else { 0.0 }
}

/// Receives page-space rectangles and draws them at the viewport's scale.
pub trait HighlightRenderer {
    fn render_page(
        &mut self,
        page: &PageGeometry,
        rects: &[HighlightRect],
        viewport: Viewport,
    ) -> AppResult<()>;
}

/// Renders each page's highlights as a standalone SVG document.
#[derive(Debug, Clone)]
pub struct SvgOverlay {
    fill: String,
    opacity: f64,
    documents: Vec<String>,
}

impl SvgOverlay {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            fill: config.fill.clone(),
            opacity: config.opacity,
            documents: Vec::new(),
        }
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<String> {
        self.documents
    }
}

impl HighlightRenderer for SvgOverlay {
    fn render_page(
        &mut self,
        page: &PageGeometry,
        rects: &[HighlightRect],
        viewport: Viewport,
    ) -> AppResult<()> {
        let width = page.width * viewport.scale;
        let height = page.height * viewport.scale;

        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" data-page=\"{}\">\n",
            page.page_index
        ));
        for rect in rects.iter().filter(|rect| rect.page_index == page.page_index) {
            let screen = rect.to_screen(viewport);
            svg.push_str(&format!(
                "  <rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" fill-opacity=\"{}\"/>\n",
                screen.x,
                screen.y,
                screen.width,
                screen.height,
                escape_attr(&self.fill),
                self.opacity
            ));
        }
        svg.push_str("</svg>\n");

        self.documents.push(svg);
        Ok(())
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
