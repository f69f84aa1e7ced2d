use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Where an extractor anchors a fragment's `origin_x`/`origin_y`.
///
/// Everything downstream of [`TextFragment::top_left`] works in a single
/// top-left-origin, y-down page space at scale 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginConvention {
    /// Baseline anchor measured from the bottom page edge (pdf.js text content).
    #[default]
    BottomLeftBaseline,
    /// Baseline anchor measured from the top page edge.
    TopLeftBaseline,
    /// Top-left corner of the fragment's box.
    TopLeft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFragment {
    pub text: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub font_height: f64,
    pub total_width: f64,
}

impl TextFragment {
    pub fn new(
        text: impl Into<String>,
        origin_x: f64,
        origin_y: f64,
        font_height: f64,
        total_width: f64,
    ) -> Self {
        Self {
            text: text.into(),
            origin_x,
            origin_y,
            font_height,
            total_width,
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn height(&self) -> f64 {
        finite_or_zero(self.font_height).abs()
    }

    pub fn width(&self) -> f64 {
        finite_or_zero(self.total_width).abs()
    }

    pub fn top_left(&self, convention: OriginConvention, page_height: f64) -> Point {
        let x = finite_or_zero(self.origin_x);
        let origin_y = finite_or_zero(self.origin_y);
        let y = match convention {
            OriginConvention::BottomLeftBaseline => page_height - origin_y - self.height(),
            OriginConvention::TopLeftBaseline => origin_y - self.height(),
            OriginConvention::TopLeft => origin_y,
        };
        Point::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn new(page_index: usize, width: f64, height: f64) -> Self {
        Self {
            page_index,
            width,
            height,
        }
    }
}

/// One page of extractor output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page: PageGeometry,
    #[serde(default)]
    pub convention: OriginConvention,
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
