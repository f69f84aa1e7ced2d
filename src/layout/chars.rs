use kurbo::Rect;
use serde::{Deserialize, Serialize};

use super::fragment::{PageGeometry, PageLayout};

/// Reconstructed box of one character in page space at scale 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterBox {
    pub character: char,
    pub page_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub global_offset: usize,
}

impl CharacterBox {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.right(), self.y + self.height)
    }
}

/// Splits every fragment into per-character boxes.
///
/// Each fragment's width is shared evenly by its characters. Glyphs are not
/// monospace, so the boxes only approximate real glyph extents; highlighting
/// needs region coverage, not exact outlines.
pub fn expand_fragments(layout: &PageLayout) -> Vec<CharacterBox> {
    let page_index = layout.page.page_index;
    let mut boxes = Vec::new();
    let mut global_offset = 0_usize;

    for fragment in &layout.fragments {
        let count = fragment.char_count();
        if count == 0 {
            continue;
        }

        let origin = fragment.top_left(layout.convention, layout.page.height);
        let height = fragment.height();
        let char_width = fragment.width() / count as f64;

        for (index, character) in fragment.text.chars().enumerate() {
            boxes.push(CharacterBox {
                character,
                page_index,
                x: origin.x + char_width * index as f64,
                y: origin.y,
                width: char_width,
                height,
                global_offset,
            });
            global_offset += 1;
        }
    }

    boxes
}

/// The character stream of one page, ordered by `global_offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCharMap {
    pub page: PageGeometry,
    pub chars: Vec<CharacterBox>,
}

impl PageCharMap {
    pub fn from_layout(layout: &PageLayout) -> Self {
        Self {
            page: layout.page,
            chars: expand_fragments(layout),
        }
    }

    pub fn page_index(&self) -> usize {
        self.page.page_index
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Flattened page text. Character `i` of the result has `global_offset == i`.
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.character).collect()
    }
}
