use kurbo::Rect;
use serde::{Deserialize, Serialize};

use crate::layout::{CharacterBox, PageCharMap, PageGeometry};

use super::request::HighlightRequest;

/// Vertical distance, in page pixels, within which characters share a line.
pub const DEFAULT_LINE_TOLERANCE: f64 = 2.0;

/// A merged highlight rectangle in page space at scale 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRect {
    pub page_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub page_width: f64,
    pub page_height: f64,
}

impl HighlightRect {
    fn from_char(c: &CharacterBox, page: &PageGeometry) -> Self {
        Self {
            page_index: c.page_index,
            x: c.x,
            y: c.y,
            width: c.width,
            height: c.height,
            page_width: page.width,
            page_height: page.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn to_kurbo(&self) -> Rect {
        Rect::new(self.x, self.y, self.right(), self.bottom())
    }

    fn absorb(&mut self, c: &CharacterBox) {
        let right = self.right().max(c.right());
        self.x = self.x.min(c.x);
        self.width = right - self.x;
        self.y = self.y.min(c.y);
        self.height = self.height.max(c.height);
    }
}

/// Maps character-offset ranges to per-line highlight rectangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetHighlighter {
    line_tolerance: f64,
}

impl Default for OffsetHighlighter {
    fn default() -> Self {
        Self {
            line_tolerance: DEFAULT_LINE_TOLERANCE,
        }
    }
}

impl OffsetHighlighter {
    pub fn new(line_tolerance: f64) -> Self {
        if !line_tolerance.is_finite() || line_tolerance < 0.0 {
            return Self::default();
        }
        Self { line_tolerance }
    }

    pub fn line_tolerance(&self) -> f64 {
        self.line_tolerance
    }

    /// Covers the characters with `offset_start <= global_offset < offset_end`.
    ///
    /// `characters` must be sorted by `global_offset` without duplicates.
    /// Characters whose `y` lies within the line tolerance of an existing
    /// rectangle widen that rectangle, even when their x spans are disjoint.
    /// Rectangles come back in the order their first character appears.
    /// A range that selects nothing yields an empty vector.
    pub fn compute_rects(
        &self,
        page: &PageGeometry,
        characters: &[CharacterBox],
        offset_start: i64,
        offset_end: i64,
    ) -> Vec<HighlightRect> {
        let slice = select_range(characters, offset_start, offset_end);
        let mut lines: Vec<HighlightRect> = Vec::new();

        for c in slice {
            match lines
                .iter_mut()
                .find(|line| (line.y - c.y).abs() <= self.line_tolerance)
            {
                Some(line) => line.absorb(c),
                None => lines.push(HighlightRect::from_char(c, page)),
            }
        }

        lines
    }

    pub fn highlight(&self, map: &PageCharMap, request: &HighlightRequest) -> Vec<HighlightRect> {
        if request.page_index != map.page_index() {
            return Vec::new();
        }
        self.compute_rects(
            &map.page,
            &map.chars,
            request.offset_start,
            request.offset_end,
        )
    }
}

fn select_range(characters: &[CharacterBox], start: i64, end: i64) -> &[CharacterBox] {
    if start >= end {
        return &[];
    }
    let lo = characters.partition_point(|c| offset_of(c) < start);
    let hi = characters.partition_point(|c| offset_of(c) < end);
    &characters[lo..hi.max(lo)]
}

fn offset_of(c: &CharacterBox) -> i64 {
    i64::try_from(c.global_offset).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{HighlightRect, OffsetHighlighter};
    use crate::highlight::HighlightRequest;
    use crate::layout::{CharacterBox, PageCharMap, PageGeometry};

    fn page() -> PageGeometry {
        PageGeometry::new(0, 612.0, 792.0)
    }

    fn line(first_offset: usize, count: usize, x: f64, y: f64, width: f64) -> Vec<CharacterBox> {
        (0..count)
            .map(|i| CharacterBox {
                character: 'a',
                page_index: 0,
                x: x + width * i as f64,
                y,
                width,
                height: 12.0,
                global_offset: first_offset + i,
            })
            .collect()
    }

    fn two_lines() -> Vec<CharacterBox> {
        let mut chars = line(0, 10, 0.0, 100.0, 6.0);
        chars.extend(line(10, 10, 0.0, 114.0, 6.0));
        chars
    }

    fn assert_rect(rect: &HighlightRect, x: f64, y: f64, width: f64, height: f64) {
        assert!((rect.x - x).abs() < 1e-9, "x: {} != {x}", rect.x);
        assert!((rect.y - y).abs() < 1e-9, "y: {} != {y}", rect.y);
        assert!((rect.width - width).abs() < 1e-9, "width: {} != {width}", rect.width);
        assert!((rect.height - height).abs() < 1e-9, "height: {} != {height}", rect.height);
    }

    #[test]
    fn range_across_two_lines_yields_one_rect_per_line() {
        let highlighter = OffsetHighlighter::default();
        let rects = highlighter.compute_rects(&page(), &two_lines(), 3, 15);

        assert_eq!(rects.len(), 2);
        assert_rect(&rects[0], 18.0, 100.0, 42.0, 12.0);
        assert_rect(&rects[1], 0.0, 114.0, 30.0, 12.0);
        assert_eq!(rects[0].page_width, 612.0);
        assert_eq!(rects[1].page_height, 792.0);
    }

    #[test]
    fn empty_range_is_empty_for_every_start() {
        let highlighter = OffsetHighlighter::default();
        let chars = two_lines();
        for k in -3..25 {
            assert!(highlighter.compute_rects(&page(), &chars, k, k).is_empty());
        }
    }

    #[test]
    fn inverted_range_is_empty() {
        let highlighter = OffsetHighlighter::default();
        assert!(highlighter.compute_rects(&page(), &two_lines(), 8, 2).is_empty());
    }

    #[test]
    fn range_past_the_last_character_is_empty() {
        let highlighter = OffsetHighlighter::default();
        assert!(highlighter.compute_rects(&page(), &two_lines(), 50, 60).is_empty());
    }

    #[test]
    fn empty_input_is_empty() {
        let highlighter = OffsetHighlighter::default();
        assert!(highlighter.compute_rects(&page(), &[], 0, 10).is_empty());
    }

    #[test]
    fn single_character_matches_its_box() {
        let highlighter = OffsetHighlighter::default();
        let chars = two_lines();
        let rects = highlighter.compute_rects(&page(), &chars, 5, 6);

        assert_eq!(rects.len(), 1);
        assert_rect(&rects[0], chars[5].x, chars[5].y, chars[5].width, chars[5].height);
    }

    #[test]
    fn end_beyond_text_is_truncated() {
        let highlighter = OffsetHighlighter::default();
        let rects = highlighter.compute_rects(&page(), &two_lines(), 12, 1_000);

        assert_eq!(rects.len(), 1);
        assert_rect(&rects[0], 12.0, 114.0, 48.0, 12.0);
    }

    #[test]
    fn negative_start_is_a_plain_filter() {
        let highlighter = OffsetHighlighter::default();
        let rects = highlighter.compute_rects(&page(), &two_lines(), -40, 2);

        assert_eq!(rects.len(), 1);
        assert_rect(&rects[0], 0.0, 100.0, 12.0, 12.0);
    }

    #[test]
    fn jittered_fragments_on_one_line_merge_into_one_rect() {
        let mut chars = line(0, 4, 0.0, 100.0, 5.0);
        chars.extend(line(4, 4, 20.0, 101.5, 5.0));
        chars.extend(line(8, 4, 40.0, 99.0, 5.0));

        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 0, 12);
        assert_eq!(rects.len(), 1);
        assert_rect(&rects[0], 0.0, 99.0, 60.0, 12.0);
    }

    #[test]
    fn lines_further_apart_than_tolerance_stay_separate() {
        let mut chars = line(0, 3, 0.0, 100.0, 5.0);
        chars.extend(line(3, 3, 0.0, 102.5, 5.0));

        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 0, 6);
        assert_eq!(rects.len(), 2);

        let loose = OffsetHighlighter::new(3.0).compute_rects(&page(), &chars, 0, 6);
        assert_eq!(loose.len(), 1);
    }

    #[test]
    fn rects_keep_first_encounter_order() {
        let mut chars = line(0, 2, 0.0, 300.0, 5.0);
        chars.extend(line(2, 2, 0.0, 100.0, 5.0));
        chars.extend(line(4, 2, 20.0, 300.0, 5.0));

        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 0, 6);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].y, 300.0);
        assert_eq!(rects[1].y, 100.0);
        assert_rect(&rects[0], 0.0, 300.0, 30.0, 12.0);
    }

    #[test]
    fn disjoint_spans_on_the_same_line_merge_into_one_wide_rect() {
        let mut chars = line(0, 2, 0.0, 100.0, 5.0);
        chars.extend(line(2, 2, 300.0, 100.0, 5.0));

        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 0, 4);
        assert_eq!(rects.len(), 1);
        assert_rect(&rects[0], 0.0, 100.0, 310.0, 12.0);
    }

    #[test]
    fn taller_characters_grow_the_line_height() {
        let mut chars = line(0, 2, 0.0, 100.0, 5.0);
        chars[1].height = 16.0;

        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 0, 2);
        assert_rect(&rects[0], 0.0, 100.0, 10.0, 16.0);
    }

    #[test]
    fn every_selected_character_is_covered() {
        let chars = two_lines();
        let rects = OffsetHighlighter::default().compute_rects(&page(), &chars, 1, 19);

        for c in &chars[1..19] {
            assert!(
                rects
                    .iter()
                    .any(|r| r.x <= c.x && c.right() <= r.right() + 1e-9 && (r.y - c.y).abs() <= 2.0),
                "character at offset {} is not covered",
                c.global_offset
            );
        }
    }

    #[test]
    fn invalid_tolerance_falls_back_to_default() {
        assert_eq!(OffsetHighlighter::new(f64::NAN).line_tolerance(), 2.0);
        assert_eq!(OffsetHighlighter::new(-1.0).line_tolerance(), 2.0);
        assert_eq!(OffsetHighlighter::new(0.5).line_tolerance(), 0.5);
    }

    #[test]
    fn highlight_ignores_requests_for_other_pages() {
        let map = PageCharMap {
            page: page(),
            chars: two_lines(),
        };
        let highlighter = OffsetHighlighter::default();

        assert!(
            highlighter
                .highlight(&map, &HighlightRequest::new(1, 0, 5))
                .is_empty()
        );
        assert_eq!(
            highlighter
                .highlight(&map, &HighlightRequest::new(0, 0, 5))
                .len(),
            1
        );
    }
}
