use crate::layout::PageCharMap;

use super::request::HighlightRequest;

/// Case-insensitive, non-overlapping occurrences of `query` on the page.
pub fn find_matches(map: &PageCharMap, query: &str) -> Vec<HighlightRequest> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let needle: Vec<char> = query.chars().map(fold_char).collect();
    let hay: Vec<char> = map.chars.iter().map(|c| fold_char(c.character)).collect();

    let mut out = Vec::new();
    let mut start = 0_usize;
    while start + needle.len() <= hay.len() {
        if hay[start..start + needle.len()] == needle[..] {
            let offset_start = map.chars[start].global_offset as i64;
            out.push(HighlightRequest::new(
                map.page_index(),
                offset_start,
                offset_start + needle.len() as i64,
            ));
            start += needle.len();
        } else {
            start += 1;
        }
    }

    out
}

// One char in, one char out, so match positions stay valid offsets.
fn fold_char(ch: char) -> char {
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}
