use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::layout::PageCharMap;

use super::rects::{HighlightRect, OffsetHighlighter};

/// `[offset_start, offset_end)` on one page, in `global_offset` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRequest {
    pub page_index: usize,
    pub offset_start: i64,
    pub offset_end: i64,
}

impl HighlightRequest {
    pub fn new(page_index: usize, offset_start: i64, offset_end: i64) -> Self {
        Self {
            page_index,
            offset_start,
            offset_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.offset_start >= self.offset_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(default)]
    pub id: String,
    pub file_name: String,
    /// 1-based.
    pub page_number: usize,
    pub offset_start: i64,
    pub offset_end: i64,
}

impl Citation {
    pub fn to_request(&self) -> AppResult<HighlightRequest> {
        let Some(page_index) = self.page_number.checked_sub(1) else {
            return Err(AppError::invalid_argument(format!(
                "citation {:?} has page number 0 (pages are 1-based)",
                self.id
            )));
        };
        Ok(HighlightRequest::new(
            page_index,
            self.offset_start,
            self.offset_end,
        ))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CitationPayload {
    Many(Vec<Citation>),
    One(Citation),
    Nothing(Option<()>),
}

/// Accepts a single citation object, an array of them, or `null`.
pub fn parse_citations(raw: &str) -> AppResult<Vec<Citation>> {
    let payload = serde_json::from_str::<CitationPayload>(raw).map_err(|source| {
        AppError::json_with_context(source, "expected a citation, an array of citations or null")
    })?;

    Ok(match payload {
        CitationPayload::Many(citations) => citations,
        CitationPayload::One(citation) => vec![citation],
        CitationPayload::Nothing(_) => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedRect {
    pub citation_id: String,
    #[serde(flatten)]
    pub rect: HighlightRect,
}

/// Highlights every citation that targets `file_name`, in citation order.
///
/// Pages that fail to load are logged and skipped so that one broken page
/// does not hide the remaining highlights.
pub fn highlight_citations<F>(
    highlighter: &OffsetHighlighter,
    file_name: &str,
    citations: &[Citation],
    mut load_page: F,
) -> Vec<TaggedRect>
where
    F: FnMut(usize) -> AppResult<Arc<PageCharMap>>,
{
    let mut out = Vec::new();

    for citation in citations.iter().filter(|c| c.file_name == file_name) {
        let request = match citation.to_request() {
            Ok(request) => request,
            Err(err) => {
                log::warn!("skipping citation {:?}: {err}", citation.id);
                continue;
            }
        };
        if request.is_empty() {
            continue;
        }

        let map = match load_page(request.page_index) {
            Ok(map) => map,
            Err(err) => {
                log::warn!(
                    "skipping citation {:?} on page {}: {err}",
                    citation.id,
                    citation.page_number
                );
                continue;
            }
        };

        out.extend(
            highlighter
                .highlight(&map, &request)
                .into_iter()
                .map(|rect| TaggedRect {
                    citation_id: citation.id.clone(),
                    rect,
                }),
        );
    }

    out
}

/// First rectangle of the citation, i.e. where a viewer should scroll to.
pub fn anchor_for<'a>(rects: &'a [TaggedRect], citation_id: &str) -> Option<&'a TaggedRect> {
    rects.iter().find(|tagged| tagged.citation_id == citation_id)
}
