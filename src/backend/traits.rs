use std::path::Path;

use crate::error::AppResult;
use crate::layout::{PageCharMap, PageGeometry, PageLayout};

/// Source of per-page text layout at scale 1.
pub trait PageTextExtractor: Send {
    fn path(&self) -> &Path;
    fn doc_id(&self) -> u64;
    fn page_count(&self) -> usize;
    fn page_geometry(&self, page: usize) -> AppResult<PageGeometry>;
    fn page_layout(&self, page: usize) -> AppResult<PageLayout>;

    fn char_map(&self, page: usize) -> AppResult<PageCharMap> {
        self.page_layout(page)
            .map(|layout| PageCharMap::from_layout(&layout))
    }
}
