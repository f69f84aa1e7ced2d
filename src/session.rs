use std::sync::Arc;

use crate::backend::PageTextExtractor;
use crate::cache::{PageCharCache, PageKey};
use crate::config::Config;
use crate::error::AppResult;
use crate::highlight::{
    Citation, HighlightRect, HighlightRequest, OffsetHighlighter, TaggedRect, find_matches,
    highlight_citations,
};
use crate::layout::PageCharMap;

/// One open document together with the page cache and highlighter that serve it.
pub struct DocumentSession {
    doc: Box<dyn PageTextExtractor>,
    cache: PageCharCache,
    highlighter: OffsetHighlighter,
}

impl DocumentSession {
    pub fn new(doc: Box<dyn PageTextExtractor>, config: &Config) -> Self {
        Self {
            doc,
            cache: PageCharCache::new(config.cache.max_pages),
            highlighter: config.highlight.highlighter(),
        }
    }

    pub fn doc(&self) -> &dyn PageTextExtractor {
        self.doc.as_ref()
    }

    pub fn cache(&self) -> &PageCharCache {
        &self.cache
    }

    pub fn char_map(&mut self, page: usize) -> AppResult<Arc<PageCharMap>> {
        let key = PageKey::new(self.doc.doc_id(), page);
        let doc = self.doc.as_ref();
        self.cache.get_or_try_insert_with(key, || doc.char_map(page))
    }

    pub fn highlight(&mut self, request: &HighlightRequest) -> AppResult<Vec<HighlightRect>> {
        let map = self.char_map(request.page_index)?;
        Ok(self.highlighter.highlight(&map, request))
    }

    /// Rectangles for every occurrence of `query` on `page`, one group per match.
    pub fn highlight_query(
        &mut self,
        page: usize,
        query: &str,
    ) -> AppResult<Vec<Vec<HighlightRect>>> {
        let map = self.char_map(page)?;
        Ok(find_matches(&map, query)
            .iter()
            .map(|request| self.highlighter.highlight(&map, request))
            .collect())
    }

    pub fn highlight_citations(&mut self, file_name: &str, citations: &[Citation]) -> Vec<TaggedRect> {
        let highlighter = self.highlighter;
        highlight_citations(&highlighter, file_name, citations, |page| self.char_map(page))
    }
}
