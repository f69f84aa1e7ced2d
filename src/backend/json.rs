use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::layout::{PageGeometry, PageLayout};

use super::traits::PageTextExtractor;
use super::{calculate_doc_id, check_regular_file};

#[derive(Debug, Deserialize)]
struct LayoutDump {
    pages: Vec<PageLayout>,
}

/// Pre-extracted page layouts, e.g. a dump of pdf.js `getTextContent()` items.
#[derive(Debug, Clone)]
pub struct JsonLayoutDoc {
    path: PathBuf,
    doc_id: u64,
    pages: Vec<PageLayout>,
}

impl JsonLayoutDoc {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        check_regular_file(path, "layout")?;
        let raw = std::fs::read_to_string(path).map_err(|source| {
            AppError::io_with_context(source, format!("failed to read layout: {}", path.display()))
        })?;
        let doc_id = calculate_doc_id(path, raw.len());
        Self::from_json(path, doc_id, &raw)
    }

    pub fn from_json(path: impl AsRef<Path>, doc_id: u64, raw: &str) -> AppResult<Self> {
        let path = path.as_ref();
        let dump = serde_json::from_str::<LayoutDump>(raw).map_err(|source| {
            AppError::json_with_context(source, format!("layout dump {}", path.display()))
        })?;

        if let Some((position, layout)) = dump
            .pages
            .iter()
            .enumerate()
            .find(|(position, layout)| layout.page.page_index != *position)
        {
            return Err(AppError::invalid_argument(format!(
                "layout page at position {position} declares pageIndex {}",
                layout.page.page_index
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            doc_id,
            pages: dump.pages,
        })
    }

    fn page(&self, page: usize) -> AppResult<&PageLayout> {
        self.pages
            .get(page)
            .ok_or(AppError::invalid_argument("page index is out of range"))
    }
}

impl PageTextExtractor for JsonLayoutDoc {
    fn path(&self) -> &Path {
        &self.path
    }

    fn doc_id(&self) -> u64 {
        self.doc_id
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_geometry(&self, page: usize) -> AppResult<PageGeometry> {
        self.page(page).map(|layout| layout.page)
    }

    fn page_layout(&self, page: usize) -> AppResult<PageLayout> {
        self.page(page).cloned()
    }
}
