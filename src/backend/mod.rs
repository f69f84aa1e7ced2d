use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::error::{AppError, AppResult};

mod hayro;
mod json;
mod traits;

pub use hayro::PdfDoc;
pub use json::JsonLayoutDoc;
pub use traits::PageTextExtractor;

/// Opens `.json` layout dumps with [`JsonLayoutDoc`] and everything else as a PDF.
pub fn open_document(path: impl AsRef<Path>) -> AppResult<Box<dyn PageTextExtractor>> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        JsonLayoutDoc::open(path).map(|doc| Box::new(doc) as Box<dyn PageTextExtractor>)
    } else {
        PdfDoc::open(path).map(|doc| Box::new(doc) as Box<dyn PageTextExtractor>)
    }
}

pub(crate) fn calculate_doc_id(path: &Path, byte_len: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    byte_len.hash(&mut hasher);
    hasher.finish()
}

pub(crate) fn check_regular_file(path: &Path, kind: &str) -> AppResult<()> {
    if path.as_os_str().is_empty() {
        return Err(AppError::invalid_argument(format!(
            "{kind} path must not be empty"
        )));
    }
    if !path.exists() {
        return Err(AppError::io_with_context(
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"),
            format!("{kind} file not found: {}", path.display()),
        ));
    }
    if !path.is_file() {
        return Err(AppError::invalid_argument(format!(
            "{kind} path must be a regular file"
        )));
    }
    Ok(())
}
