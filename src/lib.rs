//! Citation highlight geometry for PDF pages.
//!
//! A page's text layout ([`layout::PageLayout`]) is expanded into per-character
//! boxes, and [`highlight::OffsetHighlighter`] turns a character-offset range
//! into one rectangle per visual line, in page space at scale 1.

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod highlight;
pub mod layout;
pub mod loader;
pub mod overlay;
pub mod session;
