mod query;
mod rects;
mod request;

pub use query::find_matches;
pub use rects::{DEFAULT_LINE_TOLERANCE, HighlightRect, OffsetHighlighter};
pub use request::{
    Citation, HighlightRequest, TaggedRect, anchor_for, highlight_citations, parse_citations,
};
