mod chars;
mod fragment;

pub use chars::{CharacterBox, PageCharMap, expand_fragments};
pub use fragment::{OriginConvention, PageGeometry, PageLayout, TextFragment};
