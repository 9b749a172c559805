use core::fmt;
use std::time::SystemTime;

use compact_str::CompactString;

/// A tracked business, identified by its Google Maps URL or by a plain name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Business {
    pub ident: CompactString,
}

impl Business {
    pub fn new(ident: impl Into<CompactString>) -> Self {
        Self { ident: ident.into() }
    }

    pub fn is_url(&self) -> bool {
        self.ident.starts_with("https://") || self.ident.starts_with("http://")
    }
}

impl fmt::Display for Business {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident)
    }
}

/// One review block as extracted from the page.
///
/// Every attribute except the id may be missing from the markup; missing
/// attributes stay `None` (or 0 for the author's review count) and the review
/// is still processed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawReview {
    pub id: CompactString,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub relative_date: Option<String>,
    pub author_reviews: i32,
    pub author_url: Option<String>,
    pub caption: Option<String>,
}

/// A review ready to be persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Review {
    pub raw: RawReview,
    /// Absolute time derived from `raw.relative_date` at retrieval. Never recomputed.
    pub resolved: SystemTime,
    pub retrieved: SystemTime,
    pub business: CompactString,
}

impl Review {
    #[inline]
    pub fn id(&self) -> &str {
        &self.raw.id
    }
}
