use crate::{review::RawReview, scrape::ReviewSource};

/// Offset-based pagination over one business's feed.
#[derive(Debug, Default)]
pub struct PageCursor {
    offset: usize,
    exhausted: bool,
}

impl PageCursor {
    pub const fn new() -> Self {
        Self {
            offset: 0,
            exhausted: false,
        }
    }

    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Fetches the next page. `None` once the source returns an empty page;
    /// the cursor stays exhausted afterwards without asking the source again.
    pub async fn next_page<F: ReviewSource>(&mut self, source: &mut F) -> anyhow::Result<Option<Vec<RawReview>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = source.fetch_review_page(self.offset).await?;
        if page.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        self.offset += page.len();
        Ok(Some(page))
    }
}
