use thiserror::Error;

use crate::date::DateError;

/// Why one unit of work (a business, or a single review) was abandoned.
///
/// None of these abort a run: the orchestrator logs them and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot sort reviews by recency: {0:#}")]
    Sort(anyhow::Error),
    #[error("cannot fetch review page at offset {offset}: {source:#}")]
    Fetch {
        offset: usize,
        source: anyhow::Error,
    },
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("store failure: {0:#}")]
    Store(anyhow::Error),
}

impl SyncError {
    /// Whether the error ends the current business, as opposed to a single review.
    pub const fn is_fatal_for_business(&self) -> bool {
        matches!(self, Self::Sort(_) | Self::Fetch { .. })
    }
}
