//! Incremental synchronization of review feeds into a [`ReviewStore`].
//!
//! Each business is scanned newest first. The scan ends at the first review
//! that is already stored or older than the cutoff, or when the feed runs
//! dry; whatever follows the stopping review on the same page is never looked
//! at. Failures are contained: a broken review is skipped, a broken business
//! is logged and the run moves on to the next one.

pub mod cursor;
pub mod stop;

use core::fmt;
use std::time::SystemTime;

use compact_str::CompactString;

use crate::{
    date,
    error::SyncError,
    review::{Business, Review},
    scrape::ReviewSource,
    store::ReviewStore,
};
use cursor::PageCursor;
use stop::Verdict;

pub type Clock = Box<dyn Fn() -> SystemTime + Send + Sync>;

/// Why the scan of a business ended normally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Halt {
    Exhausted,
    Known(CompactString),
    Expired(CompactString),
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("feed exhausted"),
            Self::Known(id) => write!(f, "reached stored review {id}"),
            Self::Expired(id) => write!(f, "reached review {id} older than cutoff"),
        }
    }
}

#[derive(Debug)]
pub struct BusinessReport {
    pub business: CompactString,
    pub inserted: usize,
    /// Reviews that went through the stop decision, the stopping one included.
    pub evaluated: usize,
    /// Reviews dropped because of a date or store error.
    pub skipped: usize,
    pub halt: Option<Halt>,
    pub error: Option<SyncError>,
}

impl BusinessReport {
    fn new(business: &Business) -> Self {
        Self {
            business: business.ident.clone(),
            inserted: 0,
            evaluated: 0,
            skipped: 0,
            halt: None,
            error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<BusinessReport>,
}

impl RunSummary {
    pub fn total_inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BusinessReport> {
        self.reports.iter().filter(|r| r.error.is_some())
    }

    pub fn get(&self, business: &str) -> Option<&BusinessReport> {
        self.reports.iter().find(|r| r.business == business)
    }
}

pub struct Orchestrator<F, S> {
    source: F,
    store: S,
    clock: Clock,
}

impl<F: ReviewSource, S: ReviewStore> Orchestrator<F, S> {
    pub fn new(source: F, store: S) -> Self {
        Self {
            source,
            store,
            clock: Box::new(SystemTime::now),
        }
    }

    /// Replaces the wall clock used to stamp fetched pages.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> SystemTime + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Synchronizes `businesses` one after another, then closes the source.
    pub async fn run(mut self, businesses: &[Business], cutoff: SystemTime) -> RunSummary {
        let mut reports = Vec::with_capacity(businesses.len());

        for business in businesses {
            let mut report = BusinessReport::new(business);
            match self.sync_business(business, cutoff, &mut report).await {
                Ok(halt) => {
                    tracing::info!(target: "sync", "\x1b[36m{business} : {} new reviews\x1b[0m ({halt})", report.inserted);
                    report.halt = Some(halt);
                }
                Err(e) => {
                    tracing::error!(target: "sync", "\x1b[31m{business}: {e}\x1b[0m ({} new reviews before failing)", report.inserted);
                    report.error = Some(e);
                }
            }
            reports.push(report);
        }

        if let Err(e) = self.source.close().await {
            tracing::warn!(target: "sync", "closing review source: {e:#}");
        }

        RunSummary { reports }
    }

    async fn sync_business(
        &mut self,
        business: &Business,
        cutoff: SystemTime,
        report: &mut BusinessReport,
    ) -> Result<Halt, SyncError> {
        self.source
            .sort_by_recency(business)
            .await
            .map_err(SyncError::Sort)?;

        let mut cursor = PageCursor::new();
        loop {
            let offset = cursor.offset();
            let page = cursor
                .next_page(&mut self.source)
                .await
                .map_err(|source| SyncError::Fetch { offset, source })?;
            let Some(page) = page else {
                return Ok(Halt::Exhausted);
            };
            let retrieved = (self.clock)();

            for raw in page {
                let resolved = date::resolve(raw.relative_date.as_deref().unwrap_or_default(), retrieved);
                let verdict = stop::evaluate(&raw.id, resolved.as_ref().ok().copied(), &self.store, cutoff).await;
                let resolved = match verdict {
                    Ok(Verdict::Eligible(t)) => t,
                    Ok(Verdict::Known) => {
                        report.evaluated += 1;
                        return Ok(Halt::Known(raw.id));
                    }
                    Ok(Verdict::Expired) => {
                        report.evaluated += 1;
                        return Ok(Halt::Expired(raw.id));
                    }
                    Ok(Verdict::Undated) => {
                        if let Err(e) = resolved {
                            let e = SyncError::from(e);
                            tracing::warn!(target: "sync", "{business}: review {} skipped: {e}", raw.id);
                        }
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        let e = SyncError::Store(e);
                        tracing::error!(target: "sync", "{business}: review {} skipped: {e}", raw.id);
                        report.evaluated += 1;
                        report.skipped += 1;
                        continue;
                    }
                };

                report.evaluated += 1;
                let review = Review {
                    raw,
                    resolved,
                    retrieved,
                    business: business.ident.clone(),
                };
                match self.store.upsert(&review).await {
                    Ok(true) => report.inserted += 1,
                    Ok(false) => tracing::debug!(target: "sync", "{business}: review {} was inserted concurrently", review.id()),
                    Err(e) => {
                        let e = SyncError::Store(e);
                        tracing::error!(target: "sync", "{business}: review {} skipped: {e}", review.id());
                        report.skipped += 1;
                    }
                }
            }
        }
    }
}
