use core::time::Duration;
use std::{sync::Arc, time::SystemTime};

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use rvmon::{
    error::SyncError,
    review::{Business, RawReview, Review},
    scrape::ReviewSource,
    store::{MemoryStore, ReviewStore},
    sync::{Halt, Orchestrator},
    util::parse_cutoff,
};

const DAY: u64 = 86_400;

/// 2022-03-01T00:00:00Z
fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_646_092_800)
}

fn cutoff() -> SystemTime {
    parse_cutoff("2022-01-01").unwrap()
}

fn raw(id: &str, relative: &str) -> RawReview {
    RawReview {
        id: id.into(),
        author: Some(format!("author of {id}")),
        rating: Some(5.0),
        relative_date: Some(relative.to_owned()),
        ..RawReview::default()
    }
}

#[derive(Default)]
struct Journal {
    sorted: Vec<String>,
    fetched: Vec<(String, usize)>,
    closed: usize,
}

/// Serves fixed feeds in pages of `page_size`, with optional failures.
#[derive(Default)]
struct ScriptedSource {
    feeds: HashMap<String, Vec<RawReview>>,
    page_size: usize,
    fail_sort: HashSet<String>,
    fail_fetch_at: HashMap<String, usize>,
    current: Option<String>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedSource {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    fn feed(mut self, business: &str, reviews: Vec<RawReview>) -> Self {
        self.feeds.insert(business.to_owned(), reviews);
        self
    }

    fn failing_sort(mut self, business: &str) -> Self {
        self.fail_sort.insert(business.to_owned());
        self
    }

    fn failing_fetch(mut self, business: &str, offset: usize) -> Self {
        self.fail_fetch_at.insert(business.to_owned(), offset);
        self
    }

    fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }
}

impl ReviewSource for ScriptedSource {
    async fn sort_by_recency(&mut self, business: &Business) -> anyhow::Result<()> {
        let ident = business.ident.to_string();
        self.journal.lock().sorted.push(ident.clone());
        if self.fail_sort.contains(&ident) {
            self.current = None;
            anyhow::bail!("sort button not found");
        }
        self.current = Some(ident);
        Ok(())
    }

    async fn fetch_review_page(&mut self, offset: usize) -> anyhow::Result<Vec<RawReview>> {
        let Some(current) = self.current.clone() else {
            anyhow::bail!("no business selected");
        };
        self.journal.lock().fetched.push((current.clone(), offset));
        if self.fail_fetch_at.get(&current) == Some(&offset) {
            anyhow::bail!("review pane vanished");
        }
        let feed = self.feeds.get(&current).map(Vec::as_slice).unwrap_or_default();
        let start = offset.min(feed.len());
        let end = (offset + self.page_size).min(feed.len());
        Ok(feed[start..end].to_vec())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.journal.lock().closed += 1;
        Ok(())
    }
}

/// Wraps a [`MemoryStore`], recording existence checks and failing on demand.
#[derive(Clone, Default)]
struct RecordingStore {
    inner: MemoryStore,
    checked: Arc<Mutex<Vec<String>>>,
    fail_upsert: Arc<Mutex<HashSet<String>>>,
    fail_exists: Arc<Mutex<HashSet<String>>>,
}

impl RecordingStore {
    fn checked(&self) -> Vec<String> {
        self.checked.lock().clone()
    }
}

impl ReviewStore for RecordingStore {
    async fn exists(&self, id: &str) -> anyhow::Result<bool> {
        self.checked.lock().push(id.to_owned());
        if self.fail_exists.lock().contains(id) {
            anyhow::bail!("connection reset");
        }
        self.inner.exists(id).await
    }

    async fn upsert(&self, review: &Review) -> anyhow::Result<bool> {
        if self.fail_upsert.lock().contains(review.id()) {
            anyhow::bail!("connection reset");
        }
        self.inner.upsert(review).await
    }
}

fn stored(store: &MemoryStore, id: &str, business: &str) {
    store.preload(Review {
        raw: raw(id, "a week"),
        resolved: now() - Duration::from_secs(7 * DAY),
        retrieved: now() - Duration::from_secs(DAY),
        business: business.into(),
    });
}

#[tokio::test]
async fn end_to_end_cutoff_stops_scan() {
    let source = ScriptedSource::new(10).feed("x", vec![raw("r1", "2 days"), raw("r2", "3 years")]);
    let store = MemoryStore::new();

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    assert_eq!(summary.total_inserted(), 1);
    assert!(store.get("r1").is_some());
    assert!(store.get("r2").is_none());
    let report = summary.get("x").unwrap();
    assert_eq!(report.halt, Some(Halt::Expired("r2".into())));
    assert!(report.error.is_none());

    let r1 = store.get("r1").unwrap();
    assert_eq!(r1.resolved, now() - Duration::from_secs(2 * DAY));
    assert_eq!(r1.retrieved, now());
    assert_eq!(r1.business, "x");
}

#[tokio::test]
async fn stored_review_halts_mid_page() {
    let source = ScriptedSource::new(10).feed(
        "x",
        vec![raw("A", "1 day"), raw("B", "2 days"), raw("C", "3 days"), raw("D", "4 days")],
    );
    let journal = source.journal();
    let store = RecordingStore::default();
    stored(&store.inner, "C", "x");

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    assert_eq!(summary.total_inserted(), 2);
    assert_eq!(store.checked(), ["A", "B", "C"]);
    assert!(store.inner.get("D").is_none());
    assert_eq!(summary.get("x").unwrap().halt, Some(Halt::Known("C".into())));
    // no further page was requested after the stop
    assert_eq!(journal.lock().fetched, [("x".to_owned(), 0)]);
}

#[tokio::test]
async fn cutoff_boundary_is_inclusive() {
    let cutoff = now() - Duration::from_secs(2 * DAY);
    let source = ScriptedSource::new(10).feed("x", vec![raw("edge", "2 days"), raw("old", "3 days")]);
    let store = MemoryStore::new();

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff)
        .await;

    assert!(store.get("edge").is_some());
    assert!(store.get("old").is_none());
    assert_eq!(summary.total_inserted(), 1);
}

#[tokio::test]
async fn empty_feed_is_exhausted_without_error() {
    let source = ScriptedSource::new(10).feed("x", Vec::new());
    let journal = source.journal();

    let summary = Orchestrator::new(source, MemoryStore::new())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    let report = summary.get("x").unwrap();
    assert_eq!(report.halt, Some(Halt::Exhausted));
    assert!(report.error.is_none());
    assert_eq!(report.inserted, 0);
    assert_eq!(summary.failures().count(), 0);
    assert_eq!(journal.lock().fetched, [("x".to_owned(), 0)]);
}

#[tokio::test]
async fn pagination_advances_by_page_length() {
    let feed = (0..5).map(|i| raw(&format!("r{i}"), &format!("{} days", i + 1))).collect();
    let source = ScriptedSource::new(2).feed("x", feed);
    let journal = source.journal();
    let store = MemoryStore::new();

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    assert_eq!(summary.total_inserted(), 5);
    assert_eq!(store.len(), 5);
    let offsets = journal.lock().fetched.iter().map(|(_, o)| *o).collect::<Vec<_>>();
    assert_eq!(offsets, [0, 2, 4, 5]);
    assert_eq!(summary.get("x").unwrap().halt, Some(Halt::Exhausted));
}

#[tokio::test]
async fn sort_failure_is_isolated() {
    let source = ScriptedSource::new(10)
        .feed("a", vec![raw("a1", "1 day")])
        .feed("b", vec![raw("b1", "1 day")])
        .feed("c", vec![raw("c1", "1 day"), raw("c2", "1 week")])
        .failing_sort("b");
    let journal = source.journal();
    let store = MemoryStore::new();

    let businesses = [Business::new("a"), Business::new("b"), Business::new("c")];
    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&businesses, cutoff())
        .await;

    assert_eq!(summary.get("a").unwrap().inserted, 1);
    assert_eq!(summary.get("c").unwrap().inserted, 2);
    let b = summary.get("b").unwrap();
    assert!(matches!(b.error, Some(SyncError::Sort(_))));
    assert_eq!(b.inserted, 0);
    assert!(store.get("b1").is_none());

    let journal = journal.lock();
    assert_eq!(journal.sorted, ["a", "b", "c"]);
    assert!(journal.fetched.iter().all(|(business, _)| business != "b"));
}

#[tokio::test]
async fn fetch_failure_keeps_earlier_pages() {
    let source = ScriptedSource::new(2)
        .feed("a", vec![raw("a1", "1 day"), raw("a2", "2 days"), raw("a3", "3 days")])
        .feed("b", vec![raw("b1", "1 day")])
        .failing_fetch("a", 2);
    let store = MemoryStore::new();

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("a"), Business::new("b")], cutoff())
        .await;

    let a = summary.get("a").unwrap();
    assert!(matches!(a.error, Some(SyncError::Fetch { offset: 2, .. })));
    assert!(a.error.as_ref().unwrap().is_fatal_for_business());
    assert_eq!(a.inserted, 2);
    assert!(store.get("a3").is_none());
    assert_eq!(summary.get("b").unwrap().inserted, 1);
    assert_eq!(summary.total_inserted(), 3);
}

#[tokio::test]
async fn source_closed_once_even_when_everything_fails() {
    let source = ScriptedSource::new(10).failing_sort("a").failing_sort("b");
    let journal = source.journal();

    let summary = Orchestrator::new(source, MemoryStore::new())
        .run(&[Business::new("a"), Business::new("b")], cutoff())
        .await;

    assert_eq!(summary.failures().count(), 2);
    assert_eq!(journal.lock().closed, 1);
}

#[tokio::test]
async fn source_closed_once_with_no_businesses() {
    let source = ScriptedSource::new(10);
    let journal = source.journal();

    let summary = Orchestrator::new(source, MemoryStore::new()).run(&[], cutoff()).await;

    assert!(summary.reports.is_empty());
    assert_eq!(journal.lock().closed, 1);
}

#[tokio::test]
async fn unresolvable_date_skips_only_that_review() {
    let mut undated = raw("r2", "");
    undated.relative_date = None;
    let source = ScriptedSource::new(10).feed(
        "x",
        vec![raw("r1", "1 day"), undated, raw("r3", "3 fortnights"), raw("r4", "2 days")],
    );
    let store = MemoryStore::new();

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    let report = summary.get("x").unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.evaluated, 2);
    assert!(store.get("r4").is_some());
    assert!(report.error.is_none());
}

#[tokio::test]
async fn stored_review_with_unreadable_date_halts() {
    let source = ScriptedSource::new(10).feed(
        "x",
        vec![raw("A", "1 day"), raw("B", "yesterday"), raw("C", "2 days")],
    );
    let store = RecordingStore::default();
    stored(&store.inner, "B", "x");

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    let report = summary.get("x").unwrap();
    assert_eq!(report.halt, Some(Halt::Known("B".into())));
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 0);
    assert!(store.inner.get("A").is_some());
    assert!(store.inner.get("C").is_none());
    assert_eq!(store.checked(), ["A", "B"]);
}

#[tokio::test]
async fn store_failures_skip_the_review() {
    let source = ScriptedSource::new(10).feed(
        "x",
        vec![raw("r1", "1 day"), raw("r2", "2 days"), raw("r3", "3 days")],
    );
    let store = RecordingStore::default();
    store.fail_upsert.lock().insert("r1".to_owned());
    store.fail_exists.lock().insert("r2".to_owned());

    let summary = Orchestrator::new(source, store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    let report = summary.get("x").unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 2);
    assert!(store.inner.get("r3").is_some());
    assert_eq!(report.halt, Some(Halt::Exhausted));
}

#[tokio::test]
async fn second_run_resumes_without_duplicates() {
    let feed = vec![raw("r1", "1 day"), raw("r2", "2 days"), raw("r3", "1 year")];
    let store = MemoryStore::new();

    let first = Orchestrator::new(ScriptedSource::new(10).feed("x", feed.clone()), store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;
    assert_eq!(first.total_inserted(), 2);

    let mut newer = vec![raw("r0", "moments")];
    newer.extend(feed);
    let second = Orchestrator::new(ScriptedSource::new(10).feed("x", newer), store.clone())
        .with_clock(now)
        .run(&[Business::new("x")], cutoff())
        .await;

    assert_eq!(second.total_inserted(), 1);
    assert_eq!(second.get("x").unwrap().halt, Some(Halt::Known("r1".into())));
    assert_eq!(store.len(), 3);
}
