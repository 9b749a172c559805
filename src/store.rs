//! Idempotent review persistence.

use std::sync::Arc;

use compact_str::CompactString;
use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::review::Review;

/// Insert-if-absent storage keyed by the external review id.
///
/// `upsert` never overwrites: a review's fields are fixed by the first
/// insertion, so replaying a half-finished run is harmless.
pub trait ReviewStore {
    fn exists(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>>;

    /// Returns `true` if the review was newly inserted.
    fn upsert(&self, review: &Review) -> impl Future<Output = anyhow::Result<bool>>;
}

impl<S: ReviewStore> ReviewStore for &S {
    #[inline]
    fn exists(&self, id: &str) -> impl Future<Output = anyhow::Result<bool>> {
        (**self).exists(id)
    }

    #[inline]
    fn upsert(&self, review: &Review) -> impl Future<Output = anyhow::Result<bool>> {
        (**self).upsert(review)
    }
}

/// Process-local store, used for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<HashMap<CompactString, Review>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Review> {
        self.rows.lock().get(id).cloned()
    }

    /// Seeds a review as if stored by an earlier run.
    pub fn preload(&self, review: Review) {
        self.rows.lock().insert(review.raw.id.clone(), review);
    }
}

impl ReviewStore for MemoryStore {
    async fn exists(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.rows.lock().contains_key(id))
    }

    async fn upsert(&self, review: &Review) -> anyhow::Result<bool> {
        use hashbrown::hash_map::Entry;

        Ok(match self.rows.lock().entry(review.raw.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(review.clone());
                true
            }
        })
    }
}
