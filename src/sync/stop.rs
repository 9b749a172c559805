use std::time::SystemTime;

use crate::store::ReviewStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// New and inside the window: insert at the resolved time and keep scanning.
    Eligible(SystemTime),
    /// Already stored; everything older is presumed stored too.
    Known,
    /// Older than the cutoff.
    Expired,
    /// New, but its date could not be resolved: skip it and keep scanning.
    Undated,
}

/// Decides whether the review `id`, resolved to `resolved`, ends the scan of
/// its business.
///
/// The existence check comes first: a stored review stops the scan even
/// when it is inside the window or its date is unknown. `cutoff` itself is
/// inside the window.
pub async fn evaluate<S: ReviewStore>(
    id: &str,
    resolved: Option<SystemTime>,
    store: &S,
    cutoff: SystemTime,
) -> anyhow::Result<Verdict> {
    if store.exists(id).await? {
        return Ok(Verdict::Known);
    }
    Ok(match resolved {
        None => Verdict::Undated,
        Some(t) if t < cutoff => Verdict::Expired,
        Some(t) => Verdict::Eligible(t),
    })
}
