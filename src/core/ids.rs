//! Day-scoped sequential identifiers.
//!
//! IDs look like `<kind>_YYYYMMDD_<seq>`. The sequence continues past the
//! highest suffix already taken today, so a fresh process never reissues an
//! ID that is already persisted.

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Next ID for `kind`, zero-padded to `width` digits.
///
/// `counter` is the process-wide sequence; `taken` are IDs already stored.
pub(crate) fn next_daily_id<'a>(
    kind: &str,
    width: usize,
    counter: &AtomicU32,
    taken: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = format!("{}_{}_", kind, Utc::now().format("%Y%m%d"));
    let floor = highest_suffix(&prefix, taken).map_or(0, |n| n.saturating_add(1));

    counter.fetch_max(floor, Ordering::SeqCst);
    let seq = counter.fetch_add(1, Ordering::SeqCst);
    format!("{}{:0width$}", prefix, seq, width = width)
}

fn highest_suffix<'a>(prefix: &str, taken: impl IntoIterator<Item = &'a str>) -> Option<u32> {
    taken
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
}
