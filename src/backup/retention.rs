//! Retention window evaluation
//!
//! A blob is expired only if it is a block blob and its last-modified time
//! is strictly earlier than the cutoff. Blob names are not consulted: the
//! container is expected to hold nothing but backups.

use chrono::{DateTime, Duration, Utc};

use crate::blob::models::{BlobEntry, BlobKind};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// `now - retention_days`
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(retention_days))
}

pub fn is_expired(entry: &BlobEntry, cutoff: DateTime<Utc>) -> bool {
    entry.kind == BlobKind::BlockBlob && entry.last_modified < cutoff
}

/// Entries to delete, in listing order
pub fn select_expired(entries: &[BlobEntry], cutoff: DateTime<Utc>) -> Vec<&BlobEntry> {
    entries
        .iter()
        .filter(|entry| is_expired(entry, cutoff))
        .collect()
}
