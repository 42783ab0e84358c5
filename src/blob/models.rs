//! Data models for blob storage operations

use chrono::{DateTime, Utc};

/// Azure blob type as reported by the listing API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    BlockBlob,
    PageBlob,
    AppendBlob,
}

/// One entry of a container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub name: String,
    pub last_modified: DateTime<Utc>,
    pub kind: BlobKind,
}

impl BlobEntry {
    pub fn new(name: impl Into<String>, last_modified: DateTime<Utc>, kind: BlobKind) -> Self {
        Self {
            name: name.into(),
            last_modified,
            kind,
        }
    }
}
