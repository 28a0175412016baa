//! Directory entry types shared by the tree and native backends

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// MIME type document providers report for directories
pub const DIRECTORY_MIME_TYPE: &str = "vnd.android.document/directory";

/// Where a listed entry lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryLocation {
    /// Fully qualified document URI inside a granted tree
    Uri(String),
    /// Absolute native filesystem path
    Path(String),
}

/// A single child produced by a listing call. Never cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub location: EntryLocation,
    pub name: String,
    /// Epoch milliseconds, 0 when unknown
    pub last_modified: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.is_directory.unwrap_or(false)
            || self.mime_type.as_deref() == Some(DIRECTORY_MIME_TYPE)
    }
}

/// Row returned by a document provider children query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub document_id: String,
    pub display_name: String,
    pub last_modified: i64,
    pub mime_type: Option<String>,
}

/// Convert a filesystem timestamp to epoch milliseconds
///
/// Times chrono cannot represent come out as 0.
pub fn epoch_millis(time: SystemTime) -> i64 {
    let offset = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => chrono::Duration::from_std(after),
        Err(before) => chrono::Duration::from_std(before.duration()).map(|d| -d),
    };
    offset.map(|d| d.num_milliseconds()).unwrap_or(0)
}

/// Sort entries directories first, then by case-insensitive name
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| match (a.is_dir(), b.is_dir()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
}
