//! Direct filesystem access gated by the broad-access permission

use crate::capability::BroadAccessGate;
use crate::error::{Error, NativeError, Result};
use crate::types::{epoch_millis, sort_entries, DirectoryEntry, EntryLocation};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// What the running platform offers, probed once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub sdk_level: u32,
}

impl PlatformCapabilities {
    /// First level with a streaming directory primitive
    pub const DIRECTORY_STREAM_MIN_SDK: u32 = 26;
    /// First level where the picker honors an initial location
    pub const INITIAL_URI_MIN_SDK: u32 = 26;
    /// First level with a broad "all files" permission
    pub const BROAD_ACCESS_MIN_SDK: u32 = 30;

    pub fn probe(sdk_level: u32) -> Self {
        Self { sdk_level }
    }

    pub fn has_directory_stream(&self) -> bool {
        self.sdk_level >= Self::DIRECTORY_STREAM_MIN_SDK
    }

    pub fn supports_initial_uri(&self) -> bool {
        self.sdk_level >= Self::INITIAL_URI_MIN_SDK
    }

    pub fn has_broad_access_gate(&self) -> bool {
        self.sdk_level >= Self::BROAD_ACCESS_MIN_SDK
    }

    /// Listing strategy for this platform
    pub fn directory_lister(&self) -> Box<dyn DirectoryLister> {
        if self.has_directory_stream() {
            Box::new(StreamLister)
        } else {
            Box::new(LegacyLister)
        }
    }
}

/// Enumerates an existing directory
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list(&self, dir: &Path) -> Result<Vec<DirectoryEntry>>;
}

/// Streaming enumeration with per-entry metadata
pub struct StreamLister;

#[async_trait]
impl DirectoryLister for StreamLister {
    fn name(&self) -> &'static str {
        "stream"
    }

    async fn list(&self, dir: &Path) -> Result<Vec<DirectoryEntry>> {
        let mut read_dir = fs::read_dir(dir)
            .await
            .map_err(|e| NativeError::AccessDenied(format!("NIO: {}", e)))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| NativeError::Failed(e.to_string()))?
        {
            // Follow links; a dangling link falls back to its own metadata
            let metadata = match fs::metadata(entry.path()).await {
                Ok(m) => Some(m),
                Err(_) => entry.metadata().await.ok(),
            };
            entries.push(native_entry(
                entry.path(),
                metadata.as_ref().and_then(|m| m.modified().ok()),
                metadata.as_ref().map(|m| m.is_dir()),
            ));
        }
        Ok(entries)
    }
}

/// One-shot listing; an unreadable directory yields no listing at all
pub struct LegacyLister;

impl LegacyLister {
    fn list_blocking(dir: &Path) -> Option<Vec<DirectoryEntry>> {
        let read_dir = std::fs::read_dir(dir).ok()?;
        Some(
            read_dir
                .filter_map(|entry| entry.ok())
                .map(|entry| {
                    let metadata = std::fs::metadata(entry.path())
                        .or_else(|_| entry.metadata())
                        .ok();
                    native_entry(
                        entry.path(),
                        metadata.as_ref().and_then(|m| m.modified().ok()),
                        metadata.as_ref().map(|m| m.is_dir()),
                    )
                })
                .collect(),
        )
    }
}

#[async_trait]
impl DirectoryLister for LegacyLister {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn list(&self, dir: &Path) -> Result<Vec<DirectoryEntry>> {
        let dir = dir.to_path_buf();
        let listing = tokio::task::spawn_blocking(move || Self::list_blocking(&dir))
            .await
            .map_err(|e| NativeError::Failed(e.to_string()))?;

        listing.ok_or_else(|| NativeError::AccessDenied("Legacy: Access denied".to_string()).into())
    }
}

fn native_entry(
    path: PathBuf,
    modified: Option<std::time::SystemTime>,
    is_dir: Option<bool>,
) -> DirectoryEntry {
    DirectoryEntry {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        location: EntryLocation::Path(path.to_string_lossy().to_string()),
        last_modified: modified.map(epoch_millis).unwrap_or(0),
        mime_type: None,
        is_directory: is_dir,
    }
}

/// Native path backend
pub struct NativeBackend {
    platform: PlatformCapabilities,
    lister: Box<dyn DirectoryLister>,
    gate: Arc<dyn BroadAccessGate>,
}

impl NativeBackend {
    pub fn new(platform: PlatformCapabilities, gate: Arc<dyn BroadAccessGate>) -> Self {
        let lister = platform.directory_lister();
        debug!(
            "Native listing via {} lister (sdk {})",
            lister.name(),
            platform.sdk_level
        );
        Self {
            platform,
            lister,
            gate,
        }
    }

    pub fn lister_name(&self) -> &'static str {
        self.lister.name()
    }

    /// Whether broad access is in effect. Platforms without the gate have
    /// no such restriction.
    pub fn check_broad_access(&self) -> bool {
        !self.platform.has_broad_access_gate() || self.gate.is_granted()
    }

    /// `true` if already granted. Otherwise opens the settings screen and
    /// returns `false` without waiting; the caller must check again later.
    pub fn request_broad_access(&self) -> bool {
        if self.check_broad_access() {
            return true;
        }

        info!("Broad access not granted, opening settings");
        if let Err(e) = self.gate.open_settings() {
            warn!("Failed to open broad access settings: {}", e);
        }
        false
    }

    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>> {
        let dir = absolutize(Path::new(path))?;

        match fs::try_exists(&dir).await {
            Ok(true) => {}
            Ok(false) => return Err(NativeError::PathNotFound(path.to_string()).into()),
            Err(e) => return Err(existence_error(path, e).into()),
        }

        debug!("Listing native directory {:?} ({})", dir, self.lister.name());

        let mut entries = self.lister.list(&dir).await?;
        sort_entries(&mut entries);
        Ok(entries)
    }
}

/// Classify a failed existence check. A parent that is a regular file means
/// the path does not exist.
fn existence_error(path: &str, e: std::io::Error) -> NativeError {
    match e.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            NativeError::PathNotFound(path.to_string())
        }
        ErrorKind::PermissionDenied => NativeError::AccessDenied(format!("NIO: {}", e)),
        _ => NativeError::Failed(e.to_string()),
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| Error::Native(NativeError::Failed(e.to_string())))?;
    Ok(cwd.join(path))
}
