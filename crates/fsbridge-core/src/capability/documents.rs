//! Document provider over local volume roots
//!
//! Document ids follow the `<volume>:<relative/path>` convention used by
//! external-storage providers, so `primary:Download/a.log` resolves to
//! `<primary root>/Download/a.log`.

use super::{ByteStream, DocumentProvider, GrantFlags};
use crate::error::{Error, Result, TreeError};
use crate::types::{epoch_millis, DocumentRow, DIRECTORY_MIME_TYPE};
use crate::uri::DocumentUri;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Document provider backed by directories on the local filesystem
pub struct LocalDocumentProvider {
    authority: String,
    volumes: BTreeMap<String, PathBuf>,
    grants: Mutex<HashSet<String>>,
}

impl LocalDocumentProvider {
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            volumes: BTreeMap::new(),
            grants: Mutex::new(HashSet::new()),
        }
    }

    /// Expose `root` as volume `id`
    pub fn with_volume(mut self, id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.volumes.insert(id.into(), root.into());
        self
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Tree URI granting the whole of `volume`
    pub fn volume_tree(&self, volume: &str) -> DocumentUri {
        DocumentUri::tree(self.authority.clone(), format!("{}:", volume))
    }

    /// Trees with a persisted grant, as URI strings
    pub fn persisted_grants(&self) -> Vec<String> {
        let mut grants: Vec<String> = self.grants.lock().iter().cloned().collect();
        grants.sort();
        grants
    }

    fn check_authority(&self, uri: &DocumentUri) -> Result<()> {
        if uri.authority() != self.authority {
            return Err(Error::Internal(format!(
                "Unknown authority: {}",
                uri.authority()
            )));
        }
        Ok(())
    }

    /// Map a document id onto a local path
    fn resolve(&self, document_id: &str) -> Result<PathBuf> {
        let (volume, relative) = document_id.split_once(':').ok_or_else(|| {
            TreeError::DocumentNotFound(format!("Malformed document id: {}", document_id))
        })?;

        let root = self.volumes.get(volume).ok_or_else(|| {
            TreeError::DocumentNotFound(format!("Unknown volume: {}", volume))
        })?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(TreeError::DocumentNotFound(format!(
                "Document id escapes its volume: {}",
                document_id
            ))
            .into());
        }

        Ok(root.join(relative))
    }

    fn child_id(parent_id: &str, name: &str) -> String {
        if parent_id.ends_with(':') || parent_id.ends_with('/') {
            format!("{}{}", parent_id, name)
        } else {
            format!("{}/{}", parent_id, name)
        }
    }
}

#[async_trait]
impl DocumentProvider for LocalDocumentProvider {
    async fn query_children(&self, children: &DocumentUri) -> Result<Vec<DocumentRow>> {
        self.check_authority(children)?;
        if !children.is_children() {
            return Err(Error::Internal(format!(
                "Not a children URI: {}",
                children
            )));
        }

        let parent_id = children
            .document_id()
            .ok_or_else(|| Error::Internal(format!("No parent document in {}", children)))?;
        let dir = self.resolve(parent_id)?;

        debug!("Querying children of {} ({:?})", parent_id, dir);

        let mut rows = Vec::new();
        let mut read_dir = fs::read_dir(&dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = match fs::metadata(entry.path()).await {
                Ok(m) => m,
                Err(_) => entry.metadata().await?,
            };
            let name = entry.file_name().to_string_lossy().to_string();

            let mime_type = if metadata.is_dir() {
                DIRECTORY_MIME_TYPE.to_string()
            } else {
                mime_guess::from_path(entry.path())
                    .first_or_octet_stream()
                    .to_string()
            };

            rows.push(DocumentRow {
                document_id: Self::child_id(parent_id, &name),
                display_name: name,
                last_modified: metadata.modified().map(epoch_millis).unwrap_or(0),
                mime_type: Some(mime_type),
            });
        }

        Ok(rows)
    }

    async fn open_input(&self, document: &DocumentUri) -> Result<Option<ByteStream>> {
        self.check_authority(document)?;

        let document_id = document
            .document_id()
            .ok_or_else(|| Error::Internal(format!("No document in {}", document)))?;
        let path = self.resolve(document_id)?;

        debug!("Opening document {} ({:?})", document_id, path);

        if fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(None);
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Tree(TreeError::DocumentNotFound(document_id.to_string()))
            } else {
                Error::Io(e)
            }
        })?;

        Ok(Some(Box::new(file)))
    }

    fn persist_grant(&self, tree: &DocumentUri, flags: GrantFlags) -> Result<()> {
        self.check_authority(tree)?;

        let tree_id = tree.tree_document_id()?;
        self.resolve(tree_id)?;

        info!(
            "Persisting grant on {} (read: {}, write: {})",
            tree, flags.read, flags.write
        );
        self.grants.lock().insert(tree.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    const AUTHORITY: &str = "com.android.externalstorage.documents";

    #[tokio::test]
    async fn test_query_children_of_volume_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("match.json"), "{}").unwrap();
        std::fs::create_dir(dir.path().join("replays")).unwrap();

        let provider = LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path());
        let tree = provider.volume_tree("primary");
        let children = tree.build_children_using_tree(tree.tree_document_id().unwrap());

        let mut rows = provider.query_children(&children).await.unwrap();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].document_id, "primary:match.json");
        assert_eq!(rows[0].mime_type.as_deref(), Some("application/json"));
        assert_eq!(rows[1].document_id, "primary:replays");
        assert_eq!(rows[1].mime_type.as_deref(), Some(DIRECTORY_MIME_TYPE));
        assert!(rows[0].last_modified > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_linked_directory_reports_directory_mime() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("replays")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("replays"), dir.path().join("latest.d"))
            .unwrap();

        let provider = LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path());
        let tree = provider.volume_tree("primary");
        let children = tree.build_children_using_tree(tree.tree_document_id().unwrap());

        let rows = provider.query_children(&children).await.unwrap();
        let linked = rows
            .iter()
            .find(|r| r.display_name == "latest.d")
            .unwrap();
        assert_eq!(linked.mime_type.as_deref(), Some(DIRECTORY_MIME_TYPE));
    }

    #[tokio::test]
    async fn test_open_input_reads_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("logs/a.log"), b"hello").unwrap();

        let provider = LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path());
        let doc = provider
            .volume_tree("primary")
            .build_document_using_tree("primary:logs/a.log");

        let mut stream = provider.open_input(&doc).await.unwrap().unwrap();
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, b"hello");

        let dir_doc = provider
            .volume_tree("primary")
            .build_document_using_tree("primary:logs");
        assert!(provider.open_input(&dir_doc).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_escaping_document_ids() {
        let dir = tempdir().unwrap();
        let provider = LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path());
        let doc = provider
            .volume_tree("primary")
            .build_document_using_tree("primary:../etc/passwd");

        assert!(provider.open_input(&doc).await.is_err());
    }

    #[test]
    fn test_persist_grant_requires_known_volume() {
        let dir = tempdir().unwrap();
        let provider = LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path());

        provider
            .persist_grant(&provider.volume_tree("primary"), GrantFlags::READ_WRITE)
            .unwrap();
        assert!(provider
            .persist_grant(&provider.volume_tree("sdcard1"), GrantFlags::READ_WRITE)
            .is_err());

        assert_eq!(provider.persisted_grants().len(), 1);
    }
}
