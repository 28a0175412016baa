//! Scoped document-tree access

use crate::capability::DocumentProvider;
use crate::error::{Result, TreeError};
use crate::types::{DirectoryEntry, EntryLocation};
use crate::uri::DocumentUri;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Lists and reads documents under a granted tree
pub struct TreeBackend {
    documents: Arc<dyn DocumentProvider>,
}

impl TreeBackend {
    pub fn new(documents: Arc<dyn DocumentProvider>) -> Self {
        Self { documents }
    }

    /// Children of the tree root `tree` was granted on.
    ///
    /// Each entry's URI is the child document addressed through the same tree.
    pub async fn list_children(&self, tree: &DocumentUri) -> Result<Vec<DirectoryEntry>> {
        let root_id = tree
            .tree_document_id()
            .map_err(|e| TreeError::List(e.message()))?;
        let children = tree.build_children_using_tree(root_id);

        debug!("Listing tree children: {}", children);

        let rows = self
            .documents
            .query_children(&children)
            .await
            .map_err(|e| TreeError::List(e.message()))?;

        Ok(rows
            .into_iter()
            .map(|row| DirectoryEntry {
                location: EntryLocation::Uri(
                    tree.build_document_using_tree(&row.document_id).to_string(),
                ),
                name: row.display_name,
                last_modified: row.last_modified,
                mime_type: row.mime_type,
                is_directory: None,
            })
            .collect())
    }

    /// Read a whole document into memory
    pub async fn read_file(&self, document: &DocumentUri) -> Result<Vec<u8>> {
        debug!("Reading document: {}", document);

        let stream = self
            .documents
            .open_input(document)
            .await
            .map_err(|e| TreeError::Read(e.message()))?;

        let Some(mut stream) = stream else {
            return Err(TreeError::StreamUnavailable.into());
        };

        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| TreeError::Read(e.to_string()))?;

        Ok(bytes)
    }
}
