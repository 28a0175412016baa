//! Content URIs for scoped document trees
//!
//! Shapes understood here:
//!
//! ```text
//! content://<authority>/tree/<treeId>
//! content://<authority>/tree/<treeId>/document/<docId>
//! content://<authority>/tree/<treeId>/document/<docId>/children
//! content://<authority>/document/<docId>
//! ```
//!
//! Ids are percent-encoded in the path and decoded in memory.

use crate::error::{Result, TreeError};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const SCHEME: &str = "content://";

/// Characters left unescaped in an encoded document id
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'-')
    .remove(b'!')
    .remove(b'.')
    .remove(b'~')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*');

/// A parsed document provider URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentUri {
    authority: String,
    tree_id: Option<String>,
    document_id: Option<String>,
    children: bool,
}

impl DocumentUri {
    /// URI for a whole granted tree
    pub fn tree(authority: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            tree_id: Some(tree_id.into()),
            document_id: None,
            children: false,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| TreeError::InvalidUri(format!("{}: {}", reason, raw));

        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("not a content URI"))?;
        let mut segments = rest.split('/');

        let authority = segments
            .next()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| invalid("missing authority"))?
            .to_string();

        let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
        let mut uri = Self {
            authority,
            tree_id: None,
            document_id: None,
            children: false,
        };

        let mut i = 0;
        if segments.get(i) == Some(&"tree") {
            let id = segments.get(i + 1).ok_or_else(|| invalid("missing tree id"))?;
            uri.tree_id = Some(decode(id)?);
            i += 2;
        }
        if segments.get(i) == Some(&"document") {
            let id = segments
                .get(i + 1)
                .ok_or_else(|| invalid("missing document id"))?;
            uri.document_id = Some(decode(id)?);
            i += 2;
            if segments.get(i) == Some(&"children") {
                uri.children = true;
                i += 1;
            }
        }

        if i != segments.len() || (uri.tree_id.is_none() && uri.document_id.is_none()) {
            return Err(invalid("unrecognized document URI").into());
        }

        Ok(uri)
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Document id of the tree root this URI was granted under
    pub fn tree_document_id(&self) -> Result<&str> {
        self.tree_id.as_deref().ok_or_else(|| {
            TreeError::InvalidUri(format!("Invalid URI: {} is not a tree URI", self)).into()
        })
    }

    /// Document id this URI points at; for a bare tree URI that is the root
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref().or(self.tree_id.as_deref())
    }

    pub fn is_children(&self) -> bool {
        self.children
    }

    pub fn is_tree(&self) -> bool {
        self.tree_id.is_some()
    }

    /// Children collection of `parent_id`, addressed through this tree
    pub fn build_children_using_tree(&self, parent_id: &str) -> Self {
        Self {
            authority: self.authority.clone(),
            tree_id: self.tree_id.clone(),
            document_id: Some(parent_id.to_string()),
            children: true,
        }
    }

    /// Document `document_id`, addressed through this tree
    pub fn build_document_using_tree(&self, document_id: &str) -> Self {
        Self {
            authority: self.authority.clone(),
            tree_id: self.tree_id.clone(),
            document_id: Some(document_id.to_string()),
            children: false,
        }
    }
}

impl std::fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", SCHEME, self.authority)?;
        if let Some(tree) = &self.tree_id {
            write!(f, "/tree/{}", utf8_percent_encode(tree, ID_ENCODE_SET))?;
        }
        if let Some(doc) = &self.document_id {
            write!(f, "/document/{}", utf8_percent_encode(doc, ID_ENCODE_SET))?;
            if self.children {
                f.write_str("/children")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for DocumentUri {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn decode(segment: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| TreeError::InvalidUri(format!("Invalid URI encoding: {}", e)).into())
}
