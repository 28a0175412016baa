//! Injected platform capabilities
//!
//! The bridge never talks to the platform directly. Each outside system is a
//! trait object handed in at construction:
//!
//! - `DocumentProvider` - the scoped document-tree subsystem
//! - `DirectoryPicker` - the system UI that lets the user grant a tree
//! - `BroadAccessGate` - the OS-level "all files" permission
//! - `PrivilegedBroker` - the elevated-access shell broker
//!
//! Local implementations used by the host binary and tests live alongside.

mod access;
mod broker;
mod documents;

pub use access::{LoggingPicker, StaticBroadAccess};
pub use broker::{LocalProcess, LocalShellBroker, PermissionResult};
pub use documents::LocalDocumentProvider;

use crate::error::Result;
use crate::types::DocumentRow;
use crate::uri::DocumentUri;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Boxed byte stream handed out by providers and brokers
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Access requested when persisting a tree grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantFlags {
    pub read: bool,
    pub write: bool,
}

impl GrantFlags {
    pub const READ_WRITE: GrantFlags = GrantFlags {
        read: true,
        write: true,
    };
}

/// Scoped document-tree subsystem
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Rows for a children collection URI
    async fn query_children(&self, children: &DocumentUri) -> Result<Vec<DocumentRow>>;

    /// Open a document for reading. `Ok(None)` means the provider had no stream.
    async fn open_input(&self, document: &DocumentUri) -> Result<Option<ByteStream>>;

    /// Persist a grant on `tree` so it survives restarts
    fn persist_grant(&self, tree: &DocumentUri, flags: GrantFlags) -> Result<()>;
}

/// System directory picker. Launching returns immediately; the result comes
/// back out of band through `Bridge::complete_directory_grant`.
#[cfg_attr(test, mockall::automock)]
pub trait DirectoryPicker: Send + Sync {
    fn launch(&self, initial_hint: Option<String>) -> Result<()>;
}

/// OS-level broad filesystem access permission
#[cfg_attr(test, mockall::automock)]
pub trait BroadAccessGate: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Show the settings screen for the permission. Does not wait for the user.
    fn open_settings(&self) -> Result<()>;
}

/// Elevated-access shell broker
///
/// A permission request is answered out of band through
/// `Bridge::complete_privileged_permission`.
#[async_trait]
pub trait PrivilegedBroker: Send + Sync {
    /// Whether the broker process is reachable
    async fn ping(&self) -> Result<bool>;

    /// Whether this client currently holds the broker permission
    async fn check_permission(&self) -> Result<bool>;

    async fn request_permission(&self, request_code: i32) -> Result<()>;

    /// Start `argv` with no working-directory or environment override
    async fn spawn(&self, argv: &[String]) -> Result<Box<dyn BrokerProcess>>;
}

/// A process started through the broker
#[async_trait]
pub trait BrokerProcess: Send {
    fn take_stdout(&mut self) -> Option<ByteStream>;

    fn take_stderr(&mut self) -> Option<ByteStream>;

    /// Wait for exit and return the exit code
    async fn wait(&mut self) -> Result<i32>;
}
