//! Storage and shell backends
//!
//! Backends own no state beyond their injected capabilities. Each call is a
//! plain async function over its inputs; the dispatcher decides where it runs.

mod native;
mod shell;
mod tree;

pub use native::{DirectoryLister, LegacyLister, NativeBackend, PlatformCapabilities, StreamLister};
pub use shell::{holds_broker_permission, ShellBackend};
pub use tree::TreeBackend;
