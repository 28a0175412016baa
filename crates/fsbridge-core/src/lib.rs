//! FsBridge Core Library
//!
//! This crate arbitrates file-system access for a UI layer running under a
//! restrictive mobile security model. It unifies three access paths behind one
//! request/response interface:
//! - Scoped document trees granted through the system picker
//! - Native paths gated by the broad "all files" permission
//! - Shell commands run by an external privileged broker
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     fsbridge-core                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  dispatch/     - Bridge: validation and routing             │
//! │  permission/   - Pending-flow slots, grant handshakes       │
//! │  backend/      - Tree, native and shell backends            │
//! │  capability/   - Injected platform traits + local impls     │
//! │  runtime/      - UI loop, responders, worker pool           │
//! │  types/        - Shared type definitions                    │
//! │  config.rs     - Configuration                              │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod permission;
pub mod runtime;
pub mod types;
pub mod uri;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

pub use config::BridgeConfig;
pub use dispatch::{Bridge, Capabilities};
pub use permission::{FlowKind, FlowToken, SlotPolicy};
pub use runtime::{Responder, UiHandle, UiLoop};
pub use uri::DocumentUri;

// Re-export capability traits and local implementations
pub use capability::{
    BroadAccessGate, BrokerProcess, DirectoryPicker, DocumentProvider, LocalDocumentProvider,
    LocalShellBroker, LoggingPicker, PrivilegedBroker, StaticBroadAccess,
};
