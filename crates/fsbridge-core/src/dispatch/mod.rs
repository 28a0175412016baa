//! Request dispatcher
//!
//! [`Bridge`] is the single entry point for the UI layer. A dispatch call
//! validates arguments, picks a backend and returns at once; the outcome
//! arrives later through the caller's callback on the UI context.
//!
//! ```text
//!  UI ──dispatch──▶ Bridge ──validate──▶ WorkerPool ──▶ backend
//!   ▲                                                      │
//!   └───────────── UiLoop ◀──── Responder::resolve ◀───────┘
//! ```

use crate::backend::{NativeBackend, PlatformCapabilities, ShellBackend, TreeBackend};
use crate::capability::{BroadAccessGate, DirectoryPicker, DocumentProvider, PrivilegedBroker};
use crate::config::BridgeConfig;
use crate::error::{Error, Result, TreeError};
use crate::permission::{FlowKind, PermissionTracker};
use crate::runtime::{Responder, UiHandle, WorkerPool};
use crate::types::{Operation, Outcome, Payload, PickerOutcome, Request};
use crate::uri::DocumentUri;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Platform capabilities the bridge is built over
#[derive(Clone)]
pub struct Capabilities {
    pub documents: Arc<dyn DocumentProvider>,
    pub picker: Arc<dyn DirectoryPicker>,
    pub gate: Arc<dyn BroadAccessGate>,
    pub broker: Arc<dyn PrivilegedBroker>,
}

struct BridgeInner {
    ui: UiHandle,
    pool: WorkerPool,
    tracker: PermissionTracker,
    tree: TreeBackend,
    native: NativeBackend,
    shell: ShellBackend,
}

/// Access-arbitration front end. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Build a bridge on the ambient tokio runtime
    pub fn new(config: &BridgeConfig, capabilities: Capabilities, ui: UiHandle) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::Internal(format!("No tokio runtime available: {}", e)))?;
        Self::with_runtime(config, capabilities, ui, handle)
    }

    pub fn with_runtime(
        config: &BridgeConfig,
        capabilities: Capabilities,
        ui: UiHandle,
        handle: Handle,
    ) -> Result<Self> {
        config.validate()?;

        let platform = PlatformCapabilities::probe(config.platform.sdk_level);
        info!(
            "Starting bridge (sdk {}, flow policy {:?}, {} workers)",
            platform.sdk_level, config.flows.policy, config.workers.max_in_flight
        );

        let tracker = PermissionTracker::new(
            config.flows.policy,
            capabilities.picker,
            Arc::clone(&capabilities.documents),
            Arc::clone(&capabilities.broker),
        )
        .with_request_code(config.broker.permission_request_code)
        .with_initial_hint_support(platform.supports_initial_uri());

        let inner = BridgeInner {
            ui,
            pool: WorkerPool::new(handle, config.workers.max_in_flight),
            tracker,
            tree: TreeBackend::new(capabilities.documents),
            native: NativeBackend::new(platform, capabilities.gate),
            shell: ShellBackend::new(capabilities.broker, &config.shell),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Dispatch `request`; `callback` runs exactly once on the UI context
    pub fn dispatch(&self, request: Request, callback: impl FnOnce(Outcome) + Send + 'static) {
        let responder = Responder::new(request.method.clone(), self.inner.ui.clone(), callback);
        self.dispatch_with(request, responder);
    }

    pub fn dispatch_with(&self, request: Request, responder: Responder) {
        let Some(operation) = request.operation() else {
            debug!("Unrecognized operation: {}", request.method);
            responder.not_implemented();
            return;
        };

        debug!("Dispatching {}", operation);
        let keys = operation.argument_keys();

        match operation {
            Operation::OpenDirectoryPicker => {
                let hint = request.arg(keys).map(str::to_string);
                self.inner.tracker.begin_directory_grant(hint, responder);
            }
            Operation::ListTreeChildren => {
                let tree = match parse_uri_arg(&request, keys) {
                    Ok(uri) => uri,
                    Err(e) => return responder.error(e),
                };
                let inner = Arc::clone(&self.inner);
                self.inner.pool.submit(responder, async move {
                    inner.tree.list_children(&tree).await.map(Payload::Entries)
                });
            }
            Operation::ReadTreeFile => {
                let document = match parse_uri_arg(&request, keys) {
                    Ok(uri) => uri,
                    Err(e) => return responder.error(e),
                };
                let inner = Arc::clone(&self.inner);
                self.inner.pool.submit(responder, async move {
                    inner.tree.read_file(&document).await.map(Payload::Bytes)
                });
            }
            Operation::RequestBroadAccess => {
                responder.success(Payload::Bool(self.inner.native.request_broad_access()));
            }
            Operation::CheckBroadAccess => {
                responder.success(Payload::Bool(self.inner.native.check_broad_access()));
            }
            Operation::ListNativeDirectory => {
                let Some(path) = request.arg(keys).map(str::to_string) else {
                    return responder.error(Error::MissingArgument("Path null".to_string()));
                };
                let inner = Arc::clone(&self.inner);
                self.inner.pool.submit(responder, async move {
                    inner.native.list_directory(&path).await.map(Payload::Entries)
                });
            }
            Operation::CheckBrokerAvailable => {
                let inner = Arc::clone(&self.inner);
                self.inner.pool.submit(responder, async move {
                    Ok(Payload::BrokerStatus(inner.shell.check_availability().await))
                });
            }
            Operation::RequestBrokerPermission => {
                let inner = Arc::clone(&self.inner);
                self.inner.pool.spawn(async move {
                    inner.tracker.begin_privileged_permission(responder).await;
                });
            }
            Operation::ExecutePrivilegedCommand => {
                let Some(command) = request.arg(keys).map(str::to_string) else {
                    return responder.error(Error::MissingArgument("Cmd null".to_string()));
                };
                let inner = Arc::clone(&self.inner);
                self.inner.pool.submit(responder, async move {
                    inner.shell.run(&command).await.map(Payload::Text)
                });
            }
        }
    }

    /// Out-of-band entry point for the system picker result
    pub fn complete_directory_grant(&self, outcome: PickerOutcome) -> bool {
        self.inner.tracker.complete_directory_grant(outcome)
    }

    /// Out-of-band entry point for the broker's permission answer
    pub fn complete_privileged_permission(&self, request_code: i32, granted: bool) -> bool {
        self.inner
            .tracker
            .complete_privileged_permission(request_code, granted)
    }

    pub fn is_pending(&self, kind: FlowKind) -> bool {
        self.inner.tracker.is_pending(kind)
    }

    /// Worker jobs started since construction
    pub fn spawned_tasks(&self) -> u64 {
        self.inner.pool.spawned()
    }

    /// Worker jobs not yet finished
    pub fn in_flight(&self) -> usize {
        self.inner.pool.in_flight()
    }

    /// Resolve any callers still parked in a permission flow
    pub fn shutdown(&self) {
        info!("Shutting down bridge");
        self.inner.tracker.abort_all();
    }
}

fn parse_uri_arg(request: &Request, keys: &[&str]) -> Result<DocumentUri> {
    let raw = request
        .arg(keys)
        .ok_or_else(|| TreeError::InvalidUri("URI is null".to_string()))?;
    DocumentUri::parse(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        LocalDocumentProvider, LocalShellBroker, MockBroadAccessGate, MockDirectoryPicker,
    };
    use crate::config::ConsentMode;
    use crate::runtime::UiLoop;

    fn bridge(ui: &UiLoop) -> Bridge {
        let mut picker = MockDirectoryPicker::new();
        picker.expect_launch().returning(|_| Ok(()));
        let mut gate = MockBroadAccessGate::new();
        gate.expect_is_granted().return_const(true);

        let capabilities = Capabilities {
            documents: Arc::new(LocalDocumentProvider::new("test.docs")),
            picker: Arc::new(picker),
            gate: Arc::new(gate),
            broker: Arc::new(LocalShellBroker::new(ConsentMode::Prompt)),
        };
        Bridge::new(&BridgeConfig::default(), capabilities, ui.handle()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_implemented() {
        let mut ui = UiLoop::new();
        let bridge = bridge(&ui);
        let (responder, rx) = Responder::channel("deleteFile", ui.handle());

        bridge.dispatch_with(Request::new("deleteFile"), responder);

        assert_eq!(ui.run_until(rx).await.unwrap(), Outcome::NotImplemented);
        assert_eq!(bridge.spawned_tasks(), 0);
    }

    #[tokio::test]
    async fn test_missing_arguments_fail_without_spawning() {
        let mut ui = UiLoop::new();
        let bridge = bridge(&ui);

        let cases = [
            ("list-tree-children", "INVALID_URI", "URI is null"),
            ("read-tree-file", "INVALID_URI", "URI is null"),
            ("list-native-directory", "ERR", "Path null"),
            ("execute-privileged-command", "ERR", "Cmd null"),
        ];

        for (method, code, message) in cases {
            let (responder, rx) = Responder::channel(method, ui.handle());
            bridge.dispatch_with(Request::new(method), responder);

            assert_eq!(
                ui.run_until(rx).await.unwrap(),
                Outcome::Error {
                    code: code.to_string(),
                    message: message.to_string(),
                },
                "{}",
                method
            );
        }

        assert_eq!(bridge.spawned_tasks(), 0);
    }

    #[tokio::test]
    async fn test_broad_access_checks_run_inline() {
        let mut ui = UiLoop::new();
        let bridge = bridge(&ui);

        for method in ["check-broad-access", "requestAllFilesAccess"] {
            let (responder, rx) = Responder::channel(method, ui.handle());
            bridge.dispatch_with(Request::new(method), responder);
            assert_eq!(
                ui.run_until(rx).await.unwrap(),
                Outcome::Success(Payload::Bool(true))
            );
        }
        assert_eq!(bridge.spawned_tasks(), 0);
    }

    #[tokio::test]
    async fn test_malformed_uri_is_invalid_uri() {
        let mut ui = UiLoop::new();
        let bridge = bridge(&ui);
        let (responder, rx) = Responder::channel("listFiles", ui.handle());

        bridge.dispatch_with(
            Request::new("listFiles").with_arg("uri", "file:///sdcard"),
            responder,
        );

        assert_eq!(ui.run_until(rx).await.unwrap().error_code(), Some("INVALID_URI"));
        assert_eq!(bridge.spawned_tasks(), 0);
    }

    #[test]
    fn test_new_requires_runtime() {
        let ui = UiLoop::new();
        let capabilities = Capabilities {
            documents: Arc::new(LocalDocumentProvider::new("test.docs")),
            picker: Arc::new(MockDirectoryPicker::new()),
            gate: Arc::new(MockBroadAccessGate::new()),
            broker: Arc::new(LocalShellBroker::new(ConsentMode::Prompt)),
        };

        let err = Bridge::new(&BridgeConfig::default(), capabilities, ui.handle())
            .err()
            .unwrap();
        assert_eq!(err.code(), "INTERNAL");
    }
}
