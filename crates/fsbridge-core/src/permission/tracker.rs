//! Directory-grant and privileged-permission flows

use super::slot::{FlowKind, FlowToken, PendingSlot, SlotPolicy};
use crate::backend::holds_broker_permission;
use crate::capability::{DirectoryPicker, DocumentProvider, GrantFlags, PrivilegedBroker};
use crate::error::{GrantError, ShellError};
use crate::runtime::Responder;
use crate::types::{Payload, PickerOutcome};
use crate::uri::DocumentUri;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracks the one pending caller per flow kind and resolves it when the
/// out-of-band answer arrives.
pub struct PermissionTracker {
    directory: PendingSlot<Responder>,
    privileged: PendingSlot<Responder>,
    picker: Arc<dyn DirectoryPicker>,
    documents: Arc<dyn DocumentProvider>,
    broker: Arc<dyn PrivilegedBroker>,
    request_code: i32,
    forward_initial_hint: bool,
}

impl PermissionTracker {
    pub fn new(
        policy: SlotPolicy,
        picker: Arc<dyn DirectoryPicker>,
        documents: Arc<dyn DocumentProvider>,
        broker: Arc<dyn PrivilegedBroker>,
    ) -> Self {
        Self {
            directory: PendingSlot::new(FlowKind::DirectoryGrant, policy),
            privileged: PendingSlot::new(FlowKind::PrivilegedPermission, policy),
            picker,
            documents,
            broker,
            request_code: 0,
            forward_initial_hint: true,
        }
    }

    /// Code sent with broker permission requests
    pub fn with_request_code(mut self, request_code: i32) -> Self {
        self.request_code = request_code;
        self
    }

    /// Whether the platform picker accepts an initial location
    pub fn with_initial_hint_support(mut self, supported: bool) -> Self {
        self.forward_initial_hint = supported;
        self
    }

    pub fn is_pending(&self, kind: FlowKind) -> bool {
        match kind {
            FlowKind::DirectoryGrant => self.directory.is_pending(),
            FlowKind::PrivilegedPermission => self.privileged.is_pending(),
        }
    }

    /// Park `responder` and launch the picker. Returns immediately.
    ///
    /// Returns `None` when the flow could not start; the responder has then
    /// already been resolved with the reason.
    pub fn begin_directory_grant(
        &self,
        initial_hint: Option<String>,
        responder: Responder,
    ) -> Option<FlowToken> {
        let token = match self.directory.store(responder) {
            Ok(token) => token,
            Err(rejected) => {
                rejected.error(GrantError::Busy(FlowKind::DirectoryGrant.to_string()));
                return None;
            }
        };

        let hint = match initial_hint {
            Some(hint) if !self.forward_initial_hint => {
                debug!("Platform picker takes no initial location, dropping {}", hint);
                None
            }
            hint => hint,
        };

        debug!("Directory grant {} started", token);

        if let Err(e) = self.picker.launch(hint) {
            warn!("Failed to launch directory picker: {}", e);
            if let Some(responder) = self.directory.take_if(token) {
                responder.error(GrantError::PickerFailed(e.message()));
            }
            return None;
        }

        Some(token)
    }

    /// Deliver the picker result. Returns `false` if nobody was waiting.
    pub fn complete_directory_grant(&self, outcome: PickerOutcome) -> bool {
        let Some((token, responder)) = self.directory.take() else {
            warn!("Picker result {:?} arrived with no pending caller", outcome);
            return false;
        };

        match outcome {
            PickerOutcome::Selected(Some(uri)) => {
                self.persist_grant(&uri);
                info!("Directory grant {} completed: {}", token, uri);
                responder.success(Payload::Text(uri));
            }
            PickerOutcome::Selected(None) => responder.error(GrantError::UriNull),
            PickerOutcome::Cancelled => {
                info!("Directory grant {} cancelled", token);
                responder.success(Payload::Null);
            }
            PickerOutcome::Failed(reason) => responder.error(GrantError::PickerFailed(reason)),
        }
        true
    }

    // A failed persist still hands the handle back; access works until restart.
    fn persist_grant(&self, uri: &str) {
        let result = DocumentUri::parse(uri)
            .and_then(|tree| self.documents.persist_grant(&tree, GrantFlags::READ_WRITE));
        if let Err(e) = result {
            warn!("Could not persist grant on {}: {}", uri, e);
        }
    }

    /// Resolve at once if the broker permission is held, otherwise park
    /// `responder` and ask the broker.
    pub async fn begin_privileged_permission(&self, responder: Responder) -> Option<FlowToken> {
        if holds_broker_permission(self.broker.as_ref()).await {
            responder.success(Payload::Bool(true));
            return None;
        }

        let token = match self.privileged.store(responder) {
            Ok(token) => token,
            Err(rejected) => {
                rejected.error(GrantError::Busy(FlowKind::PrivilegedPermission.to_string()));
                return None;
            }
        };

        debug!("Privileged permission {} requested", token);

        if let Err(e) = self.broker.request_permission(self.request_code).await {
            warn!("Broker permission request failed: {}", e);
            if let Some(responder) = self.privileged.take_if(token) {
                responder.error(ShellError::Broker(e.message()));
            }
            return None;
        }

        Some(token)
    }

    /// Deliver the broker's answer. Returns `false` if it was not for us.
    pub fn complete_privileged_permission(&self, request_code: i32, granted: bool) -> bool {
        if request_code != self.request_code {
            debug!("Ignoring permission result for request code {}", request_code);
            return false;
        }

        let Some((token, responder)) = self.privileged.take() else {
            warn!("Permission result arrived with no pending caller");
            return false;
        };

        info!("Privileged permission {} answered: granted={}", token, granted);
        responder.success(Payload::Bool(granted));
        true
    }

    /// Resolve any parked callers with an abort error
    pub fn abort_all(&self) {
        for slot in [&self.directory, &self.privileged] {
            if let Some((token, responder)) = slot.take() {
                warn!("Aborting pending {} flow {}", slot.kind(), token);
                responder.error(GrantError::Aborted(slot.kind().to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{LocalDocumentProvider, LocalShellBroker, MockDirectoryPicker};
    use crate::config::ConsentMode;
    use crate::error::Error;
    use crate::runtime::UiLoop;
    use crate::types::Outcome;
    use tokio_test::{assert_pending, task};

    const AUTHORITY: &str = "com.android.externalstorage.documents";

    struct Fixture {
        ui: UiLoop,
        documents: Arc<LocalDocumentProvider>,
        broker: Arc<LocalShellBroker>,
        tracker: PermissionTracker,
        _dir: tempfile::TempDir,
    }

    fn fixture(policy: SlotPolicy, picker: MockDirectoryPicker) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let documents =
            Arc::new(LocalDocumentProvider::new(AUTHORITY).with_volume("primary", dir.path()));
        let broker = Arc::new(LocalShellBroker::new(ConsentMode::Prompt));
        let tracker = PermissionTracker::new(
            policy,
            Arc::new(picker),
            documents.clone(),
            broker.clone(),
        );
        Fixture {
            ui: UiLoop::new(),
            documents,
            broker,
            tracker,
            _dir: dir,
        }
    }

    fn launching_picker(times: usize) -> MockDirectoryPicker {
        let mut picker = MockDirectoryPicker::new();
        picker.expect_launch().times(times).returning(|_| Ok(()));
        picker
    }

    #[test]
    fn test_selected_tree_is_persisted_and_returned() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(1));
        let (responder, mut rx) = Responder::channel("open-directory-picker", f.ui.handle());

        assert!(f.tracker.begin_directory_grant(None, responder).is_some());
        assert!(f.tracker.is_pending(FlowKind::DirectoryGrant));

        let uri = f.documents.volume_tree("primary").to_string();
        assert!(f
            .tracker
            .complete_directory_grant(PickerOutcome::Selected(Some(uri.clone()))));
        f.ui.run_pending();

        assert_eq!(rx.try_recv().unwrap(), Outcome::Success(Payload::Text(uri.clone())));
        assert_eq!(f.documents.persisted_grants(), vec![uri]);
        assert!(!f.tracker.is_pending(FlowKind::DirectoryGrant));
    }

    #[test]
    fn test_cancel_is_null_success_not_error() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(1));
        let (responder, mut rx) = Responder::channel("open-directory-picker", f.ui.handle());

        f.tracker.begin_directory_grant(None, responder);
        f.tracker.complete_directory_grant(PickerOutcome::Cancelled);
        f.ui.run_pending();

        assert_eq!(rx.try_recv().unwrap(), Outcome::Success(Payload::Null));
    }

    #[test]
    fn test_missing_uri_and_picker_failure_are_distinct_errors() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(2));

        let (responder, mut null_rx) = Responder::channel("open-directory-picker", f.ui.handle());
        f.tracker.begin_directory_grant(None, responder);
        f.tracker.complete_directory_grant(PickerOutcome::Selected(None));

        let (responder, mut failed_rx) = Responder::channel("open-directory-picker", f.ui.handle());
        f.tracker.begin_directory_grant(None, responder);
        f.tracker
            .complete_directory_grant(PickerOutcome::Failed("activity not found".to_string()));

        f.ui.run_pending();
        assert_eq!(null_rx.try_recv().unwrap().error_code(), Some("URI_NULL"));
        assert_eq!(
            failed_rx.try_recv().unwrap(),
            Outcome::Error {
                code: "PICKER_ERROR".to_string(),
                message: "Picker failed: activity not found".to_string(),
            }
        );
    }

    #[test]
    fn test_unpersistable_grant_still_returns_handle() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(1));
        let (responder, mut rx) = Responder::channel("open-directory-picker", f.ui.handle());

        f.tracker.begin_directory_grant(None, responder);
        let foreign = "content://other.provider/tree/root%3A".to_string();
        f.tracker
            .complete_directory_grant(PickerOutcome::Selected(Some(foreign.clone())));
        f.ui.run_pending();

        assert_eq!(rx.try_recv().unwrap(), Outcome::Success(Payload::Text(foreign)));
        assert!(f.documents.persisted_grants().is_empty());
    }

    #[test]
    fn test_second_grant_is_rejected_while_first_pending() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(1));
        let (first, first_rx) = Responder::channel("open-directory-picker", f.ui.handle());
        let (second, mut second_rx) = Responder::channel("open-directory-picker", f.ui.handle());

        f.tracker.begin_directory_grant(None, first);
        assert!(f.tracker.begin_directory_grant(None, second).is_none());
        f.ui.run_pending();

        assert_eq!(second_rx.try_recv().unwrap().error_code(), Some("BUSY"));
        let mut first_rx = task::spawn(first_rx);
        assert_pending!(first_rx.poll());

        f.tracker.complete_directory_grant(PickerOutcome::Cancelled);
        f.ui.run_pending();
        assert!(first_rx.is_woken());
    }

    #[test]
    fn test_replace_latest_never_resolves_first_caller() {
        let mut f = fixture(SlotPolicy::ReplaceLatest, launching_picker(2));
        let (first, mut first_rx) = Responder::channel("open-directory-picker", f.ui.handle());
        let (second, mut second_rx) = Responder::channel("open-directory-picker", f.ui.handle());

        f.tracker.begin_directory_grant(None, first);
        f.tracker.begin_directory_grant(None, second);
        f.tracker.complete_directory_grant(PickerOutcome::Cancelled);
        f.ui.run_pending();

        assert!(matches!(
            first_rx.try_recv(),
            Err(tokio::sync::oneshot::error::TryRecvError::Closed)
        ));
        assert_eq!(second_rx.try_recv().unwrap(), Outcome::Success(Payload::Null));
    }

    #[test]
    fn test_launch_failure_frees_the_slot() {
        let mut picker = MockDirectoryPicker::new();
        picker
            .expect_launch()
            .times(1)
            .returning(|_| Err(Error::Internal("no activity".to_string())));
        let mut f = fixture(SlotPolicy::RejectBusy, picker);
        let (responder, mut rx) = Responder::channel("open-directory-picker", f.ui.handle());

        assert!(f.tracker.begin_directory_grant(None, responder).is_none());
        f.ui.run_pending();

        assert_eq!(rx.try_recv().unwrap().error_code(), Some("PICKER_ERROR"));
        assert!(!f.tracker.is_pending(FlowKind::DirectoryGrant));
    }

    #[test]
    fn test_initial_hint_dropped_when_unsupported() {
        let mut picker = MockDirectoryPicker::new();
        picker
            .expect_launch()
            .withf(|hint| hint.is_none())
            .times(1)
            .returning(|_| Ok(()));
        let f = fixture(SlotPolicy::RejectBusy, picker);
        let tracker = f.tracker.with_initial_hint_support(false);
        let ui = UiLoop::new();
        let (responder, _rx) = Responder::channel("open-directory-picker", ui.handle());

        tracker.begin_directory_grant(Some("content://x/tree/y".to_string()), responder);
    }

    #[test]
    fn test_picker_result_without_caller_is_ignored() {
        let f = fixture(SlotPolicy::RejectBusy, MockDirectoryPicker::new());
        assert!(!f.tracker.complete_directory_grant(PickerOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_privileged_already_granted_resolves_immediately() {
        let mut f = fixture(SlotPolicy::RejectBusy, MockDirectoryPicker::new());
        f.broker.set_granted(true);
        let (responder, rx) = Responder::channel("request-broker-permission", f.ui.handle());

        assert!(f.tracker.begin_privileged_permission(responder).await.is_none());

        let outcome = f.ui.run_until(rx).await.unwrap();
        assert_eq!(outcome, Outcome::Success(Payload::Bool(true)));
    }

    #[tokio::test]
    async fn test_privileged_waits_for_matching_answer() {
        let mut f = fixture(SlotPolicy::RejectBusy, MockDirectoryPicker::new());
        let tracker = f.tracker.with_request_code(42);
        let (responder, rx) = Responder::channel("request-broker-permission", f.ui.handle());

        assert!(tracker.begin_privileged_permission(responder).await.is_some());
        assert!(!tracker.complete_privileged_permission(7, true));
        assert!(tracker.is_pending(FlowKind::PrivilegedPermission));

        assert!(tracker.complete_privileged_permission(42, false));
        let outcome = f.ui.run_until(rx).await.unwrap();
        assert_eq!(outcome, Outcome::Success(Payload::Bool(false)));
    }

    #[tokio::test]
    async fn test_broker_request_failure_resolves_with_broker_error() {
        let mut f = fixture(SlotPolicy::RejectBusy, MockDirectoryPicker::new());
        f.broker.set_available(false);
        let (responder, rx) = Responder::channel("request-broker-permission", f.ui.handle());

        f.tracker.begin_privileged_permission(responder).await;

        let outcome = f.ui.run_until(rx).await.unwrap();
        assert_eq!(outcome.error_code(), Some("SHIZUKU_ERR"));
        assert!(!f.tracker.is_pending(FlowKind::PrivilegedPermission));
    }

    #[tokio::test]
    async fn test_abort_all_resolves_parked_callers() {
        let mut f = fixture(SlotPolicy::RejectBusy, launching_picker(1));
        let (grant, grant_rx) = Responder::channel("open-directory-picker", f.ui.handle());
        let (perm, perm_rx) = Responder::channel("request-broker-permission", f.ui.handle());

        f.tracker.begin_directory_grant(None, grant);
        f.tracker.begin_privileged_permission(perm).await;
        f.tracker.abort_all();

        assert_eq!(f.ui.run_until(grant_rx).await.unwrap().error_code(), Some("ABORTED"));
        assert_eq!(f.ui.run_until(perm_rx).await.unwrap().error_code(), Some("ABORTED"));
    }
}
