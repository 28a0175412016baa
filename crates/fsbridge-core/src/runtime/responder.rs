//! Single-shot result sinks

use super::ui::UiHandle;
use crate::error::Error;
use crate::types::{Outcome, Payload};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Caller-supplied result sink
pub type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Owns one caller's callback until it is resolved.
///
/// Resolving consumes the responder, so a second resolution cannot be
/// expressed. The callback itself always runs on the UI context.
pub struct Responder {
    operation: String,
    callback: Option<Callback>,
    ui: UiHandle,
}

impl Responder {
    pub fn new(
        operation: impl Into<String>,
        ui: UiHandle,
        callback: impl FnOnce(Outcome) + Send + 'static,
    ) -> Self {
        Self {
            operation: operation.into(),
            callback: Some(Box::new(callback)),
            ui,
        }
    }

    /// Create a responder whose outcome arrives on a oneshot receiver
    pub fn channel(
        operation: impl Into<String>,
        ui: UiHandle,
    ) -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let responder = Self::new(operation, ui, move |outcome| {
            let _ = tx.send(outcome);
        });
        (responder, rx)
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn resolve(mut self, outcome: Outcome) {
        let Some(callback) = self.callback.take() else {
            return;
        };

        debug!("Resolving {}: {:?}", self.operation, outcome_kind(&outcome));

        if !self.ui.post(Box::new(move || callback(outcome))) {
            warn!(
                "UI context gone, dropping resolution for {}",
                self.operation
            );
        }
    }

    pub fn success(self, payload: Payload) {
        self.resolve(Outcome::Success(payload));
    }

    pub fn error(self, err: impl Into<Error>) {
        self.resolve(err.into().into());
    }

    pub fn not_implemented(self) {
        self.resolve(Outcome::NotImplemented);
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.callback.is_some() {
            warn!("Responder for {} dropped without resolution", self.operation);
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("operation", &self.operation)
            .field("resolved", &self.callback.is_none())
            .finish()
    }
}

fn outcome_kind(outcome: &Outcome) -> &str {
    match outcome {
        Outcome::Success(_) => "success",
        Outcome::Error { code, .. } => code,
        Outcome::NotImplemented => "not implemented",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NativeError;
    use crate::runtime::UiLoop;

    #[test]
    fn test_resolution_waits_for_ui_loop() {
        let mut ui = UiLoop::new();
        let (responder, mut rx) = Responder::channel("check-broad-access", ui.handle());

        responder.success(Payload::Bool(true));
        assert!(rx.try_recv().is_err());

        ui.run_pending();
        assert_eq!(rx.try_recv().unwrap(), Outcome::Success(Payload::Bool(true)));
    }

    #[test]
    fn test_error_is_converted_to_code_and_message() {
        let mut ui = UiLoop::new();
        let (responder, mut rx) = Responder::channel("list-native-directory", ui.handle());

        responder.error(NativeError::PathNotFound("/missing".to_string()));
        ui.run_pending();

        assert_eq!(
            rx.try_recv().unwrap(),
            Outcome::Error {
                code: "DIR_ERROR".to_string(),
                message: "Path does not exist: /missing".to_string(),
            }
        );
    }

    #[test]
    fn test_dropped_responder_never_invokes_callback() {
        let mut ui = UiLoop::new();
        let (responder, mut rx) = Responder::channel("open-directory-picker", ui.handle());

        drop(responder);
        ui.run_pending();

        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
