//! Privileged broker that runs commands as local child processes

use super::{BrokerProcess, ByteStream, PrivilegedBroker};
use crate::config::{BrokerConfig, ConsentMode};
use crate::error::{Error, Result, ShellError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Answer to a broker permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionResult {
    pub request_code: i32,
    pub granted: bool,
}

/// Broker that executes commands with the host's own privileges.
///
/// Consent is decided by [`ConsentMode`]; with `Prompt` the host must feed the
/// user's answer back itself. Answers are published to the listener returned
/// by [`LocalShellBroker::subscribe`].
pub struct LocalShellBroker {
    available: AtomicBool,
    granted: AtomicBool,
    consent: ConsentMode,
    listener: Mutex<Option<mpsc::UnboundedSender<PermissionResult>>>,
}

impl LocalShellBroker {
    pub fn new(consent: ConsentMode) -> Self {
        Self {
            available: AtomicBool::new(true),
            granted: AtomicBool::new(false),
            consent,
            listener: Mutex::new(None),
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        let broker = Self::new(config.consent);
        broker.set_available(config.available);
        broker.set_granted(config.pre_granted);
        broker
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Register the permission-result listener, replacing any previous one
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PermissionResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock() = Some(tx);
        rx
    }

    pub fn unsubscribe(&self) {
        self.listener.lock().take();
    }

    fn publish(&self, result: PermissionResult) {
        match self.listener.lock().as_ref() {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => warn!("No permission listener registered, dropping {:?}", result),
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ShellError::Broker("binder haven't been received".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl PrivilegedBroker for LocalShellBroker {
    async fn ping(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn check_permission(&self) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.granted.load(Ordering::SeqCst))
    }

    async fn request_permission(&self, request_code: i32) -> Result<()> {
        self.ensure_available()?;
        debug!("Permission requested (code {}, consent {:?})", request_code, self.consent);

        let granted = match self.consent {
            ConsentMode::Grant => true,
            ConsentMode::Deny => false,
            ConsentMode::Prompt => {
                info!("Waiting for the user to answer permission request {}", request_code);
                return Ok(());
            }
        };

        self.set_granted(granted);
        self.publish(PermissionResult {
            request_code,
            granted,
        });
        Ok(())
    }

    async fn spawn(&self, argv: &[String]) -> Result<Box<dyn BrokerProcess>> {
        self.ensure_available()?;
        if !self.granted.load(Ordering::SeqCst) {
            return Err(ShellError::Broker("Permission not granted".to_string()).into());
        }

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Internal("Empty command line".to_string()))?;

        debug!("Spawning {} {:?}", program, args);

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        Ok(Box::new(LocalProcess { child }))
    }
}

/// Child process started by [`LocalShellBroker`]
pub struct LocalProcess {
    child: Child,
}

#[async_trait]
impl BrokerProcess for LocalProcess {
    fn take_stdout(&mut self) -> Option<ByteStream> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as ByteStream)
    }

    fn take_stderr(&mut self) -> Option<ByteStream> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as ByteStream)
    }

    async fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        // Killed by a signal: no exit code
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consent_grant_publishes_result() {
        let broker = LocalShellBroker::new(ConsentMode::Grant);
        let mut rx = broker.subscribe();

        assert!(!broker.check_permission().await.unwrap());
        broker.request_permission(3).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            PermissionResult {
                request_code: 3,
                granted: true
            }
        );
        assert!(broker.check_permission().await.unwrap());
    }

    #[tokio::test]
    async fn test_prompt_publishes_nothing() {
        let broker = LocalShellBroker::new(ConsentMode::Prompt);
        let mut rx = broker.subscribe();

        broker.request_permission(0).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_broker() {
        let broker = LocalShellBroker::new(ConsentMode::Grant);
        broker.set_available(false);

        assert!(!broker.ping().await.unwrap());
        assert!(broker.check_permission().await.is_err());
        assert!(broker.request_permission(0).await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_requires_permission() {
        let broker = LocalShellBroker::new(ConsentMode::Deny);
        let argv = vec!["sh".to_string(), "-c".to_string(), "true".to_string()];

        let err = broker.spawn(&argv).await.err().unwrap();
        assert_eq!(err.code(), "SHIZUKU_ERR");

        broker.set_granted(true);
        let mut process = broker.spawn(&argv).await.unwrap();
        assert_eq!(process.wait().await.unwrap(), 0);
    }
}
