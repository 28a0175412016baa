//! Privileged shell execution through the broker

use crate::capability::{ByteStream, PrivilegedBroker};
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::types::{BrokerStatus, ShellExecutionResult};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Whether the broker permission is currently held. Probe errors count as no.
pub async fn holds_broker_permission(broker: &dyn PrivilegedBroker) -> bool {
    match broker.check_permission().await {
        Ok(granted) => granted,
        Err(e) => {
            debug!("Broker permission probe failed: {}", e);
            false
        }
    }
}

/// Runs shell command lines through the broker
pub struct ShellBackend {
    broker: Arc<dyn PrivilegedBroker>,
    program: String,
    args: Vec<String>,
}

impl ShellBackend {
    pub fn new(broker: Arc<dyn PrivilegedBroker>, config: &ShellConfig) -> Self {
        Self {
            broker,
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    /// Ping the broker, then check our permission. Never cached.
    pub async fn check_availability(&self) -> BrokerStatus {
        match self.broker.ping().await {
            Ok(false) => BrokerStatus::Unavailable,
            Ok(true) => {
                if holds_broker_permission(self.broker.as_ref()).await {
                    BrokerStatus::Granted
                } else {
                    BrokerStatus::Denied
                }
            }
            Err(e) => {
                warn!("Probing the broker failed: {}", e);
                BrokerStatus::Error
            }
        }
    }

    /// Spawn `command` and capture both streams until the process exits.
    ///
    /// Only spawn and stream failures are errors here; a non-zero exit is a
    /// normal result.
    pub async fn execute(&self, command: &str) -> Result<ShellExecutionResult> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv.push(command.to_string());

        debug!("Executing privileged command: {}", command);

        let mut process = self
            .broker
            .spawn(&argv)
            .await
            .map_err(|e| ShellError::Execution(e.message()))?;

        let stdout = process
            .take_stdout()
            .ok_or_else(|| ShellError::Execution("stdout was not captured".to_string()))?;
        let stderr = process
            .take_stderr()
            .ok_or_else(|| ShellError::Execution("stderr was not captured".to_string()))?;

        // Drain both pipes together so neither can fill up and stall the child.
        let (stdout, stderr) = tokio::try_join!(read_text(stdout), read_text(stderr))
            .map_err(|e| ShellError::Execution(e.to_string()))?;

        let exit_code = process
            .wait()
            .await
            .map_err(|e| ShellError::Execution(e.message()))?;

        debug!("Privileged command exited with {}", exit_code);

        Ok(ShellExecutionResult {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Execute and keep stdout on success; non-zero exits become
    /// [`ShellError::NonZeroExit`] carrying stderr.
    pub async fn run(&self, command: &str) -> Result<String> {
        let result = self.execute(command).await?;
        if result.is_success() {
            Ok(result.stdout)
        } else {
            Err(ShellError::NonZeroExit {
                code: result.exit_code,
                stderr: result.stderr,
            }
            .into())
        }
    }
}

async fn read_text(mut stream: ByteStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
