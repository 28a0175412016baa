//! Core type definitions for FsBridge
//!
//! This module contains the shared request, result and entry types that flow
//! between the dispatcher, the permission tracker and the backends.

mod entry_types;
mod request_types;

pub use entry_types::*;
pub use request_types::*;

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Value carried by a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Explicit null, e.g. a cancelled picker
    Null,
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Entries(Vec<DirectoryEntry>),
    BrokerStatus(BrokerStatus),
}

/// Final outcome delivered through a [`crate::runtime::Responder`]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Payload),
    Error { code: String, message: String },
    /// The operation name was not recognized. This is not an error.
    NotImplemented,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Error code, if this outcome is an error
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Outcome::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        Outcome::Error {
            code: err.code(),
            message: err.message(),
        }
    }
}

impl From<crate::error::Result<Payload>> for Outcome {
    fn from(result: crate::error::Result<Payload>) -> Self {
        match result {
            Ok(payload) => Outcome::Success(payload),
            Err(err) => err.into(),
        }
    }
}

/// Availability of the privileged-shell broker, recomputed on every check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerStatus {
    Granted,
    Denied,
    /// The broker process could not be pinged
    Unavailable,
    /// Probing the broker raised an error
    Error,
}

impl BrokerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerStatus::Granted => "GRANTED",
            BrokerStatus::Denied => "DENIED",
            BrokerStatus::Unavailable => "UNAVAILABLE",
            BrokerStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result delivered by the system directory picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    /// The user confirmed a directory. `None` means the picker returned no URI.
    Selected(Option<String>),
    /// The user dismissed the picker
    Cancelled,
    /// The picker itself failed
    Failed(String),
}

/// Captured output of a privileged shell command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShellExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ShellExecutionResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShellError;

    #[test]
    fn test_outcome_from_error() {
        let outcome: Outcome = Error::Shell(ShellError::NonZeroExit {
            code: 2,
            stderr: "bad".to_string(),
        })
        .into();

        assert_eq!(
            outcome,
            Outcome::Error {
                code: "SHELL_EXIT_2".to_string(),
                message: "bad".to_string(),
            }
        );
        assert_eq!(outcome.error_code(), Some("SHELL_EXIT_2"));
    }

    #[test]
    fn test_broker_status_serialization() {
        let json = serde_json::to_string(&BrokerStatus::Unavailable).unwrap();
        assert_eq!(json, "\"UNAVAILABLE\"");
        assert_eq!(BrokerStatus::Granted.to_string(), "GRANTED");
    }
}
