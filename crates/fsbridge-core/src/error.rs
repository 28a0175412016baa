//! Error types for FsBridge Core
//!
//! Every error carries a stable wire code (see [`Error::code`]) so the host can
//! hand a `(code, message)` pair back to the UI layer unchanged.

use thiserror::Error;

/// Main error type for FsBridge operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Grant flow error: {0}")]
    Grant(#[from] GrantError),

    #[error("Document tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Native filesystem error: {0}")]
    Native(#[from] NativeError),

    #[error("Privileged shell error: {0}")]
    Shell(#[from] ShellError),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by the directory-grant and privileged-permission flows
#[derive(Error, Debug)]
pub enum GrantError {
    #[error("Uri is null")]
    UriNull,

    #[error("Picker failed: {0}")]
    PickerFailed(String),

    #[error("A {0} request is already pending")]
    Busy(String),

    #[error("{0} flow aborted before completion")]
    Aborted(String),
}

/// Scoped document tree errors
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("{0}")]
    InvalidUri(String),

    #[error("{0}")]
    List(String),

    #[error("{0}")]
    Read(String),

    #[error("Stream null")]
    StreamUnavailable,

    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

/// Native path errors
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("Path does not exist: {0}")]
    PathNotFound(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    Failed(String),
}

/// Privileged shell errors
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("{0}")]
    Broker(String),

    #[error("Command exited with status {code}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("{0}")]
    Execution(String),
}

impl Error {
    /// Stable error code reported to the caller
    pub fn code(&self) -> String {
        let code = match self {
            Error::Grant(GrantError::UriNull) => "URI_NULL",
            Error::Grant(GrantError::PickerFailed(_)) => "PICKER_ERROR",
            Error::Grant(GrantError::Busy(_)) => "BUSY",
            Error::Grant(GrantError::Aborted(_)) => "ABORTED",
            Error::Tree(TreeError::InvalidUri(_)) => "INVALID_URI",
            Error::Tree(TreeError::List(_)) => "LIST_ERROR",
            Error::Tree(TreeError::Read(_))
            | Error::Tree(TreeError::StreamUnavailable)
            | Error::Tree(TreeError::DocumentNotFound(_)) => "READ_ERROR",
            Error::Native(NativeError::PathNotFound(_)) => "DIR_ERROR",
            Error::Native(NativeError::AccessDenied(_)) => "ACCESS_DENIED",
            Error::Native(NativeError::Failed(_)) => "NATIVE_ERROR",
            Error::Shell(ShellError::Broker(_)) => "SHIZUKU_ERR",
            Error::Shell(ShellError::NonZeroExit { code, .. }) => {
                return format!("SHELL_EXIT_{}", code)
            }
            Error::Shell(ShellError::Execution(_)) => "SHIZUKU_EX",
            Error::MissingArgument(_) => "ERR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Internal(_) => "INTERNAL",
        };
        code.to_string()
    }

    /// Detail message reported alongside [`Error::code`]
    ///
    /// This is the innermost message without the category prefix used by
    /// `Display`. A non-zero shell exit reports the captured stderr.
    pub fn message(&self) -> String {
        match self {
            Error::Grant(e) => e.to_string(),
            Error::Tree(e) => e.to_string(),
            Error::Native(e) => e.to_string(),
            Error::Shell(ShellError::NonZeroExit { stderr, .. }) => stderr.clone(),
            Error::Shell(e) => e.to_string(),
            Error::MissingArgument(m) | Error::Config(m) | Error::Internal(m) => m.clone(),
            Error::Io(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
        }
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
