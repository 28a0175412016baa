//! Request types accepted by the dispatcher

use serde::{Deserialize, Serialize};

/// Operations the dispatcher recognizes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    OpenDirectoryPicker,
    ListTreeChildren,
    ReadTreeFile,
    RequestBroadAccess,
    CheckBroadAccess,
    ListNativeDirectory,
    CheckBrokerAvailable,
    RequestBrokerPermission,
    ExecutePrivilegedCommand,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::OpenDirectoryPicker,
        Operation::ListTreeChildren,
        Operation::ReadTreeFile,
        Operation::RequestBroadAccess,
        Operation::CheckBroadAccess,
        Operation::ListNativeDirectory,
        Operation::CheckBrokerAvailable,
        Operation::RequestBrokerPermission,
        Operation::ExecutePrivilegedCommand,
    ];

    /// Parse an operation name.
    ///
    /// Both the kebab-case names and the legacy camelCase method-channel names
    /// are accepted. Returns `None` for anything else.
    pub fn parse(name: &str) -> Option<Self> {
        let op = match name {
            "open-directory-picker" | "openDocumentTree" => Operation::OpenDirectoryPicker,
            "list-tree-children" | "listFiles" => Operation::ListTreeChildren,
            "read-tree-file" | "readFile" => Operation::ReadTreeFile,
            "request-broad-access" | "requestAllFilesAccess" => Operation::RequestBroadAccess,
            "check-broad-access" | "checkAllFilesAccess" => Operation::CheckBroadAccess,
            "list-native-directory" | "listNativeDirectory" => Operation::ListNativeDirectory,
            "check-broker-available" | "checkShizukuAvailable" => Operation::CheckBrokerAvailable,
            "request-broker-permission" | "requestShizukuPermission" => {
                Operation::RequestBrokerPermission
            }
            "execute-privileged-command" | "shizukuShell" => Operation::ExecutePrivilegedCommand,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::OpenDirectoryPicker => "open-directory-picker",
            Operation::ListTreeChildren => "list-tree-children",
            Operation::ReadTreeFile => "read-tree-file",
            Operation::RequestBroadAccess => "request-broad-access",
            Operation::CheckBroadAccess => "check-broad-access",
            Operation::ListNativeDirectory => "list-native-directory",
            Operation::CheckBrokerAvailable => "check-broker-available",
            Operation::RequestBrokerPermission => "request-broker-permission",
            Operation::ExecutePrivilegedCommand => "execute-privileged-command",
        }
    }

    /// Argument keys consulted for this operation's required or optional input
    pub fn argument_keys(&self) -> &'static [&'static str] {
        match self {
            Operation::OpenDirectoryPicker => &["initialUri", "initialUriHint"],
            Operation::ListTreeChildren => &["treeUri", "uri"],
            Operation::ReadTreeFile => &["fileUri", "uri"],
            Operation::ListNativeDirectory => &["path"],
            Operation::ExecutePrivilegedCommand => &["cmd"],
            Operation::RequestBroadAccess
            | Operation::CheckBroadAccess
            | Operation::CheckBrokerAvailable
            | Operation::RequestBrokerPermission => &[],
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A named operation with its arguments. Immutable once dispatched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: serde_json::Map::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn operation(&self) -> Option<Operation> {
        Operation::parse(&self.method)
    }

    /// First string argument found under any of `keys`.
    ///
    /// JSON null counts as absent.
    pub fn arg(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.args.get(*key).and_then(|v| v.as_str()))
    }
}
