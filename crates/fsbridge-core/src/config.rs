//! Bridge configuration
//!
//! Loaded from `<config_dir>/fsbridge/config.json` when present. Every field
//! has a default, so a partial file is fine.

use crate::error::{Error, Result};
use crate::permission::SlotPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    pub workers: WorkerConfig,
    pub flows: FlowConfig,
    pub platform: PlatformConfig,
    pub shell: ShellConfig,
    pub broker: BrokerConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerConfig {
    /// Backend operations allowed to run at the same time
    pub max_in_flight: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfig {
    /// What to do when a second flow of the same kind starts while one is pending
    pub policy: SlotPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformConfig {
    /// Platform API level used for capability probing
    pub sdk_level: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self { sdk_level: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellConfig {
    pub program: String,
    /// Arguments placed before the command line
    pub args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }
}

/// How the local broker answers permission requests
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConsentMode {
    Grant,
    Deny,
    /// Leave the request pending until the host delivers an answer
    #[default]
    Prompt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerConfig {
    /// Code sent with permission requests; answers with another code are ignored
    pub permission_request_code: i32,
    pub consent: ConsentMode,
    pub available: bool,
    pub pre_granted: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            permission_request_code: 0,
            consent: ConsentMode::default(),
            available: true,
            pre_granted: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentsConfig {
    pub authority: String,
    /// Volume id to local root directory
    pub volumes: BTreeMap<String, PathBuf>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        let mut volumes = BTreeMap::new();
        if let Some(home) = dirs::home_dir() {
            volumes.insert("primary".to_string(), home);
        }
        Self {
            authority: "com.android.externalstorage.documents".to_string(),
            volumes,
        }
    }
}

impl BridgeConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("fsbridge").join("config.json"))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from {:?}", path);

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers.max_in_flight == 0 {
            return Err(Error::Config(
                "workers.maxInFlight must be at least 1".to_string(),
            ));
        }
        if self.shell.program.trim().is_empty() {
            return Err(Error::Config("shell.program must not be empty".to_string()));
        }
        if self.documents.authority.is_empty() {
            return Err(Error::Config(
                "documents.authority must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
