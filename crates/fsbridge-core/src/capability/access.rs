//! Static broad-access gate and a picker that only logs

use super::{BroadAccessGate, DirectoryPicker};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::info;

/// Broad-access gate with a fixed, externally toggled grant state
#[derive(Debug, Default)]
pub struct StaticBroadAccess {
    granted: AtomicBool,
    settings_opened: AtomicUsize,
}

impl StaticBroadAccess {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
            settings_opened: AtomicUsize::new(0),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// How many times the settings screen was requested
    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }
}

impl BroadAccessGate for StaticBroadAccess {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn open_settings(&self) -> Result<()> {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        info!("Broad access settings requested; grant it and check again");
        Ok(())
    }
}

/// Picker for headless hosts: records the launch and waits for the host to
/// deliver a result event.
#[derive(Debug, Default)]
pub struct LoggingPicker {
    launches: AtomicUsize,
}

impl LoggingPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl DirectoryPicker for LoggingPicker {
    fn launch(&self, initial_hint: Option<String>) -> Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        info!("Directory picker launched (initial hint: {:?})", initial_hint);
        Ok(())
    }
}
