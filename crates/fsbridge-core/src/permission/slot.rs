//! Single-entry registry for a pending flow

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Opaque identifier of one started flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowToken(Uuid);

impl FlowToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    DirectoryGrant,
    PrivilegedPermission,
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FlowKind::DirectoryGrant => "directory grant",
            FlowKind::PrivilegedPermission => "privileged permission",
        })
    }
}

/// Behavior when a flow starts while another of the same kind is pending
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SlotPolicy {
    /// Refuse the newcomer; the pending flow keeps the slot
    #[default]
    RejectBusy,
    /// Evict the pending flow without resolving it
    ReplaceLatest,
}

/// Holds at most one pending value. Values are handed out exactly once.
pub struct PendingSlot<T> {
    kind: FlowKind,
    policy: SlotPolicy,
    inner: Mutex<Option<(FlowToken, T)>>,
}

impl<T> PendingSlot<T> {
    pub fn new(kind: FlowKind, policy: SlotPolicy) -> Self {
        Self {
            kind,
            policy,
            inner: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    /// Store `value`, returning its token.
    ///
    /// Under [`SlotPolicy::RejectBusy`] an occupied slot hands `value` back
    /// as the error. Under [`SlotPolicy::ReplaceLatest`] the previous value is
    /// dropped outside the lock.
    pub fn store(&self, value: T) -> Result<FlowToken, T> {
        let token = FlowToken::new();

        let evicted = {
            let mut guard = self.inner.lock();
            if guard.is_some() && self.policy == SlotPolicy::RejectBusy {
                return Err(value);
            }
            guard.replace((token, value))
        };

        if let Some((previous, _)) = &evicted {
            warn!(
                "{} flow {} replaced by {} before it completed",
                self.kind, previous, token
            );
        }
        drop(evicted);

        Ok(token)
    }

    /// Remove and return the pending value, whoever stored it
    pub fn take(&self) -> Option<(FlowToken, T)> {
        self.inner.lock().take()
    }

    /// Remove the pending value only if it still belongs to `token`
    pub fn take_if(&self, token: FlowToken) -> Option<T> {
        let mut guard = self.inner.lock();
        match guard.as_ref() {
            Some((current, _)) if *current == token => guard.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn pending_token(&self) -> Option<FlowToken> {
        self.inner.lock().as_ref().map(|(token, _)| *token)
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().is_some()
    }
}
