//! Permission handshakes that outlive a single call
//!
//! Two flows suspend until an out-of-band answer arrives:
//! - the directory grant (system picker result)
//! - the privileged permission (broker consent callback)
//!
//! Each flow kind owns one [`PendingSlot`]; [`PermissionTracker`] drives both.

mod slot;
mod tracker;

pub use slot::{FlowKind, FlowToken, PendingSlot, SlotPolicy};
pub use tracker::PermissionTracker;
