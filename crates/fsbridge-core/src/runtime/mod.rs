//! Execution contexts
//!
//! This module provides:
//! - The UI-affine loop every resolution is delivered on
//! - Single-shot responders
//! - The bounded worker pool backend I/O runs on

mod pool;
mod responder;
mod ui;

pub use pool::WorkerPool;
pub use responder::{Callback, Responder};
pub use ui::{UiHandle, UiJob, UiLoop};
