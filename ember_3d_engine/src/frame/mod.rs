//! Frame scheduling module
//!
//! Drives the swapchain: acquire, submit, present, with a configurable number
//! of frames in flight.

mod frame;
mod frame_scheduler;

pub use frame::{Frame, FrameState};
pub use frame_scheduler::{FrameScheduler, FrameStatus};
