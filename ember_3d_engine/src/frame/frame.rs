/// Per-slot frame state

use std::sync::Arc;
use crate::command::ExecutionPoint;
use crate::device::Semaphore;

/// Where a frame slot is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Never used, or acquisition failed
    Idle,
    Acquired,
    Recording,
    Submitted,
    Presented,
}

/// One frame-in-flight slot
///
/// Owns the semaphore its swapchain acquisition signals and remembers the
/// last work it submitted, which must finish before the slot is reused.
pub struct Frame {
    slot: usize,
    image_available: Arc<dyn Semaphore>,
    image_index: Option<u32>,
    submission: Option<ExecutionPoint>,
    suboptimal: bool,
    state: FrameState,
}

impl Frame {
    pub(crate) fn new(slot: usize, image_available: Arc<dyn Semaphore>) -> Self {
        Self {
            slot,
            image_available,
            image_index: None,
            submission: None,
            suboptimal: false,
            state: FrameState::Idle,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Swapchain image acquired for this frame
    pub fn image_index(&self) -> Option<u32> {
        self.image_index
    }

    /// Last submission of this slot not yet waited for
    pub fn submission(&self) -> Option<ExecutionPoint> {
        self.submission
    }

    pub fn image_available(&self) -> &Arc<dyn Semaphore> {
        &self.image_available
    }

    pub(crate) fn mark_acquired(&mut self, image_index: u32, suboptimal: bool) {
        self.image_index = Some(image_index);
        self.suboptimal = suboptimal;
        self.state = FrameState::Acquired;
    }

    pub(crate) fn mark_recording(&mut self) {
        self.state = FrameState::Recording;
    }

    pub(crate) fn mark_submitted(&mut self, point: ExecutionPoint) {
        self.submission = Some(point);
        self.state = FrameState::Submitted;
    }

    pub(crate) fn mark_presented(&mut self) {
        self.state = FrameState::Presented;
    }

    pub(crate) fn take_submission(&mut self) -> Option<ExecutionPoint> {
        self.submission.take()
    }

    pub(crate) fn was_suboptimal(&self) -> bool {
        self.suboptimal
    }

    pub(crate) fn reset(&mut self) {
        self.image_index = None;
        self.suboptimal = false;
        self.state = FrameState::Idle;
    }
}
