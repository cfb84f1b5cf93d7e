//! Engine configuration

use crate::device::{PresentMode, QueueType};
use crate::error::{Error, Result};

/// Configuration shared by the render graph, frame scheduler and backends
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Application name reported to the backend
    pub app_name: String,

    /// Enable backend validation layers
    pub enable_validation: bool,

    /// Number of frames the CPU may record ahead of the GPU (>= 1)
    pub frames_in_flight: usize,

    /// Swapchain acquire timeout in nanoseconds (`u64::MAX` waits indefinitely)
    pub acquire_timeout_ns: u64,

    /// Queue types the command buffer manager creates pools for
    pub queue_types: Vec<QueueType>,

    /// Present mode requested from the swapchain owner
    pub preferred_present_mode: PresentMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Ember3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            frames_in_flight: 2,
            acquire_timeout_ns: u64::MAX,
            queue_types: vec![QueueType::Graphics, QueueType::Transfer],
            preferred_present_mode: PresentMode::Fifo,
        }
    }
}

impl Config {
    /// Check the configuration before any GPU object is created
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if `frames_in_flight` is zero, or if no graphics
    /// queue is configured (the render graph records on the graphics queue).
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if !self.queue_types.contains(&QueueType::Graphics) {
            return Err(Error::InitializationFailed(
                "queue_types must include QueueType::Graphics".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
