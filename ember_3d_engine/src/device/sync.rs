/// Synchronization primitives and pipeline barrier masks

use bitflags::bitflags;
use crate::device::ResourceId;
use crate::error::Result;

/// CPU-observable completion primitive
pub trait Fence: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Non-blocking status query
    fn is_signaled(&self) -> Result<bool>;

    /// Block until signaled or until `timeout_ns` elapses
    ///
    /// Returns `Ok(false)` on timeout.
    fn wait(&self, timeout_ns: u64) -> Result<bool>;

    /// Return to the unsignaled state
    fn reset(&self) -> Result<()>;
}

/// GPU-side ordering primitive (not observable from the CPU)
pub trait Semaphore: Send + Sync {
    fn id(&self) -> ResourceId;
}

bitflags! {
    /// Pipeline stages used in barriers and submission waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_INPUT = 1 << 1;
        const VERTEX_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const LATE_FRAGMENT_TESTS = 1 << 5;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
    }
}

bitflags! {
    /// Memory access kinds used in barriers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const TRANSFER_READ = 1 << 0;
        const TRANSFER_WRITE = 1 << 1;
        const SHADER_READ = 1 << 2;
        const COLOR_ATTACHMENT_READ = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 5;
        const MEMORY_READ = 1 << 6;
    }
}
