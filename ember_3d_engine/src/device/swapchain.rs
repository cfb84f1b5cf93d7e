/// Swapchain trait - image acquisition and presentation
///
/// Surface and swapchain creation belong to the window layer. The engine only
/// drives an existing swapchain through this trait.

use std::sync::Arc;
use crate::device::{Semaphore, Texture, TextureFormat};
use crate::error::Result;

/// Outcome of an image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// Image acquired; `suboptimal` means it is still usable but a rebuild is advised
    Acquired { image_index: u32, suboptimal: bool },
    /// Swapchain no longer matches the surface
    OutOfDate,
    /// No image became available before the timeout
    Timeout,
}

/// Outcome of a presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    /// No vsync, may tear
    Immediate,
    /// Low-latency vsync, replaces queued images
    Mailbox,
    /// Vsync (always supported)
    Fifo,
    /// Vsync that tears when a frame is late
    FifoRelaxed,
}

/// Swapchain driven by the frame scheduler
pub trait Swapchain: Send + Sync {
    /// Acquire the next image, signaling `signal` when it is ready for rendering
    fn acquire_next_image(&mut self, timeout_ns: u64, signal: &Arc<dyn Semaphore>) -> Result<AcquireStatus>;

    /// Queue `image_index` for presentation once every semaphore in `wait` is signaled
    fn present(&mut self, image_index: u32, wait: &[Arc<dyn Semaphore>]) -> Result<PresentStatus>;

    fn image_count(&self) -> usize;

    /// Swapchain image `index` (usable as a color attachment)
    fn image(&self, index: usize) -> Option<Arc<dyn Texture>>;

    /// Image extent (width, height)
    fn extent(&self) -> (u32, u32);

    fn format(&self) -> TextureFormat;
}
