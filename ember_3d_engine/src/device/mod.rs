/// Device facade - traits implemented by graphics backends and the test mock

// Module declarations
pub mod graphics_device;
pub mod resource_id;
pub mod buffer;
pub mod texture;
pub mod sync;
pub mod command_list;
pub mod render_pass;
pub mod pipeline;
pub mod swapchain;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use resource_id::*;
pub use buffer::*;
pub use texture::*;
pub use sync::*;
pub use command_list::*;
pub use render_pass::*;
pub use pipeline::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
