/*!
# Ember 3D Engine - Vulkan Backend

Vulkan implementation of the `ember_3d_engine` device facade.

The backend wraps an externally created `ash::Device` and its queues, using
`ash` for the Vulkan bindings and `gpu-allocator` for memory management.
Instance, device and surface creation stay with the application.

## Example

```no_run
use ember_3d_engine::ember3d::{Config, RenderContext};
use ember_3d_engine::ember3d::device::QueueType;
use ember_3d_engine_renderer_vulkan::{VulkanGraphicsDevice, VulkanQueue};
use std::sync::Arc;

# fn run(instance: &ash::Instance, physical_device: ash::vk::PhysicalDevice,
#        device: ash::Device, queue: ash::vk::Queue) -> ember_3d_engine::ember3d::Result<()> {
let queues = [
    VulkanQueue { queue_type: QueueType::Graphics, family_index: 0, queue },
    VulkanQueue { queue_type: QueueType::Transfer, family_index: 0, queue },
];
let device = VulkanGraphicsDevice::new(instance, physical_device, device, &queues)?;
let _context = RenderContext::new(Arc::new(device), Config::default())?;
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_format;
mod vulkan_sync;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_graphics_device;
mod vulkan_swapchain;

#[cfg(feature = "vulkan-validation")]
mod vulkan_debug;

pub use vulkan_context::VulkanQueue;
pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use vulkan_swapchain::{choose_present_mode, VulkanSwapchain, VulkanSwapchainDesc};

// Validation layer support
#[cfg(feature = "vulkan-validation")]
pub use vulkan_debug::{
    print_validation_stats_report, reset_validation_stats, validation_stats, ValidationStats,
    VulkanDebugMessenger, DEBUG_UTILS_EXTENSION_NAME, VALIDATION_LAYER_NAME,
};
