//! Integration tests for VulkanGraphicsDevice
//!
//! These tests drive the engine core on a real Vulkan device created headless
//! (no window, no surface). All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_device_tests -- --ignored

use ash::vk;
use ember_3d_engine::ember3d::{Config, Error, RenderContext};
use ember_3d_engine::ember3d::device::{
    BufferDesc, BufferUsage, GraphicsDevice, ImageLayout, MemoryLocation, QueueType, TextureDesc,
    TextureFormat, TextureUsage,
};
use ember_3d_engine::ember3d::graph::{ColorTarget, RenderGraph, RenderTargets, TrackedImage};
use ember_3d_engine_renderer_vulkan::{VulkanGraphicsDevice, VulkanQueue};
use std::sync::Arc;

/// Headless instance and device, destroyed when dropped
///
/// Declare it before anything created on the device so it drops last.
struct GpuFixture {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    family_index: u32,
}

impl GpuFixture {
    fn new() -> Self {
        let entry = unsafe { ash::Entry::load() }.expect("Vulkan loader not found");
        let app_info = vk::ApplicationInfo::default()
            .application_name(c"ember3d-tests")
            .api_version(vk::API_VERSION_1_0);
        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_info, None) }.unwrap();

        let physical_devices = unsafe { instance.enumerate_physical_devices() }.unwrap();
        let (physical_device, family_index) = physical_devices
            .iter()
            .find_map(|&physical_device| {
                let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
                families
                    .iter()
                    .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|index| (physical_device, index as u32))
            })
            .expect("No graphics-capable GPU");

        let priorities = [1.0f32];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(family_index)
            .queue_priorities(&priorities);
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_info));
        let device = unsafe { instance.create_device(physical_device, &device_info, None) }.unwrap();
        let queue = unsafe { device.get_device_queue(family_index, 0) };

        Self { _entry: entry, instance, physical_device, device, queue, family_index }
    }

    fn graphics_device(&self) -> Arc<VulkanGraphicsDevice> {
        // Graphics and transfer share the single queue
        let queues = [
            VulkanQueue { queue_type: QueueType::Graphics, family_index: self.family_index, queue: self.queue },
            VulkanQueue { queue_type: QueueType::Transfer, family_index: self.family_index, queue: self.queue },
        ];
        Arc::new(VulkanGraphicsDevice::new(&self.instance, self.physical_device, self.device.clone(), &queues).unwrap())
    }

    fn context(&self) -> RenderContext {
        RenderContext::new(self.graphics_device(), Config::default()).unwrap()
    }
}

impl Drop for GpuFixture {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

// ============================================================================
// SYNC OBJECT TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_fence_signal_and_reset() {
    let fixture = GpuFixture::new();
    let device = fixture.graphics_device();

    let fence = device.create_fence(true).unwrap();
    assert!(fence.is_signaled().unwrap());
    assert!(fence.wait(0).unwrap());

    fence.reset().unwrap();
    assert!(!fence.is_signaled().unwrap());
    // Unsignaled fence with a zero timeout reports a timeout, not an error
    assert!(!fence.wait(0).unwrap());
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_host_visible_buffer_write() {
    let fixture = GpuFixture::new();
    let device = fixture.graphics_device();

    let buffer = device.create_buffer(&BufferDesc {
        size: 256,
        usage: BufferUsage::TRANSFER_SRC,
        location: MemoryLocation::CpuToGpu,
    }).unwrap();

    assert_eq!(buffer.size(), 256);
    assert!(buffer.is_host_visible());
    buffer.write(0, &[7u8; 128]).unwrap();
    buffer.write(128, &[9u8; 128]).unwrap();

    let overflow = buffer.write(200, &[0u8; 100]);
    assert!(matches!(overflow, Err(Error::InvalidUsage(_))));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_gpu_only_buffer_rejects_host_write() {
    let fixture = GpuFixture::new();
    let device = fixture.graphics_device();

    let buffer = device.create_buffer(&BufferDesc {
        size: 64,
        usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        location: MemoryLocation::GpuOnly,
    }).unwrap();

    assert!(!buffer.is_host_visible());
    assert!(matches!(buffer.write(0, &[1u8; 16]), Err(Error::InvalidUsage(_))));
}

// ============================================================================
// RENDER GRAPH ON A REAL DEVICE
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_staged_buffer_upload_reclaims_staging() {
    let fixture = GpuFixture::new();
    let context = fixture.context();
    let mut graph = RenderGraph::new(&context).unwrap();

    let vertex_buffer = context.device().create_buffer(&BufferDesc {
        size: 1024,
        usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        location: MemoryLocation::GpuOnly,
    }).unwrap();

    graph.copy_buffer(&[42u8; 1024], &vertex_buffer).unwrap();
    assert_eq!(graph.staging().stats().pending, 1);

    let point = graph.execute(&[], &[], &[]).unwrap();
    assert!(graph.command_buffers().wait(point, u64::MAX).unwrap());
    assert_eq!(graph.tick().unwrap(), 1);
    assert_eq!(graph.staging().stats().pending, 0);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_texture_upload_and_transitions() {
    let fixture = GpuFixture::new();
    let context = fixture.context();
    let mut graph = RenderGraph::new(&context).unwrap();

    let texture = context.device().create_texture(&TextureDesc {
        width: 4,
        height: 4,
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
    }).unwrap();
    let image = TrackedImage::new(texture);

    graph.transition_layout(&image, ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();
    graph.copy_image(&[255u8; 64], &image).unwrap();
    graph.transition_layout(&image, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly).unwrap();
    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);

    let point = graph.execute(&[], &[], &[]).unwrap();
    assert!(graph.command_buffers().wait(point, u64::MAX).unwrap());
    graph.tick().unwrap();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_offscreen_clear_pass() {
    let fixture = GpuFixture::new();
    let context = fixture.context();
    let mut graph = RenderGraph::new(&context).unwrap();

    let color = context.device().create_texture(&TextureDesc {
        width: 64,
        height: 64,
        format: TextureFormat::R8G8B8A8_UNORM,
        usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
    }).unwrap();
    let image = Arc::new(TrackedImage::new(color));

    // The second pass starts from the layout the first one left behind
    for _ in 0..2 {
        let targets = RenderTargets::new()
            .with_color(ColorTarget::new(Arc::clone(&image)).with_clear_color([0.1, 0.2, 0.3, 1.0]));
        graph.set_render_targets(targets).unwrap();
        graph.begin_render_pass().unwrap();
        graph.end_render_pass().unwrap();
    }
    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);
    assert_eq!(graph.stats().render_passes_begun, 2);
    assert_eq!(graph.stats().render_passes_cached, 2);

    let point = graph.execute(&[], &[], &[]).unwrap();
    assert!(graph.command_buffers().wait(point, u64::MAX).unwrap());
    graph.tick().unwrap();
}
