/// Buffer - Vulkan implementation of the engine Buffer trait

use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::ember3d::device::{Buffer, BufferDesc, MemoryLocation, ResourceId};
use ember_3d_engine::{engine_bail_misuse, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::sync::Arc;

use crate::vulkan_context::{vk_error, VulkanContext};
use crate::vulkan_format::{buffer_usage_to_vk, memory_location_to_vk};

/// Vulkan buffer with its gpu-allocator allocation
pub(crate) struct VulkanBuffer {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    location: MemoryLocation,
}

impl VulkanBuffer {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &BufferDesc) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(buffer_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { ctx.device.create_buffer(&create_info, None) }
            .map_err(|e| vk_error(&format!("vkCreateBuffer ({} bytes)", desc.size), e))?;
        let requirements = unsafe { ctx.device.get_buffer_memory_requirements(buffer) };

        let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
            name: "ember3d buffer",
            requirements,
            location: memory_location_to_vk(desc.location),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("ember3d::vulkan", "Out of GPU memory for buffer (required: {:.2} MB): {:?}", size_mb, e);
                unsafe { ctx.device.destroy_buffer(buffer, None) };
                return Err(Error::OutOfMemory);
            }
        };

        if let Err(e) = unsafe { ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            ctx.allocator().free(allocation).ok();
            unsafe { ctx.device.destroy_buffer(buffer, None) };
            return Err(vk_error("vkBindBufferMemory", e));
        }

        Ok(Self {
            ctx,
            id: ResourceId::next(),
            buffer,
            allocation: Some(allocation),
            size: desc.size,
            location: desc.location,
        })
    }
}

impl Buffer for VulkanBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_host_visible(&self) -> bool {
        self.location == MemoryLocation::CpuToGpu
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            engine_bail_misuse!("ember3d::vulkan",
                "Buffer write of {} bytes at offset {} overflows {} bytes", data.len(), offset, self.size);
        }
        let mapped = self.allocation.as_ref().and_then(|allocation| allocation.mapped_ptr());
        let Some(mapped) = mapped.filter(|_| self.is_host_visible()) else {
            engine_bail_misuse!("ember3d::vulkan", "Buffer write on memory that is not host-visible");
        };

        // Host-coherent memory: no flush needed
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (mapped.as_ptr() as *mut u8).add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.ctx.allocator().free(allocation).ok();
        }
        unsafe {
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

pub(crate) fn vk_buffer(buffer: &Arc<dyn Buffer>) -> vk::Buffer {
    // SAFETY: every buffer reaching the Vulkan backend was created by it
    let buffer = unsafe { &*(buffer.as_ref() as *const dyn Buffer as *const VulkanBuffer) };
    buffer.buffer
}
