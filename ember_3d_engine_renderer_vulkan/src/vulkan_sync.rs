/// Fence and Semaphore - Vulkan implementations of the engine sync traits

use ember_3d_engine::ember3d::Result;
use ember_3d_engine::ember3d::device::{Fence, ResourceId, Semaphore};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, VulkanContext};

pub(crate) struct VulkanFence {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) fence: vk::Fence,
}

impl VulkanFence {
    pub(crate) fn new(ctx: Arc<VulkanContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { ctx.device.create_fence(&create_info, None) }
            .map_err(|e| vk_error("vkCreateFence", e))?;
        Ok(Self { ctx, id: ResourceId::next(), fence })
    }
}

impl Fence for VulkanFence {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn is_signaled(&self) -> Result<bool> {
        unsafe { self.ctx.device.get_fence_status(self.fence) }
            .map_err(|e| vk_error("vkGetFenceStatus", e))
    }

    fn wait(&self, timeout_ns: u64) -> Result<bool> {
        match unsafe { self.ctx.device.wait_for_fences(&[self.fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(vk_error("vkWaitForFences", e)),
        }
    }

    fn reset(&self) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[self.fence]) }
            .map_err(|e| vk_error("vkResetFences", e))
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

pub(crate) struct VulkanSemaphore {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanSemaphore {
    pub(crate) fn new(ctx: Arc<VulkanContext>) -> Result<Self> {
        let semaphore = unsafe { ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| vk_error("vkCreateSemaphore", e))?;
        Ok(Self { ctx, id: ResourceId::next(), semaphore })
    }
}

impl Semaphore for VulkanSemaphore {
    fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for VulkanSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Native handle of a fence created by this backend
pub(crate) fn vk_fence(fence: &Arc<dyn Fence>) -> vk::Fence {
    // SAFETY: every fence reaching the Vulkan device was created by it
    let fence = unsafe { &*(fence.as_ref() as *const dyn Fence as *const VulkanFence) };
    fence.fence
}

/// Native handle of a semaphore created by this backend
pub(crate) fn vk_semaphore(semaphore: &Arc<dyn Semaphore>) -> vk::Semaphore {
    // SAFETY: every semaphore reaching the Vulkan device was created by it
    let semaphore = unsafe { &*(semaphore.as_ref() as *const dyn Semaphore as *const VulkanSemaphore) };
    semaphore.semaphore
}

pub(crate) fn vk_semaphores(semaphores: &[Arc<dyn Semaphore>]) -> Vec<vk::Semaphore> {
    semaphores.iter().map(vk_semaphore).collect()
}
