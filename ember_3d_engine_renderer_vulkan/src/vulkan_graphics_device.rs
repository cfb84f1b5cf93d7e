/// VulkanGraphicsDevice - Vulkan implementation of the engine GraphicsDevice trait
///
/// The caller creates the instance, logical device and queues (and the surface
/// when presenting). This device only creates objects on top of them.

use ember_3d_engine::ember3d::Result;
use ember_3d_engine::ember3d::device::{
    Buffer, BufferDesc, CommandPool, DescriptorSet, DescriptorWrite, Fence, Framebuffer,
    FramebufferDesc, GraphicsDevice, Pipeline, PipelineDesc, PipelineLayout, PipelineLayoutDesc,
    QueueType, RenderPass, RenderPassDesc, Semaphore, Shader, ShaderDesc, SubmitInfo, Texture,
    TextureDesc,
};
use ember_3d_engine::{engine_bail_misuse, engine_info};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::{vk_command_buffer, VulkanCommandPool};
use crate::vulkan_context::{vk_error, VulkanContext, VulkanQueue};
use crate::vulkan_format::pipeline_stages_to_vk;
use crate::vulkan_pipeline::{VulkanDescriptorSet, VulkanPipeline, VulkanPipelineLayout, VulkanShader};
use crate::vulkan_render_pass::{VulkanFramebuffer, VulkanRenderPass};
use crate::vulkan_sync::{vk_fence, vk_semaphores, VulkanFence, VulkanSemaphore};
use crate::vulkan_texture::VulkanTexture;

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    pub(crate) ctx: Arc<VulkanContext>,
}

impl VulkanGraphicsDevice {
    /// Wrap an externally created logical device
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance the device was created from
    /// * `physical_device` - Physical device backing `device`
    /// * `device` - Logical device; must outlive every object created here
    /// * `queues` - One entry per queue type the engine may submit to
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queues: &[VulkanQueue],
    ) -> Result<Self> {
        let ctx = VulkanContext::new(instance, physical_device, device, queues)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        engine_info!("ember3d::vulkan", "Vulkan device ready: {} ({} queue(s))", device_name, queues.len());

        Ok(Self { ctx: Arc::new(ctx) })
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_command_pool(&self, queue_type: QueueType) -> Result<Box<dyn CommandPool>> {
        Ok(Box::new(VulkanCommandPool::new(Arc::clone(&self.ctx), queue_type)?))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::new(Arc::clone(&self.ctx), signaled)?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(VulkanSemaphore::new(Arc::clone(&self.ctx))?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(VulkanBuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(VulkanTexture::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(VulkanShader::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(VulkanPipelineLayout::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_descriptor_set(
        &self,
        layout: &Arc<dyn PipelineLayout>,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DescriptorSet>> {
        Ok(Arc::new(VulkanDescriptorSet::new(Arc::clone(&self.ctx), layout, writes)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        Ok(Arc::new(VulkanRenderPass::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        Ok(Arc::new(VulkanFramebuffer::new(Arc::clone(&self.ctx), desc)?))
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<Arc<dyn Pipeline>> {
        Ok(Arc::new(VulkanPipeline::new(Arc::clone(&self.ctx), desc)?))
    }

    fn queue_submit(&self, queue_type: QueueType, submit: &SubmitInfo<'_>) -> Result<()> {
        if submit.wait_semaphores.len() != submit.wait_stages.len() {
            engine_bail_misuse!("ember3d::vulkan", "queue_submit: {} wait semaphore(s) but {} wait stage(s)",
                submit.wait_semaphores.len(), submit.wait_stages.len());
        }

        let queue = self.ctx.queue(queue_type)?;
        let command_buffers: Vec<vk::CommandBuffer> = submit.command_lists
            .iter()
            .map(|list| vk_command_buffer(*list))
            .collect();
        let wait_semaphores = vk_semaphores(submit.wait_semaphores);
        let wait_stages: Vec<vk::PipelineStageFlags> = submit.wait_stages
            .iter()
            .map(|stages| pipeline_stages_to_vk(*stages))
            .collect();
        let signal_semaphores = vk_semaphores(submit.signal_semaphores);
        let fence = submit.fence.map_or(vk::Fence::null(), vk_fence);

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _queue_guard = self.ctx.lock_queues();
        unsafe { self.ctx.device.queue_submit(queue.queue, &[submit_info], fence) }
            .map_err(|e| vk_error("vkQueueSubmit", e))
    }

    fn wait_idle(&self) -> Result<()> {
        let _queue_guard = self.ctx.lock_queues();
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| vk_error("vkDeviceWaitIdle", e))
    }
}
