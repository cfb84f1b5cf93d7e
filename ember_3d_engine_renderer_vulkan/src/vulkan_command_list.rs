/// CommandPool and CommandList - Vulkan implementations of native command recording

use ember_3d_engine::ember3d::Result;
use ember_3d_engine::ember3d::device::{
    Buffer, BufferCopy, ClearValue, CommandList, CommandPool, DescriptorSet, Framebuffer,
    ImageBarrier, ImageLayout, IndexType, Pipeline, QueueType, Rect2D, RenderPass, Texture,
    Viewport,
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_buffer::vk_buffer;
use crate::vulkan_context::{vk_error, VulkanContext};
use crate::vulkan_format::{
    access_flags_to_vk, image_layout_to_vk, index_type_to_vk, pipeline_stages_to_vk,
    shader_stage_flags_to_vk,
};
use crate::vulkan_pipeline::{as_vulkan_layout, vk_descriptor_set, vk_pipeline};
use crate::vulkan_render_pass::{vk_framebuffer, vk_render_pass};
use crate::vulkan_texture::{as_vulkan_texture, full_range};

// ===== COMMAND POOL =====

/// Command pool for one queue family; its buffers are reset individually
pub(crate) struct VulkanCommandPool {
    ctx: Arc<VulkanContext>,
    pool: vk::CommandPool,
    queue_type: QueueType,
}

impl VulkanCommandPool {
    pub(crate) fn new(ctx: Arc<VulkanContext>, queue_type: QueueType) -> Result<Self> {
        let queue = ctx.queue(queue_type)?;
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue.family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { ctx.device.create_command_pool(&create_info, None) }
            .map_err(|e| vk_error("vkCreateCommandPool", e))?;

        Ok(Self { ctx, pool, queue_type })
    }
}

impl CommandPool for VulkanCommandPool {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn allocate(&mut self) -> Result<Box<dyn CommandList>> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffers = unsafe { self.ctx.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| vk_error("vkAllocateCommandBuffers", e))?;

        Ok(Box::new(VulkanCommandList {
            ctx: Arc::clone(&self.ctx),
            pool: self.pool,
            command_buffer: command_buffers[0],
        }))
    }

    fn trim(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device.trim_command_pool(self.pool, vk::CommandPoolTrimFlags::empty());
        }
        Ok(())
    }
}

impl Drop for VulkanCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_command_pool(self.pool, None);
        }
    }
}

// ===== COMMAND LIST =====

/// Primary command buffer allocated from a [`VulkanCommandPool`]
///
/// The owning manager drops every list before its pool.
pub(crate) struct VulkanCommandList {
    ctx: Arc<VulkanContext>,
    pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
}

impl VulkanCommandList {
    fn device(&self) -> &ash::Device {
        &self.ctx.device
    }
}

impl CommandList for VulkanCommandList {
    fn begin(&mut self) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device().begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(|e| vk_error("vkBeginCommandBuffer", e))
    }

    fn end(&mut self) -> Result<()> {
        unsafe { self.device().end_command_buffer(self.command_buffer) }
            .map_err(|e| vk_error("vkEndCommandBuffer", e))
    }

    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device().reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| vk_error("vkResetCommandBuffer", e))
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|clear| match *clear {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width: framebuffer.width(), height: framebuffer.height() },
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass(render_pass))
            .framebuffer(vk_framebuffer(framebuffer))
            .render_area(render_area)
            .clear_values(&vk_clear_values);

        unsafe {
            self.device().cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        unsafe {
            self.device().cmd_end_render_pass(self.command_buffer);
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.device().cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.device().cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        unsafe {
            self.device().cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline(pipeline),
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        let layout = as_vulkan_layout(pipeline.layout()).layout;
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                set_index,
                &[vk_descriptor_set(descriptor_set)],
                &[],
            );
        }
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &Arc<dyn Pipeline>, offset: u32, data: &[u8]) -> Result<()> {
        let layout = as_vulkan_layout(pipeline.layout());
        unsafe {
            self.device().cmd_push_constants(
                self.command_buffer,
                layout.layout,
                shader_stage_flags_to_vk(layout.desc.push_constant_stages),
                offset,
                data,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        unsafe {
            self.device().cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer(buffer)], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        unsafe {
            self.device().cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer(buffer),
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        unsafe {
            self.device().cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        unsafe {
            self.device().cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: &Arc<dyn Buffer>, dst: &Arc<dyn Buffer>, region: BufferCopy) -> Result<()> {
        let dst_buffer = vk_buffer(dst);
        let copy = vk::BufferCopy {
            src_offset: region.src_offset,
            dst_offset: region.dst_offset,
            size: region.size,
        };

        let read_access = vk::AccessFlags::VERTEX_ATTRIBUTE_READ
            | vk::AccessFlags::INDEX_READ
            | vk::AccessFlags::UNIFORM_READ
            | vk::AccessFlags::SHADER_READ;
        let read_stages = vk::PipelineStageFlags::VERTEX_INPUT
            | vk::PipelineStageFlags::VERTEX_SHADER
            | vk::PipelineStageFlags::FRAGMENT_SHADER;
        let range_barrier = |src_access, dst_access| {
            vk::BufferMemoryBarrier::default()
                .src_access_mask(src_access)
                .dst_access_mask(dst_access)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .buffer(dst_buffer)
                .offset(region.dst_offset)
                .size(region.size)
        };
        // Reads submitted earlier on this queue finish before the copy overwrites
        // the range, and the copied range is visible to any later read
        let before = range_barrier(read_access, vk::AccessFlags::TRANSFER_WRITE);
        let after = range_barrier(vk::AccessFlags::TRANSFER_WRITE, read_access);

        unsafe {
            self.device().cmd_pipeline_barrier(
                self.command_buffer,
                read_stages,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[before],
                &[],
            );
            self.device().cmd_copy_buffer(self.command_buffer, vk_buffer(src), dst_buffer, &[copy]);
            self.device().cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                read_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[after],
                &[],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<dyn Buffer>,
        src_offset: u64,
        dst: &Arc<dyn Texture>,
        dst_layout: ImageLayout,
    ) -> Result<()> {
        let texture = as_vulkan_texture(dst);
        let info = dst.info();
        let range = full_range(info);
        let region = vk::BufferImageCopy {
            buffer_offset: src_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: range.aspect_mask,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D { width: info.width, height: info.height, depth: 1 },
        };

        unsafe {
            self.device().cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_buffer(src),
                texture.image,
                image_layout_to_vk(dst_layout),
                &[region],
            );
        }
        Ok(())
    }

    fn image_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()> {
        let texture = as_vulkan_texture(barrier.texture);
        let image_barrier = vk::ImageMemoryBarrier::default()
            .old_layout(image_layout_to_vk(barrier.old_layout))
            .new_layout(image_layout_to_vk(barrier.new_layout))
            .src_access_mask(access_flags_to_vk(barrier.src_access))
            .dst_access_mask(access_flags_to_vk(barrier.dst_access))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(full_range(barrier.texture.info()));

        unsafe {
            self.device().cmd_pipeline_barrier(
                self.command_buffer,
                pipeline_stages_to_vk(barrier.src_stages),
                pipeline_stages_to_vk(barrier.dst_stages),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
        Ok(())
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.free_command_buffers(self.pool, &[self.command_buffer]);
        }
    }
}

/// Native handle of a command list recorded by this backend
pub(crate) fn vk_command_buffer(list: &dyn CommandList) -> vk::CommandBuffer {
    // SAFETY: every command list reaching the Vulkan device was allocated by it
    let list = unsafe { &*(list as *const dyn CommandList as *const VulkanCommandList) };
    list.command_buffer
}
