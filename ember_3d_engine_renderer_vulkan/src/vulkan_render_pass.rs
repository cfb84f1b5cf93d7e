/// RenderPass and Framebuffer - Vulkan implementations

use ember_3d_engine::ember3d::Result;
use ember_3d_engine::ember3d::device::{
    AttachmentDesc, Framebuffer, FramebufferDesc, RenderPass, RenderPassDesc, ResourceId, Texture,
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, VulkanContext};
use crate::vulkan_format::{
    image_layout_to_vk, load_op_to_vk, sample_count_to_vk, store_op_to_vk, texture_format_to_vk,
};
use crate::vulkan_texture::as_vulkan_texture;

pub(crate) struct VulkanRenderPass {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

impl VulkanRenderPass {
    /// Single-subpass render pass with an external dependency on attachment output
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &RenderPassDesc) -> Result<Self> {
        let mut attachments: Vec<vk::AttachmentDescription> = desc.color_attachments
            .iter()
            .map(attachment_description)
            .collect();
        let color_refs: Vec<vk::AttachmentReference> = (0..desc.color_attachments.len() as u32)
            .map(|index| vk::AttachmentReference::default()
                .attachment(index)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
            .collect();

        let depth_ref = desc.depth_attachment.as_ref().map(|depth| {
            attachments.push(attachment_description(depth));
            vk::AttachmentReference::default()
                .attachment(attachments.len() as u32 - 1)
                .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        // Include depth stages when a depth attachment is present
        let (stage_mask, access_mask) = if depth_ref.is_some() {
            (
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
        } else {
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        };
        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage_mask)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage_mask)
            .dst_access_mask(access_mask);

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe { ctx.device.create_render_pass(&create_info, None) }
            .map_err(|e| vk_error("vkCreateRenderPass", e))?;

        Ok(Self { ctx, id: ResourceId::next(), render_pass, desc: desc.clone() })
    }
}

fn attachment_description(attachment: &AttachmentDesc) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(texture_format_to_vk(attachment.format))
        .samples(sample_count_to_vk(attachment.samples))
        .load_op(load_op_to_vk(attachment.load_op))
        .store_op(store_op_to_vk(attachment.store_op))
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(image_layout_to_vk(attachment.initial_layout))
        .final_layout(image_layout_to_vk(attachment.final_layout))
}

impl RenderPass for VulkanRenderPass {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

impl Drop for VulkanRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

pub(crate) fn vk_render_pass(render_pass: &Arc<dyn RenderPass>) -> vk::RenderPass {
    // SAFETY: every render pass reaching the Vulkan backend was created by it
    let render_pass = unsafe { &*(render_pass.as_ref() as *const dyn RenderPass as *const VulkanRenderPass) };
    render_pass.render_pass
}

// ===== FRAMEBUFFER =====

pub(crate) struct VulkanFramebuffer {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    // Views must outlive the framebuffer
    _attachments: Vec<Arc<dyn Texture>>,
}

impl VulkanFramebuffer {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &FramebufferDesc) -> Result<Self> {
        let views: Vec<vk::ImageView> = desc.attachments
            .iter()
            .map(|texture| as_vulkan_texture(texture).view)
            .collect();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_render_pass(&desc.render_pass))
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe { ctx.device.create_framebuffer(&create_info, None) }
            .map_err(|e| vk_error("vkCreateFramebuffer", e))?;

        Ok(Self {
            ctx,
            id: ResourceId::next(),
            framebuffer,
            width: desc.width,
            height: desc.height,
            _attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

pub(crate) fn vk_framebuffer(framebuffer: &Arc<dyn Framebuffer>) -> vk::Framebuffer {
    // SAFETY: every framebuffer reaching the Vulkan backend was created by it
    let framebuffer = unsafe { &*(framebuffer.as_ref() as *const dyn Framebuffer as *const VulkanFramebuffer) };
    framebuffer.framebuffer
}
