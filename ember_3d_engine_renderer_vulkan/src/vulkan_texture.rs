/// Texture - Vulkan implementation of the engine Texture trait

use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::ember3d::device::{ResourceId, Texture, TextureDesc, TextureInfo};
use ember_3d_engine::engine_error;
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::sync::Arc;

use crate::vulkan_context::{vk_error, VulkanContext};
use crate::vulkan_format::{aspect_mask, texture_format_to_vk, texture_usage_to_vk};

/// Vulkan image plus its default view
///
/// Swapchain images carry no allocation: only the view is destroyed on drop,
/// the image belongs to the swapchain.
pub(crate) struct VulkanTexture {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    info: TextureInfo,
}

impl VulkanTexture {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &TextureDesc) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(texture_format_to_vk(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(texture_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device.create_image(&image_info, None) }
            .map_err(|e| vk_error("vkCreateImage", e))?;
        let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };

        let allocation = ctx.allocator().allocate(&AllocationCreateDesc {
            name: "ember3d texture",
            requirements,
            location: gpu_allocator::MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!("ember3d::vulkan", "Out of GPU memory for texture {}x{} (required: {:.2} MB): {:?}",
                    desc.width, desc.height, size_mb, e);
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(Error::OutOfMemory);
            }
        };

        if let Err(e) = unsafe { ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            ctx.allocator().free(allocation).ok();
            unsafe { ctx.device.destroy_image(image, None) };
            return Err(vk_error("vkBindImageMemory", e));
        }

        let info = TextureInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            is_swapchain_image: false,
        };
        let view = match create_view(&ctx, image, &info) {
            Ok(view) => view,
            Err(e) => {
                ctx.allocator().free(allocation).ok();
                unsafe { ctx.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        Ok(Self {
            ctx,
            id: ResourceId::next(),
            image,
            view,
            allocation: Some(allocation),
            info,
        })
    }

    /// Wrap an image owned by a swapchain
    pub(crate) fn from_swapchain_image(ctx: Arc<VulkanContext>, image: vk::Image, info: TextureInfo) -> Result<Self> {
        let view = create_view(&ctx, image, &info)?;
        Ok(Self {
            ctx,
            id: ResourceId::next(),
            image,
            view,
            allocation: None,
            info,
        })
    }
}

fn create_view(ctx: &VulkanContext, image: vk::Image, info: &TextureInfo) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(texture_format_to_vk(info.format))
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(full_range(info));
    unsafe { ctx.device.create_image_view(&create_info, None) }
        .map_err(|e| vk_error("vkCreateImageView", e))
}

/// Single mip, single layer subresource range covering the whole image
pub(crate) fn full_range(info: &TextureInfo) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask(info.format),
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl Texture for VulkanTexture {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                self.ctx.allocator().free(allocation).ok();
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}

pub(crate) fn as_vulkan_texture(texture: &Arc<dyn Texture>) -> &VulkanTexture {
    // SAFETY: every texture reaching the Vulkan backend was created by it
    unsafe { &*(texture.as_ref() as *const dyn Texture as *const VulkanTexture) }
}
