/// Swapchain - Vulkan implementation of the engine Swapchain trait
///
/// Built on a surface created by the window layer. Rebuilding after
/// `FrameStatus::NeedsRebuild` means creating a new `VulkanSwapchain` with the
/// old one passed as `old_swapchain`, then handing it to the frame scheduler.

use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::ember3d::device::{
    AcquireStatus, PresentMode, PresentStatus, QueueType, Semaphore, Swapchain, Texture,
    TextureFormat, TextureInfo, TextureUsage,
};
use ember_3d_engine::{engine_bail_misuse, engine_debug, engine_error, engine_info, engine_warn};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::{vk_error, VulkanContext, VulkanQueue};
use crate::vulkan_format::{present_mode_to_vk, vk_to_present_mode, vk_to_texture_format};
use crate::vulkan_graphics_device::VulkanGraphicsDevice;
use crate::vulkan_sync::{vk_semaphore, vk_semaphores};
use crate::vulkan_texture::VulkanTexture;

/// Surface and sizing parameters for a swapchain
pub struct VulkanSwapchainDesc<'a> {
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    /// Used only when the surface does not dictate its extent
    pub width: u32,
    pub height: u32,
    pub preferred_present_mode: PresentMode,
    /// Swapchain being replaced, if any
    pub old_swapchain: Option<&'a VulkanSwapchain>,
}

pub struct VulkanSwapchain {
    ctx: Arc<VulkanContext>,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    present_queue: VulkanQueue,
    images: Vec<Arc<dyn Texture>>,
    extent: vk::Extent2D,
    format: TextureFormat,
    present_mode: PresentMode,
}

impl VulkanSwapchain {
    /// Create a swapchain presenting on the graphics queue
    pub fn new(device: &VulkanGraphicsDevice, instance: &ash::Instance, desc: &VulkanSwapchainDesc<'_>) -> Result<Self> {
        let ctx = Arc::clone(&device.ctx);
        let present_queue = ctx.queue(QueueType::Graphics)?;

        let (capabilities, surface_formats, surface_present_modes) = unsafe {
            let capabilities = desc.surface_loader
                .get_physical_device_surface_capabilities(desc.physical_device, desc.surface)
                .map_err(|e| init_error("Failed to get surface capabilities", e))?;
            let formats = desc.surface_loader
                .get_physical_device_surface_formats(desc.physical_device, desc.surface)
                .map_err(|e| init_error("Failed to get surface formats", e))?;
            let present_modes = desc.surface_loader
                .get_physical_device_surface_present_modes(desc.physical_device, desc.surface)
                .map_err(|e| init_error("Failed to get surface present modes", e))?;
            (capabilities, formats, present_modes)
        };

        let supported = unsafe {
            desc.surface_loader.get_physical_device_surface_support(
                desc.physical_device,
                present_queue.family_index,
                desc.surface,
            )
        }
        .map_err(|e| init_error("Failed to query surface support", e))?;
        if !supported {
            engine_error!("ember3d::vulkan", "Graphics queue family {} cannot present to the surface",
                present_queue.family_index);
            return Err(Error::InitializationFailed("Graphics queue cannot present to the surface".to_string()));
        }

        let Some((surface_format, format)) = choose_surface_format(&surface_formats) else {
            engine_error!("ember3d::vulkan", "No supported surface format among {} candidate(s)", surface_formats.len());
            return Err(Error::InitializationFailed("No supported surface format".to_string()));
        };

        let available_modes: Vec<PresentMode> = surface_present_modes
            .iter()
            .filter_map(|mode| vk_to_present_mode(*mode))
            .collect();
        let present_mode = choose_present_mode(&available_modes, desc.preferred_present_mode);
        if present_mode != desc.preferred_present_mode {
            engine_warn!("ember3d::vulkan", "Present mode {:?} unavailable, falling back to {:?}",
                desc.preferred_present_mode, present_mode);
        }

        let extent = choose_extent(&capabilities, desc.width, desc.height);
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(desc.surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(present_mode))
            .clipped(true)
            .old_swapchain(desc.old_swapchain.map_or(vk::SwapchainKHR::null(), |old| old.swapchain));

        let loader = ash::khr::swapchain::Device::new(instance, &ctx.device);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| init_error("Failed to create swapchain", e))?;

        let vk_images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(init_error("Failed to get swapchain images", e));
            }
        };

        let info = TextureInfo {
            width: extent.width,
            height: extent.height,
            format,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::TRANSFER_DST,
            is_swapchain_image: true,
        };
        let mut images: Vec<Arc<dyn Texture>> = Vec::with_capacity(vk_images.len());
        for image in vk_images {
            match VulkanTexture::from_swapchain_image(Arc::clone(&ctx), image, info) {
                Ok(texture) => images.push(Arc::new(texture)),
                Err(e) => {
                    images.clear();
                    unsafe { loader.destroy_swapchain(swapchain, None) };
                    return Err(e);
                }
            }
        }

        engine_info!("ember3d::vulkan", "Swapchain created: {}x{}, {} image(s), {:?}, {:?}",
            extent.width, extent.height, images.len(), format, present_mode);

        Ok(Self {
            ctx,
            loader,
            swapchain,
            present_queue,
            images,
            extent,
            format,
            present_mode,
        })
    }

    /// Present mode actually in use
    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }
}

impl Swapchain for VulkanSwapchain {
    fn acquire_next_image(&mut self, timeout_ns: u64, signal: &Arc<dyn Semaphore>) -> Result<AcquireStatus> {
        let result = unsafe {
            self.loader.acquire_next_image(self.swapchain, timeout_ns, vk_semaphore(signal), vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireStatus::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("ember3d::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireStatus::OutOfDate)
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireStatus::Timeout),
            Err(e) => Err(vk_error("vkAcquireNextImageKHR", e)),
        }
    }

    fn present(&mut self, image_index: u32, wait: &[Arc<dyn Semaphore>]) -> Result<PresentStatus> {
        if image_index as usize >= self.images.len() {
            engine_bail_misuse!("ember3d::vulkan", "present: image index {} out of range (count: {})",
                image_index, self.images.len());
        }

        let wait_semaphores = vk_semaphores(wait);
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _queue_guard = self.ctx.lock_queues();
        match unsafe { self.loader.queue_present(self.present_queue.queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(vk_error("vkQueuePresentKHR", e)),
        }
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image(&self, index: usize) -> Option<Arc<dyn Texture>> {
        self.images.get(index).cloned()
    }

    fn extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        // Views of images still shared with the frame scheduler outlive this
        // call; the scheduler drops them on rebuild or shutdown.
        self.images.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

fn init_error(what: &str, result: vk::Result) -> Error {
    engine_error!("ember3d::vulkan", "{}: {:?}", what, result);
    Error::InitializationFailed(format!("{}: {:?}", what, result))
}

// ===== SELECTION HELPERS =====

/// Pick the present mode to use
///
/// Returns `preferred` when the surface supports it, FIFO otherwise (FIFO is
/// the only mode every surface must support).
pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode) -> PresentMode {
    if available.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// Prefer an sRGB 8-bit format, otherwise the first format the engine knows
pub(crate) fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, TextureFormat)> {
    let srgb = available.iter().find(|candidate| {
        candidate.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            && matches!(candidate.format, vk::Format::B8G8R8A8_SRGB | vk::Format::R8G8B8A8_SRGB)
    });
    srgb.into_iter()
        .chain(available.iter())
        .find_map(|candidate| vk_to_texture_format(candidate.format).map(|format| (*candidate, format)))
}

/// Surface extent, or the requested size clamped to the surface limits
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One image more than the minimum, within the surface maximum (0 = unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
