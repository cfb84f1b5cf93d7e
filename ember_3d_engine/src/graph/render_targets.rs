/// Render target descriptors and layout-tracked images

use std::sync::{Arc, Mutex, PoisonError};
use crate::device::{ImageLayout, LoadOp, Texture, TextureUsage};

// ===== TRACKED IMAGE =====

/// A texture plus the layout it will be in once the recorded work executes
///
/// The render graph updates the layout when it records barriers and render
/// passes; nothing else should.
pub struct TrackedImage {
    texture: Arc<dyn Texture>,
    layout: Mutex<ImageLayout>,
}

impl TrackedImage {
    /// Track `texture`, starting in `Undefined`
    pub fn new(texture: Arc<dyn Texture>) -> Self {
        Self::with_layout(texture, ImageLayout::Undefined)
    }

    pub fn with_layout(texture: Arc<dyn Texture>, layout: ImageLayout) -> Self {
        Self { texture, layout: Mutex::new(layout) }
    }

    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn layout(&self) -> ImageLayout {
        *self.layout.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_layout(&self, layout: ImageLayout) {
        *self.layout.lock().unwrap_or_else(PoisonError::into_inner) = layout;
    }
}

// ===== LOAD ACTION =====

/// What happens to an attachment's contents when a render pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAction {
    Load,
    Clear,
    DontCare,
}

impl LoadAction {
    pub fn to_load_op(self) -> LoadOp {
        match self {
            LoadAction::Load => LoadOp::Load,
            LoadAction::Clear => LoadOp::Clear,
            LoadAction::DontCare => LoadOp::DontCare,
        }
    }
}

// ===== TARGETS =====

/// Color attachment of a render pass
#[derive(Clone)]
pub struct ColorTarget {
    pub image: Arc<TrackedImage>,
    pub load: LoadAction,
    pub clear_color: [f32; 4],
    /// Layout the image is left in when the pass ends
    pub final_layout: ImageLayout,
}

impl ColorTarget {
    /// Cleared to opaque black, final layout derived from the image
    ///
    /// Swapchain images end in `PresentSrc`, sampled images in
    /// `ShaderReadOnly`, anything else stays a color attachment.
    pub fn new(image: Arc<TrackedImage>) -> Self {
        let info = *image.texture().info();
        let final_layout = if info.is_swapchain_image {
            ImageLayout::PresentSrc
        } else if info.usage.contains(TextureUsage::SAMPLED) {
            ImageLayout::ShaderReadOnly
        } else {
            ImageLayout::ColorAttachment
        };
        Self {
            image,
            load: LoadAction::Clear,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            final_layout,
        }
    }

    pub fn with_load(mut self, load: LoadAction) -> Self {
        self.load = load;
        self
    }

    /// Clear to `color` (implies `LoadAction::Clear`)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.load = LoadAction::Clear;
        self.clear_color = color;
        self
    }

    pub fn with_final_layout(mut self, layout: ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }
}

/// Depth/stencil attachment of a render pass
#[derive(Clone)]
pub struct DepthTarget {
    pub image: Arc<TrackedImage>,
    pub load: LoadAction,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub final_layout: ImageLayout,
}

impl DepthTarget {
    /// Cleared to depth 1.0, left as a depth attachment
    pub fn new(image: Arc<TrackedImage>) -> Self {
        Self {
            image,
            load: LoadAction::Clear,
            clear_depth: 1.0,
            clear_stencil: 0,
            final_layout: ImageLayout::DepthStencilAttachment,
        }
    }

    pub fn with_load(mut self, load: LoadAction) -> Self {
        self.load = load;
        self
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.load = LoadAction::Clear;
        self.clear_depth = depth;
        self
    }

    pub fn with_final_layout(mut self, layout: ImageLayout) -> Self {
        self.final_layout = layout;
        self
    }
}

/// Attachments of the next render pass
#[derive(Clone, Default)]
pub struct RenderTargets {
    pub colors: Vec<ColorTarget>,
    pub depth: Option<DepthTarget>,
}

impl RenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, target: ColorTarget) -> Self {
        self.colors.push(target);
        self
    }

    pub fn with_depth(mut self, target: DepthTarget) -> Self {
        self.depth = Some(target);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.depth.is_none()
    }

    /// Every attachment image, colors first then depth
    pub fn images(&self) -> impl Iterator<Item = &Arc<TrackedImage>> {
        self.colors
            .iter()
            .map(|target| &target.image)
            .chain(self.depth.iter().map(|target| &target.image))
    }
}

#[cfg(test)]
#[path = "render_targets_tests.rs"]
mod tests;
