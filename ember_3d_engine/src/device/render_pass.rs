/// Render pass and framebuffer objects
///
/// `RenderPassDesc` is hashable so equivalent descriptors can share one render
/// pass object.

use std::sync::Arc;
use crate::device::{ResourceId, Texture, TextureFormat};

/// Render pass GPU object
pub trait RenderPass: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Descriptor the render pass was created from
    fn desc(&self) -> &RenderPassDesc;
}

/// Descriptor for creating a render pass (one subpass)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
}

impl RenderPassDesc {
    /// Number of attachments (color + depth)
    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len() + usize::from(self.depth_attachment.is_some())
    }
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    /// Number of samples (1 = no MSAA)
    pub samples: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Layout the attachment is in when the pass begins
    pub initial_layout: ImageLayout,
    /// Layout the attachment is transitioned to when the pass ends
    pub final_layout: ImageLayout,
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined (initial state, or "discard contents")
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    /// Ready for presentation to the swapchain
    PresentSrc,
}

/// Descriptor for creating a framebuffer
pub struct FramebufferDesc {
    pub render_pass: Arc<dyn RenderPass>,
    /// Color attachments first, depth attachment last
    pub attachments: Vec<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
}

/// Framebuffer GPU object
pub trait Framebuffer: Send + Sync {
    fn id(&self) -> ResourceId;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}
