/// CommandList trait - native command recording

use std::sync::Arc;
use crate::device::{
    AccessFlags, Buffer, DescriptorSet, Framebuffer, ImageLayout, IndexType, Pipeline,
    PipelineStages, RenderPass, Texture,
};
use crate::error::Result;

/// Native recordable command buffer
///
/// Implementations only record. State-machine checks live in
/// [`CommandBuffer`](crate::command::CommandBuffer), and protocol checks
/// (bound targets, bound pipeline) live in the render graph.
pub trait CommandList: Send + Sync {
    /// Start recording (the list must be in its initial state)
    fn begin(&mut self) -> Result<()>;

    /// Finish recording
    fn end(&mut self) -> Result<()>;

    /// Drop recorded commands and return to the initial state
    fn reset(&mut self) -> Result<()>;

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a descriptor set at `set_index` using the layout of `pipeline`
    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()>;

    fn push_constants(&mut self, pipeline: &Arc<dyn Pipeline>, offset: u32, data: &[u8]) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;

    fn copy_buffer(&mut self, src: &Arc<dyn Buffer>, dst: &Arc<dyn Buffer>, region: BufferCopy) -> Result<()>;

    /// Copy tightly packed texels from `src` into the whole of `dst`
    ///
    /// `dst_layout` is the layout `dst` is in while the copy executes.
    fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<dyn Buffer>,
        src_offset: u64,
        dst: &Arc<dyn Texture>,
        dst_layout: ImageLayout,
    ) -> Result<()>;

    fn image_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()>;
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering `width` x `height` with the full depth range
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

/// Region of a buffer to buffer copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// Image memory barrier with a layout transition
pub struct ImageBarrier<'a> {
    pub texture: &'a Arc<dyn Texture>,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}
