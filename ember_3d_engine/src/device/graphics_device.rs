/// GraphicsDevice trait - factory for GPU objects and queue submission

use std::sync::Arc;
use crate::device::{
    Buffer, BufferDesc, CommandList, DescriptorSet, DescriptorWrite, Fence, Framebuffer,
    FramebufferDesc, Pipeline, PipelineDesc, PipelineLayout, PipelineLayoutDesc,
    PipelineStages, RenderPass, RenderPassDesc, Semaphore, Shader, ShaderDesc, Texture,
    TextureDesc,
};
use crate::error::Result;

/// Logical queue type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueType {
    Graphics,
    Compute,
    Transfer,
}

/// One queue submission
///
/// `wait_semaphores` and `wait_stages` are parallel arrays.
pub struct SubmitInfo<'a> {
    pub command_lists: &'a [&'a dyn CommandList],
    pub wait_semaphores: &'a [Arc<dyn Semaphore>],
    pub wait_stages: &'a [PipelineStages],
    pub signal_semaphores: &'a [Arc<dyn Semaphore>],
    /// Fence signaled when every command list has finished executing
    pub fence: Option<&'a Arc<dyn Fence>>,
}

/// Native command pool for one queue type
///
/// Lists allocated from a pool must be dropped before the pool.
pub trait CommandPool: Send + Sync {
    fn queue_type(&self) -> QueueType;

    /// Allocate a primary command list in the initial state
    fn allocate(&mut self) -> Result<Box<dyn CommandList>>;

    /// Return unused pool memory to the system
    fn trim(&mut self) -> Result<()>;
}

/// Graphics device facade
///
/// Every creation failure is fatal for the caller: `OutOfMemory` for allocation
/// failures, `BackendError` for driver rejections.
pub trait GraphicsDevice: Send + Sync {
    fn create_command_pool(&self, queue_type: QueueType) -> Result<Box<dyn CommandPool>>;

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>>;

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> Result<Arc<dyn Shader>>;

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>>;

    /// Allocate a descriptor set for set 0 of `layout` and write `writes` into it
    fn create_descriptor_set(
        &self,
        layout: &Arc<dyn PipelineLayout>,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DescriptorSet>>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<Arc<dyn Pipeline>>;

    /// Submit recorded command lists to the queue of `queue_type`
    fn queue_submit(&self, queue_type: QueueType, submit: &SubmitInfo<'_>) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;
}
