/// Mock graphics device for unit tests (no GPU required)
///
/// Every device and command call is appended to a shared event log. Submitted
/// fences stay unsignaled until the test calls `complete_submissions()` (the
/// GPU finishing) or somebody waits on them. Misuse that a real driver would
/// reject (submitting with a signaled fence, drawing outside a render pass,
/// recording into a closed list) fails with `BackendError`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::device::{
    AcquireStatus, Buffer, BufferCopy, BufferDesc, ClearValue, CommandList, CommandPool,
    DescriptorSet, DescriptorWrite, Fence, Framebuffer, FramebufferDesc, GraphicsDevice,
    ImageBarrier, ImageLayout, IndexType, MemoryLocation, Pipeline, PipelineDesc,
    PipelineLayout, PipelineLayoutDesc, PresentStatus, QueueType, Rect2D, RenderPass,
    RenderPassDesc, ResourceId, Semaphore, Shader, ShaderDesc, ShaderStage, SubmitInfo,
    Swapchain, Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage, Viewport,
};
use crate::error::{Error, Result};

// ============================================================================
// Shared state
// ============================================================================

/// Counters exposed to tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockCounters {
    pub fence_waits: usize,
    pub submits: usize,
    pub command_lists_allocated: usize,
    pub buffers_created: usize,
    pub bytes_written: u64,
    pub render_passes_created: usize,
    pub framebuffers_created: usize,
    pub pipelines_created: usize,
    pub descriptor_sets_created: usize,
    pub shaders_created: usize,
    pub pipeline_layouts_created: usize,
}

#[derive(Default)]
pub struct MockState {
    pub events: Vec<String>,
    pub counters: MockCounters,
    /// Remaining buffer allocations to fail with `OutOfMemory`
    pub fail_buffer_allocations: usize,
    /// Remaining render pass creations to fail with `BackendError`
    pub fail_render_pass_creations: usize,
    /// Image index and wait semaphores of every present
    pub presents: Vec<(u32, Vec<ResourceId>)>,
    fences: Vec<Weak<MockFence>>,
    in_flight: Vec<ResourceId>,
}

pub type SharedMockState = Arc<Mutex<MockState>>;

fn record(state: &SharedMockState, event: impl Into<String>) {
    state.lock().unwrap().events.push(event.into());
}

fn backend(message: &str) -> Error {
    Error::BackendError(format!("mock: {}", message))
}

// ============================================================================
// Mock Device
// ============================================================================

pub struct MockGraphicsDevice {
    state: SharedMockState,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(MockState::default())) }
    }

    pub fn state(&self) -> SharedMockState {
        Arc::clone(&self.state)
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    pub fn counters(&self) -> MockCounters {
        self.state.lock().unwrap().counters.clone()
    }

    pub fn fence_wait_count(&self) -> usize {
        self.state.lock().unwrap().counters.fence_waits
    }

    pub fn submit_count(&self) -> usize {
        self.state.lock().unwrap().counters.submits
    }

    /// Number of submitted fences not signaled yet
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().unwrap().in_flight.len()
    }

    pub fn presents(&self) -> Vec<(u32, Vec<ResourceId>)> {
        self.state.lock().unwrap().presents.clone()
    }

    pub fn fail_next_buffer_allocations(&self, count: usize) {
        self.state.lock().unwrap().fail_buffer_allocations = count;
    }

    pub fn fail_next_render_pass_creations(&self, count: usize) {
        self.state.lock().unwrap().fail_render_pass_creations = count;
    }

    /// Simulate the GPU finishing every submitted batch
    pub fn complete_submissions(&self) {
        let mut state = self.state.lock().unwrap();
        let in_flight: Vec<ResourceId> = state.in_flight.drain(..).collect();
        for fence in state.fences.iter().filter_map(Weak::upgrade) {
            if in_flight.contains(&fence.id) {
                fence.signaled.store(true, Ordering::SeqCst);
            }
        }
        state.events.push("gpu_complete".to_string());
    }

    /// Swapchain with `image_count` images of `width` x `height`
    pub fn create_swapchain(&self, image_count: usize, width: u32, height: u32) -> MockSwapchain {
        MockSwapchain::new(Arc::clone(&self.state), image_count, width, height)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_command_pool(&self, queue_type: QueueType) -> Result<Box<dyn CommandPool>> {
        record(&self.state, format!("create_command_pool:{:?}", queue_type));
        Ok(Box::new(MockCommandPool { queue_type, state: Arc::clone(&self.state) }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let fence = Arc::new(MockFence {
            id: ResourceId::next(),
            signaled: AtomicBool::new(signaled),
            state: Arc::clone(&self.state),
        });
        self.state.lock().unwrap().fences.push(Arc::downgrade(&fence));
        Ok(fence)
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(MockSemaphore { id: ResourceId::next() }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_buffer_allocations > 0 {
            state.fail_buffer_allocations -= 1;
            return Err(Error::OutOfMemory);
        }
        state.counters.buffers_created += 1;
        state.events.push(format!("create_buffer:{}", desc.size));
        Ok(Arc::new(MockBuffer {
            id: ResourceId::next(),
            size: desc.size,
            host_visible: desc.location == MemoryLocation::CpuToGpu,
            state: Arc::clone(&self.state),
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        Ok(Arc::new(MockTexture::new(TextureInfo {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            is_swapchain_image: false,
        })))
    }

    fn create_shader(&self, desc: &ShaderDesc<'_>) -> Result<Arc<dyn Shader>> {
        self.state.lock().unwrap().counters.shaders_created += 1;
        Ok(Arc::new(MockShader { id: ResourceId::next(), stage: desc.stage }))
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>> {
        self.state.lock().unwrap().counters.pipeline_layouts_created += 1;
        Ok(Arc::new(MockPipelineLayout { id: ResourceId::next(), desc: desc.clone() }))
    }

    fn create_descriptor_set(
        &self,
        layout: &Arc<dyn PipelineLayout>,
        writes: &[DescriptorWrite],
    ) -> Result<Arc<dyn DescriptorSet>> {
        for write in writes {
            if !layout.desc().bindings.iter().any(|b| b.binding == write.binding) {
                return Err(backend("descriptor write to a binding missing from the layout"));
            }
        }
        self.state.lock().unwrap().counters.descriptor_sets_created += 1;
        Ok(Arc::new(MockDescriptorSet { id: ResourceId::next() }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_render_pass_creations > 0 {
            state.fail_render_pass_creations -= 1;
            return Err(backend("render pass creation failed"));
        }
        state.counters.render_passes_created += 1;
        state.events.push("create_render_pass".to_string());
        Ok(Arc::new(MockRenderPass { id: ResourceId::next(), desc: desc.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        if desc.attachments.len() != desc.render_pass.desc().attachment_count() {
            return Err(backend("framebuffer attachment count does not match render pass"));
        }
        if desc.attachments.iter().any(|t| t.info().width < desc.width || t.info().height < desc.height) {
            return Err(backend("framebuffer larger than an attachment"));
        }
        self.state.lock().unwrap().counters.framebuffers_created += 1;
        Ok(Arc::new(MockFramebuffer { id: ResourceId::next(), width: desc.width, height: desc.height }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_>) -> Result<Arc<dyn Pipeline>> {
        let mut state = self.state.lock().unwrap();
        state.counters.pipelines_created += 1;
        state.events.push("create_pipeline".to_string());
        Ok(Arc::new(MockPipeline { id: ResourceId::next(), layout: Arc::clone(&desc.state.layout) }))
    }

    fn queue_submit(&self, queue_type: QueueType, submit: &SubmitInfo<'_>) -> Result<()> {
        if submit.wait_semaphores.len() != submit.wait_stages.len() {
            return Err(backend("wait semaphores and wait stages differ in length"));
        }
        if let Some(fence) = submit.fence {
            if fence.is_signaled()? {
                return Err(backend("submitting with a signaled fence"));
            }
        }
        let mut state = self.state.lock().unwrap();
        state.counters.submits += 1;
        state.events.push(format!("submit:{:?}", queue_type));
        if let Some(fence) = submit.fence {
            state.in_flight.push(fence.id());
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.complete_submissions();
        record(&self.state, "wait_idle");
        Ok(())
    }
}

// ============================================================================
// Mock Sync
// ============================================================================

pub struct MockFence {
    id: ResourceId,
    signaled: AtomicBool,
    state: SharedMockState,
}

impl Fence for MockFence {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.signaled.load(Ordering::SeqCst))
    }

    /// Waiting completes the submission this fence guards
    fn wait(&self, _timeout_ns: u64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.counters.fence_waits += 1;
        state.events.push("wait_fence".to_string());
        state.in_flight.retain(|id| *id != self.id);
        self.signaled.store(true, Ordering::SeqCst);
        Ok(true)
    }

    fn reset(&self) -> Result<()> {
        self.signaled.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockSemaphore {
    id: ResourceId,
}

impl Semaphore for MockSemaphore {
    fn id(&self) -> ResourceId {
        self.id
    }
}

// ============================================================================
// Mock Command Pool / Command List
// ============================================================================

pub struct MockCommandPool {
    queue_type: QueueType,
    state: SharedMockState,
}

impl CommandPool for MockCommandPool {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn allocate(&mut self) -> Result<Box<dyn CommandList>> {
        self.state.lock().unwrap().counters.command_lists_allocated += 1;
        Ok(Box::new(MockCommandList {
            state: Arc::clone(&self.state),
            recording: false,
            in_render_pass: false,
        }))
    }

    fn trim(&mut self) -> Result<()> {
        record(&self.state, format!("trim_pool:{:?}", self.queue_type));
        Ok(())
    }
}

pub struct MockCommandList {
    state: SharedMockState,
    recording: bool,
    in_render_pass: bool,
}

impl MockCommandList {
    fn command(&self, name: impl Into<String>) -> Result<()> {
        if !self.recording {
            return Err(backend("command recorded while not recording"));
        }
        record(&self.state, format!("cmd:{}", name.into()));
        Ok(())
    }

    fn draw_command(&self, name: String) -> Result<()> {
        if !self.in_render_pass {
            return Err(backend("draw outside a render pass"));
        }
        self.command(name)
    }

    fn transfer_command(&self, name: &str) -> Result<()> {
        if self.in_render_pass {
            return Err(backend("transfer command inside a render pass"));
        }
        self.command(name)
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        if self.recording {
            return Err(backend("begin on a list already recording"));
        }
        self.recording = true;
        record(&self.state, "cmd:begin");
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.in_render_pass {
            return Err(backend("end inside a render pass"));
        }
        self.command("end")?;
        self.recording = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.recording = false;
        self.in_render_pass = false;
        record(&self.state, "cmd:reset");
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        _render_pass: &Arc<dyn RenderPass>,
        _framebuffer: &Arc<dyn Framebuffer>,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        if self.in_render_pass {
            return Err(backend("nested render pass"));
        }
        self.command(format!("begin_render_pass:{}", clear_values.len()))?;
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            return Err(backend("end_render_pass without begin"));
        }
        self.command("end_render_pass")?;
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.command(format!("set_viewport:{}x{}", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.command(format!("set_scissor:{}x{}", scissor.width, scissor.height))
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.command("bind_pipeline")
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        _descriptor_set: &Arc<dyn DescriptorSet>,
    ) -> Result<()> {
        self.command(format!("bind_descriptor_set:{}", set_index))
    }

    fn push_constants(&mut self, _pipeline: &Arc<dyn Pipeline>, offset: u32, data: &[u8]) -> Result<()> {
        self.command(format!("push_constants:{}:{}", offset, data.len()))
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.command("bind_vertex_buffer")
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64, index_type: IndexType) -> Result<()> {
        self.command(format!("bind_index_buffer:{:?}", index_type))
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.draw_command(format!("draw:{}", vertex_count))
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.draw_command(format!("draw_indexed:{}", index_count))
    }

    fn copy_buffer(&mut self, src: &Arc<dyn Buffer>, dst: &Arc<dyn Buffer>, region: BufferCopy) -> Result<()> {
        if region.src_offset + region.size > src.size() || region.dst_offset + region.size > dst.size() {
            return Err(backend("copy region out of bounds"));
        }
        self.transfer_command("copy_buffer")
    }

    fn copy_buffer_to_texture(
        &mut self,
        _src: &Arc<dyn Buffer>,
        _src_offset: u64,
        _dst: &Arc<dyn Texture>,
        dst_layout: ImageLayout,
    ) -> Result<()> {
        if dst_layout != ImageLayout::TransferDst {
            return Err(backend("image copy destination not in TransferDst"));
        }
        self.transfer_command("copy_buffer_to_texture")
    }

    fn image_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()> {
        self.transfer_command(&format!(
            "image_barrier:{:?}->{:?}",
            barrier.old_layout, barrier.new_layout
        ))
    }
}

// ============================================================================
// Mock Resources
// ============================================================================

pub struct MockBuffer {
    id: ResourceId,
    size: u64,
    host_visible: bool,
    state: SharedMockState,
}

impl Buffer for MockBuffer {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_host_visible(&self) -> bool {
        self.host_visible
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.host_visible {
            return Err(Error::InvalidUsage("write to a device-local buffer".to_string()));
        }
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidUsage("write past the end of the buffer".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.counters.bytes_written += data.len() as u64;
        state.events.push(format!("write_buffer:{}", data.len()));
        Ok(())
    }
}

pub struct MockTexture {
    id: ResourceId,
    info: TextureInfo,
}

impl MockTexture {
    pub fn new(info: TextureInfo) -> Self {
        Self { id: ResourceId::next(), info }
    }

    /// Offscreen color target that can also be sampled
    pub fn color_target(width: u32, height: u32) -> Arc<dyn Texture> {
        Arc::new(Self::new(TextureInfo {
            width,
            height,
            format: TextureFormat::R8G8B8A8_UNORM,
            usage: TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            is_swapchain_image: false,
        }))
    }

    pub fn depth_target(width: u32, height: u32) -> Arc<dyn Texture> {
        Arc::new(Self::new(TextureInfo {
            width,
            height,
            format: TextureFormat::D32_FLOAT,
            usage: TextureUsage::DEPTH_STENCIL_ATTACHMENT,
            is_swapchain_image: false,
        }))
    }

    /// Sampled texture filled through copies
    pub fn sampled(width: u32, height: u32) -> Arc<dyn Texture> {
        Arc::new(Self::new(TextureInfo {
            width,
            height,
            format: TextureFormat::R8G8B8A8_SRGB,
            usage: TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
            is_swapchain_image: false,
        }))
    }
}

impl Texture for MockTexture {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

pub struct MockShader {
    id: ResourceId,
    stage: ShaderStage,
}

impl Shader for MockShader {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

pub struct MockPipelineLayout {
    id: ResourceId,
    desc: PipelineLayoutDesc,
}

impl PipelineLayout for MockPipelineLayout {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

pub struct MockDescriptorSet {
    id: ResourceId,
}

impl DescriptorSet for MockDescriptorSet {
    fn id(&self) -> ResourceId {
        self.id
    }
}

pub struct MockRenderPass {
    id: ResourceId,
    desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

pub struct MockFramebuffer {
    id: ResourceId,
    width: u32,
    height: u32,
}

impl Framebuffer for MockFramebuffer {
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

pub struct MockPipeline {
    id: ResourceId,
    layout: Arc<dyn PipelineLayout>,
}

impl Pipeline for MockPipeline {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    state: SharedMockState,
    images: Vec<Arc<dyn Texture>>,
    next_image: u32,
    width: u32,
    height: u32,
    acquire_script: VecDeque<AcquireStatus>,
    present_script: VecDeque<PresentStatus>,
}

impl MockSwapchain {
    fn new(state: SharedMockState, image_count: usize, width: u32, height: u32) -> Self {
        let images = (0..image_count)
            .map(|_| {
                Arc::new(MockTexture::new(TextureInfo {
                    width,
                    height,
                    format: TextureFormat::B8G8R8A8_SRGB,
                    usage: TextureUsage::COLOR_ATTACHMENT,
                    is_swapchain_image: true,
                })) as Arc<dyn Texture>
            })
            .collect();
        Self {
            state,
            images,
            next_image: 0,
            width,
            height,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
        }
    }

    /// Results returned by the next acquisitions before falling back to round-robin
    pub fn with_acquire_results(mut self, results: Vec<AcquireStatus>) -> Self {
        self.acquire_script.extend(results);
        self
    }

    pub fn with_present_results(mut self, results: Vec<PresentStatus>) -> Self {
        self.present_script.extend(results);
        self
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _timeout_ns: u64, _signal: &Arc<dyn Semaphore>) -> Result<AcquireStatus> {
        record(&self.state, "acquire");
        if let Some(status) = self.acquire_script.pop_front() {
            return Ok(status);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.images.len() as u32;
        Ok(AcquireStatus::Acquired { image_index, suboptimal: false })
    }

    fn present(&mut self, image_index: u32, wait: &[Arc<dyn Semaphore>]) -> Result<PresentStatus> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("present:{}", image_index));
        state.presents.push((image_index, wait.iter().map(|semaphore| semaphore.id()).collect()));
        drop(state);
        Ok(self.present_script.pop_front().unwrap_or(PresentStatus::Presented))
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image(&self, index: usize) -> Option<Arc<dyn Texture>> {
        self.images.get(index).cloned()
    }

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_SRGB
    }
}
