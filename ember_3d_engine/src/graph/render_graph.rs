/// The single active recorder.
///
/// Call protocol per frame:
///
/// ```text
/// copy_buffer / copy_image / transition_layout   (outside render passes)
/// set_render_targets -> begin_render_pass
///     set_pipeline_state -> bind_* / push_constants -> draw / draw_indexed
/// end_render_pass
/// ... more passes ...
/// execute(wait, wait_stages, signal)
/// ```
///
/// The graph always holds a command buffer in the `Recording` state: `execute`
/// submits the current one and immediately begins a new one.

use std::sync::Arc;
use crate::command::{CommandBufferId, CommandBufferManager, ExecutionPoint};
use crate::context::RenderContext;
use crate::device::{
    Buffer, BufferCopy, ClearValue, CommandList, DescriptorSet, FramebufferDesc, ImageBarrier,
    ImageLayout, IndexType, Pipeline, PipelineStages, PipelineState, QueueType, Rect2D,
    RenderPass, RenderPassDesc, AttachmentDesc, Semaphore, StoreOp, Viewport,
};
use crate::error::{Error, Result};
use crate::staging::StagingBufferManager;
use crate::{engine_bail_misuse, engine_misuse, engine_trace};
use super::layout_transition::barrier_for;
use super::pipeline_cache::PipelineCache;
use super::render_pass_cache::RenderPassCache;
use super::render_targets::{RenderTargets, TrackedImage};

/// Recording counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderGraphStats {
    /// Draw calls recorded since creation
    pub draw_calls: u64,
    pub render_passes_begun: u64,
    pub submissions: u64,
    pub pipelines_cached: usize,
    pub render_passes_cached: usize,
}

struct ActivePass {
    render_pass: Arc<dyn RenderPass>,
}

pub struct RenderGraph {
    context: RenderContext,
    // Dropped before `staging`: waits for pending command buffers that may
    // still read staging memory
    commands: CommandBufferManager,
    staging: StagingBufferManager,
    pipeline_cache: PipelineCache,
    render_pass_cache: RenderPassCache,
    current: CommandBufferId,
    pending_targets: Option<RenderTargets>,
    active_pass: Option<ActivePass>,
    bound_pipeline: Option<Arc<dyn Pipeline>>,
    draw_calls: u64,
    render_passes_begun: u64,
    submissions: u64,
}

impl RenderGraph {
    /// Create the graph and begin recording on a fresh graphics command buffer
    pub fn new(context: &RenderContext) -> Result<Self> {
        let mut commands = CommandBufferManager::new(context)?;
        let current = begin_new_buffer(&mut commands)?;

        Ok(Self {
            context: context.clone(),
            commands,
            staging: StagingBufferManager::new(context),
            pipeline_cache: PipelineCache::new(),
            render_pass_cache: RenderPassCache::new(),
            current,
            pending_targets: None,
            active_pass: None,
            bound_pipeline: None,
            draw_calls: 0,
            render_passes_begun: 0,
            submissions: 0,
        })
    }

    // ===== ACCESSORS =====

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn command_buffers(&self) -> &CommandBufferManager {
        &self.commands
    }

    pub fn command_buffers_mut(&mut self) -> &mut CommandBufferManager {
        &mut self.commands
    }

    pub fn staging(&self) -> &StagingBufferManager {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingBufferManager {
        &mut self.staging
    }

    /// Command buffer being recorded
    pub fn current_command_buffer(&self) -> CommandBufferId {
        self.current
    }

    /// Execution point of the work recorded so far
    pub fn current_execution_point(&self) -> Result<ExecutionPoint> {
        self.commands
            .execution_point(self.current)
            .ok_or_else(|| Error::InvalidResource("current command buffer is gone".to_string()))
    }

    pub fn is_in_render_pass(&self) -> bool {
        self.active_pass.is_some()
    }

    pub fn stats(&self) -> RenderGraphStats {
        RenderGraphStats {
            draw_calls: self.draw_calls,
            render_passes_begun: self.render_passes_begun,
            submissions: self.submissions,
            pipelines_cached: self.pipeline_cache.len(),
            render_passes_cached: self.render_pass_cache.len(),
        }
    }

    fn recorder(&mut self) -> Result<&mut dyn CommandList> {
        self.commands
            .get_mut(self.current)
            .ok_or_else(|| Error::InvalidResource("current command buffer is gone".to_string()))?
            .list_mut()
    }

    fn require_outside_pass(&self, operation: &str) -> Result<()> {
        if self.active_pass.is_some() {
            engine_bail_misuse!("ember3d::RenderGraph", "{}() is not allowed inside a render pass", operation);
        }
        Ok(())
    }

    fn require_draw_state(&self, operation: &str) -> Result<&Arc<dyn Pipeline>> {
        if self.active_pass.is_none() {
            engine_bail_misuse!("ember3d::RenderGraph", "{}() without an active render pass", operation);
        }
        match &self.bound_pipeline {
            Some(pipeline) => Ok(pipeline),
            None => Err(engine_misuse!("ember3d::RenderGraph",
                "{}() without a bound pipeline", operation)),
        }
    }

    // ===== TRANSFERS =====

    /// Upload `data` to the start of `dst`
    ///
    /// Host-visible destinations are written directly. Device-local ones go
    /// through a staging buffer released against the current command buffer.
    pub fn copy_buffer(&mut self, data: &[u8], dst: &Arc<dyn Buffer>) -> Result<()> {
        self.require_outside_pass("copy_buffer")?;
        let size = data.len() as u64;
        if size > dst.size() {
            engine_bail_misuse!("ember3d::RenderGraph",
                "copy_buffer() of {} bytes into a {} byte buffer", size, dst.size());
        }
        if size == 0 {
            return Ok(());
        }
        if dst.is_host_visible() {
            return dst.write(0, data);
        }

        let point = self.current_execution_point()?;
        let staging = self.staging.acquire_staging_buffer(size)?;
        let recorded = staging.write(0, data).and_then(|()| {
            self.recorder()?.copy_buffer(&staging, dst, BufferCopy { src_offset: 0, dst_offset: 0, size })
        });
        self.staging.release_staging_buffer(&staging, Some(point))?;
        recorded
    }

    /// Upload tightly packed texels covering the whole of `image`
    ///
    /// The image must already be in `TransferDst`.
    pub fn copy_image(&mut self, data: &[u8], image: &TrackedImage) -> Result<()> {
        self.require_outside_pass("copy_image")?;
        if image.layout() != ImageLayout::TransferDst {
            engine_bail_misuse!("ember3d::RenderGraph",
                "copy_image() requires TransferDst layout, image is {:?}", image.layout());
        }
        let expected = image.texture().info().byte_size();
        if data.len() as u64 != expected {
            engine_bail_misuse!("ember3d::RenderGraph",
                "copy_image() got {} bytes, image holds {}", data.len(), expected);
        }

        let point = self.current_execution_point()?;
        let staging = self.staging.acquire_staging_buffer(expected)?;
        let recorded = staging.write(0, data).and_then(|()| {
            self.recorder()?.copy_buffer_to_texture(&staging, 0, image.texture(), ImageLayout::TransferDst)
        });
        self.staging.release_staging_buffer(&staging, Some(point))?;
        recorded
    }

    /// Record a layout transition barrier
    ///
    /// Only `Undefined -> TransferDst`, `TransferDst -> ShaderReadOnly` and
    /// `ColorAttachment -> PresentSrc` are supported. `old` must match the
    /// tracked layout unless it is `Undefined` (contents discarded).
    pub fn transition_layout(&mut self, image: &TrackedImage, old: ImageLayout, new: ImageLayout) -> Result<()> {
        self.require_outside_pass("transition_layout")?;
        let Some(barrier) = barrier_for(old, new) else {
            engine_bail_misuse!("ember3d::RenderGraph", "Unsupported layout transition {:?} -> {:?}", old, new);
        };
        if old != ImageLayout::Undefined && old != image.layout() {
            engine_bail_misuse!("ember3d::RenderGraph",
                "transition_layout() from {:?} but image is in {:?}", old, image.layout());
        }

        self.recorder()?.image_barrier(&ImageBarrier {
            texture: image.texture(),
            old_layout: old,
            new_layout: new,
            src_stages: barrier.src_stages,
            dst_stages: barrier.dst_stages,
            src_access: barrier.src_access,
            dst_access: barrier.dst_access,
        })?;
        image.set_layout(new);
        Ok(())
    }

    // ===== RENDER PASSES =====

    /// Store the attachments of the next `begin_render_pass()`
    pub fn set_render_targets(&mut self, targets: RenderTargets) -> Result<()> {
        self.require_outside_pass("set_render_targets")?;
        if targets.is_empty() {
            engine_bail_misuse!("ember3d::RenderGraph", "set_render_targets() with no attachment");
        }
        if targets.colors.iter().any(|target| target.image.texture().info().format.is_depth()) {
            engine_bail_misuse!("ember3d::RenderGraph", "Color target with a depth format");
        }
        if let Some(depth) = &targets.depth {
            if !depth.image.texture().info().format.is_depth() {
                engine_bail_misuse!("ember3d::RenderGraph", "Depth target with a color format");
            }
        }
        let extents: Vec<(u32, u32)> = targets
            .images()
            .map(|image| (image.texture().info().width, image.texture().info().height))
            .collect();
        if extents.windows(2).any(|pair| pair[0] != pair[1]) {
            engine_bail_misuse!("ember3d::RenderGraph", "Render targets differ in size");
        }

        self.pending_targets = Some(targets);
        Ok(())
    }

    /// Begin a render pass on the pending render targets
    ///
    /// Initial layouts are the tracked layouts of the attachments. Once
    /// recorded, every attachment is tracked in its target's final layout.
    /// Sets a full-size viewport and scissor.
    pub fn begin_render_pass(&mut self) -> Result<()> {
        if self.active_pass.is_some() {
            engine_bail_misuse!("ember3d::RenderGraph", "begin_render_pass() while a render pass is active");
        }
        // Stay pending until the native objects exist so a failed begin can be retried
        let Some(targets) = self.pending_targets.as_ref() else {
            engine_bail_misuse!("ember3d::RenderGraph", "begin_render_pass() without render targets");
        };

        let mut clear_values = Vec::with_capacity(targets.colors.len() + 1);
        let color_attachments: Vec<AttachmentDesc> = targets.colors.iter().map(|target| {
            clear_values.push(ClearValue::Color(target.clear_color));
            AttachmentDesc {
                format: target.image.texture().info().format,
                samples: 1,
                load_op: target.load.to_load_op(),
                store_op: StoreOp::Store,
                initial_layout: target.image.layout(),
                final_layout: target.final_layout,
            }
        }).collect();
        let depth_attachment = targets.depth.as_ref().map(|target| {
            clear_values.push(ClearValue::DepthStencil {
                depth: target.clear_depth,
                stencil: target.clear_stencil,
            });
            AttachmentDesc {
                format: target.image.texture().info().format,
                samples: 1,
                load_op: target.load.to_load_op(),
                store_op: StoreOp::Store,
                initial_layout: target.image.layout(),
                final_layout: target.final_layout,
            }
        });
        let desc = RenderPassDesc { color_attachments, depth_attachment };

        let (width, height) = targets
            .images()
            .next()
            .map(|image| (image.texture().info().width, image.texture().info().height))
            .unwrap_or((0, 0));

        let device = Arc::clone(self.context.device());
        let render_pass = self.render_pass_cache.get_or_create(device.as_ref(), &desc)?;
        let framebuffer = device.create_framebuffer(&FramebufferDesc {
            render_pass: Arc::clone(&render_pass),
            attachments: targets.images().map(|image| Arc::clone(image.texture())).collect(),
            width,
            height,
        })?;

        let buffer = self
            .commands
            .get_mut(self.current)
            .ok_or_else(|| Error::InvalidResource("current command buffer is gone".to_string()))?;
        let list = buffer.list_mut()?;
        list.begin_render_pass(&render_pass, &framebuffer, &clear_values)?;
        list.set_viewport(Viewport::full(width, height))?;
        list.set_scissor(Rect2D::full(width, height))?;
        buffer.track_render_pass(Arc::clone(&render_pass));
        buffer.track_framebuffer(framebuffer);

        for target in &targets.colors {
            target.image.set_layout(target.final_layout);
        }
        if let Some(target) = &targets.depth {
            target.image.set_layout(target.final_layout);
        }

        engine_trace!("ember3d::RenderGraph", "Begin render pass {}x{} ({} attachment(s))",
            width, height, desc.attachment_count());
        self.pending_targets = None;
        self.active_pass = Some(ActivePass { render_pass });
        self.bound_pipeline = None;
        self.render_passes_begun += 1;
        Ok(())
    }

    /// Close the active render pass (the command buffer stays open)
    pub fn end_render_pass(&mut self) -> Result<()> {
        if self.active_pass.is_none() {
            engine_bail_misuse!("ember3d::RenderGraph", "end_render_pass() without an active render pass");
        }
        self.recorder()?.end_render_pass()?;
        self.active_pass = None;
        self.bound_pipeline = None;
        Ok(())
    }

    // ===== PIPELINE AND DRAWS =====

    /// Bind the pipeline for `state` on the active render pass, plus set 0
    ///
    /// The pipeline is cached and kept alive by the current command buffer.
    pub fn set_pipeline_state(
        &mut self,
        state: &PipelineState,
        descriptor_set: Option<&Arc<dyn DescriptorSet>>,
    ) -> Result<()> {
        let Some(active) = &self.active_pass else {
            engine_bail_misuse!("ember3d::RenderGraph", "set_pipeline_state() without an active render pass");
        };
        let render_pass = Arc::clone(&active.render_pass);
        let pipeline = self.pipeline_cache.get_or_create(self.context.device().as_ref(), state, &render_pass)?;

        let buffer = self
            .commands
            .get_mut(self.current)
            .ok_or_else(|| Error::InvalidResource("current command buffer is gone".to_string()))?;
        let list = buffer.list_mut()?;
        list.bind_pipeline(&pipeline)?;
        if let Some(set) = descriptor_set {
            list.bind_descriptor_set(&pipeline, 0, set)?;
        }
        buffer.track_pipeline(Arc::clone(&pipeline));

        self.bound_pipeline = Some(pipeline);
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.require_draw_state("bind_vertex_buffer")?;
        self.recorder()?.bind_vertex_buffer(buffer, offset)
    }

    pub fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.require_draw_state("bind_index_buffer")?;
        self.recorder()?.bind_index_buffer(buffer, offset, index_type)
    }

    /// Write push constants through the bound pipeline's layout
    pub fn push_constants(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let pipeline = Arc::clone(self.require_draw_state("push_constants")?);
        let capacity = pipeline.layout().desc().push_constant_size;
        if offset as u64 + data.len() as u64 > capacity as u64 {
            engine_bail_misuse!("ember3d::RenderGraph",
                "push_constants() of {} bytes at {} overflows the {} byte block", data.len(), offset, capacity);
        }
        self.recorder()?.push_constants(&pipeline, offset, data)
    }

    pub fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_draw_state("draw")?;
        self.recorder()?.draw(vertex_count, first_vertex)?;
        self.draw_calls += 1;
        Ok(())
    }

    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_draw_state("draw_indexed")?;
        self.recorder()?.draw_indexed(index_count, first_index, vertex_offset)?;
        self.draw_calls += 1;
        Ok(())
    }

    // ===== SUBMISSION =====

    /// Submit everything recorded so far and start a new command buffer
    ///
    /// `wait_semaphores` and `wait_stages` are parallel arrays. Returns the
    /// execution point of the submitted work.
    pub fn execute(
        &mut self,
        wait_semaphores: &[Arc<dyn Semaphore>],
        wait_stages: &[PipelineStages],
        signal_semaphores: &[Arc<dyn Semaphore>],
    ) -> Result<ExecutionPoint> {
        self.require_outside_pass("execute")?;
        let point = self.commands.submit(self.current, wait_semaphores, wait_stages, signal_semaphores)?;
        self.commands.release(self.current)?;
        self.current = begin_new_buffer(&mut self.commands)?;
        self.submissions += 1;

        engine_trace!("ember3d::RenderGraph", "Submitted generation {} of command buffer {:?}",
            point.generation, point.command_buffer);
        Ok(point)
    }

    /// Throw away the current recording and start over on a clean buffer
    ///
    /// Tracked image layouts changed by the discarded commands are not rolled back.
    pub fn discard_recording(&mut self) -> Result<()> {
        self.active_pass = None;
        self.bound_pipeline = None;
        self.pending_targets = None;
        self.commands.release(self.current)?;
        self.current = begin_new_buffer(&mut self.commands)?;
        Ok(())
    }

    /// Reclaim finished command buffers, then the staging buffers they held
    ///
    /// Returns the number of staging buffers made reusable.
    pub fn tick(&mut self) -> Result<usize> {
        self.commands.reclaim_completed()?;
        Ok(self.staging.tick(&self.commands))
    }
}

fn begin_new_buffer(commands: &mut CommandBufferManager) -> Result<CommandBufferId> {
    let id = commands.acquire(QueueType::Graphics)?;
    if let Some(buffer) = commands.get_mut(id) {
        buffer.begin()?;
    }
    Ok(id)
}

#[cfg(test)]
#[path = "render_graph_tests.rs"]
mod tests;
