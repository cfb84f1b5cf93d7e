/// Recordable command buffer with a dedicated fence and execution generation.
///
/// State machine: `Initial -> Recording -> Executable -> Pending -> Initial`.
/// The return to `Initial` is a reset, performed by the manager once the fence
/// signaled. Each reset increments the execution generation and drops the
/// objects cached during the last recording.

use std::sync::Arc;
use slotmap::new_key_type;
use crate::device::{CommandList, Fence, Framebuffer, Pipeline, QueueType, RenderPass};
use crate::error::Result;
use crate::engine_bail_misuse;

new_key_type! {
    /// Handle to a command buffer owned by a `CommandBufferManager`
    pub struct CommandBufferId;
}

/// Lifecycle state of a command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// Ready to record
    Initial,
    Recording,
    /// Recorded, not submitted
    Executable,
    /// Submitted, fence not observed signaled yet
    Pending,
}

/// Snapshot of a command buffer's execution generation
///
/// The work recorded at this point has finished executing once the buffer's
/// generation moved past `generation`, or once the buffer no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionPoint {
    pub command_buffer: CommandBufferId,
    pub generation: u64,
}

/// GPU objects referenced by a recording, kept alive until the buffer is reset
#[derive(Default)]
pub struct CachedObjects {
    render_passes: Vec<Arc<dyn RenderPass>>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
    pipelines: Vec<Arc<dyn Pipeline>>,
}

impl CachedObjects {
    pub fn render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.render_passes.is_empty() && self.framebuffers.is_empty() && self.pipelines.is_empty()
    }

    fn clear(&mut self) {
        self.render_passes.clear();
        self.framebuffers.clear();
        self.pipelines.clear();
    }
}

/// A pooled command buffer
pub struct CommandBuffer {
    queue_type: QueueType,
    list: Box<dyn CommandList>,
    fence: Arc<dyn Fence>,
    generation: u64,
    state: CommandBufferState,
    cached: CachedObjects,
}

impl CommandBuffer {
    pub(crate) fn new(queue_type: QueueType, list: Box<dyn CommandList>, fence: Arc<dyn Fence>) -> Self {
        Self {
            queue_type,
            list,
            fence,
            generation: 0,
            state: CommandBufferState::Initial,
            cached: CachedObjects::default(),
        }
    }

    // ===== ACCESSORS =====

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Number of resets this buffer went through
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fence(&self) -> &Arc<dyn Fence> {
        &self.fence
    }

    pub fn cached_objects(&self) -> &CachedObjects {
        &self.cached
    }

    /// Native list, for submission
    pub fn list(&self) -> &dyn CommandList {
        self.list.as_ref()
    }

    /// Native list for recording commands
    ///
    /// # Errors
    ///
    /// `InvalidUsage` unless the buffer is recording.
    pub fn list_mut(&mut self) -> Result<&mut dyn CommandList> {
        if self.state != CommandBufferState::Recording {
            engine_bail_misuse!("ember3d::CommandBuffer",
                "Cannot record commands in state {:?}", self.state);
        }
        Ok(self.list.as_mut())
    }

    // ===== STATE TRANSITIONS =====

    /// `Initial -> Recording`
    pub fn begin(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Initial {
            engine_bail_misuse!("ember3d::CommandBuffer",
                "begin() requires Initial state, buffer is {:?}", self.state);
        }
        self.list.begin()?;
        self.state = CommandBufferState::Recording;
        Ok(())
    }

    /// `Recording -> Executable`
    pub fn end(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Recording {
            engine_bail_misuse!("ember3d::CommandBuffer",
                "end() requires Recording state, buffer is {:?}", self.state);
        }
        self.list.end()?;
        self.state = CommandBufferState::Executable;
        Ok(())
    }

    /// `Executable -> Pending`, once the buffer was handed to a queue
    pub(crate) fn mark_submitted(&mut self) -> Result<()> {
        if self.state != CommandBufferState::Executable {
            engine_bail_misuse!("ember3d::CommandBuffer",
                "Cannot submit a command buffer in state {:?}", self.state);
        }
        self.state = CommandBufferState::Pending;
        Ok(())
    }

    /// Back to `Initial`: bumps the generation, drops cached objects, unsignals the fence
    ///
    /// The caller guarantees the GPU no longer executes this buffer.
    pub(crate) fn reset(&mut self) -> Result<()> {
        self.list.reset()?;
        self.fence.reset()?;
        self.cached.clear();
        self.generation += 1;
        self.state = CommandBufferState::Initial;
        Ok(())
    }

    // ===== CACHED OBJECTS =====

    pub fn track_render_pass(&mut self, render_pass: Arc<dyn RenderPass>) {
        self.cached.render_passes.push(render_pass);
    }

    pub fn track_framebuffer(&mut self, framebuffer: Arc<dyn Framebuffer>) {
        self.cached.framebuffers.push(framebuffer);
    }

    pub fn track_pipeline(&mut self, pipeline: Arc<dyn Pipeline>) {
        self.cached.pipelines.push(pipeline);
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
