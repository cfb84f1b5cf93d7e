/// Command buffer pools, one per queue type.
///
/// Every buffer is in exactly one of three places: the pool's free list, its
/// submitted list (awaiting the fence), or held by a caller (in use).
/// Reclamation is lazy: submitted buffers whose fence signaled are reset and
/// moved back to the free list at the start of every `acquire()`.

use std::sync::Arc;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use crate::context::RenderContext;
use crate::device::{CommandPool, GraphicsDevice, PipelineStages, QueueType, Semaphore, SubmitInfo};
use crate::error::{Error, Result};
use crate::{engine_bail_misuse, engine_debug, engine_error, engine_trace, engine_warn};
use super::command_buffer::{CommandBuffer, CommandBufferId, CommandBufferState, ExecutionPoint};

/// Per-queue pool occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandPoolStats {
    pub free: usize,
    pub submitted: usize,
    pub in_use: usize,
    pub total: usize,
}

struct QueuePool {
    pool: Box<dyn CommandPool>,
    free: Vec<CommandBufferId>,
    submitted: Vec<CommandBufferId>,
    in_use: FxHashSet<CommandBufferId>,
}

/// Owner of every command buffer
pub struct CommandBufferManager {
    // Declared before `pools`: native lists must drop before their pool
    buffers: SlotMap<CommandBufferId, CommandBuffer>,
    pools: FxHashMap<QueueType, QueuePool>,
    device: Arc<dyn GraphicsDevice>,
}

fn missing_pool(queue_type: QueueType) -> Error {
    engine_error!("ember3d::CommandBufferManager",
        "No command pool for queue {:?} (check Config::queue_types)", queue_type);
    Error::InitializationFailed(format!("no command pool for queue {:?}", queue_type))
}

impl CommandBufferManager {
    /// Create one native command pool per configured queue type
    pub fn new(context: &RenderContext) -> Result<Self> {
        let device = Arc::clone(context.device());
        let mut pools = FxHashMap::default();
        for &queue_type in &context.config().queue_types {
            if pools.contains_key(&queue_type) {
                continue;
            }
            let pool = device.create_command_pool(queue_type)?;
            pools.insert(queue_type, QueuePool {
                pool,
                free: Vec::new(),
                submitted: Vec::new(),
                in_use: FxHashSet::default(),
            });
        }

        engine_debug!("ember3d::CommandBufferManager",
            "Created command pools for {} queue type(s)", pools.len());

        Ok(Self {
            buffers: SlotMap::with_key(),
            pools,
            device,
        })
    }

    /// Hand out a command buffer in the `Initial` state
    ///
    /// Reclaims completed buffers first, then reuses a free buffer of
    /// `queue_type` or allocates a new one (never blocks).
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if no pool exists for `queue_type`; device errors
    /// if a new buffer cannot be allocated.
    pub fn acquire(&mut self, queue_type: QueueType) -> Result<CommandBufferId> {
        if !self.pools.contains_key(&queue_type) {
            return Err(missing_pool(queue_type));
        }
        self.reclaim_completed()?;

        let pool = self.pools.get_mut(&queue_type).ok_or_else(|| missing_pool(queue_type))?;
        let id = match pool.free.pop() {
            Some(id) => id,
            None => {
                let list = pool.pool.allocate()?;
                let fence = self.device.create_fence(false)?;
                let id = self.buffers.insert(CommandBuffer::new(queue_type, list, fence));
                engine_trace!("ember3d::CommandBufferManager",
                    "Allocated command buffer #{} for {:?}", self.buffers.len(), queue_type);
                id
            }
        };
        pool.in_use.insert(id);
        Ok(id)
    }

    /// Give a buffer back
    ///
    /// A pending buffer goes to the submitted list and is reclaimed once its
    /// fence signals. A buffer that was never submitted is reset on the spot.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `id` is unknown or not currently in use.
    pub fn release(&mut self, id: CommandBufferId) -> Result<()> {
        let Some(buffer) = self.buffers.get_mut(id) else {
            engine_warn!("ember3d::CommandBufferManager", "release() of an unknown command buffer");
            return Err(Error::InvalidResource("unknown command buffer".to_string()));
        };
        let queue_type = buffer.queue_type();
        let pool = self.pools.get_mut(&queue_type).ok_or_else(|| missing_pool(queue_type))?;
        if !pool.in_use.remove(&id) {
            engine_warn!("ember3d::CommandBufferManager",
                "release() of a command buffer that is not in use");
            return Err(Error::InvalidResource("command buffer is not in use".to_string()));
        }

        if buffer.state() == CommandBufferState::Pending {
            pool.submitted.push(id);
        } else {
            buffer.reset()?;
            pool.free.push(id);
        }
        Ok(())
    }

    /// Move every submitted buffer whose fence signaled back to its free list
    ///
    /// Returns the number of buffers reclaimed.
    pub fn reclaim_completed(&mut self) -> Result<usize> {
        let mut reclaimed = 0;
        for pool in self.pools.values_mut() {
            let mut index = 0;
            while index < pool.submitted.len() {
                let id = pool.submitted[index];
                let Some(buffer) = self.buffers.get_mut(id) else {
                    pool.submitted.swap_remove(index);
                    continue;
                };
                if buffer.fence().is_signaled()? {
                    buffer.reset()?;
                    pool.submitted.swap_remove(index);
                    pool.free.push(id);
                    reclaimed += 1;
                } else {
                    index += 1;
                }
            }
        }
        if reclaimed > 0 {
            engine_trace!("ember3d::CommandBufferManager", "Reclaimed {} command buffer(s)", reclaimed);
        }
        Ok(reclaimed)
    }

    /// End recording of `id` and submit it to its queue with its own fence
    ///
    /// The buffer stays in use; `release()` it afterwards.
    pub fn submit(
        &mut self,
        id: CommandBufferId,
        wait_semaphores: &[Arc<dyn Semaphore>],
        wait_stages: &[PipelineStages],
        signal_semaphores: &[Arc<dyn Semaphore>],
    ) -> Result<ExecutionPoint> {
        if wait_semaphores.len() != wait_stages.len() {
            engine_bail_misuse!("ember3d::CommandBufferManager",
                "submit() got {} wait semaphores but {} wait stages",
                wait_semaphores.len(), wait_stages.len());
        }
        let Some(buffer) = self.buffers.get_mut(id) else {
            return Err(Error::InvalidResource("unknown command buffer".to_string()));
        };
        buffer.end()?;

        let lists = [buffer.list()];
        self.device.queue_submit(buffer.queue_type(), &SubmitInfo {
            command_lists: &lists,
            wait_semaphores,
            wait_stages,
            signal_semaphores,
            fence: Some(buffer.fence()),
        })?;
        buffer.mark_submitted()?;

        Ok(ExecutionPoint { command_buffer: id, generation: buffer.generation() })
    }

    // ===== EXECUTION POINTS =====

    pub fn get(&self, id: CommandBufferId) -> Option<&CommandBuffer> {
        self.buffers.get(id)
    }

    pub fn get_mut(&mut self, id: CommandBufferId) -> Option<&mut CommandBuffer> {
        self.buffers.get_mut(id)
    }

    /// Current generation of `id`, `None` once the buffer was destroyed
    pub fn generation(&self, id: CommandBufferId) -> Option<u64> {
        self.buffers.get(id).map(CommandBuffer::generation)
    }

    pub fn execution_point(&self, id: CommandBufferId) -> Option<ExecutionPoint> {
        self.generation(id).map(|generation| ExecutionPoint { command_buffer: id, generation })
    }

    /// True once the work recorded at `point` can no longer be executing
    ///
    /// Only a reset advances the generation, so a buffer whose fence signaled
    /// but that was not reclaimed yet still reports incomplete.
    pub fn is_complete(&self, point: ExecutionPoint) -> bool {
        match self.buffers.get(point.command_buffer) {
            Some(buffer) => buffer.generation() > point.generation,
            None => true,
        }
    }

    /// Block until the work recorded at `point` finished, or `timeout_ns` elapsed
    ///
    /// Returns `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// `InvalidUsage` if `point` is the buffer's current generation and the
    /// buffer was never submitted (waiting would never return).
    pub fn wait(&self, point: ExecutionPoint, timeout_ns: u64) -> Result<bool> {
        if self.is_complete(point) {
            return Ok(true);
        }
        let Some(buffer) = self.buffers.get(point.command_buffer) else {
            return Ok(true);
        };
        if buffer.state() != CommandBufferState::Pending {
            engine_bail_misuse!("ember3d::CommandBufferManager",
                "wait() on a command buffer that was not submitted ({:?})", buffer.state());
        }
        buffer.fence().wait(timeout_ns)
    }

    // ===== MAINTENANCE =====

    /// Destroy the free buffers of `queue_type` and trim its native pool
    ///
    /// Returns the number of buffers destroyed.
    pub fn trim(&mut self, queue_type: QueueType) -> Result<usize> {
        let pool = self.pools.get_mut(&queue_type).ok_or_else(|| missing_pool(queue_type))?;
        let destroyed = pool.free.len();
        for id in pool.free.drain(..) {
            self.buffers.remove(id);
        }
        pool.pool.trim()?;

        engine_debug!("ember3d::CommandBufferManager",
            "Trimmed {} free command buffer(s) from {:?}", destroyed, queue_type);
        Ok(destroyed)
    }

    /// Occupancy of the pool of `queue_type`
    pub fn stats(&self, queue_type: QueueType) -> Option<CommandPoolStats> {
        self.pools.get(&queue_type).map(|pool| CommandPoolStats {
            free: pool.free.len(),
            submitted: pool.submitted.len(),
            in_use: pool.in_use.len(),
            total: pool.free.len() + pool.submitted.len() + pool.in_use.len(),
        })
    }

    /// Total number of live command buffers across all queues
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

impl Drop for CommandBufferManager {
    fn drop(&mut self) {
        // Buffers still executing must finish before their lists are freed
        for buffer in self.buffers.values() {
            if buffer.state() == CommandBufferState::Pending {
                if let Err(e) = buffer.fence().wait(u64::MAX) {
                    engine_error!("ember3d::CommandBufferManager",
                        "Failed to wait for a pending command buffer on drop: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "command_buffer_manager_tests.rs"]
mod tests;
