/// Transient upload buffers with deferred release.
///
/// A buffer released against an execution point stays pending until the
/// command buffer that reads it has moved to a later generation (or was
/// destroyed). Reuse is first-fit by capacity.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::command::{CommandBufferManager, ExecutionPoint};
use crate::context::RenderContext;
use crate::device::{Buffer, BufferDesc, GraphicsDevice, ResourceId};
use crate::error::{Error, Result};
use crate::{engine_bail_misuse, engine_error, engine_trace, engine_warn};

/// Buffer counts and byte totals per tracking list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingBufferStats {
    pub free: usize,
    pub in_use: usize,
    pub pending: usize,
    pub free_bytes: u64,
    pub in_use_bytes: u64,
    pub pending_bytes: u64,
}

struct PendingEntry {
    buffer: Arc<dyn Buffer>,
    point: ExecutionPoint,
}

pub struct StagingBufferManager {
    device: Arc<dyn GraphicsDevice>,
    free: Vec<Arc<dyn Buffer>>,
    in_use: FxHashMap<ResourceId, Arc<dyn Buffer>>,
    pending: Vec<PendingEntry>,
}

impl StagingBufferManager {
    pub fn new(context: &RenderContext) -> Self {
        Self {
            device: Arc::clone(context.device()),
            free: Vec::new(),
            in_use: FxHashMap::default(),
            pending: Vec::new(),
        }
    }

    /// Get a host-visible buffer of at least `size` bytes
    ///
    /// Takes the first free buffer large enough, otherwise allocates one sized
    /// exactly to `size`.
    ///
    /// # Errors
    ///
    /// `InvalidUsage` for a zero size. Allocation failures (`OutOfMemory`) are
    /// fatal and not retried.
    pub fn acquire_staging_buffer(&mut self, size: u64) -> Result<Arc<dyn Buffer>> {
        if size == 0 {
            engine_bail_misuse!("ember3d::StagingBufferManager", "Cannot acquire an empty staging buffer");
        }

        let buffer = match self.free.iter().position(|buffer| buffer.size() >= size) {
            Some(index) => self.free.remove(index),
            None => {
                let buffer = self.device.create_buffer(&BufferDesc::staging(size)).map_err(|e| {
                    engine_error!("ember3d::StagingBufferManager",
                        "Failed to allocate a {} byte staging buffer: {}", size, e);
                    e
                })?;
                engine_trace!("ember3d::StagingBufferManager", "Allocated {} byte staging buffer", size);
                buffer
            }
        };

        self.in_use.insert(buffer.id(), Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Hand a buffer back
    ///
    /// Without an owner the buffer is reusable at once (the caller guarantees
    /// no GPU read is pending). With an owner it waits in the pending list
    /// until `tick()` sees the owner's generation advance.
    ///
    /// # Errors
    ///
    /// `InvalidResource` if the buffer was not acquired from this manager or
    /// was already released.
    pub fn release_staging_buffer(&mut self, buffer: &Arc<dyn Buffer>, owner: Option<ExecutionPoint>) -> Result<()> {
        let Some(owned) = self.in_use.remove(&buffer.id()) else {
            engine_warn!("ember3d::StagingBufferManager",
                "release of a staging buffer that is not in use ({:?})", buffer.id());
            return Err(Error::InvalidResource("staging buffer is not in use".to_string()));
        };

        match owner {
            None => self.free.push(owned),
            Some(point) => self.pending.push(PendingEntry { buffer: owned, point }),
        }
        Ok(())
    }

    /// Move every pending buffer whose owner finished to the free list
    ///
    /// Call once per frame. Entries still waiting keep their relative order.
    /// Returns the number of buffers made reusable.
    pub fn tick(&mut self, commands: &CommandBufferManager) -> usize {
        let (ready, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|entry| commands.is_complete(entry.point));
        self.pending = waiting;

        let reclaimed = ready.len();
        self.free.extend(ready.into_iter().map(|entry| entry.buffer));
        if reclaimed > 0 {
            engine_trace!("ember3d::StagingBufferManager", "Reclaimed {} staging buffer(s)", reclaimed);
        }
        reclaimed
    }

    /// Drop every free buffer, returning how many were destroyed
    pub fn trim(&mut self) -> usize {
        let count = self.free.len();
        self.free.clear();
        count
    }

    pub fn stats(&self) -> StagingBufferStats {
        StagingBufferStats {
            free: self.free.len(),
            in_use: self.in_use.len(),
            pending: self.pending.len(),
            free_bytes: self.free.iter().map(|b| b.size()).sum(),
            in_use_bytes: self.in_use.values().map(|b| b.size()).sum(),
            pending_bytes: self.pending.iter().map(|e| e.buffer.size()).sum(),
        }
    }
}

#[cfg(test)]
#[path = "staging_buffer_manager_tests.rs"]
mod tests;
