/// Buffer trait and buffer descriptor

use bitflags::bitflags;
use crate::device::ResourceId;
use crate::error::Result;

bitflags! {
    /// How a buffer will be used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        /// Source of a copy command (staging buffers)
        const TRANSFER_SRC = 1 << 4;
        /// Destination of a copy command (device-local uploads)
        const TRANSFER_DST = 1 << 5;
    }
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not mappable
    GpuOnly,
    /// Host-visible and host-coherent, written by the CPU
    CpuToGpu,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub location: MemoryLocation,
}

impl BufferDesc {
    /// Host-visible transfer source sized exactly to `size`
    pub fn staging(size: u64) -> Self {
        Self {
            size,
            usage: BufferUsage::TRANSFER_SRC,
            location: MemoryLocation::CpuToGpu,
        }
    }
}

/// GPU buffer
pub trait Buffer: Send + Sync {
    fn id(&self) -> ResourceId;

    /// Capacity in bytes
    fn size(&self) -> u64;

    /// True when the CPU can write the memory directly
    fn is_host_visible(&self) -> bool;

    /// Copy `data` into the mapped memory at `offset`
    ///
    /// # Errors
    ///
    /// `InvalidUsage` if the buffer is not host-visible or the write overflows it.
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;
}
