//! Command buffer module
//!
//! Command buffers wrap a native command list with a dedicated fence and an
//! execution generation. The manager pools them per queue type and reclaims
//! them lazily once their fence signals.

mod command_buffer;
mod command_buffer_manager;

pub use command_buffer::{CachedObjects, CommandBuffer, CommandBufferId, CommandBufferState, ExecutionPoint};
pub use command_buffer_manager::{CommandBufferManager, CommandPoolStats};
