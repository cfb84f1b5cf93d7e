//! Staging buffer module
//!
//! Host-visible transient buffers used to upload data into device-local
//! resources, recycled once the command buffer that read them moved on.

mod staging_buffer_manager;

pub use staging_buffer_manager::{StagingBufferManager, StagingBufferStats};
