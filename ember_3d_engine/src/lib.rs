/*!
# Ember 3D Engine

GPU command and resource lifecycle core of the Ember 3D renderer.

This crate records GPU work without exposing raw synchronization to the code
that draws. It guarantees that nothing the GPU may still read is mutated or
freed, and recycles command buffers and staging memory across frames.

## Architecture

- **GraphicsDevice**: backend facade (command pools, fences, buffers, pipelines...)
- **CommandBufferManager**: per-queue command buffer pools reclaimed on fence signal
- **StagingBufferManager**: transient upload buffers released by execution generation
- **RenderGraph**: the single active recorder (targets, pipelines, copies, draws)
- **ScenePass**: logical draw units (`DepthPass`, `DirectionalLightPass`)
- **FrameScheduler**: swapchain acquire / submit / present with N frames in flight

Backends (see `ember_3d_engine_renderer_vulkan`) implement the device traits.
*/

// Internal modules
mod error;
mod engine;
mod config;
mod context;
pub mod log;
pub mod device;
pub mod command;
pub mod staging;
pub mod graph;
pub mod pass;
pub mod frame;

// Main ember3d namespace module
pub mod ember3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging entry point
    pub use crate::engine::Engine;

    // Configuration and explicit render context
    pub use crate::config::Config;
    pub use crate::context::RenderContext;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Device facade traits and descriptors
    pub mod device {
        pub use crate::device::*;
    }

    // Command buffer pools
    pub mod command {
        pub use crate::command::*;
    }

    // Staging buffers
    pub mod staging {
        pub use crate::staging::*;
    }

    // Render graph
    pub mod graph {
        pub use crate::graph::*;
    }

    // Logical render passes and scene data
    pub mod pass {
        pub use crate::pass::*;
    }

    // Frame scheduling
    pub mod frame {
        pub use crate::frame::*;
    }
}

// Re-export math library at crate root
pub use glam;
