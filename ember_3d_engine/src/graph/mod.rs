//! Render graph module
//!
//! The render graph is the single active recorder. It owns the current
//! command buffer, the staging and command buffer managers, and the pipeline
//! and render pass caches. Logical passes record exclusively through it.

mod layout_transition;
mod render_targets;
mod pipeline_cache;
mod render_pass_cache;
mod render_graph;

pub use layout_transition::{barrier_for, LayoutBarrier};
pub use render_targets::{ColorTarget, DepthTarget, LoadAction, RenderTargets, TrackedImage};
pub use pipeline_cache::PipelineCache;
pub use render_pass_cache::RenderPassCache;
pub use render_graph::{RenderGraph, RenderGraphStats};
