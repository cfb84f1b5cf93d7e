/// Pipelines keyed by structural state and render pass.
///
/// Entries are never evicted: the state space is bounded by the loaded
/// materials and passes.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::device::{GraphicsDevice, Pipeline, PipelineDesc, PipelineState, PipelineStateKey, RenderPass, ResourceId};
use crate::error::Result;
use crate::engine_debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineCacheKey {
    state: PipelineStateKey,
    render_pass: ResourceId,
}

#[derive(Default)]
pub struct PipelineCache {
    entries: FxHashMap<PipelineCacheKey, Arc<dyn Pipeline>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline for `state` compatible with `render_pass`, built on first request
    pub fn get_or_create(
        &mut self,
        device: &dyn GraphicsDevice,
        state: &PipelineState,
        render_pass: &Arc<dyn RenderPass>,
    ) -> Result<Arc<dyn Pipeline>> {
        let key = PipelineCacheKey { state: state.key(), render_pass: render_pass.id() };
        if let Some(pipeline) = self.entries.get(&key) {
            return Ok(Arc::clone(pipeline));
        }

        let pipeline = device.create_pipeline(&PipelineDesc { state, render_pass })?;
        self.entries.insert(key, Arc::clone(&pipeline));
        engine_debug!("ember3d::PipelineCache", "Built pipeline ({} cached)", self.entries.len());
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "pipeline_cache_tests.rs"]
mod tests;
