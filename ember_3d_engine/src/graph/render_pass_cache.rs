/// Render pass objects shared by structurally equal descriptors

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::device::{GraphicsDevice, RenderPass, RenderPassDesc};
use crate::error::Result;
use crate::engine_debug;

/// Append-only map from `RenderPassDesc` to render pass object
#[derive(Default)]
pub struct RenderPassCache {
    entries: FxHashMap<RenderPassDesc, Arc<dyn RenderPass>>,
}

impl RenderPassCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render pass for `desc`, created on first request
    pub fn get_or_create(&mut self, device: &dyn GraphicsDevice, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        if let Some(render_pass) = self.entries.get(desc) {
            return Ok(Arc::clone(render_pass));
        }

        let render_pass = device.create_render_pass(desc)?;
        self.entries.insert(desc.clone(), Arc::clone(&render_pass));
        engine_debug!("ember3d::RenderPassCache",
            "Created render pass with {} attachment(s) ({} cached)",
            desc.attachment_count(), self.entries.len());
        Ok(render_pass)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
