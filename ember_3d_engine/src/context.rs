//! Explicit render context
//!
//! Handed to every component needing device access instead of a global
//! render system.

use std::sync::Arc;
use crate::config::Config;
use crate::device::GraphicsDevice;
use crate::error::Result;

/// Device handle plus configuration, cheap to clone
#[derive(Clone)]
pub struct RenderContext {
    device: Arc<dyn GraphicsDevice>,
    config: Config,
}

impl RenderContext {
    /// Build a context after validating `config`
    pub fn new(device: Arc<dyn GraphicsDevice>, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { device, config })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
