/// Depth pre-pass: writes depth for every opaque instance, no color output

use std::sync::Arc;
use crate::device::{
    GraphicsDevice, PipelineLayout, PipelineLayoutDesc, PipelineState, PipelineStateKey,
    RasterizationState, Shader, ShaderDesc, ShaderStage, ShaderStageFlags,
};
use crate::error::Result;
use crate::graph::RenderGraph;
use super::scene::{MeshInstance, Scene};
use super::scene_pass::{draw_mesh, ScenePass};

/// Model-view-projection matrix
const PUSH_CONSTANT_SIZE: u32 = 64;

pub struct DepthPass {
    vertex_spirv: Vec<u32>,
    vertex_shader: Option<Arc<dyn Shader>>,
    layout: Option<Arc<dyn PipelineLayout>>,
}

impl DepthPass {
    /// `vertex_spirv` transforms positions by a push-constant MVP matrix
    pub fn new(vertex_spirv: Vec<u32>) -> Self {
        Self { vertex_spirv, vertex_shader: None, layout: None }
    }

    fn ensure_resources(&mut self, device: &dyn GraphicsDevice) -> Result<(Arc<dyn Shader>, Arc<dyn PipelineLayout>)> {
        let vertex_shader = match self.vertex_shader.clone() {
            Some(shader) => shader,
            None => {
                let shader = device.create_shader(&ShaderDesc {
                    stage: ShaderStage::Vertex,
                    code: &self.vertex_spirv,
                    entry_point: "main",
                })?;
                self.vertex_shader = Some(Arc::clone(&shader));
                shader
            }
        };
        let layout = match self.layout.clone() {
            Some(layout) => layout,
            None => {
                let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
                    bindings: Vec::new(),
                    push_constant_size: PUSH_CONSTANT_SIZE,
                    push_constant_stages: ShaderStageFlags::VERTEX,
                })?;
                self.layout = Some(Arc::clone(&layout));
                layout
            }
        };
        Ok((vertex_shader, layout))
    }
}

impl ScenePass for DepthPass {
    fn name(&self) -> &str {
        "depth"
    }

    /// Opaque instances whose mesh still exists
    fn prepare<'a>(&self, scene: &'a Scene) -> Vec<&'a MeshInstance> {
        scene
            .instances
            .iter()
            .filter(|instance| instance.material.opaque && scene.mesh_of(instance).is_some())
            .collect()
    }

    fn draw(&mut self, objects: &[&MeshInstance], scene: &Scene, graph: &mut RenderGraph) -> Result<()> {
        let device = Arc::clone(graph.context().device());
        let (vertex_shader, layout) = self.ensure_resources(device.as_ref())?;

        let mut bound: Option<PipelineStateKey> = None;
        for instance in objects {
            let Some(mesh) = scene.mesh_of(instance) else {
                continue;
            };

            let state = PipelineState::new(Arc::clone(&vertex_shader), Arc::clone(&layout))
                .with_vertex_layout(mesh.vertex_layout.clone())
                .with_rasterization(RasterizationState {
                    cull_mode: instance.material.cull_mode,
                    ..RasterizationState::default()
                });
            let key = state.key();
            if bound.as_ref() != Some(&key) {
                graph.set_pipeline_state(&state, None)?;
                bound = Some(key);
            }

            let mvp = scene.view_projection * instance.transform;
            graph.push_constants(0, bytemuck::bytes_of(&mvp))?;
            draw_mesh(graph, mesh)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "depth_pass_tests.rs"]
mod tests;
