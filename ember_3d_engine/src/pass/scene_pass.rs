/// Capability interface of the logical passes

use crate::error::Result;
use crate::graph::{RenderGraph, RenderTargets};
use super::scene::{GpuMesh, MeshInstance, Scene};

/// A reusable unit of draw logic
///
/// Passes keep no per-frame state. GPU objects they need (shaders, layouts,
/// descriptor sets) are built on first use and kept for the pass's lifetime.
pub trait ScenePass {
    fn name(&self) -> &str;

    /// Select and order the instances this pass draws
    fn prepare<'a>(&self, scene: &'a Scene) -> Vec<&'a MeshInstance>;

    /// Record uploads needed by `draw` (called outside the render pass)
    fn update(&mut self, _scene: &Scene, _graph: &mut RenderGraph) -> Result<()> {
        Ok(())
    }

    /// Record the draws of `objects` inside the active render pass
    fn draw(&mut self, objects: &[&MeshInstance], scene: &Scene, graph: &mut RenderGraph) -> Result<()>;
}

/// Prepare, update, then draw `pass` into `targets` within one render pass
///
/// Returns the number of instances selected by the pass.
pub fn execute_pass(
    pass: &mut dyn ScenePass,
    scene: &Scene,
    targets: RenderTargets,
    graph: &mut RenderGraph,
) -> Result<usize> {
    let objects = pass.prepare(scene);
    pass.update(scene, graph)?;

    graph.set_render_targets(targets)?;
    graph.begin_render_pass()?;
    pass.draw(&objects, scene, graph)?;
    graph.end_render_pass()?;

    crate::engine_trace!("ember3d::ScenePass", "Pass '{}' drew {} instance(s)", pass.name(), objects.len());
    Ok(objects.len())
}

/// Bind the buffers of `mesh` and issue its draw
pub fn draw_mesh(graph: &mut RenderGraph, mesh: &GpuMesh) -> Result<()> {
    graph.bind_vertex_buffer(&mesh.vertex_buffer, 0)?;
    match &mesh.index_buffer {
        Some(index_buffer) => {
            graph.bind_index_buffer(index_buffer, 0, mesh.index_type)?;
            graph.draw_indexed(mesh.index_count, 0, 0)
        }
        None => graph.draw(mesh.vertex_count, 0),
    }
}
