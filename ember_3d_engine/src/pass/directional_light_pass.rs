/// Forward lighting by one directional light.
///
/// Runs after the depth pre-pass: depth is tested read-only. Each recording
/// uploads the light into its own device-local uniform slot; a slot is only
/// rewritten once the work that read it completed (or was discarded), so a
/// frame still in flight keeps the light it was recorded with.
/// Opaque instances are drawn first, then the blended ones, each group
/// ordered by material so pipeline switches stay rare.

use std::sync::Arc;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use crate::command::{CommandBufferManager, ExecutionPoint};
use crate::device::{
    Buffer, BufferDesc, BufferUsage, CompareOp, DepthState, DescriptorBinding, DescriptorKind,
    DescriptorSet, DescriptorWrite, GraphicsDevice, MemoryLocation, PipelineLayout,
    PipelineLayoutDesc, PipelineState, PipelineStateKey, RasterizationState, ShaderStageFlags,
};
use crate::error::Result;
use crate::graph::RenderGraph;
use crate::{engine_bail_misuse, engine_trace};
use super::scene::{DirectionalLight, MeshInstance, Scene};
use super::scene_pass::{draw_mesh, ScenePass};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct LightUniform {
    direction: [f32; 4],
    /// rgb = color, a = intensity
    color: [f32; 4],
}

impl From<&DirectionalLight> for LightUniform {
    fn from(light: &DirectionalLight) -> Self {
        let direction = light.direction.normalize_or_zero();
        Self {
            direction: [direction.x, direction.y, direction.z, 0.0],
            color: [light.color.x, light.color.y, light.color.z, light.intensity],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model_view_projection: Mat4,
    model: Mat4,
}

/// Light buffer plus the descriptor set pointing at it
struct LightSlot {
    buffer: Arc<dyn Buffer>,
    descriptor_set: Arc<dyn DescriptorSet>,
    uniform: LightUniform,
    /// Recording that wrote and reads the slot
    used_by: ExecutionPoint,
}

impl LightSlot {
    fn is_free(&self, commands: &CommandBufferManager) -> bool {
        commands.is_complete(self.used_by)
    }
}

#[derive(Default)]
pub struct DirectionalLightPass {
    layout: Option<Arc<dyn PipelineLayout>>,
    slots: Vec<LightSlot>,
    /// Slot bound by `draw()`
    current: Option<usize>,
}

impl DirectionalLightPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of light buffers created so far
    pub fn light_slot_count(&self) -> usize {
        self.slots.len()
    }

    fn ensure_layout(&mut self, device: &dyn GraphicsDevice) -> Result<Arc<dyn PipelineLayout>> {
        if let Some(layout) = &self.layout {
            return Ok(Arc::clone(layout));
        }
        let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
            bindings: vec![DescriptorBinding {
                binding: 0,
                kind: DescriptorKind::UniformBuffer,
                stages: ShaderStageFlags::FRAGMENT,
            }],
            push_constant_size: std::mem::size_of::<ObjectConstants>() as u32,
            push_constant_stages: ShaderStageFlags::VERTEX,
        })?;
        self.layout = Some(Arc::clone(&layout));
        Ok(layout)
    }

    /// Index of a slot no pending or current recording reads, created if needed
    fn free_slot(
        &mut self,
        device: &dyn GraphicsDevice,
        commands: &CommandBufferManager,
        uniform: LightUniform,
        point: ExecutionPoint,
    ) -> Result<usize> {
        if let Some(index) = self.slots.iter().position(|slot| slot.is_free(commands)) {
            let slot = &mut self.slots[index];
            slot.uniform = uniform;
            slot.used_by = point;
            return Ok(index);
        }

        let layout = self.ensure_layout(device)?;
        let buffer = device.create_buffer(&BufferDesc {
            size: std::mem::size_of::<LightUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
            location: MemoryLocation::GpuOnly,
        })?;
        let descriptor_set = device.create_descriptor_set(&layout, &[DescriptorWrite {
            binding: 0,
            buffer: Arc::clone(&buffer),
        }])?;
        self.slots.push(LightSlot { buffer, descriptor_set, uniform, used_by: point });
        engine_trace!("ember3d::DirectionalLightPass", "Light slot {} created", self.slots.len() - 1);
        Ok(self.slots.len() - 1)
    }
}

impl ScenePass for DirectionalLightPass {
    fn name(&self) -> &str {
        "directional_light"
    }

    fn prepare<'a>(&self, scene: &'a Scene) -> Vec<&'a MeshInstance> {
        let mut objects: Vec<_> = scene
            .instances
            .iter()
            .filter(|instance| scene.mesh_of(instance).is_some())
            .collect();
        objects.sort_by(|a, b| {
            b.material.opaque
                .cmp(&a.material.opaque)
                .then_with(|| a.material.name.cmp(&b.material.name))
        });
        objects
    }

    /// Upload the light for the current recording
    ///
    /// A second call within the same recording is free unless the light changed.
    fn update(&mut self, scene: &Scene, graph: &mut RenderGraph) -> Result<()> {
        let device = Arc::clone(graph.context().device());
        self.ensure_layout(device.as_ref())?;

        let uniform = LightUniform::from(&scene.light);
        let point = graph.current_execution_point()?;
        if let Some(slot) = self.current.and_then(|index| self.slots.get(index)) {
            if slot.used_by == point && slot.uniform == uniform {
                return Ok(());
            }
        }

        // On a failed copy the slot frees up once the recording is discarded
        self.current = None;
        let index = self.free_slot(device.as_ref(), graph.command_buffers(), uniform, point)?;
        let buffer = Arc::clone(&self.slots[index].buffer);
        graph.copy_buffer(bytemuck::bytes_of(&uniform), &buffer)?;
        self.current = Some(index);
        Ok(())
    }

    fn draw(&mut self, objects: &[&MeshInstance], scene: &Scene, graph: &mut RenderGraph) -> Result<()> {
        let point = graph.current_execution_point()?;
        let (Some(layout), Some(slot)) = (&self.layout, self.current.and_then(|index| self.slots.get(index))) else {
            engine_bail_misuse!("ember3d::DirectionalLightPass", "draw() before update()");
        };
        if slot.used_by != point {
            engine_bail_misuse!("ember3d::DirectionalLightPass", "draw() before update() in this recording");
        }

        let mut bound: Option<PipelineStateKey> = None;
        for instance in objects {
            let Some(mesh) = scene.mesh_of(instance) else {
                continue;
            };
            let material = &instance.material;

            let state = PipelineState::new(Arc::clone(&material.vertex_shader), Arc::clone(layout))
                .with_fragment_shader(Arc::clone(&material.fragment_shader))
                .with_vertex_layout(mesh.vertex_layout.clone())
                .with_rasterization(RasterizationState {
                    cull_mode: material.cull_mode,
                    ..RasterizationState::default()
                })
                .with_depth(DepthState::read_only(CompareOp::LessOrEqual))
                .with_blend(material.blend);
            let key = state.key();
            if bound.as_ref() != Some(&key) {
                graph.set_pipeline_state(&state, Some(&slot.descriptor_set))?;
                bound = Some(key);
            }

            let constants = ObjectConstants {
                model_view_projection: scene.view_projection * instance.transform,
                model: instance.transform,
            };
            graph.push_constants(0, bytemuck::bytes_of(&constants))?;
            draw_mesh(graph, mesh)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "directional_light_pass_tests.rs"]
mod tests;
