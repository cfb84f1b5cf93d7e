/// Shared scene fixtures for pass tests

use std::sync::Arc;
use glam::Mat4;
use crate::config::Config;
use crate::context::RenderContext;
use crate::device::mock_graphics_device::{MockGraphicsDevice, MockTexture};
use crate::device::{
    BlendState, BufferDesc, BufferUsage, CullMode, GraphicsDevice, IndexType, MemoryLocation,
    ShaderDesc, ShaderStage, VertexAttribute, VertexFormat, VertexLayout,
};
use crate::graph::{ColorTarget, DepthTarget, LoadAction, RenderGraph, RenderTargets, TrackedImage};
use super::scene::{GpuMesh, Material, MeshInstance, Scene};

pub struct PassFixture {
    pub device: Arc<MockGraphicsDevice>,
    pub graph: RenderGraph,
    pub color: Arc<TrackedImage>,
    pub depth: Arc<TrackedImage>,
}

impl PassFixture {
    pub fn new() -> Self {
        let device = Arc::new(MockGraphicsDevice::new());
        let context = RenderContext::new(device.clone(), Config::default()).unwrap();
        Self {
            graph: RenderGraph::new(&context).unwrap(),
            color: Arc::new(TrackedImage::new(MockTexture::color_target(64, 64))),
            depth: Arc::new(TrackedImage::new(MockTexture::depth_target(64, 64))),
            device,
        }
    }

    pub fn depth_targets(&self) -> RenderTargets {
        RenderTargets::new().with_depth(DepthTarget::new(Arc::clone(&self.depth)))
    }

    pub fn lighting_targets(&self) -> RenderTargets {
        RenderTargets::new()
            .with_color(ColorTarget::new(Arc::clone(&self.color)))
            .with_depth(DepthTarget::new(Arc::clone(&self.depth)).with_load(LoadAction::Load))
    }

    pub fn count_events(&self, prefix: &str) -> usize {
        self.device.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn material(&self, name: &str, opaque: bool) -> Arc<Material> {
        let code = [0x0723_0203u32];
        Arc::new(Material {
            name: name.to_string(),
            vertex_shader: self.device
                .create_shader(&ShaderDesc { stage: ShaderStage::Vertex, code: &code, entry_point: "main" })
                .unwrap(),
            fragment_shader: self.device
                .create_shader(&ShaderDesc { stage: ShaderStage::Fragment, code: &code, entry_point: "main" })
                .unwrap(),
            blend: if opaque { BlendState::default() } else { BlendState::alpha() },
            cull_mode: CullMode::Back,
            opaque,
        })
    }

    /// Indexed cube-sized mesh (24 vertices, 36 indices)
    pub fn indexed_mesh(&self) -> GpuMesh {
        GpuMesh::new(self.buffer(BufferUsage::VERTEX, 24 * 12), 24, position_layout())
            .with_indices(self.buffer(BufferUsage::INDEX, 36 * 2), IndexType::U16, 36)
    }

    /// Single triangle without index buffer
    pub fn triangle_mesh(&self) -> GpuMesh {
        GpuMesh::new(self.buffer(BufferUsage::VERTEX, 3 * 12), 3, position_layout())
    }

    fn buffer(&self, usage: BufferUsage, size: u64) -> Arc<dyn crate::device::Buffer> {
        self.device.create_buffer(&BufferDesc {
            size,
            usage: usage | BufferUsage::TRANSFER_DST,
            location: MemoryLocation::GpuOnly,
        }).unwrap()
    }
}

pub fn position_layout() -> VertexLayout {
    VertexLayout {
        stride: 12,
        attributes: vec![VertexAttribute { location: 0, format: VertexFormat::R32G32B32_SFLOAT, offset: 0 }],
    }
}

/// Scene with one opaque cube, one opaque triangle and one transparent cube
pub fn sample_scene(fixture: &PassFixture) -> Scene {
    let mut scene = Scene::new();
    let cube = scene.add_mesh(fixture.indexed_mesh());
    let triangle = scene.add_mesh(fixture.triangle_mesh());
    let stone = fixture.material("stone", true);
    let glass = fixture.material("glass", false);

    scene.add_instance(MeshInstance::new(cube, Arc::clone(&glass), Mat4::from_translation(glam::Vec3::X)));
    scene.add_instance(MeshInstance::new(cube, Arc::clone(&stone), Mat4::IDENTITY));
    scene.add_instance(MeshInstance::new(triangle, stone, Mat4::from_scale(glam::Vec3::splat(2.0))));
    scene
}
