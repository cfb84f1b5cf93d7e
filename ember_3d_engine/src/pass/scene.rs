/// Scene data consumed by the logical passes
///
/// Instances refer to meshes through `MeshHandle` keys. Removing a mesh from
/// the table turns every instance using it into a no-op; it never keeps the
/// mesh alive.

use std::sync::Arc;
use glam::{Mat4, Vec3};
use slotmap::{new_key_type, SlotMap};
use crate::device::{BlendState, Buffer, CullMode, IndexType, Shader, VertexLayout};

new_key_type! {
    /// Key of a mesh in a `MeshTable`
    pub struct MeshHandle;
}

/// Mesh table owned by the scene
pub type MeshTable = SlotMap<MeshHandle, GpuMesh>;

/// GPU-resident geometry
#[derive(Clone)]
pub struct GpuMesh {
    pub vertex_buffer: Arc<dyn Buffer>,
    pub vertex_count: u32,
    pub vertex_layout: VertexLayout,
    pub index_buffer: Option<Arc<dyn Buffer>>,
    pub index_type: IndexType,
    pub index_count: u32,
}

impl GpuMesh {
    /// Non-indexed mesh
    pub fn new(vertex_buffer: Arc<dyn Buffer>, vertex_count: u32, vertex_layout: VertexLayout) -> Self {
        Self {
            vertex_buffer,
            vertex_count,
            vertex_layout,
            index_buffer: None,
            index_type: IndexType::U32,
            index_count: 0,
        }
    }

    pub fn with_indices(mut self, index_buffer: Arc<dyn Buffer>, index_type: IndexType, index_count: u32) -> Self {
        self.index_buffer = Some(index_buffer);
        self.index_type = index_type;
        self.index_count = index_count;
        self
    }
}

/// Surface description shared by instances
pub struct Material {
    pub name: String,
    pub vertex_shader: Arc<dyn Shader>,
    pub fragment_shader: Arc<dyn Shader>,
    pub blend: BlendState,
    pub cull_mode: CullMode,
    /// Opaque materials write depth; others are drawn after them, blended
    pub opaque: bool,
}

/// One drawable object
#[derive(Clone)]
pub struct MeshInstance {
    pub mesh: MeshHandle,
    pub material: Arc<Material>,
    pub transform: Mat4,
}

impl MeshInstance {
    pub fn new(mesh: MeshHandle, material: Arc<Material>, transform: Mat4) -> Self {
        Self { mesh, material, transform }
    }
}

/// Single directional light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels (normalized by the pass)
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.3, -1.0, -0.2),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// Everything a frame draws
pub struct Scene {
    pub meshes: MeshTable,
    pub instances: Vec<MeshInstance>,
    pub view_projection: Mat4,
    pub light: DirectionalLight,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            instances: Vec::new(),
            view_projection: Mat4::IDENTITY,
            light: DirectionalLight::default(),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: GpuMesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    /// Remove a mesh; instances referring to it are skipped from now on
    pub fn remove_mesh(&mut self, handle: MeshHandle) -> Option<GpuMesh> {
        self.meshes.remove(handle)
    }

    pub fn add_instance(&mut self, instance: MeshInstance) {
        self.instances.push(instance);
    }

    /// Mesh of `instance`, `None` once the mesh was removed
    pub fn mesh_of(&self, instance: &MeshInstance) -> Option<&GpuMesh> {
        self.meshes.get(instance.mesh)
    }
}
