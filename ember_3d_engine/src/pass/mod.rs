//! Logical render passes
//!
//! A pass selects the scene instances it cares about and records their
//! draws through the render graph. Passes never touch command lists.

mod scene;
mod scene_pass;
mod depth_pass;
mod directional_light_pass;

pub use scene::{DirectionalLight, GpuMesh, Material, MeshHandle, MeshInstance, MeshTable, Scene};
pub use scene_pass::{draw_mesh, execute_pass, ScenePass};
pub use depth_pass::DepthPass;
pub use directional_light_pass::DirectionalLightPass;

#[cfg(test)]
mod test_fixtures;
