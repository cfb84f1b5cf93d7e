/// Shaders, pipeline layouts, descriptor sets and graphics pipeline state

use std::sync::Arc;
use bitflags::bitflags;
use crate::device::{Buffer, RenderPass, ResourceId};

// ===== SHADERS =====

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

bitflags! {
    /// Set of shader stages (descriptor and push constant visibility)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

/// Descriptor for creating a shader module from SPIR-V words
#[derive(Debug, Clone, Copy)]
pub struct ShaderDesc<'a> {
    pub stage: ShaderStage,
    pub code: &'a [u32],
    pub entry_point: &'a str,
}

/// Shader module
pub trait Shader: Send + Sync {
    fn id(&self) -> ResourceId;
    fn stage(&self) -> ShaderStage;
}

// ===== LAYOUTS AND DESCRIPTORS =====

/// Kind of resource bound at a descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    StorageBuffer,
}

/// One binding of descriptor set 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: ShaderStageFlags,
}

/// Descriptor for creating a pipeline layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PipelineLayoutDesc {
    /// Bindings of descriptor set 0 (empty = no descriptor set)
    pub bindings: Vec<DescriptorBinding>,
    /// Push constant block size in bytes (0 = none)
    pub push_constant_size: u32,
    pub push_constant_stages: ShaderStageFlags,
}

impl Default for ShaderStageFlags {
    fn default() -> Self {
        ShaderStageFlags::empty()
    }
}

/// Pipeline layout
pub trait PipelineLayout: Send + Sync {
    fn id(&self) -> ResourceId;
    fn desc(&self) -> &PipelineLayoutDesc;
}

/// Buffer written into a descriptor set binding
#[derive(Clone)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub buffer: Arc<dyn Buffer>,
}

/// Descriptor set allocated against a pipeline layout
pub trait DescriptorSet: Send + Sync {
    fn id(&self) -> ResourceId;
}

// ===== VERTEX INPUT =====

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum VertexFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R8G8B8A8_UNORM,
    R32_UINT,
}

/// Vertex attribute description (single binding 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Vertex input layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Stride in bytes between consecutive vertices
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

/// Index buffer element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size in bytes of one index element
    pub fn size_bytes(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

// ===== FIXED-FUNCTION STATE =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
}

impl Default for RasterizationState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: CompareOp,
}

impl DepthState {
    /// No depth test, no depth write
    pub fn disabled() -> Self {
        Self { test_enable: false, write_enable: false, compare_op: CompareOp::Always }
    }

    /// Test against a depth buffer filled by an earlier pass, without writing
    pub fn read_only(compare_op: CompareOp) -> Self {
        Self { test_enable: true, write_enable: false, compare_op }
    }
}

impl Default for DepthState {
    fn default() -> Self {
        Self { test_enable: true, write_enable: true, compare_op: CompareOp::Less }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src_color_factor: BlendFactor,
    pub dst_color_factor: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha_factor: BlendFactor,
    pub dst_alpha_factor: BlendFactor,
    pub alpha_op: BlendOp,
}

impl BlendState {
    /// Standard straight-alpha blending
    pub fn alpha() -> Self {
        Self {
            enabled: true,
            src_color_factor: BlendFactor::SrcAlpha,
            dst_color_factor: BlendFactor::OneMinusSrcAlpha,
            color_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }

    /// Additive blending (light accumulation)
    pub fn additive() -> Self {
        Self {
            enabled: true,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::One,
            color_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::One,
            alpha_op: BlendOp::Add,
        }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_color_factor: BlendFactor::One,
            dst_color_factor: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha_factor: BlendFactor::One,
            dst_alpha_factor: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

// ===== PIPELINE STATE =====

/// Structural description of a graphics pipeline, minus the render pass
#[derive(Clone)]
pub struct PipelineState {
    pub vertex_shader: Arc<dyn Shader>,
    /// `None` for depth-only pipelines
    pub fragment_shader: Option<Arc<dyn Shader>>,
    pub layout: Arc<dyn PipelineLayout>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub blend: BlendState,
}

impl PipelineState {
    /// Triangle-list state with default raster, depth and blend settings
    pub fn new(vertex_shader: Arc<dyn Shader>, layout: Arc<dyn PipelineLayout>) -> Self {
        Self {
            vertex_shader,
            fragment_shader: None,
            layout,
            vertex_layout: VertexLayout::default(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth: DepthState::default(),
            blend: BlendState::default(),
        }
    }

    pub fn with_fragment_shader(mut self, shader: Arc<dyn Shader>) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn with_vertex_layout(mut self, vertex_layout: VertexLayout) -> Self {
        self.vertex_layout = vertex_layout;
        self
    }

    pub fn with_rasterization(mut self, rasterization: RasterizationState) -> Self {
        self.rasterization = rasterization;
        self
    }

    pub fn with_depth(mut self, depth: DepthState) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = blend;
        self
    }

    /// Hashable identity of this state (GPU objects by id, the rest by value)
    pub fn key(&self) -> PipelineStateKey {
        PipelineStateKey {
            vertex_shader: self.vertex_shader.id(),
            fragment_shader: self.fragment_shader.as_ref().map(|shader| shader.id()),
            layout: self.layout.id(),
            vertex_layout: self.vertex_layout.clone(),
            topology: self.topology,
            rasterization: self.rasterization,
            depth: self.depth,
            blend: self.blend,
        }
    }
}

/// Hashable projection of a [`PipelineState`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineStateKey {
    pub vertex_shader: ResourceId,
    pub fragment_shader: Option<ResourceId>,
    pub layout: ResourceId,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub blend: BlendState,
}

/// Descriptor for creating a pipeline compatible with `render_pass`
pub struct PipelineDesc<'a> {
    pub state: &'a PipelineState,
    pub render_pass: &'a Arc<dyn RenderPass>,
}

/// Graphics pipeline
pub trait Pipeline: Send + Sync {
    fn id(&self) -> ResourceId;
    fn layout(&self) -> &Arc<dyn PipelineLayout>;
}
