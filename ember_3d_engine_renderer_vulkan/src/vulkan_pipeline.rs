/// Shaders, pipeline layouts, descriptor sets and graphics pipelines

use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::ember3d::device::{
    Buffer, DescriptorSet, DescriptorWrite, Pipeline, PipelineDesc, PipelineLayout, PipelineLayoutDesc,
    ResourceId, Shader, ShaderDesc, ShaderStage,
};
use ember_3d_engine::engine_bail_misuse;
use ash::vk;
use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::sync::Arc;

use crate::vulkan_buffer::vk_buffer;
use crate::vulkan_context::{vk_error, VulkanContext};
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, compare_op_to_vk, cull_mode_to_vk, descriptor_kind_to_vk,
    front_face_to_vk, polygon_mode_to_vk, shader_stage_flags_to_vk, shader_stage_to_vk,
    topology_to_vk, vertex_format_to_vk,
};
use crate::vulkan_render_pass::vk_render_pass;

// ===== SHADER =====

pub(crate) struct VulkanShader {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl VulkanShader {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &ShaderDesc<'_>) -> Result<Self> {
        let Ok(entry_point) = CString::new(desc.entry_point) else {
            engine_bail_misuse!("ember3d::vulkan", "Shader entry point {:?} contains a NUL byte", desc.entry_point);
        };
        let create_info = vk::ShaderModuleCreateInfo::default().code(desc.code);
        let module = unsafe { ctx.device.create_shader_module(&create_info, None) }
            .map_err(|e| vk_error("vkCreateShaderModule", e))?;

        Ok(Self { ctx, id: ResourceId::next(), module, stage: desc.stage, entry_point })
    }
}

impl Shader for VulkanShader {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

fn as_vulkan_shader(shader: &Arc<dyn Shader>) -> &VulkanShader {
    // SAFETY: every shader reaching the Vulkan backend was created by it
    unsafe { &*(shader.as_ref() as *const dyn Shader as *const VulkanShader) }
}

// ===== PIPELINE LAYOUT =====

/// Pipeline layout with an optional descriptor set 0 layout
pub(crate) struct VulkanPipelineLayout {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) layout: vk::PipelineLayout,
    set_layout: Option<vk::DescriptorSetLayout>,
    pub(crate) desc: PipelineLayoutDesc,
}

impl VulkanPipelineLayout {
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &PipelineLayoutDesc) -> Result<Self> {
        let set_layout = if desc.bindings.is_empty() {
            None
        } else {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc.bindings
                .iter()
                .map(|binding| vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(descriptor_kind_to_vk(binding.kind))
                    .descriptor_count(1)
                    .stage_flags(shader_stage_flags_to_vk(binding.stages)))
                .collect();
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            Some(unsafe { ctx.device.create_descriptor_set_layout(&create_info, None) }
                .map_err(|e| vk_error("vkCreateDescriptorSetLayout", e))?)
        };

        let set_layouts: Vec<vk::DescriptorSetLayout> = set_layout.into_iter().collect();
        let push_constant_ranges: Vec<vk::PushConstantRange> = if desc.push_constant_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: shader_stage_flags_to_vk(desc.push_constant_stages),
                offset: 0,
                size: desc.push_constant_size,
            }]
        } else {
            Vec::new()
        };
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&set_layouts)
            .push_constant_ranges(&push_constant_ranges);

        let layout = match unsafe { ctx.device.create_pipeline_layout(&create_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                if let Some(set_layout) = set_layout {
                    unsafe { ctx.device.destroy_descriptor_set_layout(set_layout, None) };
                }
                return Err(vk_error("vkCreatePipelineLayout", e));
            }
        };

        Ok(Self { ctx, id: ResourceId::next(), layout, set_layout, desc: desc.clone() })
    }
}

impl PipelineLayout for VulkanPipelineLayout {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn desc(&self) -> &PipelineLayoutDesc {
        &self.desc
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            if let Some(set_layout) = self.set_layout {
                self.ctx.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

pub(crate) fn as_vulkan_layout(layout: &Arc<dyn PipelineLayout>) -> &VulkanPipelineLayout {
    // SAFETY: every pipeline layout reaching the Vulkan backend was created by it
    unsafe { &*(layout.as_ref() as *const dyn PipelineLayout as *const VulkanPipelineLayout) }
}

// ===== DESCRIPTOR SET =====

/// Descriptor set for set 0 of a layout, allocated from its own pool
///
/// Sets are created once per pass resource, so a dedicated pool per set keeps
/// freeing trivial.
pub(crate) struct VulkanDescriptorSet {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pool: vk::DescriptorPool,
    pub(crate) set: vk::DescriptorSet,
    // Written buffers stay alive as long as the set references them
    _buffers: Vec<Arc<dyn Buffer>>,
}

impl VulkanDescriptorSet {
    pub(crate) fn new(
        ctx: Arc<VulkanContext>,
        layout: &Arc<dyn PipelineLayout>,
        writes: &[DescriptorWrite],
    ) -> Result<Self> {
        let vk_layout = as_vulkan_layout(layout);
        let Some(set_layout) = vk_layout.set_layout else {
            engine_bail_misuse!("ember3d::vulkan", "Descriptor set requested for a layout without bindings");
        };

        let kinds: FxHashMap<u32, vk::DescriptorType> = vk_layout.desc.bindings
            .iter()
            .map(|binding| (binding.binding, descriptor_kind_to_vk(binding.kind)))
            .collect();
        for write in writes {
            if !kinds.contains_key(&write.binding) {
                engine_bail_misuse!("ember3d::vulkan", "Descriptor write to unknown binding {}", write.binding);
            }
        }

        let mut counts: FxHashMap<vk::DescriptorType, u32> = FxHashMap::default();
        for kind in kinds.values() {
            *counts.entry(*kind).or_insert(0) += 1;
        }
        let pool_sizes: Vec<vk::DescriptorPoolSize> = counts
            .into_iter()
            .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
            .collect();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { ctx.device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| vk_error("vkCreateDescriptorPool", e))?;

        let set_layouts = [set_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        let set = match unsafe { ctx.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => sets[0],
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_pool(pool, None) };
                return Err(vk_error("vkAllocateDescriptorSets", e));
            }
        };

        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
            .iter()
            .map(|write| [vk::DescriptorBufferInfo {
                buffer: vk_buffer(&write.buffer),
                offset: 0,
                range: vk::WHOLE_SIZE,
            }])
            .collect();
        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&buffer_infos)
            .map(|(write, info)| vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(write.binding)
                .descriptor_type(kinds[&write.binding])
                .buffer_info(info))
            .collect();
        unsafe { ctx.device.update_descriptor_sets(&vk_writes, &[]) };

        Ok(Self {
            ctx,
            id: ResourceId::next(),
            pool,
            set,
            _buffers: writes.iter().map(|write| Arc::clone(&write.buffer)).collect(),
        })
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn id(&self) -> ResourceId {
        self.id
    }
}

impl Drop for VulkanDescriptorSet {
    fn drop(&mut self) {
        unsafe {
            // Frees the set with it
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

pub(crate) fn vk_descriptor_set(set: &Arc<dyn DescriptorSet>) -> vk::DescriptorSet {
    // SAFETY: every descriptor set reaching the Vulkan backend was created by it
    let set = unsafe { &*(set.as_ref() as *const dyn DescriptorSet as *const VulkanDescriptorSet) };
    set.set
}

// ===== GRAPHICS PIPELINE =====

pub(crate) struct VulkanPipeline {
    ctx: Arc<VulkanContext>,
    id: ResourceId,
    pub(crate) pipeline: vk::Pipeline,
    layout: Arc<dyn PipelineLayout>,
}

impl VulkanPipeline {
    /// Graphics pipeline with dynamic viewport and scissor
    pub(crate) fn new(ctx: Arc<VulkanContext>, desc: &PipelineDesc<'_>) -> Result<Self> {
        let state = desc.state;
        let layout = as_vulkan_layout(&state.layout).layout;

        let vertex_shader = as_vulkan_shader(&state.vertex_shader);
        let mut shader_stages = vec![vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(vertex_shader.stage))
            .module(vertex_shader.module)
            .name(&vertex_shader.entry_point)];
        if let Some(fragment_shader) = state.fragment_shader.as_ref().map(as_vulkan_shader) {
            shader_stages.push(vk::PipelineShaderStageCreateInfo::default()
                .stage(shader_stage_to_vk(fragment_shader.stage))
                .module(fragment_shader.module)
                .name(&fragment_shader.entry_point));
        }

        // Single interleaved binding 0
        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = if state.vertex_layout.attributes.is_empty() {
            Vec::new()
        } else {
            vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: state.vertex_layout.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            }]
        };
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = state.vertex_layout.attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: 0,
                format: vertex_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(state.topology))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(state.rasterization.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(state.rasterization.cull_mode))
            .front_face(front_face_to_vk(state.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(state.depth.test_enable)
            .depth_write_enable(state.depth.write_enable)
            .depth_compare_op(compare_op_to_vk(state.depth.compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // One blend state per color attachment of the render pass
        let blend = state.blend;
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(blend.enabled)
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_op));
        let color_blend_attachments = vec![color_blend_attachment; desc.render_pass.desc().color_attachments.len()];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(vk_render_pass(desc.render_pass))
            .subpass(0);

        let pipelines = unsafe {
            ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| vk_error("vkCreateGraphicsPipelines", e))?;
        let pipeline = pipelines.into_iter().next()
            .ok_or_else(|| Error::BackendError("vkCreateGraphicsPipelines returned no pipeline".to_string()))?;

        Ok(Self {
            ctx,
            id: ResourceId::next(),
            pipeline,
            layout: Arc::clone(&state.layout),
        })
    }
}

impl Pipeline for VulkanPipeline {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn layout(&self) -> &Arc<dyn PipelineLayout> {
        &self.layout
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

pub(crate) fn vk_pipeline(pipeline: &Arc<dyn Pipeline>) -> vk::Pipeline {
    // SAFETY: every pipeline reaching the Vulkan backend was created by it
    let pipeline = unsafe { &*(pipeline.as_ref() as *const dyn Pipeline as *const VulkanPipeline) };
    pipeline.pipeline
}
