/// Tests for RenderGraph
///
/// These tests validate the recording protocol (targets, passes, pipelines,
/// draws), transfers through staging, layout tracking and submission.

use super::*;
use crate::command::CommandBufferState;
use crate::config::Config;
use crate::device::mock_graphics_device::{MockGraphicsDevice, MockTexture};
use crate::device::{
    BufferDesc, BufferUsage, GraphicsDevice, MemoryLocation, PipelineLayoutDesc, ShaderDesc,
    ShaderStage, ShaderStageFlags,
};
use crate::graph::{ColorTarget, DepthTarget, LoadAction};

fn setup() -> (Arc<MockGraphicsDevice>, RenderGraph) {
    let device = Arc::new(MockGraphicsDevice::new());
    let context = RenderContext::new(device.clone(), Config::default()).unwrap();
    let graph = RenderGraph::new(&context).unwrap();
    (device, graph)
}

fn device_local_buffer(device: &MockGraphicsDevice, size: u64) -> Arc<dyn Buffer> {
    device.create_buffer(&BufferDesc {
        size,
        usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
        location: MemoryLocation::GpuOnly,
    }).unwrap()
}

fn host_visible_buffer(device: &MockGraphicsDevice, size: u64) -> Arc<dyn Buffer> {
    device.create_buffer(&BufferDesc {
        size,
        usage: BufferUsage::UNIFORM,
        location: MemoryLocation::CpuToGpu,
    }).unwrap()
}

/// Vertex + fragment state with a 64 byte push constant block
fn trivial_state(device: &MockGraphicsDevice) -> PipelineState {
    let code = [0x0723_0203u32];
    let vs = device.create_shader(&ShaderDesc { stage: ShaderStage::Vertex, code: &code, entry_point: "main" }).unwrap();
    let fs = device.create_shader(&ShaderDesc { stage: ShaderStage::Fragment, code: &code, entry_point: "main" }).unwrap();
    let layout = device.create_pipeline_layout(&PipelineLayoutDesc {
        bindings: Vec::new(),
        push_constant_size: 64,
        push_constant_stages: ShaderStageFlags::VERTEX,
    }).unwrap();
    PipelineState::new(vs, layout).with_fragment_shader(fs)
}

fn color_image(size: u32) -> Arc<TrackedImage> {
    Arc::new(TrackedImage::new(MockTexture::color_target(size, size)))
}

fn begin_color_pass(graph: &mut RenderGraph, image: &Arc<TrackedImage>) {
    graph.set_render_targets(RenderTargets::new().with_color(
        ColorTarget::new(Arc::clone(image)).with_clear_color([0.1, 0.2, 0.3, 1.0]),
    )).unwrap();
    graph.begin_render_pass().unwrap();
}

fn has_event(device: &MockGraphicsDevice, event: &str) -> bool {
    device.events().iter().any(|e| e == event)
}

// ============================================================================
// Tests: Construction
// ============================================================================

#[test]
fn test_new_graph_is_recording() {
    let (device, graph) = setup();

    let buffer = graph.command_buffers().get(graph.current_command_buffer()).unwrap();
    assert_eq!(buffer.state(), CommandBufferState::Recording);
    assert_eq!(buffer.generation(), 0);
    assert!(has_event(&device, "cmd:begin"));
    assert!(!graph.is_in_render_pass());
}

// ============================================================================
// Tests: CopyBuffer
// ============================================================================

#[test]
fn test_copy_to_host_visible_buffer_writes_directly() {
    let (device, mut graph) = setup();
    let dst = host_visible_buffer(&device, 64);

    graph.copy_buffer(&[7u8; 48], &dst).unwrap();

    assert!(has_event(&device, "write_buffer:48"));
    assert!(!has_event(&device, "cmd:copy_buffer"));
    assert_eq!(graph.staging().stats().pending, 0);
    assert_eq!(graph.staging().stats().free, 0);
}

#[test]
fn test_copy_to_device_local_buffer_goes_through_staging() {
    let (device, mut graph) = setup();
    let dst = device_local_buffer(&device, 256);

    graph.copy_buffer(&[1u8; 200], &dst).unwrap();

    assert!(has_event(&device, "write_buffer:200"));
    assert!(has_event(&device, "cmd:copy_buffer"));
    let stats = graph.staging().stats();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.pending_bytes, 200);
    assert_eq!(stats.in_use, 0);
}

#[test]
fn test_copy_larger_than_destination_is_misuse() {
    let (device, mut graph) = setup();
    let dst = device_local_buffer(&device, 16);

    assert!(graph.copy_buffer(&[0u8; 32], &dst).unwrap_err().is_misuse());
}

#[test]
fn test_copy_inside_render_pass_is_misuse() {
    let (device, mut graph) = setup();
    let dst = device_local_buffer(&device, 16);
    begin_color_pass(&mut graph, &color_image(32));

    assert!(graph.copy_buffer(&[0u8; 8], &dst).unwrap_err().is_misuse());
    assert_eq!(graph.staging().stats().in_use, 0);
}

#[test]
fn test_staging_reclaimed_after_submission_completes() {
    let (device, mut graph) = setup();
    let dst = device_local_buffer(&device, 128);
    graph.copy_buffer(&[3u8; 128], &dst).unwrap();
    graph.execute(&[], &[], &[]).unwrap();

    assert_eq!(graph.tick().unwrap(), 0);
    assert_eq!(graph.staging().stats().pending, 1);

    device.complete_submissions();
    assert_eq!(graph.tick().unwrap(), 1);
    assert_eq!(graph.staging().stats().free, 1);
}

// ============================================================================
// Tests: TransitionLayout / CopyImage
// ============================================================================

#[test]
fn test_transition_records_barrier_and_tracks_layout() {
    let (device, mut graph) = setup();
    let image = TrackedImage::new(MockTexture::sampled(4, 4));

    graph.transition_layout(&image, ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();

    assert_eq!(image.layout(), ImageLayout::TransferDst);
    assert!(has_event(&device, "cmd:image_barrier:Undefined->TransferDst"));
}

#[test]
fn test_unsupported_transition_is_misuse() {
    let (device, mut graph) = setup();
    let image = TrackedImage::with_layout(MockTexture::sampled(4, 4), ImageLayout::ShaderReadOnly);

    let err = graph.transition_layout(&image, ImageLayout::ShaderReadOnly, ImageLayout::Undefined).unwrap_err();

    assert!(matches!(err, Error::InvalidUsage(_)));
    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);
    assert!(!device.events().iter().any(|e| e.starts_with("cmd:image_barrier")));
}

#[test]
fn test_transition_from_wrong_tracked_layout_is_misuse() {
    let (_device, mut graph) = setup();
    let image = TrackedImage::new(MockTexture::sampled(4, 4));

    let err = graph.transition_layout(&image, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly).unwrap_err();
    assert!(err.is_misuse());
}

#[test]
fn test_texture_upload_sequence() {
    let (device, mut graph) = setup();
    let image = TrackedImage::new(MockTexture::sampled(4, 4));

    graph.transition_layout(&image, ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();
    graph.copy_image(&[255u8; 64], &image).unwrap();
    graph.transition_layout(&image, ImageLayout::TransferDst, ImageLayout::ShaderReadOnly).unwrap();

    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);
    assert!(has_event(&device, "cmd:copy_buffer_to_texture"));
    assert_eq!(graph.staging().stats().pending, 1);
}

#[test]
fn test_copy_image_requires_transfer_dst() {
    let (_device, mut graph) = setup();
    let image = TrackedImage::new(MockTexture::sampled(4, 4));

    assert!(graph.copy_image(&[0u8; 64], &image).unwrap_err().is_misuse());
}

#[test]
fn test_copy_image_size_mismatch_is_misuse() {
    let (_device, mut graph) = setup();
    let image = TrackedImage::with_layout(MockTexture::sampled(4, 4), ImageLayout::TransferDst);

    assert!(graph.copy_image(&[0u8; 10], &image).unwrap_err().is_misuse());
}

// ============================================================================
// Tests: Render Targets / Render Pass
// ============================================================================

#[test]
fn test_begin_render_pass_without_targets_is_misuse() {
    let (_device, mut graph) = setup();
    assert!(graph.begin_render_pass().unwrap_err().is_misuse());
}

#[test]
fn test_set_render_targets_size_mismatch_is_misuse() {
    let (_device, mut graph) = setup();
    let targets = RenderTargets::new()
        .with_color(ColorTarget::new(color_image(32)))
        .with_depth(DepthTarget::new(Arc::new(TrackedImage::new(MockTexture::depth_target(64, 64)))));

    assert!(graph.set_render_targets(targets).unwrap_err().is_misuse());
}

#[test]
fn test_depth_format_as_color_is_misuse() {
    let (_device, mut graph) = setup();
    let depth_image = Arc::new(TrackedImage::new(MockTexture::depth_target(32, 32)));

    let err = graph.set_render_targets(RenderTargets::new().with_color(ColorTarget::new(depth_image))).unwrap_err();
    assert!(err.is_misuse());
}

#[test]
fn test_begin_render_pass_records_viewport_and_updates_layout() {
    let (device, mut graph) = setup();
    let image = color_image(64);

    begin_color_pass(&mut graph, &image);

    assert!(graph.is_in_render_pass());
    assert!(has_event(&device, "cmd:begin_render_pass:1"));
    assert!(has_event(&device, "cmd:set_viewport:64x64"));
    assert!(has_event(&device, "cmd:set_scissor:64x64"));
    assert_eq!(image.layout(), ImageLayout::ShaderReadOnly);
}

#[test]
fn test_begin_render_pass_consumes_targets() {
    let (_device, mut graph) = setup();
    begin_color_pass(&mut graph, &color_image(16));
    graph.end_render_pass().unwrap();

    assert!(graph.begin_render_pass().unwrap_err().is_misuse());
}

#[test]
fn test_failed_begin_render_pass_keeps_targets() {
    let (device, mut graph) = setup();
    let image = color_image(16);
    graph.set_render_targets(RenderTargets::new().with_color(ColorTarget::new(Arc::clone(&image)))).unwrap();
    device.fail_next_render_pass_creations(1);

    let err = graph.begin_render_pass().unwrap_err();
    assert!(!err.is_misuse());
    assert!(!graph.is_in_render_pass());
    assert_eq!(image.layout(), ImageLayout::Undefined);

    // The same targets are still pending
    graph.begin_render_pass().unwrap();
    assert!(graph.is_in_render_pass());
    assert_eq!(graph.stats().render_passes_begun, 1);
}

#[test]
fn test_nested_begin_render_pass_is_misuse() {
    let (_device, mut graph) = setup();
    let image = color_image(16);
    begin_color_pass(&mut graph, &image);

    assert!(graph.begin_render_pass().unwrap_err().is_misuse());
}

#[test]
fn test_end_render_pass_without_begin_is_misuse() {
    let (_device, mut graph) = setup();
    assert!(graph.end_render_pass().unwrap_err().is_misuse());
}

#[test]
fn test_color_and_depth_pass_clear_values() {
    let (device, mut graph) = setup();
    let color = color_image(32);
    let depth = Arc::new(TrackedImage::new(MockTexture::depth_target(32, 32)));

    graph.set_render_targets(RenderTargets::new()
        .with_color(ColorTarget::new(Arc::clone(&color)))
        .with_depth(DepthTarget::new(Arc::clone(&depth)))).unwrap();
    graph.begin_render_pass().unwrap();

    assert!(has_event(&device, "cmd:begin_render_pass:2"));
    assert_eq!(depth.layout(), ImageLayout::DepthStencilAttachment);
}

#[test]
fn test_render_pass_cache_reuses_equal_descriptors() {
    let (device, mut graph) = setup();
    let image = color_image(16);

    // First pass starts from Undefined, the next ones from ShaderReadOnly
    for _ in 0..3 {
        begin_color_pass(&mut graph, &image);
        graph.end_render_pass().unwrap();
    }

    assert_eq!(device.counters().render_passes_created, 2);
    assert_eq!(device.counters().framebuffers_created, 3);
    assert_eq!(graph.stats().render_passes_cached, 2);
    assert_eq!(graph.stats().render_passes_begun, 3);
}

// ============================================================================
// Tests: Pipeline / Draw
// ============================================================================

#[test]
fn test_draw_without_render_pass_is_misuse() {
    let (_device, mut graph) = setup();
    assert!(graph.draw(3, 0).unwrap_err().is_misuse());
}

#[test]
fn test_draw_without_pipeline_is_misuse() {
    let (_device, mut graph) = setup();
    begin_color_pass(&mut graph, &color_image(16));

    assert!(graph.draw(3, 0).unwrap_err().is_misuse());
    assert!(graph.draw_indexed(3, 0, 0).unwrap_err().is_misuse());
}

#[test]
fn test_set_pipeline_state_without_pass_is_misuse() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);

    assert!(graph.set_pipeline_state(&state, None).unwrap_err().is_misuse());
}

#[test]
fn test_pipeline_tracked_by_command_buffer() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    begin_color_pass(&mut graph, &color_image(16));

    graph.set_pipeline_state(&state, None).unwrap();

    let buffer = graph.command_buffers().get(graph.current_command_buffer()).unwrap();
    assert_eq!(buffer.cached_objects().pipeline_count(), 1);
    assert_eq!(buffer.cached_objects().render_pass_count(), 1);
    assert_eq!(buffer.cached_objects().framebuffer_count(), 1);
    assert!(has_event(&device, "cmd:bind_pipeline"));
}

#[test]
fn test_pipeline_cache_hit_across_passes() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    let image = color_image(16);

    for _ in 0..3 {
        begin_color_pass(&mut graph, &image);
        graph.set_pipeline_state(&state, None).unwrap();
        graph.draw(3, 0).unwrap();
        graph.end_render_pass().unwrap();
    }

    // One pipeline per distinct render pass
    assert_eq!(device.counters().pipelines_created, 2);
    assert_eq!(graph.stats().pipelines_cached, 2);
    assert_eq!(graph.stats().draw_calls, 3);
}

#[test]
fn test_pipeline_unbound_after_end_render_pass() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    let image = color_image(16);
    begin_color_pass(&mut graph, &image);
    graph.set_pipeline_state(&state, None).unwrap();
    graph.end_render_pass().unwrap();
    begin_color_pass(&mut graph, &image);

    assert!(graph.draw(3, 0).unwrap_err().is_misuse());
}

#[test]
fn test_push_constants_within_block() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    begin_color_pass(&mut graph, &color_image(16));
    graph.set_pipeline_state(&state, None).unwrap();

    graph.push_constants(0, &[0u8; 64]).unwrap();
    assert!(has_event(&device, "cmd:push_constants:0:64"));
    assert!(graph.push_constants(32, &[0u8; 64]).unwrap_err().is_misuse());
}

#[test]
fn test_indexed_draw_sequence() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    let vertices = device_local_buffer(&device, 1024);
    let indices = device_local_buffer(&device, 1024);
    begin_color_pass(&mut graph, &color_image(16));
    graph.set_pipeline_state(&state, None).unwrap();

    graph.bind_vertex_buffer(&vertices, 0).unwrap();
    graph.bind_index_buffer(&indices, 0, IndexType::U16).unwrap();
    graph.draw_indexed(36, 0, 0).unwrap();

    assert!(has_event(&device, "cmd:bind_vertex_buffer"));
    assert!(has_event(&device, "cmd:bind_index_buffer:U16"));
    assert!(has_event(&device, "cmd:draw_indexed:36"));
}

// ============================================================================
// Tests: Execute / Discard
// ============================================================================

#[test]
fn test_end_to_end_single_triangle() {
    let (device, mut graph) = setup();
    let state = trivial_state(&device);
    let image = color_image(128);
    let first = graph.current_command_buffer();
    assert_eq!(graph.command_buffers().get(first).unwrap().state(), CommandBufferState::Recording);

    begin_color_pass(&mut graph, &image);
    graph.set_pipeline_state(&state, None).unwrap();
    graph.draw(3, 0).unwrap();
    graph.end_render_pass().unwrap();
    let point = graph.execute(&[], &[], &[]).unwrap();

    assert_eq!(point.command_buffer, first);
    assert_eq!(graph.command_buffers().get(first).unwrap().state(), CommandBufferState::Pending);
    assert_ne!(graph.current_command_buffer(), first);
    assert_eq!(
        graph.command_buffers().get(graph.current_command_buffer()).unwrap().state(),
        CommandBufferState::Recording
    );

    device.complete_submissions();
    graph.tick().unwrap();

    let buffer = graph.command_buffers().get(first).unwrap();
    assert_eq!(buffer.state(), CommandBufferState::Initial);
    assert_eq!(buffer.generation(), 1);
    assert!(buffer.cached_objects().is_empty());
    assert!(graph.command_buffers().is_complete(point));
    assert!(has_event(&device, "cmd:draw:3"));
    assert_eq!(graph.stats().submissions, 1);
}

#[test]
fn test_execute_inside_render_pass_is_misuse() {
    let (device, mut graph) = setup();
    begin_color_pass(&mut graph, &color_image(16));

    assert!(graph.execute(&[], &[], &[]).unwrap_err().is_misuse());
    assert_eq!(device.submit_count(), 0);
}

#[test]
fn test_execute_reuses_reclaimed_buffer() {
    let (device, mut graph) = setup();
    let first = graph.current_command_buffer();
    graph.execute(&[], &[], &[]).unwrap();
    device.complete_submissions();
    graph.execute(&[], &[], &[]).unwrap();

    // The second execute reacquired the first buffer once it was reclaimed
    assert_eq!(graph.current_command_buffer(), first);
    assert_eq!(device.counters().command_lists_allocated, 2);
}

#[test]
fn test_discard_recording_starts_clean() {
    let (device, mut graph) = setup();
    let dst = device_local_buffer(&device, 64);
    graph.copy_buffer(&[9u8; 64], &dst).unwrap();
    begin_color_pass(&mut graph, &color_image(16));

    graph.discard_recording().unwrap();

    assert!(!graph.is_in_render_pass());
    let buffer = graph.command_buffers().get(graph.current_command_buffer()).unwrap();
    assert_eq!(buffer.state(), CommandBufferState::Recording);
    assert_eq!(buffer.generation(), 1);
    assert_eq!(device.submit_count(), 0);
    // Never submitted, so the staging copy is reusable right away
    assert_eq!(graph.tick().unwrap(), 1);
}

#[test]
fn test_load_action_load_keeps_contents() {
    let (_device, mut graph) = setup();
    let image = color_image(16);
    graph.set_render_targets(RenderTargets::new()
        .with_color(ColorTarget::new(Arc::clone(&image)).with_load(LoadAction::Load))).unwrap();

    graph.begin_render_pass().unwrap();
    assert!(graph.is_in_render_pass());
}
