/// Tests for the layout transition table

use super::*;

const ALL_LAYOUTS: [ImageLayout; 7] = [
    ImageLayout::Undefined,
    ImageLayout::ColorAttachment,
    ImageLayout::DepthStencilAttachment,
    ImageLayout::ShaderReadOnly,
    ImageLayout::TransferSrc,
    ImageLayout::TransferDst,
    ImageLayout::PresentSrc,
];

// ============================================================================
// Tests: Supported Transitions
// ============================================================================

#[test]
fn test_undefined_to_transfer_dst() {
    let barrier = barrier_for(ImageLayout::Undefined, ImageLayout::TransferDst).unwrap();
    assert_eq!(barrier.src_stages, PipelineStages::TOP_OF_PIPE);
    assert_eq!(barrier.dst_stages, PipelineStages::TRANSFER);
    assert!(barrier.src_access.is_empty());
    assert_eq!(barrier.dst_access, AccessFlags::TRANSFER_WRITE);
}

#[test]
fn test_transfer_dst_to_shader_read_only() {
    let barrier = barrier_for(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly).unwrap();
    assert_eq!(barrier.src_access, AccessFlags::TRANSFER_WRITE);
    assert_eq!(barrier.dst_access, AccessFlags::SHADER_READ);
    assert_eq!(barrier.dst_stages, PipelineStages::FRAGMENT_SHADER);
}

#[test]
fn test_color_attachment_to_present() {
    let barrier = barrier_for(ImageLayout::ColorAttachment, ImageLayout::PresentSrc).unwrap();
    assert_eq!(barrier.src_stages, PipelineStages::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(barrier.src_access, AccessFlags::COLOR_ATTACHMENT_WRITE);
}

// ============================================================================
// Tests: Closed Table
// ============================================================================

#[test]
fn test_shader_read_only_to_undefined_unsupported() {
    assert!(barrier_for(ImageLayout::ShaderReadOnly, ImageLayout::Undefined).is_none());
}

#[test]
fn test_exactly_three_pairs_supported() {
    let supported = ALL_LAYOUTS
        .iter()
        .flat_map(|&old| ALL_LAYOUTS.iter().map(move |&new| (old, new)))
        .filter(|&(old, new)| barrier_for(old, new).is_some())
        .count();
    assert_eq!(supported, 3);
}
