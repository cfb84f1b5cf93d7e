/// Supported image layout transitions and their barrier masks.
///
/// The table is closed: any pair not listed is rejected by the render graph.

use crate::device::{AccessFlags, ImageLayout, PipelineStages};

/// Stage and access masks of one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBarrier {
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Barrier for `old -> new`, or `None` if the transition is not supported
pub fn barrier_for(old: ImageLayout, new: ImageLayout) -> Option<LayoutBarrier> {
    match (old, new) {
        (ImageLayout::Undefined, ImageLayout::TransferDst) => Some(LayoutBarrier {
            src_stages: PipelineStages::TOP_OF_PIPE,
            dst_stages: PipelineStages::TRANSFER,
            src_access: AccessFlags::empty(),
            dst_access: AccessFlags::TRANSFER_WRITE,
        }),
        (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly) => Some(LayoutBarrier {
            src_stages: PipelineStages::TRANSFER,
            dst_stages: PipelineStages::FRAGMENT_SHADER,
            src_access: AccessFlags::TRANSFER_WRITE,
            dst_access: AccessFlags::SHADER_READ,
        }),
        (ImageLayout::ColorAttachment, ImageLayout::PresentSrc) => Some(LayoutBarrier {
            src_stages: PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            dst_stages: PipelineStages::BOTTOM_OF_PIPE,
            src_access: AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: AccessFlags::empty(),
        }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "layout_transition_tests.rs"]
mod tests;
