/// Frame scheduler: swapchain acquire, submit and present
///
/// Owns one `Frame` per frame in flight. Before a slot is reused the
/// scheduler waits for the work that slot submitted last time, unless the
/// command buffer that ran it has already been reclaimed. With one frame in
/// flight every `end_rendering()` therefore blocks until the GPU is done.
///
/// The semaphore a present waits on belongs to the swapchain image, not to
/// the slot: an image is only handed out again once its previous present
/// consumed that semaphore, which a slot's fence does not guarantee.

use std::sync::Arc;
use crate::context::RenderContext;
use crate::device::{
    AcquireStatus, GraphicsDevice, ImageLayout, PipelineStages, PresentStatus, Semaphore, Swapchain,
};
use crate::error::{Error, Result};
use crate::graph::{RenderGraph, TrackedImage};
use crate::{engine_bail, engine_bail_misuse, engine_debug, engine_info, engine_warn};
use super::frame::{Frame, FrameState};

/// Outcome of a frame step
///
/// `NeedsRebuild` is not an error: the owner of the window recreates the
/// swapchain and hands it over through `FrameScheduler::rebuild()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Ready,
    NeedsRebuild,
}

pub struct FrameScheduler {
    context: RenderContext,
    swapchain: Box<dyn Swapchain>,
    images: Vec<Arc<TrackedImage>>,
    /// Signaled by the submit rendering into image `i`, waited on by its present
    render_finished: Vec<Arc<dyn Semaphore>>,
    frames: Vec<Frame>,
    current: usize,
    frame_number: u64,
}

impl FrameScheduler {
    /// Create `config.frames_in_flight` slots over `swapchain`
    pub fn new(context: &RenderContext, swapchain: Box<dyn Swapchain>) -> Result<Self> {
        let device = context.device();
        let frames = (0..context.config().frames_in_flight)
            .map(|slot| Ok(Frame::new(slot, device.create_semaphore()?)))
            .collect::<Result<Vec<_>>>()?;
        let images = track_images(swapchain.as_ref())?;
        let render_finished = create_semaphores(device.as_ref(), images.len())?;

        engine_info!("ember3d::FrameScheduler", "{} frame(s) in flight over {} swapchain image(s)",
            frames.len(), images.len());

        Ok(Self {
            context: context.clone(),
            swapchain,
            images,
            render_finished,
            frames,
            current: 0,
            frame_number: 0,
        })
    }

    // ===== ACCESSORS =====

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Frames presented so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn frame(&self, slot: usize) -> Option<&Frame> {
        self.frames.get(slot)
    }

    pub fn swapchain(&self) -> &dyn Swapchain {
        self.swapchain.as_ref()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Option<&Arc<TrackedImage>> {
        self.images.get(index)
    }

    /// Semaphore the present of swapchain image `index` waits on
    pub fn render_finished(&self, index: usize) -> Option<&Arc<dyn Semaphore>> {
        self.render_finished.get(index)
    }

    /// Swapchain image acquired by the current frame, while it is recording
    pub fn back_buffer(&self) -> Option<Arc<TrackedImage>> {
        let frame = &self.frames[self.current];
        if frame.state() != FrameState::Recording {
            return None;
        }
        frame.image_index().and_then(|index| self.images.get(index as usize)).cloned()
    }

    // ===== FRAME LOOP =====

    /// Acquire the next swapchain image for the current slot
    ///
    /// An out-of-date swapchain or an acquisition timeout returns
    /// `NeedsRebuild` and leaves the slot idle.
    pub fn begin_rendering(&mut self, graph: &mut RenderGraph) -> Result<FrameStatus> {
        if matches!(self.frames[self.current].state(), FrameState::Acquired | FrameState::Recording) {
            engine_bail_misuse!("ember3d::FrameScheduler", "begin_rendering() called twice for frame {}",
                self.frame_number);
        }
        self.wait_for_slot(self.current, graph)?;

        let timeout = self.context.config().acquire_timeout_ns;
        let frame = &mut self.frames[self.current];
        match self.swapchain.acquire_next_image(timeout, frame.image_available())? {
            AcquireStatus::Acquired { image_index, suboptimal } => {
                if image_index as usize >= self.images.len() {
                    engine_bail!("ember3d::FrameScheduler", "Swapchain returned image {} out of {}",
                        image_index, self.images.len());
                }
                frame.mark_acquired(image_index, suboptimal);
                frame.mark_recording();
                Ok(FrameStatus::Ready)
            }
            AcquireStatus::OutOfDate => {
                engine_warn!("ember3d::FrameScheduler", "Swapchain out of date on acquire");
                frame.reset();
                Ok(FrameStatus::NeedsRebuild)
            }
            AcquireStatus::Timeout => {
                engine_warn!("ember3d::FrameScheduler", "Swapchain acquire timed out after {} ns", timeout);
                frame.reset();
                Ok(FrameStatus::NeedsRebuild)
            }
        }
    }

    /// Submit the graph's recording, present, and move to the next slot
    ///
    /// The back buffer must have been rendered into. If it was left in
    /// `ColorAttachment` it is transitioned to `PresentSrc` first.
    pub fn end_rendering(&mut self, graph: &mut RenderGraph) -> Result<FrameStatus> {
        if self.frames[self.current].state() != FrameState::Recording {
            engine_bail_misuse!("ember3d::FrameScheduler", "end_rendering() without a successful begin_rendering()");
        }
        let Some(image) = self.back_buffer() else {
            engine_bail_misuse!("ember3d::FrameScheduler", "No back buffer for frame {}", self.frame_number);
        };

        if image.layout() == ImageLayout::ColorAttachment {
            graph.transition_layout(&image, ImageLayout::ColorAttachment, ImageLayout::PresentSrc)?;
        }
        if image.layout() != ImageLayout::PresentSrc {
            engine_bail_misuse!("ember3d::FrameScheduler",
                "Back buffer is in {:?} at end_rendering(), nothing was rendered into it", image.layout());
        }

        let frame = &mut self.frames[self.current];
        // Presentable image index was checked at acquire
        let image_index = frame.image_index().unwrap_or_default();
        let Some(render_finished) = self.render_finished.get(image_index as usize).cloned() else {
            engine_bail!("ember3d::FrameScheduler", "No present semaphore for image {}", image_index);
        };
        let image_available = Arc::clone(frame.image_available());
        let point = graph.execute(
            &[image_available],
            &[PipelineStages::COLOR_ATTACHMENT_OUTPUT],
            &[Arc::clone(&render_finished)],
        )?;
        frame.mark_submitted(point);

        let present = self.swapchain.present(image_index, &[render_finished])?;
        frame.mark_presented();
        let mut status = if frame.was_suboptimal() { FrameStatus::NeedsRebuild } else { FrameStatus::Ready };
        match present {
            PresentStatus::Presented => {}
            PresentStatus::Suboptimal | PresentStatus::OutOfDate => {
                engine_warn!("ember3d::FrameScheduler", "Present reported {:?}", present);
                status = FrameStatus::NeedsRebuild;
            }
        }

        self.frame_number += 1;
        self.current = (self.current + 1) % self.frames.len();
        self.wait_for_slot(self.current, graph)?;
        graph.tick()?;

        Ok(status)
    }

    /// Swap in a recreated swapchain
    ///
    /// Waits for every in-flight frame first. The new images start `Undefined`.
    pub fn rebuild(&mut self, swapchain: Box<dyn Swapchain>, graph: &mut RenderGraph) -> Result<()> {
        if matches!(self.frames[self.current].state(), FrameState::Acquired | FrameState::Recording) {
            engine_bail_misuse!("ember3d::FrameScheduler", "rebuild() between begin_rendering() and end_rendering()");
        }
        self.wait_idle(graph)?;

        self.images = track_images(swapchain.as_ref())?;
        self.render_finished = create_semaphores(self.context.device().as_ref(), self.images.len())?;
        self.swapchain = swapchain;
        for frame in &mut self.frames {
            frame.reset();
        }

        let (width, height) = self.swapchain.extent();
        engine_debug!("ember3d::FrameScheduler", "Swapchain rebuilt: {} image(s), {}x{}",
            self.images.len(), width, height);
        Ok(())
    }

    /// Wait for all frames in flight, then reclaim what they held
    pub fn wait_idle(&mut self, graph: &mut RenderGraph) -> Result<()> {
        for slot in 0..self.frames.len() {
            self.wait_for_slot(slot, graph)?;
        }
        graph.tick()?;
        Ok(())
    }

    /// Drain all GPU work before the swapchain and graph go away
    pub fn shutdown(&mut self, graph: &mut RenderGraph) -> Result<()> {
        self.wait_idle(graph)?;
        self.context.device().wait_idle()
    }

    fn wait_for_slot(&mut self, slot: usize, graph: &RenderGraph) -> Result<()> {
        let Some(point) = self.frames[slot].take_submission() else {
            return Ok(());
        };
        if graph.command_buffers().is_complete(point) {
            return Ok(());
        }
        if !graph.command_buffers().wait(point, u64::MAX)? {
            engine_bail!("ember3d::FrameScheduler", "Fence wait for frame slot {} timed out", slot);
        }
        Ok(())
    }
}

fn create_semaphores(device: &dyn GraphicsDevice, count: usize) -> Result<Vec<Arc<dyn Semaphore>>> {
    (0..count).map(|_| device.create_semaphore()).collect()
}

fn track_images(swapchain: &dyn Swapchain) -> Result<Vec<Arc<TrackedImage>>> {
    (0..swapchain.image_count())
        .map(|index| {
            swapchain.image(index)
                .map(|texture| Arc::new(TrackedImage::new(texture)))
                .ok_or_else(|| Error::InitializationFailed(format!("Swapchain image {} is missing", index)))
        })
        .collect()
}

#[cfg(test)]
#[path = "frame_scheduler_tests.rs"]
mod tests;
