//! Per-frame scheduling: fence waits, image acquisition, submit, present
//!
//! One `FrameSync` set per in-flight slot. `acquire` blocks on the slot's
//! fence, so at most N frames are ever submitted-but-unretired; staleness
//! reported by the presentation engine is returned to the caller, which owns
//! the rebuild policy.

use ash::vk;

use super::{ExecutionContext, FrameSync, RenderError, RenderResult, SlotTracker, SwapchainState};

/// Result of trying to acquire a swapchain image
pub enum AcquireOutcome {
    /// An image is ready; submit the command buffer recorded for this index
    Image(u32),
    /// The chain is stale; rebuild and drop this frame
    OutOfDate,
}

/// Result of submitting and presenting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Frame presented and the chain still matches the surface
    Presented,
    /// Presented (or attempted), but the chain should be rebuilt
    Stale,
}

/// Owns the per-slot sync objects and drives the submit/present protocol
pub struct FrameScheduler {
    frames: Vec<FrameSync>,
    tracker: SlotTracker,
}

impl FrameScheduler {
    /// Create sync objects for `frames_in_flight` slots
    pub fn new(context: &ExecutionContext, frames_in_flight: usize) -> RenderResult<Self> {
        let mut frames = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            frames.push(FrameSync::new(context.device.clone())?);
        }

        Ok(Self {
            frames,
            tracker: SlotTracker::new(frames_in_flight),
        })
    }

    /// Configured number of frames in flight
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Wait for the current slot to retire, then acquire the next image
    ///
    /// The fence wait uses the maximum timeout: the original design waits
    /// until completion with no device-lost path.
    pub fn acquire(
        &mut self,
        context: &ExecutionContext,
        swapchain: &SwapchainState,
    ) -> RenderResult<AcquireOutcome> {
        let slot = &self.frames[self.tracker.current()];
        slot.in_flight.wait(u64::MAX)?;
        self.tracker.mark_retired();

        let acquired = unsafe {
            context.swapchain_loader.acquire_next_image(
                swapchain.handle(),
                u64::MAX,
                slot.image_available.handle(),
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((image_index, _suboptimal)) => Ok(AcquireOutcome::Image(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("swapchain out of date at acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(RenderError::Api(e)),
        }
    }

    /// Submit the image's pre-recorded commands and request presentation
    ///
    /// The submission waits on the slot's image-available semaphore at the
    /// color-attachment-output stage and signals its render-finished
    /// semaphore plus fence; presentation waits on render-finished.
    pub fn submit_and_present(
        &mut self,
        context: &ExecutionContext,
        swapchain: &SwapchainState,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> RenderResult<PresentOutcome> {
        let slot = &self.frames[self.tracker.current()];

        // Reset only once we are certain to submit; a dropped frame must
        // leave the fence signaled.
        slot.in_flight.reset()?;
        self.tracker.mark_submitted();

        let wait_semaphores = [slot.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [slot.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            context
                .device
                .queue_submit(
                    context.graphics_queue,
                    &[submit_info.build()],
                    slot.in_flight.handle(),
                )
                .map_err(RenderError::Api)?;
        }

        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            context
                .swapchain_loader
                .queue_present(context.present_queue, &present_info)
        };

        match presented {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                log::debug!("swapchain suboptimal at present");
                Ok(PresentOutcome::Stale)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("swapchain out of date at present");
                Ok(PresentOutcome::Stale)
            }
            Err(e) => Err(RenderError::Api(e)),
        }
    }

    /// Drain the present queue and advance to the next slot
    pub fn end_frame(&mut self, context: &ExecutionContext) -> RenderResult<()> {
        unsafe {
            context
                .device
                .queue_wait_idle(context.present_queue)
                .map_err(RenderError::Api)?;
        }
        self.tracker.advance();
        Ok(())
    }
}
