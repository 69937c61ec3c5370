//! Synchronization primitives and the frame slot state machine
//!
//! Semaphores order GPU queue operations (acquire → submit → present);
//! fences let the CPU observe when a submitted frame retires. [`SlotTracker`]
//! keeps the per-slot state machine honest: a slot is never resubmitted
//! before its fence signals.

use ash::{vk, Device};

use super::{RenderError, RenderResult};

/// GPU-side ordering primitive with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(device: Device) -> RenderResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-observable completion signal with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally in the signaled state
    pub fn new(device: Device, signaled: bool) -> RenderResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    pub fn wait(&self, timeout: u64) -> RenderResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(RenderError::Api)
        }
    }

    /// Reset the fence to unsignaled
    pub fn reset(&self) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(RenderError::Api)
        }
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one in-flight frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to be drawn into
    pub image_available: Semaphore,
    /// Signaled when rendering into the image finishes
    pub render_finished: Semaphore,
    /// Signaled when the slot's submitted work retires on the GPU
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the slot's sync objects; the fence starts signaled so the first
    /// wait on a fresh slot passes immediately
    pub fn new(device: Device) -> RenderResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Lifecycle of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Slot has never been used this cycle
    Idle,
    /// Work submitted, fence not yet observed signaled
    Submitted,
    /// Fence observed signaled; slot eligible for reuse
    Retired,
}

/// CPU-side bookkeeping for the frames-in-flight invariant
///
/// Mirrors the fence protocol: `mark_retired` after the fence wait,
/// `mark_submitted` after queue submission, `advance` at end of frame.
/// Submitting a slot that has not retired is a programming error and panics.
pub struct SlotTracker {
    states: Vec<SlotState>,
    cursor: usize,
}

impl SlotTracker {
    /// Track `count` slots; fences are created signaled, so slots start Retired
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "at least one frame slot is required");
        Self {
            states: vec![SlotState::Retired; count],
            cursor: 0,
        }
    }

    /// The slot the next frame will use
    pub fn current(&self) -> usize {
        self.cursor
    }

    /// Number of tracked slots
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether any slots are tracked
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Record that the current slot's fence was observed signaled
    pub fn mark_retired(&mut self) {
        self.states[self.cursor] = SlotState::Retired;
    }

    /// Record a submission on the current slot
    ///
    /// Panics if the slot is still Submitted: that means the fence wait was
    /// skipped and the slot is being reused while its work is in flight.
    pub fn mark_submitted(&mut self) {
        assert_ne!(
            self.states[self.cursor],
            SlotState::Submitted,
            "frame slot {} reused before its fence retired",
            self.cursor
        );
        self.states[self.cursor] = SlotState::Submitted;
    }

    /// Advance to the next slot, modulo the slot count
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.states.len();
    }

    /// How many slots are currently Submitted
    pub fn submitted_count(&self) -> usize {
        self.states
            .iter()
            .filter(|&&state| state == SlotState::Submitted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive one begin/end cycle the way the scheduler does
    fn run_frame(tracker: &mut SlotTracker) {
        tracker.mark_retired(); // fence wait
        tracker.mark_submitted(); // queue submit
        tracker.advance(); // end of frame
    }

    #[test]
    fn submitted_slots_never_exceed_capacity() {
        for n in 1..=3 {
            let mut tracker = SlotTracker::new(n);
            for _ in 0..n * 4 {
                run_frame(&mut tracker);
                assert!(
                    tracker.submitted_count() <= n,
                    "more than {n} frames in flight"
                );
            }
        }
    }

    #[test]
    fn tracker_reports_slot_count() {
        let tracker = SlotTracker::new(3);
        assert_eq!(tracker.len(), 3);
        assert!(!tracker.is_empty());
    }

    #[test]
    fn cursor_wraps_modulo_slot_count() {
        let mut tracker = SlotTracker::new(2);
        assert_eq!(tracker.current(), 0);
        tracker.advance();
        assert_eq!(tracker.current(), 1);
        tracker.advance();
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn dropped_frame_leaves_slot_reusable() {
        // Acquire reported the swapchain stale: fence waited, nothing
        // submitted. The slot must still be usable next time around.
        let mut tracker = SlotTracker::new(1);
        tracker.mark_retired();
        tracker.advance();

        run_frame(&mut tracker);
        assert_eq!(tracker.submitted_count(), 1);
    }

    #[test]
    #[should_panic(expected = "reused before its fence retired")]
    fn reusing_unretired_slot_panics() {
        let mut tracker = SlotTracker::new(1);
        tracker.mark_retired();
        tracker.mark_submitted();
        tracker.advance();
        // Skipping the fence wait: invariant violation
        tracker.mark_submitted();
    }

    #[test]
    #[should_panic(expected = "at least one frame slot")]
    fn zero_slots_is_rejected() {
        let _ = SlotTracker::new(0);
    }
}
