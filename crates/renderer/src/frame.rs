//! Frame context and slot bookkeeping.
//!
//! The current frame slot is mutable state owned exclusively by the
//! renderer; nothing reads it globally. Every recording call instead takes
//! an explicit [`FrameHandle`] carrying the slot and image context for the
//! frame it belongs to.

use ash::vk;

/// Context for one frame between `begin_frame` and `end_frame`.
///
/// Carries the frame slot whose fence/semaphore/command buffer are in use,
/// the swapchain image index acquisition returned, and the open command
/// buffer. The two indices are distinct on purpose: the image index is not
/// guaranteed to equal the frame slot.
#[derive(Clone, Copy, Debug)]
pub struct FrameHandle {
    /// The frame slot this frame occupies (0..frames_in_flight).
    pub frame_slot: usize,
    /// The swapchain image acquired for this frame.
    pub image_index: u32,
    /// The slot's command buffer, open for recording.
    pub command_buffer: vk::CommandBuffer,
}

/// Round-robin frame slot counter.
///
/// Owned by the renderer; advanced once per presented frame.
#[derive(Debug)]
pub struct FrameCounter {
    slot: usize,
    frame_count: usize,
}

impl FrameCounter {
    /// Creates a counter cycling through `frame_count` slots.
    ///
    /// # Panics
    ///
    /// Panics if `frame_count` is zero.
    pub fn new(frame_count: usize) -> Self {
        assert!(frame_count > 0, "frame_count must be at least 1");
        Self {
            slot: 0,
            frame_count,
        }
    }

    /// The current frame slot.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The number of slots in the cycle.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Advances to the next slot, wrapping modulo the slot count.
    pub fn advance(&mut self) {
        self.slot = (self.slot + 1) % self.frame_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_slot_cycle() {
        let mut counter = FrameCounter::new(2);

        // Five frames yield the slot sequence 0,1,0,1,0
        let mut sequence = Vec::new();
        for _ in 0..5 {
            sequence.push(counter.slot());
            counter.advance();
        }
        assert_eq!(sequence, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_three_slot_cycle() {
        let mut counter = FrameCounter::new(3);

        let mut sequence = Vec::new();
        for _ in 0..7 {
            sequence.push(counter.slot());
            counter.advance();
        }
        assert_eq!(sequence, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_single_slot() {
        let mut counter = FrameCounter::new(1);
        assert_eq!(counter.slot(), 0);
        counter.advance();
        assert_eq!(counter.slot(), 0);
    }

    #[test]
    #[should_panic(expected = "frame_count must be at least 1")]
    fn test_zero_slots_rejected() {
        FrameCounter::new(0);
    }

    #[test]
    fn test_frame_handle_is_copy() {
        fn assert_copy<T: Copy>() {}
        assert_copy::<FrameHandle>();
    }
}
