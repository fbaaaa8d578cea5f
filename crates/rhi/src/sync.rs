//! Synchronization primitives for the frame loop.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - GPU-to-GPU synchronization (between queue operations)
//! - [`Fence`] - GPU-to-CPU synchronization (for host waiting)
//! - [`SyncObjects`] - the full set of primitives the frame loop consults
//!
//! # Two different counts
//!
//! [`SyncObjects`] holds two families of semaphores with deliberately
//! different sizes:
//!
//! - **Per frame slot** (`frame_count`): one fence and one "image
//!   available" semaphore each. The fence gates host-side reuse of the
//!   slot; the semaphore links acquisition to that slot's submission.
//! - **Per swapchain image** (`image_count`): one "render finished"
//!   semaphore each. The image index returned by acquisition is not
//!   guaranteed to equal the frame-slot index, so the semaphore that
//!   presentation waits on must be keyed by image, not by slot. Conflating
//!   the two is the classic synchronization bug in this design.
//!
//! The per-image set must be reallocated on every swapchain recreation
//! because the image count may change; see [`SyncObjects::recreate`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use frameloop_rhi::device::Device;
//! use frameloop_rhi::sync::SyncObjects;
//!
//! # fn example(device: Arc<Device>) -> Result<(), frameloop_rhi::RhiError> {
//! // 2 frame slots, 3 swapchain images
//! let sync = SyncObjects::new(device, 2, 3)?;
//!
//! // Wait for slot 0's previous work, then acquire with its semaphore
//! sync.fence(0).wait(u64::MAX)?;
//! sync.fence(0).reset()?;
//! let acquire_semaphore = sync.image_available(0).handle();
//!
//! // After acquisition returned image index 1:
//! let present_semaphore = sync.render_finished(1).handle();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan semaphore wrapper.
///
/// Semaphores are used for GPU-to-GPU synchronization between queue
/// operations; the host never waits on them.
///
/// # Thread Safety
///
/// The semaphore is immutable after creation and can be safely shared
/// between threads.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Fences are used for GPU-to-CPU synchronization, allowing the host to
/// wait for GPU operations to complete. The frame loop uses one per frame
/// slot to know when a slot's previous submission has fully retired.
pub struct Fence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, creates the fence in the signaled state.
    ///   Per-slot fences start signaled so the first frame's wait is a
    ///   no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// This function blocks until the fence is signaled or the timeout
    /// expires. The frame loop passes `u64::MAX`: a genuinely hung GPU is
    /// not a condition this layer recovers from.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for an
    ///   effectively unbounded wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or fails.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be in use by any queue operation when this is
    /// called.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Checks if the fence is currently signaled.
    ///
    /// This is a non-blocking operation that returns immediately.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// The full set of synchronization primitives the frame loop consults.
///
/// A pure resource holder: no mutable operations beyond lifetime. The
/// renderer indexes into it with a frame slot or image index depending on
/// which family it needs.
pub struct SyncObjects {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Per-slot fences, created signaled so the first wait is a no-op.
    in_flight_fences: Vec<Fence>,
    /// Per-slot semaphores signaled when an acquired image is available.
    image_available: Vec<Semaphore>,
    /// Per-image semaphores signaled when rendering into that image
    /// finished; presentation of the image waits on its semaphore.
    render_finished: Vec<Semaphore>,
}

impl SyncObjects {
    /// Allocates synchronization objects for the given slot and image
    /// counts.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `frame_count` - Number of frame slots (fences and acquire semaphores)
    /// * `image_count` - Current swapchain image count (render-finished
    ///   semaphores)
    ///
    /// # Errors
    ///
    /// Returns an error if any primitive creation fails.
    pub fn new(device: Arc<Device>, frame_count: usize, image_count: usize) -> RhiResult<Self> {
        let mut sync = Self {
            device,
            in_flight_fences: Vec::new(),
            image_available: Vec::new(),
            render_finished: Vec::new(),
        };
        sync.allocate(frame_count, image_count)?;
        debug_assert_eq!(sync.render_finished.len(), image_count);

        info!(
            "Sync objects created: {} frame slot(s), {} swapchain image(s)",
            frame_count, image_count
        );

        Ok(sync)
    }

    /// Destroys and reallocates every primitive for a new image count.
    ///
    /// Called alongside swapchain recreation. The old objects are fully
    /// destroyed before any new ones are allocated, so an abandoned
    /// frame's semaphores cannot leak a stale signal into the new
    /// swapchain's frames. The caller must have drained the device
    /// (recreation waits for device idle) before calling this.
    ///
    /// # Arguments
    ///
    /// * `image_count` - The new swapchain image count
    ///
    /// # Errors
    ///
    /// Returns an error if any primitive creation fails.
    pub fn recreate(&mut self, image_count: usize) -> RhiResult<()> {
        let frame_count = self.in_flight_fences.len();

        // Drop old primitives first
        self.in_flight_fences.clear();
        self.image_available.clear();
        self.render_finished.clear();

        self.allocate(frame_count, image_count)?;
        debug_assert_eq!(self.render_finished.len(), image_count);

        debug!(
            "Sync objects recreated for {} swapchain image(s)",
            image_count
        );

        Ok(())
    }

    fn allocate(&mut self, frame_count: usize, image_count: usize) -> RhiResult<()> {
        self.in_flight_fences.reserve(frame_count);
        self.image_available.reserve(frame_count);
        self.render_finished.reserve(image_count);

        for _ in 0..frame_count {
            // Signaled so the first frame's wait returns immediately
            self.in_flight_fences
                .push(Fence::new(self.device.clone(), true)?);
            self.image_available.push(Semaphore::new(self.device.clone())?);
        }

        for _ in 0..image_count {
            self.render_finished.push(Semaphore::new(self.device.clone())?);
        }

        Ok(())
    }

    /// Returns the fence for a frame slot.
    ///
    /// # Panics
    ///
    /// Panics if `frame_slot` is out of bounds.
    #[inline]
    pub fn fence(&self, frame_slot: usize) -> &Fence {
        &self.in_flight_fences[frame_slot]
    }

    /// Returns the "image available" semaphore for a frame slot.
    ///
    /// This semaphore is signaled by acquisition and waited on by that
    /// slot's submission.
    ///
    /// # Panics
    ///
    /// Panics if `frame_slot` is out of bounds.
    #[inline]
    pub fn image_available(&self, frame_slot: usize) -> &Semaphore {
        &self.image_available[frame_slot]
    }

    /// Returns the "render finished" semaphore for a swapchain image.
    ///
    /// This semaphore is signaled by the submission that rendered into the
    /// image and waited on by its presentation.
    ///
    /// # Panics
    ///
    /// Panics if `image_index` is out of bounds.
    #[inline]
    pub fn render_finished(&self, image_index: usize) -> &Semaphore {
        &self.render_finished[image_index]
    }

    /// Number of frame slots these objects serve.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.in_flight_fences.len()
    }

    /// Number of swapchain images these objects serve.
    ///
    /// Always equals the render-finished semaphore count; the invariant is
    /// that this tracks the live swapchain's image count.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.render_finished.len()
    }

    /// Waits for every in-flight fence.
    ///
    /// Weaker than a device-idle wait (presentation engine work is not
    /// covered) but sufficient to know no frame slot is still recording
    /// GPU work.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_all(&self) -> RhiResult<()> {
        let fences: Vec<vk::Fence> = self.in_flight_fences.iter().map(|f| f.handle()).collect();

        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
    }

    #[test]
    fn test_fence_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Fence>();
    }

    #[test]
    fn test_sync_objects_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncObjects>();
    }
}
