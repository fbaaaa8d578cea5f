//! Frame loop orchestration.
//!
//! This module provides the main [`Renderer`] struct that coordinates the
//! swapchain, synchronization objects, command buffers, and resource
//! registry, and runs the acquire/submit/present protocol.
//!
//! # Frame protocol
//!
//! ```text
//! begin_frame:
//!   1. Wait on the current slot's fence (GPU done with this slot)
//!   2. Acquire a swapchain image, signaling the slot's
//!      "image available" semaphore
//!   3. Reset the fence, reset and begin the slot's command buffer
//! ... recording calls against the returned FrameHandle ...
//! end_frame:
//!   4. Submit, waiting on the slot's "image available" semaphore and
//!      signaling the acquired image's "render finished" semaphore,
//!      fenced by the slot's fence
//!   5. Present, waiting on that same per-image semaphore
//!   6. Advance the frame slot
//! ```
//!
//! The wait semaphore at submission and the signal semaphore at
//! acquisition are the same per-slot object; the signal semaphore at
//! submission and the wait semaphore at presentation are the same
//! per-image object. The two index spaces must never be mixed.
//!
//! An out-of-date surface at acquisition abandons the frame (no partial
//! recording), recreates the swapchain, and returns `None`; the caller
//! retries on the next loop iteration.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use frameloop_core::RendererConfig;
use frameloop_platform::{Surface, Window};
use frameloop_rhi::command::{CommandBuffer, CommandPool};
use frameloop_rhi::descriptor::FrameDescriptorSets;
use frameloop_rhi::device::Device;
use frameloop_rhi::framebuffer::Framebuffer;
use frameloop_rhi::instance::Instance;
use frameloop_rhi::physical_device::select_physical_device;
use frameloop_rhi::render_pass::RenderPass;
use frameloop_rhi::swapchain::{AcquireOutcome, Swapchain};
use frameloop_rhi::sync::SyncObjects;
use frameloop_rhi::{RhiError, RhiResult};

use crate::frame::{FrameCounter, FrameHandle};
use crate::resources::ResourceManager;

/// Registry name of the per-swapchain-image framebuffer set.
pub const SWAPCHAIN_FRAMEBUFFERS: &str = "swapchain";

/// Vertex count of the fallback draw issued when no geometry is
/// registered (a full-screen-capable triangle the pipeline may synthesize
/// from the vertex index).
const FALLBACK_VERTEX_COUNT: u32 = 3;

/// Supplies the pipeline bound at draw time.
///
/// Shader compilation and pipeline construction live outside this crate;
/// the renderer binds whatever handles the provider currently exposes.
pub trait PipelineProvider {
    /// The graphics pipeline to bind.
    fn pipeline(&self) -> vk::Pipeline;
    /// The layout the pipeline was created with, used for descriptor
    /// binding.
    fn layout(&self) -> vk::PipelineLayout;
}

/// Records overlay draw calls into an open render pass.
///
/// Called once per frame with the frame's command buffer if an overlay is
/// installed.
pub trait UiOverlay {
    /// Appends the overlay's draw commands. The command buffer is inside
    /// an active render pass targeting the presented image.
    fn record(&mut self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D);
}

/// How `draw_geometry` will traverse the registry.
#[derive(Debug, PartialEq, Eq)]
enum GeometryDrawPlan {
    /// Registry empty: issue exactly one non-indexed fallback draw.
    Fallback,
    /// Issue one indexed draw per registered geometry.
    Indexed(usize),
}

fn plan_geometry_draws(geometry_count: usize) -> GeometryDrawPlan {
    if geometry_count == 0 {
        GeometryDrawPlan::Fallback
    } else {
        GeometryDrawPlan::Indexed(geometry_count)
    }
}

/// Main renderer owning the frame lifecycle and all GPU objects.
///
/// # Resource Destruction Order
///
/// GPU objects are destroyed in reverse dependency order:
/// 1. Wait for all GPU work to complete
/// 2. Registry resources (buffers, framebuffers)
/// 3. Sync objects and command pool
/// 4. Render pass, then swapchain
/// 5. Device, then surface, then instance
///
/// `ManuallyDrop` enforces the ordering explicitly in `Drop`.
pub struct Renderer {
    // Core Vulkan objects (dropped in reverse declaration order via Drop)
    instance: ManuallyDrop<Instance>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    render_pass: ManuallyDrop<RenderPass>,

    // Per-frame machinery
    command_pool: ManuallyDrop<CommandPool>,
    command_buffers: Vec<CommandBuffer>,
    sync: ManuallyDrop<SyncObjects>,

    // Named resources (framebuffers live here too)
    resources: ManuallyDrop<ResourceManager>,

    // Frame state
    frames: FrameCounter,
    frame_open: bool,
    pending_resize: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Creates a renderer for the given window.
    ///
    /// # Arguments
    ///
    /// * `window` - The window to render to
    /// * `config` - Startup configuration (frames in flight, vsync,
    ///   validation)
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object creation fails, including
    /// when no GPU resolves both a graphics and a present queue family.
    pub fn new(window: &Window, config: &RendererConfig) -> RhiResult<Self> {
        let (width, height) = window.framebuffer_size();
        let frame_count = config.frames_in_flight;

        info!(
            "Initializing renderer ({}x{}, {} frames in flight)",
            width, height, frame_count
        );

        let instance = Instance::new(config.validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::Surface(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            config.vsync,
        )?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;

        // One command buffer per frame slot, all from one graphics pool
        let graphics_family = device.queue_families().graphics_family.unwrap();
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate_per_frame(frame_count)?;

        // Fences and acquire semaphores per slot, render-finished
        // semaphores per swapchain image
        let sync = SyncObjects::new(device.clone(), frame_count, swapchain.image_count())?;

        let mut resources = ResourceManager::new(device.clone(), frame_count);
        let framebuffers = Framebuffer::for_swapchain(&device, &render_pass, &swapchain)?;
        resources.insert_framebuffers(SWAPCHAIN_FRAMEBUFFERS, framebuffers);

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            frame_count
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            render_pass: ManuallyDrop::new(render_pass),
            command_pool: ManuallyDrop::new(command_pool),
            command_buffers,
            sync: ManuallyDrop::new(sync),
            resources: ManuallyDrop::new(resources),
            frames: FrameCounter::new(frame_count),
            frame_open: false,
            pending_resize: false,
            width,
            height,
        })
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The swapchain is rebuilt lazily on the next frame boundary. Zero
    /// sizes (minimized window) are remembered but recreation is deferred
    /// until a non-zero size arrives.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width != self.width || height != self.height {
            debug!(
                "Resize noted: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.pending_resize = true;
        }
    }

    /// Begins a frame.
    ///
    /// Blocks on the current slot's fence, then acquires a swapchain
    /// image. Returns `None` when the frame was abandoned because the
    /// surface went stale (the swapchain has been recreated; retry on the
    /// next loop iteration) or because the window currently has zero size.
    ///
    /// On success the slot's fence is reset, its command buffer reset and
    /// opened for recording, and a [`FrameHandle`] returned.
    ///
    /// # Errors
    ///
    /// Any acquisition failure other than out-of-date is fatal and
    /// surfaced as [`RhiError::Acquire`].
    pub fn begin_frame(&mut self) -> RhiResult<Option<FrameHandle>> {
        debug_assert!(!self.frame_open, "begin_frame called with a frame open");

        // Handle an externally signaled resize before acquiring
        if self.pending_resize {
            self.recreate_swapchain()?;
            if self.pending_resize {
                // Still zero-sized; nothing to render into
                return Ok(None);
            }
        }

        let slot = self.frames.slot();

        // Bounded only by the driver: a hung GPU is fatal, not retried
        self.sync.fence(slot).wait(u64::MAX)?;

        match self
            .swapchain
            .acquire(self.sync.image_available(slot).handle())?
        {
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date during acquire, recreating");
                self.recreate_swapchain()?;
                Ok(None)
            }
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    // Still usable this frame; present will trigger recreation
                    debug!("Acquired suboptimal swapchain image {}", image_index);
                }

                // Only reset the fence once we know work will be submitted
                self.sync.fence(slot).reset()?;

                let command_buffer = &self.command_buffers[slot];
                command_buffer.reset()?;
                command_buffer.begin()?;

                self.frame_open = true;

                Ok(Some(FrameHandle {
                    frame_slot: slot,
                    image_index,
                    command_buffer: command_buffer.handle(),
                }))
            }
        }
    }

    /// Ends a frame: submit, present, advance the slot.
    ///
    /// Submission waits on the slot's "image available" semaphore at the
    /// color-attachment-output stage and signals the acquired image's
    /// "render finished" semaphore; presentation waits on that same
    /// per-image semaphore. If presentation reports the surface stale, or
    /// a resize is pending, the swapchain is recreated after the present.
    ///
    /// # Errors
    ///
    /// Submission and presentation failures other than the recoverable
    /// staleness results are fatal.
    pub fn end_frame(&mut self, frame: FrameHandle) -> RhiResult<()> {
        debug_assert!(self.frame_open, "end_frame called without an open frame");
        self.frame_open = false;

        let slot = frame.frame_slot;
        self.command_buffers[slot].end()?;

        let wait_semaphores = [self.sync.image_available(slot).handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished(frame.image_index as usize).handle()];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], self.sync.fence(slot).handle())?;
        }

        let outcome = self.swapchain.present(
            self.device.present_queue(),
            frame.image_index,
            signal_semaphores[0],
        )?;

        // The slot advances regardless of surface staleness; the frame was
        // submitted and its fence will signal
        self.frames.advance();

        if outcome.needs_recreate() || self.pending_resize {
            debug!("Recreating swapchain after present ({:?})", outcome);
            self.recreate_swapchain()?;
        }

        Ok(())
    }

    /// Recreates the swapchain and everything sized to its image count.
    ///
    /// Waits for the device to go fully idle, rebuilds the swapchain at
    /// the last known window size, replaces the per-image framebuffers,
    /// and reallocates the sync objects (the render-finished semaphore
    /// count must track the new image count). Safe to call again with no
    /// size change; the result is an equivalent swapchain.
    ///
    /// Deferred while the window reports zero size; the resize stays
    /// pending until a usable size arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if any rebuild step fails.
    pub fn recreate_swapchain(&mut self) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            debug!("Deferring swapchain recreation: window has zero size");
            self.pending_resize = true;
            return Ok(());
        }

        self.device.wait_idle()?;

        // Old framebuffers reference image views about to be destroyed
        self.resources.remove_framebuffers(SWAPCHAIN_FRAMEBUFFERS);

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;

        let framebuffers =
            Framebuffer::for_swapchain(&self.device, &self.render_pass, &self.swapchain)?;
        self.resources
            .insert_framebuffers(SWAPCHAIN_FRAMEBUFFERS, framebuffers);

        // Old semaphores are destroyed before the new set is allocated, so
        // an abandoned frame cannot leak a stale signal into the new chain
        self.sync.recreate(self.swapchain.image_count())?;
        debug_assert_eq!(self.sync.image_count(), self.swapchain.image_count());

        self.pending_resize = false;

        info!(
            "Swapchain recreated: {}x{}, {} images",
            self.width,
            self.height,
            self.swapchain.image_count()
        );

        Ok(())
    }

    // =========================================================================
    // Recording calls (valid between begin_frame and end_frame)
    // =========================================================================

    /// Begins the render pass targeting the acquired image's framebuffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the swapchain framebuffer set is missing from
    /// the registry.
    pub fn begin_render_pass(&self, frame: FrameHandle, clear_color: [f32; 4]) -> RhiResult<()> {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        let framebuffers = self
            .resources
            .framebuffers(SWAPCHAIN_FRAMEBUFFERS)
            .ok_or_else(|| {
                RhiError::Swapchain("Swapchain framebuffers are not registered".to_string())
            })?;
        let framebuffer = &framebuffers[frame.image_index as usize];

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: clear_color,
            },
        }];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.swapchain.extent(),
            })
            .clear_values(&clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                frame.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(())
    }

    /// Ends the render pass.
    pub fn end_render_pass(&self, frame: FrameHandle) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        unsafe {
            self.device.handle().cmd_end_render_pass(frame.command_buffer);
        }
    }

    /// Binds the provider's graphics pipeline.
    pub fn bind_pipeline(&self, frame: FrameHandle, provider: &dyn PipelineProvider) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        unsafe {
            self.device.handle().cmd_bind_pipeline(
                frame.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                provider.pipeline(),
            );
        }
    }

    /// Binds the frame slot's descriptor set at set index 0.
    ///
    /// The set for `frame.frame_slot` is selected so the draw reads the
    /// resources written for this slot, not another in-flight frame's.
    pub fn bind_descriptor_set(
        &self,
        frame: FrameHandle,
        layout: vk::PipelineLayout,
        sets: &FrameDescriptorSets,
    ) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        let descriptor_sets = [sets.set(frame.frame_slot)];
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                frame.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &descriptor_sets,
                &[],
            );
        }
    }

    /// Sets the viewport and scissor to cover the full swapchain extent.
    pub fn set_viewport_and_scissor(&self, frame: FrameHandle) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        let extent = self.swapchain.extent();

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(frame.command_buffer, 0, &[viewport]);
            self.device
                .handle()
                .cmd_set_scissor(frame.command_buffer, 0, &[scissor]);
        }
    }

    /// Draws every registered geometry, or the fallback triangle.
    ///
    /// For each registered vertex/index buffer pair, binds the pair and
    /// issues one indexed draw with its current index count. With an
    /// empty registry, issues exactly one non-indexed 3-vertex draw so an
    /// empty scene still produces observable output.
    pub fn draw_geometry(&self, frame: FrameHandle) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        let cmd = frame.command_buffer;

        match plan_geometry_draws(self.resources.geometry_count()) {
            GeometryDrawPlan::Fallback => unsafe {
                self.device
                    .handle()
                    .cmd_draw(cmd, FALLBACK_VERTEX_COUNT, 1, 0, 0);
            },
            GeometryDrawPlan::Indexed(_) => {
                for (_, geometry) in self.resources.geometries() {
                    unsafe {
                        self.device.handle().cmd_bind_vertex_buffers(
                            cmd,
                            0,
                            &[geometry.vertex_buffer().handle()],
                            &[0],
                        );
                        self.device.handle().cmd_bind_index_buffer(
                            cmd,
                            geometry.index_buffer().handle(),
                            0,
                            vk::IndexType::UINT32,
                        );
                        self.device.handle().cmd_draw_indexed(
                            cmd,
                            geometry.index_count(),
                            1,
                            0,
                            0,
                            0,
                        );
                    }
                }
            }
        }
    }

    /// Lets the overlay append its draw calls, if one is installed.
    ///
    /// Must be called inside an open render pass.
    pub fn draw_ui(&self, frame: FrameHandle, overlay: Option<&mut dyn UiOverlay>) {
        debug_assert!(self.frame_open, "recording call outside begin/end frame");

        if let Some(overlay) = overlay {
            overlay.record(frame.command_buffer, self.swapchain.extent());
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The current swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// The swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// The render pass the frame records into.
    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Number of frame slots.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    /// Number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// The resource registry.
    #[inline]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// The resource registry, mutably.
    ///
    /// Resources must only be mutated between frames; the per-slot
    /// uniform scheme covers the one case (uniform updates) that happens
    /// while earlier frames are still in flight.
    #[inline]
    pub fn resources_mut(&mut self) -> &mut ResourceManager {
        &mut self.resources
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Drain all in-flight work before destroying anything
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {:?}", e);
        }

        // Command buffers are freed with their pool
        self.command_buffers.clear();

        unsafe {
            ManuallyDrop::drop(&mut self.resources);
            ManuallyDrop::drop(&mut self.sync);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.render_pass);
            ManuallyDrop::drop(&mut self.swapchain);
            // Last Arc owned here: the device is destroyed before the
            // surface and instance it was created from
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_uses_fallback() {
        assert_eq!(plan_geometry_draws(0), GeometryDrawPlan::Fallback);
    }

    #[test]
    fn test_registered_geometry_uses_indexed_draws() {
        assert_eq!(plan_geometry_draws(1), GeometryDrawPlan::Indexed(1));
        assert_eq!(plan_geometry_draws(5), GeometryDrawPlan::Indexed(5));
    }

    #[test]
    fn test_fallback_vertex_count() {
        assert_eq!(FALLBACK_VERTEX_COUNT, 3);
    }
}
