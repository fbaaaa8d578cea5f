//! Framebuffer management.
//!
//! One framebuffer per swapchain image, binding that image's view as the
//! render pass's color attachment. Framebuffers are sized to the swapchain
//! extent and reference its image views, so the whole set is destroyed and
//! rebuilt on every swapchain recreation.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::RenderPass;
use crate::swapchain::Swapchain;

/// Vulkan framebuffer wrapper.
pub struct Framebuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan framebuffer handle.
    framebuffer: vk::Framebuffer,
    /// Extent the framebuffer was created with.
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Creates a framebuffer for a single color attachment view.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `render_pass` - The render pass this framebuffer must be compatible with
    /// * `attachment` - The image view to bind as color attachment 0
    /// * `extent` - Width and height of the attachment
    ///
    /// # Errors
    ///
    /// Returns an error if framebuffer creation fails.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let attachments = [attachment];

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .handle()
                .create_framebuffer(&create_info, None)
                .map_err(|e| {
                    RhiError::Swapchain(format!("Failed to create framebuffer: {:?}", e))
                })?
        };

        Ok(Self {
            device,
            framebuffer,
            extent,
        })
    }

    /// Creates one framebuffer per swapchain image.
    ///
    /// The returned vector's length equals the swapchain's image count and
    /// index `i` corresponds to swapchain image `i`.
    ///
    /// # Errors
    ///
    /// Returns an error if any framebuffer creation fails.
    pub fn for_swapchain(
        device: &Arc<Device>,
        render_pass: &RenderPass,
        swapchain: &Swapchain,
    ) -> RhiResult<Vec<Self>> {
        let extent = swapchain.extent();
        let mut framebuffers = Vec::with_capacity(swapchain.image_count());

        for index in 0..swapchain.image_count() {
            framebuffers.push(Self::new(
                device.clone(),
                render_pass,
                swapchain.image_view(index),
                extent,
            )?);
        }

        debug!(
            "Created {} framebuffer(s) at {}x{}",
            framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(framebuffers)
    }

    /// Returns the Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Returns the extent the framebuffer was created with.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_framebuffer(self.framebuffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Framebuffer>();
    }
}
