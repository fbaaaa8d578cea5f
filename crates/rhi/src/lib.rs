//! Vulkan abstraction layer for the frame loop.
//!
//! This crate provides a safe abstraction over Vulkan using the `ash`
//! crate. It handles:
//! - Instance and device creation
//! - Swapchain management and recreation
//! - Command pool and per-frame command buffers
//! - Render pass and per-image framebuffers
//! - Buffer management
//! - Descriptor sets, pools, and batched writes
//! - Synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
