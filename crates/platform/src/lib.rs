//! Platform layer: window and surface management.
//!
//! This crate wraps winit window creation and Vulkan surface creation. It
//! is the only place the renderer reads the current framebuffer size from,
//! which matters during swapchain recreation (a minimized window reports a
//! zero size and recreation must be deferred until the size is non-zero).

mod window;

pub use window::{Surface, Window};
