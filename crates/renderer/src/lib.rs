//! Frame orchestration.
//!
//! This crate drives the render loop: acquiring a presentable image,
//! recording and submitting GPU work against it, and presenting it, while
//! guaranteeing host and device never race on shared buffers and that the
//! swapchain can be rebuilt transparently on resize or surface
//! invalidation.

pub mod frame;
pub mod renderer;
pub mod resources;
pub mod uniforms;

pub use frame::{FrameCounter, FrameHandle};
pub use renderer::{PipelineProvider, Renderer, SWAPCHAIN_FRAMEBUFFERS, UiOverlay};
pub use resources::{Geometry, ResourceManager};
pub use uniforms::FrameUniforms;
