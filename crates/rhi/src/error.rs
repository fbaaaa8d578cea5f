//! RHI-specific error types.
//!
//! Fatal conditions carry the stage that failed (acquire, submit, present,
//! create) so diagnostics identify where the loop broke. Recoverable
//! swapchain staleness is not an error at all; see the outcome enums in
//! [`crate::swapchain`].

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    Surface(String),

    /// Swapchain creation error
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// Image acquisition failed with a non-recoverable result
    #[error("Image acquisition failed: {0}")]
    Acquire(ash::vk::Result),

    /// Queue submission failed
    #[error("Queue submission failed: {0}")]
    Submit(ash::vk::Result),

    /// Presentation failed with a non-recoverable result
    #[error("Presentation failed: {0}")]
    Present(ash::vk::Result),

    /// A per-frame resource list did not match the frame-slot count
    #[error("Descriptor binding mismatch: expected {expected} per-frame resources, got {actual}")]
    DescriptorMismatch { expected: usize, actual: usize },

    /// Descriptor pool budget exhausted
    #[error("Descriptor pool exhausted: {allocated} of {max_sets} sets allocated, {requested} requested")]
    PoolExhausted {
        allocated: u32,
        max_sets: u32,
        requested: u32,
    },

    /// Buffer creation or mapping error
    #[error("Buffer error: {0}")]
    Buffer(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
