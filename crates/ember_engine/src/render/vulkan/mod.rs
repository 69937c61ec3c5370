//! Vulkan backend primitives
//!
//! RAII wrappers over the raw API: each type's constructor fully establishes
//! its invariant or fails, and destruction releases resources in reverse
//! creation order.

use ash::vk;
use thiserror::Error;

pub mod buffer;
pub mod commands;
pub mod device;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::{GeometryBuffer, StaticGeometry};
pub use commands::{CommandBufferSet, CommandPool, CommandRecorder};
pub use device::{AdapterCandidate, ExecutionContext, QueueFamilySelection};
pub use frame::{AcquireOutcome, FrameScheduler, PresentOutcome};
pub use instance::VulkanInstance;
pub use pipeline::PipelineState;
pub use shader::{ShaderCatalog, ShaderModule};
pub use swapchain::SwapchainState;
pub use sync::{Fence, FrameSync, Semaphore, SlotState, SlotTracker};

/// Errors produced by the Vulkan backend
///
/// Setup errors (`NoSuitableDevice`, `DeviceCreation`, `PipelineCreation`,
/// `ShaderLoad`, `NoSuitableMemoryType`) are fatal and abort initialization.
/// Transient presentation conditions (out-of-date swapchain, zero-size
/// framebuffer) are recovered internally and never surfaced as errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No GPU passed adapter filtering
    #[error("no suitable GPU adapter found")]
    NoSuitableDevice,

    /// Logical device creation rejected by the driver
    #[error("logical device creation failed: {0:?}")]
    DeviceCreation(vk::Result),

    /// Shader module, layout, or pipeline creation rejected
    #[error("pipeline creation failed: {0:?}")]
    PipelineCreation(vk::Result),

    /// Shader bytecode missing or malformed
    #[error("failed to load shader {path}: {reason}")]
    ShaderLoad {
        /// Path of the offending shader file
        path: String,
        /// What went wrong
        reason: String,
    },

    /// No memory type satisfies both the type filter and the property flags
    #[error("no suitable memory type for buffer allocation")]
    NoSuitableMemoryType,

    /// Anything else that prevents the backend from coming up
    #[error("initialization failed: {0}")]
    Initialization(String),
}

/// Result type for Vulkan backend operations
pub type RenderResult<T> = Result<T, RenderError>;
