//! Rendering subsystem
//!
//! The Vulkan backend is split into low-level RAII wrappers (`vulkan`) and the
//! [`GraphicsContext`] composition root that owns them and drives the frame
//! loop.

pub mod context;
pub mod vertex;
pub mod vulkan;

pub use context::GraphicsContext;
pub use vertex::{Vertex, VertexLayout};
pub use vulkan::{RenderError, RenderResult};
