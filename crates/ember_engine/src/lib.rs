//! # Ember Engine
//!
//! A minimal real-time graphics backend built on Vulkan.
//!
//! The crate initializes a GPU execution context, negotiates a presentable
//! swapchain, compiles one fixed graphics pipeline from precompiled SPIR-V,
//! stages static geometry into device-local memory, and drives a fence- and
//! semaphore-synchronized per-frame submit/present loop with automatic
//! swapchain recovery on resize.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = GlfwWindow::new("demo", WindowMode::Windowed { width: 800, height: 600 })?;
//!     let config = RendererConfig::default();
//!     let vertices = [
//!         Vertex { position: [0.0, -0.5, 0.0], color: [1.0, 0.0, 0.0] },
//!         Vertex { position: [0.5, 0.5, 0.0], color: [0.0, 1.0, 0.0] },
//!         Vertex { position: [-0.5, 0.5, 0.0], color: [0.0, 0.0, 1.0] },
//!     ];
//!     let mut graphics = GraphicsContext::new(&mut window, config, &vertices, None)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         graphics.begin_frame(&mut window)?;
//!         graphics.end_frame()?;
//!     }
//!     graphics.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod render;
pub mod window;

pub use config::{ConfigError, RendererConfig};
pub use render::{GraphicsContext, RenderError, RenderResult};
pub use window::{GlfwWindow, RenderWindow, WindowError, WindowMode};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::RendererConfig,
        render::{vertex::Vertex, GraphicsContext, RenderError, RenderResult},
        window::{GlfwWindow, RenderWindow, WindowMode},
    };
}
