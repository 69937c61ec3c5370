//! Window management using GLFW
//!
//! The graphics core treats the window as an external collaborator: it needs a
//! native Vulkan surface, the current framebuffer size, event polling, and a
//! read-and-clear resize flag. [`RenderWindow`] captures that contract so the
//! frame loop can be exercised against test doubles; [`GlfwWindow`] is the
//! production implementation.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// Window creation was rejected by GLFW
    #[error("window creation failed")]
    CreationFailed,

    /// No monitor available for fullscreen/borderless creation
    #[error("no primary monitor available")]
    NoMonitor,

    /// Any other GLFW error
    #[error("GLFW error: {0}")]
    Glfw(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// How the window should be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Decorated window of the given size
    Windowed {
        /// Width in screen coordinates
        width: u32,
        /// Height in screen coordinates
        height: u32,
    },
    /// Fullscreen at the primary monitor's current video mode
    Borderless,
    /// Exclusive fullscreen at the given resolution
    Fullscreen {
        /// Width in screen coordinates
        width: u32,
        /// Height in screen coordinates
        height: u32,
    },
}

/// The windowing contract consumed by the frame loop
///
/// The resize flag is single-writer (the windowing system) and single-reader
/// (the frame scheduler); `consume_resized_flag` reads and clears it.
pub trait RenderWindow {
    /// Current framebuffer size in pixels; (0, 0) while minimized
    fn framebuffer_size(&self) -> (u32, u32);

    /// Pump pending window events
    fn poll_events(&mut self);

    /// Read and clear the "framebuffer was resized" flag
    fn consume_resized_flag(&mut self) -> bool;

    /// Whether the user requested the window be closed
    fn should_close(&self) -> bool;
}

/// GLFW window wrapper with proper resource management
pub struct GlfwWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
}

impl GlfwWindow {
    /// Create a window in the requested mode, configured for Vulkan
    pub fn new(title: &str, mode: WindowMode) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // No OpenGL context; Vulkan drives the surface
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let created = match mode {
            WindowMode::Windowed { width, height } => glfw
                .create_window(width, height, title, glfw::WindowMode::Windowed)
                .ok_or(WindowError::CreationFailed)?,
            WindowMode::Borderless => {
                glfw.with_primary_monitor(|glfw, monitor| {
                    let monitor = monitor.ok_or(WindowError::NoMonitor)?;
                    let video_mode = monitor.get_video_mode().ok_or(WindowError::NoMonitor)?;
                    glfw.window_hint(glfw::WindowHint::RedBits(Some(video_mode.red_bits)));
                    glfw.window_hint(glfw::WindowHint::GreenBits(Some(video_mode.green_bits)));
                    glfw.window_hint(glfw::WindowHint::BlueBits(Some(video_mode.blue_bits)));
                    glfw.window_hint(glfw::WindowHint::RefreshRate(Some(video_mode.refresh_rate)));
                    glfw.create_window(
                        video_mode.width,
                        video_mode.height,
                        title,
                        glfw::WindowMode::FullScreen(monitor),
                    )
                    .ok_or(WindowError::CreationFailed)
                })?
            }
            WindowMode::Fullscreen { width, height } => {
                glfw.with_primary_monitor(|glfw, monitor| {
                    let monitor = monitor.ok_or(WindowError::NoMonitor)?;
                    glfw.create_window(
                        width,
                        height,
                        title,
                        glfw::WindowMode::FullScreen(monitor),
                    )
                    .ok_or(WindowError::CreationFailed)
                })?
            }
        };

        let (mut window, events) = created;
        window.set_close_polling(true);
        window.set_size_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
        })
    }

    /// Get the instance extensions GLFW needs for surface creation
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::Glfw("failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface for this window
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::Glfw(format!(
                "failed to create Vulkan surface: {result:?}"
            )))
        }
    }

    /// Request that the window be closed
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }
}

impl RenderWindow for GlfwWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            if let glfw::WindowEvent::FramebufferSize(_, _) = event {
                self.resized = true;
            }
        }
    }

    fn consume_resized_flag(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    fn should_close(&self) -> bool {
        self.window.should_close()
    }
}
