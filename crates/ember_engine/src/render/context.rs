//! The graphics composition root
//!
//! `GraphicsContext` owns every GPU resource and passes borrowed references
//! downward; nothing here stores back-pointers. Initialization either fully
//! establishes the frame loop or fails with a fatal [`RenderError`];
//! transient presentation conditions (resize, staleness, minimize) are
//! recovered internally and never surfaced to the caller.

use ash::extensions::khr::Surface;
use ash::vk;

use crate::config::RendererConfig;
use crate::render::vertex::Vertex;
use crate::render::vulkan::{
    swapchain::wait_for_valid_extent, AcquireOutcome, AdapterCandidate, CommandBufferSet,
    CommandPool, ExecutionContext, FrameScheduler, GeometryBuffer, PipelineState, PresentOutcome,
    RenderError, RenderResult, ShaderCatalog, StaticGeometry, SwapchainState, VulkanInstance,
};
use crate::window::GlfwWindow;
use crate::window::RenderWindow;

/// Owns the GPU execution context and drives the per-frame loop
///
/// Field order is load-bearing: drop runs top to bottom, releasing dependent
/// state before the things it depends on.
pub struct GraphicsContext {
    scheduler: FrameScheduler,
    commands: Option<CommandBufferSet>,
    pipeline: Option<PipelineState>,
    geometry: Option<StaticGeometry>,
    command_pool: CommandPool,
    swapchain: Option<SwapchainState>,
    execution: ExecutionContext,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    instance: VulkanInstance,
    vertex_spv: Vec<u8>,
    fragment_spv: Vec<u8>,
    shut_down: bool,
}

impl GraphicsContext {
    /// Initialize the full rendering stack against an existing window
    ///
    /// Runs the whole chain: instance → surface → adapter selection → logical
    /// device → swapchain → pipeline → geometry upload → frame scheduler.
    /// Any failure is fatal; partially created state is released by RAII in
    /// reverse creation order.
    pub fn new(
        window: &mut GlfwWindow,
        config: RendererConfig,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
    ) -> RenderResult<Self> {
        let required_extensions = window.required_instance_extensions().map_err(|e| {
            RenderError::Initialization(format!("instance extensions unavailable: {e}"))
        })?;
        let instance = VulkanInstance::new(
            &required_extensions,
            &config.application_name,
            config.validation_enabled(),
        )?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| RenderError::Initialization(format!("surface creation: {e}")))?;

        // Pair the raw surface with a guard so it is released if any later
        // step fails; `new` disarms the guard on success.
        let mut surface_guard = SurfaceGuard {
            surface,
            loader: &surface_loader,
            armed: true,
        };

        let adapter = AdapterCandidate::select(&instance.instance, surface, &surface_loader)?;
        let physical_device = adapter.device;
        let execution = ExecutionContext::new(&instance.instance, &adapter)?;
        // Capability snapshot served its purpose; only the raw handle is
        // needed for surface queries during rebuilds.
        drop(adapter);

        let catalog = ShaderCatalog::new(&config.shader_dir);
        let vertex_spv = catalog.load(&config.vertex_shader)?;
        let fragment_spv = catalog.load(&config.fragment_shader)?;

        let swapchain = SwapchainState::new(
            &execution,
            physical_device,
            surface,
            &surface_loader,
            window.framebuffer_size(),
            vk::SwapchainKHR::null(),
        )?;

        let pipeline = PipelineState::build(
            &execution,
            &swapchain,
            &Vertex::layout(),
            &vertex_spv,
            &fragment_spv,
        )?;

        let command_pool = CommandPool::new(execution.device.clone(), execution.graphics_family)?;

        let vertex = GeometryBuffer::vertices(&execution, &command_pool, vertices)?;
        let index = match indices {
            Some(indices) => Some(GeometryBuffer::indices(&execution, &command_pool, indices)?),
            None => None,
        };
        let geometry = StaticGeometry { vertex, index };

        let commands =
            CommandBufferSet::record(&execution, &command_pool, &swapchain, &pipeline, &geometry)?;

        let scheduler = FrameScheduler::new(&execution, config.clamped_frames_in_flight())?;

        log::info!(
            "graphics context ready: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            scheduler.frames_in_flight()
        );

        surface_guard.armed = false;
        drop(surface_guard);

        Ok(Self {
            scheduler,
            commands: Some(commands),
            pipeline: Some(pipeline),
            geometry: Some(geometry),
            command_pool,
            swapchain: Some(swapchain),
            execution,
            physical_device,
            surface,
            surface_loader,
            instance,
            vertex_spv,
            fragment_spv,
            shut_down: false,
        })
    }

    /// Acquire, submit, and present one frame
    ///
    /// Blocks until the next frame slot's fence retires. A stale swapchain at
    /// acquire drops the frame and rebuilds; staleness at present or a
    /// consumed window resize flag rebuilds after presenting. Neither is an
    /// error from the caller's perspective.
    pub fn begin_frame(&mut self, window: &mut dyn RenderWindow) -> RenderResult<()> {
        let swapchain = self
            .swapchain
            .as_ref()
            .expect("graphics context used after shutdown");

        match self.scheduler.acquire(&self.execution, swapchain)? {
            AcquireOutcome::OutOfDate => self.rebuild(window),
            AcquireOutcome::Image(image_index) => {
                let command_buffer = self
                    .commands
                    .as_ref()
                    .expect("graphics context used after shutdown")
                    .buffer(image_index as usize);

                let outcome = self.scheduler.submit_and_present(
                    &self.execution,
                    swapchain,
                    command_buffer,
                    image_index,
                )?;

                let resized = window.consume_resized_flag();
                if outcome == PresentOutcome::Stale || resized {
                    self.rebuild(window)?;
                }
                Ok(())
            }
        }
    }

    /// Wait for presentation to drain and advance to the next frame slot
    pub fn end_frame(&mut self) -> RenderResult<()> {
        self.scheduler.end_frame(&self.execution)
    }

    /// Destroy the swapchain with its dependent pipeline and command buffers,
    /// then recreate all three against the current framebuffer size
    ///
    /// Blocks while the window reports a zero-size framebuffer (minimized).
    /// The three pieces are always rebuilt together, never partially.
    fn rebuild(&mut self, window: &mut dyn RenderWindow) -> RenderResult<()> {
        unsafe {
            self.execution
                .device
                .device_wait_idle()
                .map_err(RenderError::Api)?;
        }

        let framebuffer_size = wait_for_valid_extent(window);

        // Dependents go first; the old chain stays alive so the driver can
        // recycle it through old_swapchain.
        self.commands = None;
        self.pipeline = None;
        let old_swapchain = self.swapchain.take();
        let old_handle = old_swapchain
            .as_ref()
            .map_or(vk::SwapchainKHR::null(), SwapchainState::handle);

        let swapchain = SwapchainState::new(
            &self.execution,
            self.physical_device,
            self.surface,
            &self.surface_loader,
            framebuffer_size,
            old_handle,
        )?;
        drop(old_swapchain);

        let pipeline = PipelineState::build(
            &self.execution,
            &swapchain,
            &Vertex::layout(),
            &self.vertex_spv,
            &self.fragment_spv,
        )?;

        let geometry = self
            .geometry
            .as_ref()
            .expect("graphics context used after shutdown");
        let commands = CommandBufferSet::record(
            &self.execution,
            &self.command_pool,
            &swapchain,
            &pipeline,
            geometry,
        )?;

        log::info!(
            "swapchain rebuilt: {}x{}, {} images",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count()
        );

        self.swapchain = Some(swapchain);
        self.pipeline = Some(pipeline);
        self.commands = Some(commands);
        Ok(())
    }

    /// Drain the device and release swapchain-dependent state
    ///
    /// Idempotent and safe on a partially used context; the remaining
    /// resources are released by drop in reverse creation order.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }

        unsafe {
            self.execution
                .device
                .device_wait_idle()
                .map_err(RenderError::Api)?;
        }

        self.commands = None;
        self.pipeline = None;
        self.geometry = None;
        self.swapchain = None;
        self.shut_down = true;
        log::info!("graphics context shut down");
        Ok(())
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.execution.device.device_wait_idle();
        }
        self.commands = None;
        self.pipeline = None;
        self.geometry = None;
        self.swapchain = None;
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: scheduler and command
        // pool before the device, the device before the instance.
    }
}

/// Releases the surface if initialization fails partway through
struct SurfaceGuard<'a> {
    surface: vk::SurfaceKHR,
    loader: &'a Surface,
    armed: bool,
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            unsafe {
                self.loader.destroy_surface(self.surface, None);
            }
        }
    }
}
