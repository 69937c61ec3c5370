//! Command pool, recording, and the pre-recorded per-image command buffers

use ash::{vk, Device};

use super::{ExecutionContext, PipelineState, RenderError, RenderResult, StaticGeometry, SwapchainState};

/// Clear color used by the fixed render pass
const CLEAR_COLOR: [f32; 4] = [0.02, 0.02, 0.03, 1.0];

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a command pool on the given queue family
    pub fn new(device: Device, queue_family_index: u32) -> RenderResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(RenderError::Api)?
        };

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(RenderError::Api)
        }
    }

    /// Record, submit, and synchronously wait out a one-shot command buffer
    ///
    /// Used for the staging transfer: the graphics queue is blocked until the
    /// copy retires, then the command buffer is freed.
    pub fn submit_one_shot<F>(&self, context: &ExecutionContext, record: F) -> RenderResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.allocate(1)?[0];

        let result = (|| {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            unsafe {
                self.device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(RenderError::Api)?;
            }

            record(&self.device, command_buffer);

            unsafe {
                self.device
                    .end_command_buffer(command_buffer)
                    .map_err(RenderError::Api)?;

                let command_buffers = [command_buffer];
                let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
                self.device
                    .queue_submit(context.graphics_queue, &[submit_info.build()], vk::Fence::null())
                    .map_err(RenderError::Api)?;
                self.device
                    .queue_wait_idle(context.graphics_queue)
                    .map_err(RenderError::Api)?;
            }
            Ok(())
        })();

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }

        result
    }

    /// Command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Free previously allocated command buffers
    pub fn free(&self, buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.device.free_command_buffers(self.command_pool, buffers);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // The pool frees its remaining command buffers on destruction
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Records one command buffer; `begin` before recording, `end` to finish
pub struct CommandRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Begin recording into `command_buffer`
    pub fn begin(
        device: &'a Device,
        command_buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> RenderResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RenderError::Api)?;
        }
        Ok(Self {
            device,
            command_buffer,
        })
    }

    /// Begin a render pass; the pass ends when the guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_, 'a> {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }

        ActiveRenderPass { recorder: self }
    }

    /// Finish recording
    pub fn end(self) -> RenderResult<vk::CommandBuffer> {
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(RenderError::Api)?;
        }
        Ok(self.command_buffer)
    }
}

/// An open render pass; dropping it emits `cmd_end_render_pass`
pub struct ActiveRenderPass<'r, 'a> {
    recorder: &'r mut CommandRecorder<'a>,
}

impl ActiveRenderPass<'_, '_> {
    /// Bind the graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind vertex buffers starting at binding 0
    pub fn bind_vertex_buffers(&mut self, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.recorder.device.cmd_bind_vertex_buffers(
                self.recorder.command_buffer,
                0,
                buffers,
                offsets,
            );
        }
    }

    /// Bind a u32 index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(
                self.recorder.command_buffer,
                buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Non-indexed draw
    pub fn draw(&mut self, vertex_count: u32) {
        unsafe {
            self.recorder
                .device
                .cmd_draw(self.recorder.command_buffer, vertex_count, 1, 0, 0);
        }
    }

    /// Indexed draw
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.recorder
                .device
                .cmd_draw_indexed(self.recorder.command_buffer, index_count, 1, 0, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_, '_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

/// One pre-recorded command buffer per swapchain image
///
/// Each buffer draws the static geometry into its image's framebuffer. The
/// whole set is freed and re-recorded whenever the swapchain or pipeline is
/// rebuilt.
pub struct CommandBufferSet {
    device: Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBufferSet {
    /// Allocate and pre-record one command buffer per swapchain image
    pub fn record(
        context: &ExecutionContext,
        pool: &CommandPool,
        swapchain: &SwapchainState,
        pipeline: &PipelineState,
        geometry: &StaticGeometry,
    ) -> RenderResult<Self> {
        debug_assert_eq!(swapchain.image_count(), pipeline.framebuffers().len());

        let buffers = pool.allocate(swapchain.image_count() as u32)?;
        let extent = swapchain.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];

        for (&command_buffer, &framebuffer) in buffers.iter().zip(pipeline.framebuffers()) {
            let mut recorder = CommandRecorder::begin(
                &context.device,
                command_buffer,
                vk::CommandBufferUsageFlags::empty(),
            )?;

            {
                let mut pass = recorder.begin_render_pass(
                    pipeline.render_pass(),
                    framebuffer,
                    render_area,
                    &clear_values,
                );
                pass.bind_pipeline(pipeline.pipeline());
                pass.bind_vertex_buffers(&[geometry.vertex.handle()], &[0]);
                match &geometry.index {
                    Some(index) => {
                        pass.bind_index_buffer(index.handle());
                        pass.draw_indexed(index.element_count());
                    }
                    None => pass.draw(geometry.vertex.element_count()),
                }
            }

            recorder.end()?;
        }

        Ok(Self {
            device: context.device.clone(),
            pool: pool.handle(),
            buffers,
        })
    }

    /// The command buffer recorded for a swapchain image index
    pub fn buffer(&self, image_index: usize) -> vk::CommandBuffer {
        self.buffers[image_index]
    }

    /// Number of recorded command buffers (== swapchain image count)
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the set is empty (never the case after a successful record)
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for CommandBufferSet {
    fn drop(&mut self) {
        unsafe {
            self.device.free_command_buffers(self.pool, &self.buffers);
        }
    }
}
