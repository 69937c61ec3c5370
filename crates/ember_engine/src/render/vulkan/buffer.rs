//! Buffer allocation and static geometry upload
//!
//! Device-local memory is typically not host-mappable on discrete GPUs, so
//! static geometry takes the standard two-hop path: host data is copied into a
//! host-visible staging buffer, then a one-shot transfer command moves it into
//! the device-local destination. The staging buffer is released as soon as the
//! transfer completes.

use ash::{vk, Device};
use bytemuck::Pod;

use super::{CommandPool, ExecutionContext, RenderError, RenderResult};

/// Buffer + backing memory with RAII cleanup
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(RenderError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(RenderError::Api(e));
            }
        };

        unsafe {
            if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
                return Err(RenderError::Api(e));
            }
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Memory-map the buffer and copy `bytes` in
    ///
    /// Requires host-visible memory; used only on staging buffers here.
    pub fn write_bytes(&self, bytes: &[u8]) -> RenderResult<()> {
        debug_assert!(bytes.len() as vk::DeviceSize <= self.size);

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(RenderError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }

        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Allocated size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Device-local buffer holding vertex or index data, immutable after upload
pub struct GeometryBuffer {
    buffer: Buffer,
    element_count: u32,
}

impl GeometryBuffer {
    /// Upload `data` into a new device-local buffer via a staging copy
    ///
    /// The transfer command is submitted and waited on synchronously; when
    /// this returns, the staging buffer has already been released.
    pub fn upload_static<T: Pod>(
        context: &ExecutionContext,
        pool: &CommandPool,
        data: &[T],
        usage: vk::BufferUsageFlags,
    ) -> RenderResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let size = bytes.len() as vk::DeviceSize;

        let staging = Buffer::new(
            context.device.clone(),
            &context.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.write_bytes(bytes)?;

        let buffer = Buffer::new(
            context.device.clone(),
            &context.memory_properties,
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        pool.submit_one_shot(context, |device, command_buffer| {
            let regions = [vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            }];
            unsafe {
                device.cmd_copy_buffer(command_buffer, staging.handle(), buffer.handle(), &regions);
            }
        })?;
        // staging drops here, after the blocking transfer completed

        Ok(Self {
            buffer,
            element_count: data.len() as u32,
        })
    }

    /// Upload a vertex buffer
    pub fn vertices<T: Pod>(
        context: &ExecutionContext,
        pool: &CommandPool,
        vertices: &[T],
    ) -> RenderResult<Self> {
        Self::upload_static(context, pool, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)
    }

    /// Upload an index buffer
    pub fn indices(
        context: &ExecutionContext,
        pool: &CommandPool,
        indices: &[u32],
    ) -> RenderResult<Self> {
        Self::upload_static(context, pool, indices, vk::BufferUsageFlags::INDEX_BUFFER)
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Capacity in bytes (at least the uploaded byte length)
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }

    /// Number of uploaded elements (vertices or indices)
    pub fn element_count(&self) -> u32 {
        self.element_count
    }
}

/// The static geometry drawn every frame
pub struct StaticGeometry {
    /// Vertex buffer
    pub vertex: GeometryBuffer,
    /// Optional index buffer
    pub index: Option<GeometryBuffer>,
}

/// Find a memory type matching both the type filter and the property flags
///
/// Fails with [`RenderError::NoSuitableMemoryType`] when no type satisfies
/// both, which is fatal to the allocation.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> RenderResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }

    Err(RenderError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, &property_flags) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = property_flags;
        }
        props
    }

    #[test]
    fn finds_first_matching_memory_type() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn type_filter_excludes_otherwise_matching_types() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Only type 1 allowed by the filter
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn no_match_is_an_allocation_error() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(RenderError::NoSuitableMemoryType)));
    }
}
