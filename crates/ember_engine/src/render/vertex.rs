//! Vertex records and their Vulkan input layout
//!
//! The core renders a fixed, caller-declared list of vertices. The layout
//! description here feeds directly into pipeline creation.

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// One vertex record: position + per-vertex color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in normalized device coordinates
    pub position: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
}

/// Vertex input state for pipeline creation: one binding plus its attributes
#[derive(Debug, Clone)]
pub struct VertexLayout {
    /// Binding description (stride = size of one vertex record)
    pub binding: vk::VertexInputBindingDescription,
    /// Per-attribute descriptions (location, format, offset)
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl Vertex {
    /// Vulkan input layout for this vertex type
    pub fn layout() -> VertexLayout {
        VertexLayout {
            binding: vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<Vertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            },
            attributes: vec![
                // Position (location = 0)
                vk::VertexInputAttributeDescription {
                    binding: 0,
                    location: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 0,
                },
                // Color (location = 1)
                vk::VertexInputAttributeDescription {
                    binding: 0,
                    location: 1,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: 12,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_stride_matches_vertex_size() {
        let layout = Vertex::layout();
        assert_eq!(layout.binding.stride, 24);
        assert_eq!(layout.binding.stride as usize, std::mem::size_of::<Vertex>());
        assert_eq!(layout.binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn attribute_offsets_cover_the_record() {
        let layout = Vertex::layout();
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert!(layout
            .attributes
            .iter()
            .all(|attr| attr.binding == layout.binding.binding));
    }

    #[test]
    fn vertices_cast_to_bytes_without_padding() {
        let vertices = [
            Vertex {
                position: [0.0, -0.5, 0.0],
                color: [1.0, 0.0, 0.0],
            },
            Vertex {
                position: [0.5, 0.5, 0.0],
                color: [0.0, 1.0, 0.0],
            },
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<Vertex>());
    }
}
