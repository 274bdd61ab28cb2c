use bytemuck::{Pod, Zeroable};

/// RGBA tint, components in `[0, 1]`.
pub type Color = [f32; 4];

/// Graph vertex in render units. Two vertices bracket every graph point.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: Color,
}

impl Vertex {
    pub const fn new(position: [f32; 2], color: Color) -> Self {
        Self { position, color }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.position[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.position[1]
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 8, // [f32; 2] is 8 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}
