//! GPU renderer for graph geometry.
//!
//! Uploads the CPU-side [`GraphBuffers`] and draws them with an orthographic
//! projection of the render bounds. Device buffers only ever grow.

use std::iter;

use bytemuck::{Pod, Zeroable};

use crate::bounds::RenderBounds;
use crate::buffers::GraphBuffers;
use crate::gpu::mesh::Vertex;
use crate::gpu::pipeline;

/// Initial vertex capacity of the device buffers.
const INITIAL_VERTICES: usize = 1024;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GraphUniforms {
    view_proj: [[f32; 4]; 4],
}

impl GraphUniforms {
    fn new() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}

/// Projection mapping `bounds` onto clip space, `y_min` at the bottom.
pub fn projection_for(bounds: &RenderBounds) -> glam::Mat4 {
    glam::Mat4::orthographic_rh(bounds.x_min, bounds.x_max, bounds.y_min, bounds.y_max, -1.0, 1.0)
}

pub struct GpuGraphRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniforms: GraphUniforms,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    index_buffer: wgpu::Buffer,
    index_capacity: usize,
    index_count: u32,
    clear_color: wgpu::Color,
}

impl GpuGraphRenderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let uniforms = GraphUniforms::new();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Graph Uniform Buffer"),
            size: std::mem::size_of::<GraphUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("graph_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("graph_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Graph Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = pipeline::create_graph_pipeline(&device, &pipeline_layout, format);

        // Two triangles (six indices) per pair of vertices, roughly.
        let vertex_buffer = create_vertex_buffer(&device, INITIAL_VERTICES);
        let index_buffer = create_index_buffer(&device, INITIAL_VERTICES * 3);

        queue.write_buffer(&uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        Self {
            device,
            queue,
            pipeline,
            uniform_buffer,
            uniforms,
            bind_group,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTICES,
            index_buffer,
            index_capacity: INITIAL_VERTICES * 3,
            index_count: 0,
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Copy `buffers` to the device and project `bounds` onto the target.
    pub fn upload(&mut self, buffers: &GraphBuffers, bounds: &RenderBounds) {
        self.uniforms.view_proj = projection_for(bounds).to_cols_array_2d();
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        if buffers.vertices.len() > self.vertex_capacity {
            self.vertex_capacity = buffers.vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
            log::debug!("Grew graph vertex buffer to {} vertices", self.vertex_capacity);
        }
        if buffers.indices.len() > self.index_capacity {
            self.index_capacity = buffers.indices.len().next_power_of_two();
            self.index_buffer = create_index_buffer(&self.device, self.index_capacity);
            log::debug!("Grew graph index buffer to {} indices", self.index_capacity);
        }

        if !buffers.vertices.is_empty() {
            self.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&buffers.vertices));
        }
        if !buffers.indices.is_empty() {
            self.queue
                .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&buffers.indices));
        }
        self.index_count = buffers.indices.len() as u32;
    }

    pub fn render(&mut self, view: &wgpu::TextureView) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Graph Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Graph Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if self.index_count > 0 {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
    }
}

fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Graph Vertex Buffer"),
        size: (vertices * std::mem::size_of::<Vertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, indices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Graph Index Buffer"),
        size: (indices * std::mem::size_of::<u32>()) as u64,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
