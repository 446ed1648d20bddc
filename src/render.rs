//! Point renderer for the particle buffer.

use bytemuck::{Pod, Zeroable};

use crate::camera::Camera;
use crate::device::{compile, KernelSource};
use crate::error::{RainError, Result};

/// Built-in particle render shader.
pub const RAIN_RENDER_SOURCE: &str = include_str!("shaders/rain_render.wgsl");

/// Formats of the pass the particles are drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// Uniforms for `rain_render.wgsl`: `viewProj` and `eyeposition`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct RenderUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub eye_position: [f32; 3],
    pub _padding: f32,
}

impl RenderUniforms {
    pub fn from_camera<C: Camera + ?Sized>(camera: &C) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            eye_position: camera.eye_position().to_array(),
            _padding: 0.0,
        }
    }
}

/// Draws the position buffer as a point list.
pub struct ParticleRenderer {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    num_particles: u32,
}

impl ParticleRenderer {
    pub fn new(device: &wgpu::Device, target: RenderTarget, num_particles: u32) -> Result<Self> {
        let source = KernelSource {
            label: "rain_render.wgsl".to_string(),
            source: RAIN_RENDER_SOURCE.to_string(),
        };
        let shader = pollster::block_on(compile(device, &source))?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Rain Render Uniforms"),
            size: std::mem::size_of::<RenderUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Rain Render Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Rain Render Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Rain Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Rain Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 16,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        offset: 0,
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x4, // position
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            // Drops are translucent: test against the scene but do not write depth
            depth_stencil: target.depth_format.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RainError::resource("render pipeline", err));
        }

        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
            num_particles,
        })
    }

    /// Upload camera uniforms and draw every particle.
    ///
    /// The caller must have finished the simulation step for this frame.
    pub fn draw<C: Camera + ?Sized>(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        queue: &wgpu::Queue,
        camera: &C,
        positions: &wgpu::Buffer,
    ) {
        let uniforms = RenderUniforms::from_camera(camera);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, positions.slice(..));
        pass.draw(0..self.num_particles, 0..1);
    }

    pub(crate) fn into_parts(self) -> (wgpu::RenderPipeline, wgpu::Buffer, wgpu::BindGroup) {
        (self.pipeline, self.uniform_buffer, self.bind_group)
    }
}
