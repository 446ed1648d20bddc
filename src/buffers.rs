//! GPU buffers for particle state.

use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::error::{RainError, Result};
use crate::spawn::ParticleData;

/// Position, velocity and seed buffers.
///
/// Positions are shared with the renderer (vertex input); velocities and
/// seeds are only ever read by the kernel.
pub struct ParticleBuffers {
    pub positions: wgpu::Buffer,
    pub velocities: wgpu::Buffer,
    pub seeds: wgpu::Buffer,
}

impl ParticleBuffers {
    pub fn upload(device: &wgpu::Device, data: &ParticleData) -> Result<Self> {
        if data.is_empty() {
            return Err(RainError::resource("particle buffers", "no particles to upload"));
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Rain Positions"),
            contents: bytemuck::cast_slice(&data.positions),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
        });

        let velocities = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Rain Velocities"),
            contents: bytemuck::cast_slice(&data.velocities),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let seeds = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Rain Seeds"),
            contents: bytemuck::cast_slice(&data.seeds),
            usage: wgpu::BufferUsages::STORAGE,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RainError::resource("particle buffers", err));
        }

        log::debug!(
            "Uploaded {} particles ({} bytes per array)",
            data.len(),
            positions.size()
        );

        Ok(Self {
            positions,
            velocities,
            seeds,
        })
    }
}

/// Copy a `vec4<f32>` buffer back to the host. Blocks until done.
pub fn read_vec4s(device: &wgpu::Device, queue: &wgpu::Queue, buffer: &wgpu::Buffer) -> Result<Vec<Vec4>> {
    let size = buffer.size();
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Rain Readback Buffer"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Rain Readback Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    let index = queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));

    rx.recv()
        .map_err(|e| RainError::BufferMapping(e.to_string()))?
        .map_err(|e| RainError::BufferMapping(e.to_string()))?;

    let values = {
        let data = slice.get_mapped_range();
        bytemuck::cast_slice::<u8, f32>(&data)
            .chunks_exact(4)
            .map(Vec4::from_slice)
            .collect::<Vec<_>>()
    };
    staging.unmap();
    Ok(values)
}
