//! Terrain height and normal fields sampled by the kernel.
//!
//! Both fields are read-only 2D float textures. The kernel reads them with
//! `textureLoad`, so they use unfilterable formats (`R32Float`,
//! `Rgba32Float`) and need no sampler.

use std::path::Path;

use glam::{Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::error::{RainError, Result};

/// Single-channel height map, values in `[0, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl HeightField {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RainError::InvalidConfig(format!(
                "height field must not be empty ({}x{})",
                width, height
            )));
        }
        if data.len() != width as usize * height as usize {
            return Err(RainError::InvalidConfig(format!(
                "height field is {}x{} but has {} samples",
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Load from an image; the red channel becomes the height.
    pub fn from_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.into_rgba8();
        let (width, height) = img.dimensions();
        let data = img.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        log::info!("Loaded {}x{} height map from {}", width, height, path.display());
        Self::new(width, height, data)
    }

    /// Rolling hills, for when no height map is supplied.
    pub fn procedural(width: u32, height: u32) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let u = x as f32 / width.max(1) as f32 * std::f32::consts::TAU;
                let v = y as f32 / height.max(1) as f32 * std::f32::consts::TAU;
                let h = 0.5 + 0.3 * (2.0 * u).sin() * (3.0 * v).cos() + 0.2 * (u + v).sin();
                data.push(h.clamp(0.0, 1.0) * 0.5);
            }
        }
        Self::new(width, height, data)
    }

    /// Height at a texel, clamped to the edges.
    pub fn at(&self, x: i64, y: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Per-texel surface normals in `xyz`, `w` unused.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<Vec4>,
}

impl NormalField {
    /// Central differences over the height field. `scale` is the world height
    /// of a full-range sample relative to one texel.
    pub fn from_height(field: &HeightField, scale: f32) -> Self {
        let mut data = Vec::with_capacity(field.data.len());
        for y in 0..field.height as i64 {
            for x in 0..field.width as i64 {
                let dx = (field.at(x + 1, y) - field.at(x - 1, y)) * scale;
                let dz = (field.at(x, y + 1) - field.at(x, y - 1)) * scale;
                let n = Vec3::new(-dx, 2.0, -dz).normalize();
                data.push(n.extend(0.0));
            }
        }
        Self {
            width: field.width,
            height: field.height,
            data,
        }
    }
}

/// Uploaded field textures. Owned by the caller; the particle system only
/// creates views over them.
pub struct FieldTextures {
    pub height: wgpu::Texture,
    pub normal: wgpu::Texture,
}

impl FieldTextures {
    /// Create both textures. Fails if a field exceeds the device's 2D
    /// texture limit or the device rejects the allocation.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, height: &HeightField, normal: &NormalField) -> Result<Self> {
        let max = device.limits().max_texture_dimension_2d;
        check_dimensions("height field", height.width, height.height, max)?;
        check_dimensions("normal field", normal.width, normal.height, max)?;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let height_tex = create_field_texture(
            device,
            queue,
            "Height Field",
            height.width,
            height.height,
            wgpu::TextureFormat::R32Float,
            bytemuck::cast_slice(&height.data),
        );
        let normal_floats: Vec<f32> = normal.data.iter().flat_map(|n| n.to_array()).collect();
        let normal_tex = create_field_texture(
            device,
            queue,
            "Normal Field",
            normal.width,
            normal.height,
            wgpu::TextureFormat::Rgba32Float,
            bytemuck::cast_slice(&normal_floats),
        );

        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            return Err(RainError::resource("field textures", err));
        }

        log::debug!(
            "Uploaded {}x{} height and {}x{} normal fields",
            height.width,
            height.height,
            normal.width,
            normal.height
        );

        Ok(Self {
            height: height_tex,
            normal: normal_tex,
        })
    }

    /// Views for compute access.
    pub fn views(&self) -> (wgpu::TextureView, wgpu::TextureView) {
        (
            self.height.create_view(&wgpu::TextureViewDescriptor::default()),
            self.normal.create_view(&wgpu::TextureViewDescriptor::default()),
        )
    }
}

fn check_dimensions(what: &'static str, width: u32, height: u32, max: u32) -> Result<()> {
    if width > max || height > max {
        return Err(RainError::resource(
            what,
            format!("{}x{} exceeds the device limit of {}", width, height, max),
        ));
    }
    Ok(())
}

fn create_field_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        data,
    )
}
