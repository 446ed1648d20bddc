//! Kernel argument binding.
//!
//! The kernel takes eleven logical arguments. Buffers and textures get their own
//! bind group slot and are bound once; the scalars share a single uniform
//! block whose per-frame part (delta time, eye position) is rewritten every
//! step. The fixed part (particle count, cluster scale) is written once. Arguments are looked up by name through [`BINDING_TABLE`], never by
//! position.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::device::KERNEL_ENTRY_POINT;
use crate::error::{RainError, Result};

/// What sits behind a kernel argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Storage buffer of `vec4<f32>`.
    Buffer { read_only: bool },
    /// Unfilterable 2D float texture, read with `textureLoad`.
    Texture,
    /// Field of the `SimParams` uniform at the given byte offset.
    Scalar { offset: u32 },
}

/// One row of the binding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelArg {
    /// Logical name.
    pub name: &'static str,
    /// Bind group slot.
    pub binding: u32,
    pub kind: ArgKind,
    /// Rewritten every frame.
    pub per_frame: bool,
    /// Crosses the compute/graphics boundary.
    pub shared: bool,
}

/// Slot holding the `SimParams` uniform.
pub const PARAMS_BINDING: u32 = 5;

const fn arg(name: &'static str, binding: u32, kind: ArgKind, per_frame: bool, shared: bool) -> KernelArg {
    KernelArg {
        name,
        binding,
        kind,
        per_frame,
        shared,
    }
}

/// Kernel arguments in their logical order.
pub const BINDING_TABLE: [KernelArg; 11] = [
    arg("positions", 0, ArgKind::Buffer { read_only: false }, false, true),
    arg("velocities", 1, ArgKind::Buffer { read_only: true }, false, false),
    arg("seeds", 2, ArgKind::Buffer { read_only: true }, false, false),
    arg("height_field", 3, ArgKind::Texture, false, true),
    arg("normal_field", 4, ArgKind::Texture, false, true),
    arg("particle_count", PARAMS_BINDING, ArgKind::Scalar { offset: 16 }, false, false),
    arg("delta_time", PARAMS_BINDING, ArgKind::Scalar { offset: 12 }, true, false),
    arg("eye_x", PARAMS_BINDING, ArgKind::Scalar { offset: 0 }, true, false),
    arg("eye_y", PARAMS_BINDING, ArgKind::Scalar { offset: 4 }, true, false),
    arg("eye_z", PARAMS_BINDING, ArgKind::Scalar { offset: 8 }, true, false),
    arg("cluster_scale", PARAMS_BINDING, ArgKind::Scalar { offset: 20 }, false, false),
];

/// Look up a kernel argument by name.
pub fn lookup(name: &str) -> Result<&'static KernelArg> {
    BINDING_TABLE
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| RainError::UnknownBinding(name.to_string()))
}

/// Uniform block carrying every scalar argument. Matches `SimParams` in
/// `rain_sim.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub eye: [f32; 3],
    pub delta_time: f32,
    pub particle_count: u32,
    /// Side of the drop cloud around the eye; must match the spawn box.
    pub cluster_scale: f32,
    pub _padding: [u32; 2],
}

impl SimParams {
    pub fn new(particle_count: u32, cluster_scale: f32) -> Self {
        Self {
            eye: [0.0; 3],
            delta_time: 0.0,
            particle_count,
            cluster_scale,
            _padding: [0; 2],
        }
    }

    /// Overwrite the per-frame part; the fixed scalars are left alone.
    pub fn apply(&mut self, frame: &FrameScalars) {
        self.eye = frame.eye.to_array();
        self.delta_time = frame.delta_time;
    }

    /// Read a scalar argument by name, as raw bits.
    pub fn scalar_bits(&self, name: &str) -> Result<u32> {
        match lookup(name)?.kind {
            ArgKind::Scalar { offset } => {
                let bytes = bytemuck::bytes_of(self);
                let at = offset as usize;
                let mut word = [0u8; 4];
                word.copy_from_slice(&bytes[at..at + 4]);
                Ok(u32::from_ne_bytes(word))
            }
            _ => Err(RainError::UnknownBinding(format!("{name} is not a scalar"))),
        }
    }
}

/// Per-frame scalars fed to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameScalars {
    /// Seconds since the previous step.
    pub delta_time: f32,
    pub eye: Vec3,
}

impl FrameScalars {
    /// Build from a frame time in milliseconds.
    pub fn from_millis(delta_ms: u64, eye: Vec3) -> Self {
        Self {
            delta_time: 1e-3 * delta_ms as f32,
            eye,
        }
    }
}

/// Layout, bind group and pipeline for the simulation kernel.
pub struct KernelBinding {
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    params: SimParams,
}

/// Resources the kernel binds once at creation.
pub struct KernelInputs<'a> {
    pub positions: &'a wgpu::Buffer,
    pub velocities: &'a wgpu::Buffer,
    pub seeds: &'a wgpu::Buffer,
    pub height_field: &'a wgpu::TextureView,
    pub normal_field: &'a wgpu::TextureView,
    pub particle_count: u32,
    pub cluster_scale: f32,
}

impl KernelBinding {
    pub fn new(device: &wgpu::Device, program: &wgpu::ShaderModule, inputs: KernelInputs<'_>) -> Result<Self> {
        let params = SimParams::new(inputs.particle_count, inputs.cluster_scale);
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sim Params Buffer"),
            size: std::mem::size_of::<SimParams>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: true,
        });
        params_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(bytemuck::bytes_of(&params));
        params_buffer.unmap();

        let entries: Vec<wgpu::BindGroupLayoutEntry> = layout_bindings()
            .map(|(binding, ty)| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty,
                count: None,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Rain Sim Bind Group Layout"),
            entries: &entries,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Rain Sim Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: lookup("positions")?.binding,
                    resource: inputs.positions.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: lookup("velocities")?.binding,
                    resource: inputs.velocities.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: lookup("seeds")?.binding,
                    resource: inputs.seeds.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: lookup("height_field")?.binding,
                    resource: wgpu::BindingResource::TextureView(inputs.height_field),
                },
                wgpu::BindGroupEntry {
                    binding: lookup("normal_field")?.binding,
                    resource: wgpu::BindingResource::TextureView(inputs.normal_field),
                },
                wgpu::BindGroupEntry {
                    binding: PARAMS_BINDING,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Rain Sim Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Rain Sim Pipeline"),
            layout: Some(&pipeline_layout),
            module: program,
            entry_point: Some(KERNEL_ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RainError::resource("kernel binding", err));
        }

        log::debug!(
            "Bound {} kernel arguments for {} particles",
            BINDING_TABLE.len(),
            inputs.particle_count
        );

        Ok(Self {
            layout,
            bind_group,
            pipeline,
            params_buffer,
            params,
        })
    }

    /// Rewrite the per-frame scalars.
    pub fn set_frame_scalars(&mut self, queue: &wgpu::Queue, frame: &FrameScalars) {
        self.params.apply(frame);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));
    }

    /// Scalars most recently written.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(crate) fn into_parts(self) -> (wgpu::ComputePipeline, wgpu::BindGroup, wgpu::BindGroupLayout, wgpu::Buffer) {
        (self.pipeline, self.bind_group, self.layout, self.params_buffer)
    }
}

/// One layout entry per distinct slot in the binding table.
fn layout_bindings() -> impl Iterator<Item = (u32, wgpu::BindingType)> {
    BINDING_TABLE
        .iter()
        .filter_map(|a| match a.kind {
            ArgKind::Buffer { read_only } => Some((
                a.binding,
                wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
            )),
            ArgKind::Texture => Some((
                a.binding,
                wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
            )),
            ArgKind::Scalar { .. } => None,
        })
        .chain(std::iter::once((
            PARAMS_BINDING,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<SimParams>() as u64),
            },
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_names_are_unique() {
        let names: HashSet<_> = BINDING_TABLE.iter().map(|a| a.name).collect();
        assert_eq!(names.len(), BINDING_TABLE.len());
    }

    #[test]
    fn test_resource_slots_are_unique() {
        let slots: Vec<u32> = BINDING_TABLE
            .iter()
            .filter(|a| !matches!(a.kind, ArgKind::Scalar { .. }))
            .map(|a| a.binding)
            .collect();
        let unique: HashSet<_> = slots.iter().collect();
        assert_eq!(unique.len(), slots.len());
        assert!(!slots.contains(&PARAMS_BINDING));
    }

    #[test]
    fn test_exactly_four_per_frame_scalars() {
        let per_frame: Vec<_> = BINDING_TABLE.iter().filter(|a| a.per_frame).map(|a| a.name).collect();
        assert_eq!(per_frame, ["delta_time", "eye_x", "eye_y", "eye_z"]);
    }

    #[test]
    fn test_shared_args() {
        let shared: Vec<_> = BINDING_TABLE.iter().filter(|a| a.shared).map(|a| a.name).collect();
        assert_eq!(shared, ["positions", "height_field", "normal_field"]);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("seeds").unwrap().binding, 2);
        assert!(matches!(lookup("gravity"), Err(RainError::UnknownBinding(_))));
    }

    #[test]
    fn test_scalar_offsets_match_struct() {
        let mut p = SimParams::new(1024, 7.0);
        p.apply(&FrameScalars {
            delta_time: 0.016,
            eye: Vec3::new(1.0, 2.0, 3.0),
        });
        assert_eq!(p.scalar_bits("particle_count").unwrap(), 1024);
        assert_eq!(f32::from_bits(p.scalar_bits("delta_time").unwrap()), 0.016);
        assert_eq!(f32::from_bits(p.scalar_bits("eye_x").unwrap()), 1.0);
        assert_eq!(f32::from_bits(p.scalar_bits("eye_y").unwrap()), 2.0);
        assert_eq!(f32::from_bits(p.scalar_bits("eye_z").unwrap()), 3.0);
        assert_eq!(f32::from_bits(p.scalar_bits("cluster_scale").unwrap()), 7.0);
        assert!(p.scalar_bits("positions").is_err());
        assert_eq!(std::mem::size_of::<SimParams>(), 32);
    }

    #[test]
    fn test_per_frame_values_do_not_accumulate() {
        let mut p = SimParams::new(8, 20.0);
        p.apply(&FrameScalars::from_millis(16, Vec3::new(1.0, 0.0, 0.0)));
        p.apply(&FrameScalars::from_millis(33, Vec3::new(0.0, 5.0, 0.0)));
        assert_eq!(p.delta_time, 1e-3 * 33.0);
        assert_eq!(p.eye, [0.0, 5.0, 0.0]);
        assert_eq!(p.particle_count, 8);
        assert_eq!(p.cluster_scale, 20.0);
    }

    #[test]
    fn test_layout_has_six_slots() {
        let slots: Vec<u32> = layout_bindings().map(|(b, _)| b).collect();
        assert_eq!(slots, [0, 1, 2, 3, 4, 5]);
    }
}
