//! The rain particle system.

use glam::Vec4;

use crate::binding::{FrameScalars, KernelBinding, KernelInputs, SimParams};
use crate::buffers::{read_vec4s, ParticleBuffers};
use crate::camera::Camera;
use crate::config::RainConfig;
use crate::device::ComputeContext;
use crate::error::Result;
use crate::field::FieldTextures;
use crate::render::{ParticleRenderer, RenderTarget};
use crate::shared::SharedSet;
use crate::spawn::ParticleData;
use crate::stepper::{Stepper, WgpuQueue};
use crate::teardown::{Lifecycle, LogTracker, ReleaseTracker, ResourceKind, Teardown};

/// Everything the system allocates, released together by `destroy`.
struct Resources {
    context: ComputeContext,
    shared: SharedSet,
    velocities: wgpu::Buffer,
    seeds: wgpu::Buffer,
    binding: KernelBinding,
    renderer: ParticleRenderer,
}

impl Teardown for Resources {
    fn release(self, tracker: &mut dyn ReleaseTracker) {
        let Resources {
            context,
            shared,
            velocities,
            seeds,
            binding,
            renderer,
        } = self;
        let (positions, height_view, normal_view) = shared.into_parts();

        positions.destroy();
        drop(positions);
        tracker.released(ResourceKind::MutableBuffers);

        velocities.destroy();
        seeds.destroy();
        drop((velocities, seeds));
        tracker.released(ResourceKind::ReadOnlyBuffers);

        drop((height_view, normal_view));
        tracker.released(ResourceKind::FieldBuffers);

        let (pipeline, bind_group, layout, params_buffer) = binding.into_parts();
        params_buffer.destroy();
        drop((bind_group, layout, pipeline, params_buffer));
        tracker.released(ResourceKind::Kernel);

        let (render_pipeline, uniform_buffer, render_bind_group) = renderer.into_parts();
        uniform_buffer.destroy();
        drop((render_bind_group, render_pipeline, uniform_buffer));
        tracker.released(ResourceKind::RenderPipeline);

        let (device, queue, program) = context.into_parts();
        drop(queue);
        tracker.released(ResourceKind::Queue);
        drop(program);
        tracker.released(ResourceKind::Program);
        drop(device);
        tracker.released(ResourceKind::Context);
    }
}

/// GPU rain: a compute kernel moving drops and a point renderer drawing
/// them, sharing one position buffer.
///
/// Per frame, call [`update_simulation`](Self::update_simulation) and then
/// [`draw`](Self::draw) with the same camera. The update blocks until the
/// kernel has finished, so the draw always sees a complete step.
pub struct Raindrops {
    state: Lifecycle<Resources>,
    stepper: Stepper,
    initial: ParticleData,
    max_particles: u32,
}

impl Raindrops {
    /// Build the system on `context`: generate and upload particles, bind
    /// the kernel, then create the render pipeline.
    pub fn new(
        context: ComputeContext,
        fields: &FieldTextures,
        target: RenderTarget,
        config: &RainConfig,
    ) -> Result<Self> {
        config.validate()?;
        let params = config.spawn_params();

        let data = ParticleData::generate(&params)?;
        log::info!(
            "Generated {} drops (seed {}, {:.1}% highlighted)",
            data.len(),
            params.seed,
            data.flash_fraction() * 100.0
        );

        let device = context.device();
        let ParticleBuffers {
            positions,
            velocities,
            seeds,
            ..
        } = ParticleBuffers::upload(device, &data)?;

        let (height_view, normal_view) = fields.views();
        let mut shared = SharedSet::new(positions, height_view, normal_view);

        shared.acquire_for_compute()?;
        let binding = KernelBinding::new(
            device,
            context.program(),
            KernelInputs {
                positions: shared.positions.compute()?,
                velocities: &velocities,
                seeds: &seeds,
                height_field: shared.height_field.compute()?,
                normal_field: shared.normal_field.compute()?,
                particle_count: params.max_particles,
                cluster_scale: params.cluster_scale,
            },
        )?;
        shared.release_to_graphics()?;

        let renderer = ParticleRenderer::new(device, target, params.max_particles)?;

        Ok(Self {
            state: Lifecycle::new(Resources {
                context,
                shared,
                velocities,
                seeds,
                binding,
                renderer,
            }),
            stepper: Stepper::new(params.max_particles),
            initial: data,
            max_particles: params.max_particles,
        })
    }

    /// Advance the simulation by `delta_ms` milliseconds as seen from
    /// `camera`. Blocks until the device is done.
    pub fn update_simulation<C: Camera + ?Sized>(&mut self, delta_ms: u64, camera: &C) -> Result<()> {
        let Resources {
            context,
            shared,
            binding,
            ..
        } = self.state.get_mut()?;

        let frame = FrameScalars::from_millis(delta_ms, camera.eye_position());
        let mut queue = WgpuQueue::new(context.device(), context.queue(), binding);
        self.stepper.step(&mut queue, shared, &frame)
    }

    /// Draw the drops into `pass`.
    pub fn draw<C: Camera + ?Sized>(&self, pass: &mut wgpu::RenderPass<'_>, camera: &C) -> Result<()> {
        let res = self.state.get()?;
        let positions = res.shared.positions.graphics()?;
        res.renderer.draw(pass, res.context.queue(), camera, positions);
        Ok(())
    }

    /// Current particle positions, read back from the device.
    pub fn read_positions(&self) -> Result<Vec<Vec4>> {
        let res = self.state.get()?;
        let positions = res.shared.positions.graphics()?;
        read_vec4s(res.context.device(), res.context.queue(), positions)
    }

    /// Scalars passed to the kernel on the last step.
    pub fn kernel_params(&self) -> Result<SimParams> {
        Ok(*self.state.get()?.binding.params())
    }

    pub fn context(&self) -> Result<&ComputeContext> {
        Ok(&self.state.get()?.context)
    }

    /// `(acquires, releases)` of the shared resources so far.
    pub fn handoff_counts(&self) -> Result<(u64, u64)> {
        let shared = &self.state.get()?.shared;
        Ok((shared.acquire_count(), shared.release_count()))
    }

    /// The particles as generated, before any simulation step.
    pub fn initial_data(&self) -> &ParticleData {
        &self.initial
    }

    pub fn max_particles(&self) -> u32 {
        self.max_particles
    }

    /// Completed simulation steps.
    pub fn frames(&self) -> u64 {
        self.stepper.frames()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.is_destroyed()
    }

    /// Release all GPU resources. Later calls do nothing; every other
    /// operation returns [`RainError::Destroyed`](crate::RainError::Destroyed).
    pub fn destroy(&mut self) {
        self.destroy_with(&mut LogTracker);
    }

    pub fn destroy_with(&mut self, tracker: &mut dyn ReleaseTracker) {
        if self.state.destroy(tracker) {
            log::info!("Rain particle system destroyed after {} frames", self.stepper.frames());
        }
    }
}
