//! Per-frame simulation step.
//!
//! Each step walks `Idle → Acquired → Dispatched → Released` and then blocks
//! until the device has finished, so the renderer never reads a half-written
//! position buffer. The device side is behind [`ComputeQueue`]; [`WgpuQueue`]
//! is the real implementation.

use crate::binding::{FrameScalars, KernelBinding};
use crate::error::{RainError, Result};
use crate::shared::SharedSet;

/// Work-group size declared by `rain_sim.wgsl`.
pub const WORKGROUP_SIZE: u32 = 128;

/// 1-D dispatch over the particle domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    /// Number of particles.
    pub global: u32,
    /// Invocations per work-group.
    pub local: u32,
    /// Work-groups to dispatch; the last one may be partial.
    pub groups: u32,
}

impl DispatchPlan {
    pub fn new(global: u32, local: u32) -> Self {
        let groups = if local == 0 { 0 } else { global.div_ceil(local) };
        Self { global, local, groups }
    }
}

/// Where a step currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Idle,
    Acquired,
    Dispatched,
    Released,
}

/// Device operations a step is made of.
pub trait ComputeQueue {
    /// Begin compute use of the shared resources.
    fn acquire(&mut self) -> Result<()>;
    /// Write this frame's scalar arguments.
    fn write_scalars(&mut self, frame: &FrameScalars) -> Result<()>;
    /// Enqueue the kernel.
    fn dispatch(&mut self, plan: &DispatchPlan) -> Result<()>;
    /// Hand the shared resources back to graphics.
    fn release(&mut self) -> Result<()>;
    /// Block until all enqueued work is complete.
    fn finish(&mut self) -> Result<()>;
    /// Drop whatever a failed step left behind.
    fn abort(&mut self) {}
}

/// Drives the step state machine.
#[derive(Debug)]
pub struct Stepper {
    plan: DispatchPlan,
    state: StepState,
    frames: u64,
}

impl Stepper {
    pub fn new(max_particles: u32) -> Self {
        Self {
            plan: DispatchPlan::new(max_particles, WORKGROUP_SIZE),
            state: StepState::Idle,
            frames: 0,
        }
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Completed steps.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one full step. Any failure aborts the whole step; the shared
    /// resources go back to graphics and the stepper returns to `Idle`.
    pub fn step<Q, B, V>(&mut self, queue: &mut Q, shared: &mut SharedSet<B, V>, frame: &FrameScalars) -> Result<()>
    where
        Q: ComputeQueue + ?Sized,
    {
        if self.state != StepState::Idle {
            return Err(RainError::Dispatch(format!(
                "step started in state {:?}",
                self.state
            )));
        }

        match self.run(queue, shared, frame) {
            Ok(()) => {
                self.state = StepState::Idle;
                self.frames += 1;
                Ok(())
            }
            Err(e) => {
                log::warn!("Simulation step failed in state {:?}: {}", self.state, e);
                queue.abort();
                shared.reclaim_for_graphics();
                self.state = StepState::Idle;
                Err(e)
            }
        }
    }

    fn run<Q, B, V>(&mut self, queue: &mut Q, shared: &mut SharedSet<B, V>, frame: &FrameScalars) -> Result<()>
    where
        Q: ComputeQueue + ?Sized,
    {
        shared.acquire_for_compute()?;
        queue.acquire()?;
        self.state = StepState::Acquired;

        queue.write_scalars(frame)?;
        queue.dispatch(&self.plan)?;
        self.state = StepState::Dispatched;

        queue.release()?;
        shared.release_to_graphics()?;
        self.state = StepState::Released;

        queue.finish()
    }
}

/// [`ComputeQueue`] on a wgpu device.
///
/// Acquire opens a command encoder, dispatch records the compute pass,
/// release submits it and finish waits on that submission.
pub struct WgpuQueue<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    binding: &'a mut KernelBinding,
    encoder: Option<wgpu::CommandEncoder>,
    submission: Option<wgpu::SubmissionIndex>,
    scoped: bool,
}

impl<'a> WgpuQueue<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue, binding: &'a mut KernelBinding) -> Self {
        Self {
            device,
            queue,
            binding,
            encoder: None,
            submission: None,
            scoped: false,
        }
    }

    fn pop_scope(&mut self) -> Option<wgpu::Error> {
        if !self.scoped {
            return None;
        }
        self.scoped = false;
        pollster::block_on(self.device.pop_error_scope())
    }
}

impl ComputeQueue for WgpuQueue<'_> {
    fn acquire(&mut self) -> Result<()> {
        if self.encoder.is_some() {
            return Err(RainError::Dispatch("shared resources already acquired".into()));
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.scoped = true;
        self.encoder = Some(self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Rain Sim Encoder"),
        }));
        Ok(())
    }

    fn write_scalars(&mut self, frame: &FrameScalars) -> Result<()> {
        self.binding.set_frame_scalars(self.queue, frame);
        Ok(())
    }

    fn dispatch(&mut self, plan: &DispatchPlan) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| RainError::Dispatch("dispatch outside an acquired span".into()))?;

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Rain Sim Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(self.binding.pipeline());
        pass.set_bind_group(0, self.binding.bind_group(), &[]);
        pass.dispatch_workgroups(plan.groups, 1, 1);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| RainError::Dispatch("release without acquire".into()))?;
        self.submission = Some(self.queue.submit(std::iter::once(encoder.finish())));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let maintain = match self.submission.take() {
            Some(index) => wgpu::Maintain::WaitForSubmissionIndex(index),
            None => wgpu::Maintain::Wait,
        };
        self.device.poll(maintain);
        match self.pop_scope() {
            Some(err) => Err(RainError::Dispatch(err.to_string())),
            None => Ok(()),
        }
    }

    fn abort(&mut self) {
        self.encoder = None;
        self.submission = None;
        if let Some(err) = self.pop_scope() {
            log::debug!("Discarding error from aborted step: {}", err);
        }
    }
}
