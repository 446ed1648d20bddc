//! # rainfall - GPU rain particles
//!
//! A rain particle system where a compute kernel moves the drops and a point
//! renderer draws them straight from the same GPU buffer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rainfall::prelude::*;
//!
//! let config = RainConfig::new().with_device(DeviceClass::Gpu).with_max_particles(50_000);
//! let context = ComputeContext::new(config.device, &KernelSource::builtin())?;
//!
//! let height = HeightField::procedural(256, 256)?;
//! let normal = NormalField::from_height(&height, 8.0);
//! let fields = FieldTextures::upload(context.device(), context.queue(), &height, &normal)?;
//!
//! let target = HeadlessTarget::new(context.device(), 1280, 720)?;
//! let mut rain = Raindrops::new(context, &fields, target.render_target(), &config)?;
//! let camera = OrbitCamera::new(target.aspect());
//!
//! // Every frame: update first, then draw with the same camera
//! rain.update_simulation(16, &camera)?;
//! let ctx = rain.context()?;
//! let mut encoder = ctx.device().create_command_encoder(&Default::default());
//! {
//!     let mut pass = target.begin_pass(&mut encoder);
//!     rain.draw(&mut pass, &camera)?;
//! }
//! ctx.queue().submit(std::iter::once(encoder.finish()));
//!
//! rain.destroy();
//! ```
//!
//! ## Frame protocol
//!
//! The position buffer and both terrain fields are shared between the kernel
//! and the renderer. Each [`Raindrops::update_simulation`] call acquires them
//! for compute, writes the frame's delta time and eye position, dispatches
//! the kernel, releases them back to graphics and waits for the device. Only
//! then may [`Raindrops::draw`] read the buffer.
//!
//! | Step | Module |
//! |------|--------|
//! | Device selection, kernel compile | [`device`] |
//! | Initial particle data | [`spawn`] |
//! | Ownership tokens | [`shared`] |
//! | Kernel arguments | [`binding`] |
//! | Per-frame step | [`stepper`] |
//! | Drawing | [`render`] |
//! | Release | [`teardown`] |

pub mod binding;
pub mod buffers;
pub mod camera;
pub mod config;
pub mod device;
mod error;
pub mod field;
pub mod headless;
mod raindrops;
pub mod render;
pub mod shared;
pub mod spawn;
pub mod stepper;
pub mod teardown;
pub mod time;

pub use bytemuck;
pub use glam::{Mat4, Vec3, Vec4};

pub use camera::{Camera, OrbitCamera};
pub use config::RainConfig;
pub use device::{ComputeContext, DeviceClass, KernelSource};
pub use error::{RainError, Result};
pub use field::{FieldTextures, HeightField, NormalField};
pub use raindrops::Raindrops;
pub use render::RenderTarget;
pub use spawn::{ParticleData, SpawnParams};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use rainfall::prelude::*;
/// ```
pub mod prelude {
    pub use crate::camera::{Camera, OrbitCamera};
    pub use crate::config::RainConfig;
    pub use crate::device::{ComputeContext, DeviceClass, KernelSource};
    pub use crate::error::{RainError, Result};
    pub use crate::field::{FieldTextures, HeightField, NormalField};
    pub use crate::headless::HeadlessTarget;
    pub use crate::raindrops::Raindrops;
    pub use crate::render::RenderTarget;
    pub use crate::time::FrameClock;
    pub use crate::{Mat4, Vec3, Vec4};
}
