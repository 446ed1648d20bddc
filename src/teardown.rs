//! Ordered, exactly-once release of GPU resources.

use crate::error::{RainError, Result};

/// Logical resources in the order they are released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Buffers the kernel writes (positions).
    MutableBuffers,
    /// Compute-only inputs (velocities, seeds).
    ReadOnlyBuffers,
    /// Views over the height and normal fields.
    FieldBuffers,
    /// Compute pipeline, bind group and params block.
    Kernel,
    /// Particle render pipeline and its uniforms.
    RenderPipeline,
    Queue,
    /// Compiled kernel module.
    Program,
    /// The device itself.
    Context,
}

impl ResourceKind {
    pub const RELEASE_ORDER: [ResourceKind; 8] = [
        ResourceKind::MutableBuffers,
        ResourceKind::ReadOnlyBuffers,
        ResourceKind::FieldBuffers,
        ResourceKind::Kernel,
        ResourceKind::RenderPipeline,
        ResourceKind::Queue,
        ResourceKind::Program,
        ResourceKind::Context,
    ];
}

/// Observes releases as they happen.
pub trait ReleaseTracker {
    fn released(&mut self, kind: ResourceKind);
}

/// Logs each release at `debug`.
#[derive(Debug, Default)]
pub struct LogTracker;

impl ReleaseTracker for LogTracker {
    fn released(&mut self, kind: ResourceKind) {
        log::debug!("Released {:?}", kind);
    }
}

/// A bundle of resources that knows how to release itself in order.
pub trait Teardown {
    fn release(self, tracker: &mut dyn ReleaseTracker);
}

/// Holds a resource bundle until it is destroyed.
///
/// After [`Lifecycle::destroy`] every access returns
/// [`RainError::Destroyed`] and further destroys do nothing.
#[derive(Debug)]
pub struct Lifecycle<T> {
    inner: Option<T>,
}

impl<T: Teardown> Lifecycle<T> {
    pub fn new(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn get(&self) -> Result<&T> {
        self.inner.as_ref().ok_or(RainError::Destroyed)
    }

    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.inner.as_mut().ok_or(RainError::Destroyed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release everything. Returns `false` if already destroyed.
    pub fn destroy(&mut self, tracker: &mut dyn ReleaseTracker) -> bool {
        match self.inner.take() {
            Some(inner) => {
                inner.release(tracker);
                true
            }
            None => false,
        }
    }
}
