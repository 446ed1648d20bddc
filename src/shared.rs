//! Ownership tokens for resources shared between compute and graphics.
//!
//! The position buffer and both field textures are read by the kernel and by
//! the renderer. At any instant exactly one side owns each of them, and the
//! only way to move ownership is [`Shared::acquire_for_compute`] and
//! [`Shared::release_to_graphics`].

use std::fmt;

use crate::error::{RainError, Result};

/// Side that currently holds a shared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Compute,
    Graphics,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Compute => write!(f, "compute"),
            Owner::Graphics => write!(f, "graphics"),
        }
    }
}

/// A resource plus the token saying who may touch it.
///
/// Starts out owned by graphics, since the renderer can draw the initial
/// upload before the first simulation step.
#[derive(Debug)]
pub struct Shared<T> {
    name: &'static str,
    owner: Owner,
    inner: T,
}

impl<T> Shared<T> {
    pub fn new(name: &'static str, inner: T) -> Self {
        Self {
            name,
            owner: Owner::Graphics,
            inner,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Move ownership from graphics to compute.
    pub fn acquire_for_compute(&mut self) -> Result<()> {
        self.transfer(Owner::Graphics, Owner::Compute)
    }

    /// Move ownership from compute back to graphics.
    pub fn release_to_graphics(&mut self) -> Result<()> {
        self.transfer(Owner::Compute, Owner::Graphics)
    }

    fn transfer(&mut self, from: Owner, to: Owner) -> Result<()> {
        if self.owner != from {
            return Err(self.not_held());
        }
        self.owner = to;
        Ok(())
    }

    /// Borrow for the kernel. Fails unless compute holds the token.
    pub fn compute(&self) -> Result<&T> {
        self.borrow_as(Owner::Compute)
    }

    /// Borrow for the renderer. Fails unless graphics holds the token.
    pub fn graphics(&self) -> Result<&T> {
        self.borrow_as(Owner::Graphics)
    }

    fn borrow_as(&self, side: Owner) -> Result<&T> {
        if self.owner == side {
            Ok(&self.inner)
        } else {
            Err(self.not_held())
        }
    }

    fn not_held(&self) -> RainError {
        RainError::Ownership {
            resource: self.name,
            held_by: self.owner,
        }
    }

    /// Take the resource out for teardown, whoever holds it.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

/// The three resources that cross the compute/graphics boundary.
#[derive(Debug)]
pub struct SharedSet<B = wgpu::Buffer, V = wgpu::TextureView> {
    pub positions: Shared<B>,
    pub height_field: Shared<V>,
    pub normal_field: Shared<V>,
    acquires: u64,
    releases: u64,
}

impl<B, V> SharedSet<B, V> {
    pub fn new(positions: B, height_field: V, normal_field: V) -> Self {
        Self {
            positions: Shared::new("positions", positions),
            height_field: Shared::new("height_field", height_field),
            normal_field: Shared::new("normal_field", normal_field),
            acquires: 0,
            releases: 0,
        }
    }

    /// Acquire all three for compute. On failure nothing stays acquired.
    pub fn acquire_for_compute(&mut self) -> Result<()> {
        self.positions.acquire_for_compute()?;
        if let Err(e) = self.height_field.acquire_for_compute() {
            self.positions.release_to_graphics()?;
            return Err(e);
        }
        if let Err(e) = self.normal_field.acquire_for_compute() {
            self.height_field.release_to_graphics()?;
            self.positions.release_to_graphics()?;
            return Err(e);
        }
        self.acquires += 1;
        Ok(())
    }

    /// Release all three back to graphics.
    pub fn release_to_graphics(&mut self) -> Result<()> {
        self.positions.release_to_graphics()?;
        self.height_field.release_to_graphics()?;
        self.normal_field.release_to_graphics()?;
        self.releases += 1;
        Ok(())
    }

    /// Hand back anything compute still holds. Used after a failed frame.
    pub fn reclaim_for_graphics(&mut self) {
        let mut reclaimed = false;
        for owner in [
            &mut self.positions.owner,
            &mut self.height_field.owner,
            &mut self.normal_field.owner,
        ] {
            if *owner == Owner::Compute {
                *owner = Owner::Graphics;
                reclaimed = true;
            }
        }
        if reclaimed {
            self.releases += 1;
        }
    }

    /// Whether compute currently holds the set.
    pub fn held_by_compute(&self) -> bool {
        self.positions.owner() == Owner::Compute
    }

    pub fn acquire_count(&self) -> u64 {
        self.acquires
    }

    pub fn release_count(&self) -> u64 {
        self.releases
    }

    pub fn into_parts(self) -> (B, V, V) {
        (
            self.positions.into_inner(),
            self.height_field.into_inner(),
            self.normal_field.into_inner(),
        )
    }
}
