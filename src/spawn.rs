//! Initial particle state.
//!
//! Raindrops spawn inside a box of side `cluster_scale` centred on the
//! origin in x/z and above a small floor in y. Generation is driven by a
//! seeded RNG, so the same [`SpawnParams`] always produce the same arrays.

use glam::Vec4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RainError, Result};

/// Number of texture variants a drop can pick from (stored in `seed.w`).
pub const DROP_TYPES: u32 = 9;

/// Random draws above this value get a highlighted flash scalar.
const FLASH_THRESHOLD: f32 = 0.75;

/// Parameters controlling initial particle generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnParams {
    /// Number of particles, fixed for the lifetime of the system.
    pub max_particles: u32,
    /// Side length of the spawn volume.
    pub cluster_scale: f32,
    /// Scale applied to spawn velocities.
    pub velo_factor: f32,
    /// Spawn heights at or below this value are redrawn.
    pub spawn_floor: f32,
    /// RNG seed.
    pub seed: u64,
    /// Upper bound on redraws for a single particle's height.
    pub max_spawn_retries: u32,
}

impl Default for SpawnParams {
    fn default() -> Self {
        Self {
            max_particles: 65_536,
            cluster_scale: 7.0,
            velo_factor: 40.0,
            spawn_floor: 0.1,
            seed: 1,
            max_spawn_retries: 1024,
        }
    }
}

/// Three index-aligned particle arrays.
///
/// Particle `i` is `positions[i]`, `seeds[i]` and `velocities[i]`; viewed as
/// floats it occupies `[4i, 4i + 4)` in each array.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleData {
    /// `(x, y, z, 1)`; the only array the kernel mutates.
    pub positions: Vec<Vec4>,
    /// Spawn position plus drop type in `w`.
    pub seeds: Vec<Vec4>,
    /// Velocity plus flash scalar in `w`.
    pub velocities: Vec<Vec4>,
}

impl ParticleData {
    /// Generate particles from `params.seed`.
    pub fn generate(params: &SpawnParams) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(params.seed);
        Self::generate_with(params, &mut rng)
    }

    /// Generate particles from an arbitrary random source.
    pub fn generate_with<R: Rng + ?Sized>(params: &SpawnParams, rng: &mut R) -> Result<Self> {
        let n = params.max_particles as usize;
        let mut positions = Vec::with_capacity(n);
        let mut seeds = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);

        let scale = params.cluster_scale;
        let velo = params.velo_factor;

        for index in 0..params.max_particles {
            let x = (rng.gen::<f32>() - 0.5) * scale;
            let y = spawn_height(params, rng, index)?;
            let z = (rng.gen::<f32>() - 0.5) * scale;
            let kind = rng.gen_range(0..DROP_TYPES) as f32;

            seeds.push(Vec4::new(x, y, z, kind));
            positions.push(Vec4::new(x, y, z, 1.0));

            let vx = velo * (rng.gen::<f32>() / 20.0);
            let vy = velo * ((rng.gen::<f32>() + 0.2) / 10.0);
            let vz = velo * (rng.gen::<f32>() / 20.0);
            let r = rng.gen::<f32>();
            let flash = if r > FLASH_THRESHOLD { 1.0 + r } else { 1.0 };
            velocities.push(Vec4::new(vx, vy, vz, flash));
        }

        Ok(Self {
            positions,
            seeds,
            velocities,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions as a dense float array of length `4 * len()`.
    pub fn position_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn seed_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.seeds)
    }

    pub fn velocity_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.velocities)
    }

    /// Fraction of particles with a highlighted flash scalar.
    pub fn flash_fraction(&self) -> f32 {
        if self.velocities.is_empty() {
            return 0.0;
        }
        let lit = self.velocities.iter().filter(|v| v.w > 1.0).count();
        lit as f32 / self.velocities.len() as f32
    }
}

/// Rejection-sample a height strictly above the floor.
fn spawn_height<R: Rng + ?Sized>(params: &SpawnParams, rng: &mut R, index: u32) -> Result<f32> {
    for _ in 0..params.max_spawn_retries {
        let y = rng.gen::<f32>() * params.cluster_scale;
        if y > params.spawn_floor {
            return Ok(y);
        }
    }
    Err(RainError::SpawnExhausted {
        index,
        floor: params.spawn_floor,
        retries: params.max_spawn_retries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn params(n: u32) -> SpawnParams {
        SpawnParams {
            max_particles: n,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let a = ParticleData::generate(&params(2048)).unwrap();
        let b = ParticleData::generate(&params(2048)).unwrap();
        let bits = |d: &ParticleData| -> Vec<u32> {
            d.position_floats()
                .iter()
                .chain(d.seed_floats())
                .chain(d.velocity_floats())
                .map(|f| f.to_bits())
                .collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_different_seed_differs() {
        let a = ParticleData::generate(&params(64)).unwrap();
        let b = ParticleData::generate(&SpawnParams {
            seed: 2,
            ..params(64)
        })
        .unwrap();
        assert_ne!(a.positions, b.positions);
    }

    #[test]
    fn test_layout() {
        let data = ParticleData::generate(&params(100)).unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(data.position_floats().len(), 400);
        assert_eq!(data.seed_floats().len(), 400);
        assert_eq!(data.velocity_floats().len(), 400);
        // Particle 7 lives at floats [28, 32)
        assert_eq!(data.position_floats()[28], data.positions[7].x);
        assert_eq!(data.position_floats()[31], 1.0);
    }

    #[test]
    fn test_spawn_ranges() {
        let p = params(10_000);
        let data = ParticleData::generate(&p).unwrap();
        let half = p.cluster_scale / 2.0;
        for (pos, seed) in data.positions.iter().zip(&data.seeds) {
            assert!(pos.y > p.spawn_floor);
            assert!(pos.y <= p.cluster_scale);
            assert!(pos.x >= -half && pos.x <= half);
            assert!(pos.z >= -half && pos.z <= half);
            assert_eq!(pos.w, 1.0);
            assert_eq!(pos.truncate(), seed.truncate());
            assert!(seed.w >= 0.0 && seed.w < DROP_TYPES as f32);
            assert_eq!(seed.w.fract(), 0.0);
        }
    }

    #[test]
    fn test_velocity_ranges() {
        let p = params(5_000);
        let data = ParticleData::generate(&p).unwrap();
        for v in &data.velocities {
            assert!(v.x >= 0.0 && v.x <= p.velo_factor / 20.0);
            assert!(v.z >= 0.0 && v.z <= p.velo_factor / 20.0);
            assert!(v.y > p.velo_factor * 0.019 && v.y < p.velo_factor * 0.121);
        }
    }

    #[test]
    fn test_flash_distribution() {
        let data = ParticleData::generate(&params(20_000)).unwrap();
        for v in &data.velocities {
            assert!(v.w == 1.0 || (v.w > 1.0 && v.w <= 2.0), "flash {}", v.w);
        }
        let frac = data.flash_fraction();
        assert!((frac - 0.25).abs() < 0.05, "highlighted fraction {}", frac);
    }

    /// Random source that only ever yields zero.
    struct Zeros;

    impl RngCore for Zeros {
        fn next_u32(&mut self) -> u32 {
            0
        }
        fn next_u64(&mut self) -> u64 {
            0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }

    #[test]
    fn test_rejection_loop_is_bounded() {
        let p = SpawnParams {
            max_spawn_retries: 16,
            ..params(4)
        };
        let err = ParticleData::generate_with(&p, &mut Zeros).unwrap_err();
        match err {
            RainError::SpawnExhausted { index, retries, .. } => {
                assert_eq!(index, 0);
                assert_eq!(retries, 16);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty() {
        let data = ParticleData::generate(&params(0)).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.flash_fraction(), 0.0);
    }
}
