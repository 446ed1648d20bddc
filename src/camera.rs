//! Camera interface consumed by the simulation and the renderer.

use glam::{Mat4, Vec3};

/// Read-only view of a camera. Queried fresh every frame.
pub trait Camera {
    /// Eye position in world space.
    fn eye_position(&self) -> Vec3;
    fn view(&self) -> Mat4;
    fn projection(&self) -> Mat4;

    /// `projection * view`.
    fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Orbit camera used by the demo.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Horizontal rotation angle in radians.
    pub yaw: f32,
    /// Vertical rotation angle in radians.
    pub pitch: f32,
    /// Distance from the target point.
    pub distance: f32,
    /// Point the camera orbits around.
    pub target: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width / height of the target.
    pub aspect: f32,
}

impl OrbitCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.25,
            distance: 6.0,
            target: Vec3::new(0.0, 1.5, 0.0),
            fov_y: 60.0_f32.to_radians(),
            aspect,
        }
    }

    /// Spin around the target.
    pub fn orbit(&mut self, delta_yaw: f32) {
        self.yaw = (self.yaw + delta_yaw) % std::f32::consts::TAU;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl Camera for OrbitCamera {
    fn eye_position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, 0.1, 100.0)
    }
}
