//! End-to-end tests on a software (CPU-class) adapter.
//!
//! Skipped with a note on stderr when no such adapter is available.

use std::collections::HashMap;

use rainfall::prelude::*;
use rainfall::teardown::{ReleaseTracker, ResourceKind};

fn cpu_context(kernel: &KernelSource) -> Option<Result<ComputeContext>> {
    match ComputeContext::new(DeviceClass::Cpu, kernel) {
        Err(RainError::NoMatchingDevice(_)) | Err(RainError::DeviceRequest(_)) => {
            eprintln!("skipping: no usable CPU adapter");
            None
        }
        other => Some(other),
    }
}

struct Scene {
    rain: Raindrops,
    target: HeadlessTarget,
    camera: OrbitCamera,
}

fn scene(max_particles: u32) -> Option<Scene> {
    let context = cpu_context(&KernelSource::builtin())?.expect("CPU context");
    let height = HeightField::procedural(64, 64).unwrap();
    let normal = NormalField::from_height(&height, 8.0);
    let fields = FieldTextures::upload(context.device(), context.queue(), &height, &normal).unwrap();
    let target = HeadlessTarget::new(context.device(), 128, 96).unwrap();

    let config = RainConfig::new()
        .with_device(DeviceClass::Cpu)
        .with_max_particles(max_particles)
        .with_seed(1);
    let rain = Raindrops::new(context, &fields, target.render_target(), &config).unwrap();
    let camera = OrbitCamera::new(target.aspect());
    Some(Scene { rain, target, camera })
}

#[test]
fn test_initial_state() {
    let Some(s) = scene(1024) else { return };

    let first = s.rain.initial_data().positions[0];
    assert!(first.y > 0.1);
    assert_eq!(first.w, 1.0);

    let uploaded = s.rain.read_positions().unwrap();
    assert_eq!(uploaded.len(), 1024);
    assert_eq!(uploaded, s.rain.initial_data().positions);
}

#[test]
fn test_one_step_moves_particles() {
    let Some(mut s) = scene(1024) else { return };

    s.rain.update_simulation(16, &s.camera).unwrap();
    let after = s.rain.read_positions().unwrap();
    let moved = after
        .iter()
        .zip(&s.rain.initial_data().positions)
        .filter(|(a, b)| a != b)
        .count();
    assert!(moved > 0);
    assert!(after.iter().all(|p| p.w == 1.0));
    assert_eq!(s.rain.frames(), 1);
}

#[test]
fn test_scalars_reflect_latest_frame() {
    let Some(mut s) = scene(256) else { return };

    s.rain.update_simulation(16, &s.camera).unwrap();
    s.camera.orbit(1.0);
    s.rain.update_simulation(40, &s.camera).unwrap();

    let params = s.rain.kernel_params().unwrap();
    assert_eq!(params.delta_time, 1e-3 * 40.0);
    assert_eq!(params.eye, s.camera.eye_position().to_array());
    assert_eq!(params.particle_count, 256);

    let (acquires, releases) = s.rain.handoff_counts().unwrap();
    assert_eq!(acquires, releases);
}

#[test]
fn test_draw_touches_pixels() {
    let Some(mut s) = scene(4096) else { return };

    s.rain.update_simulation(16, &s.camera).unwrap();
    let ctx = s.rain.context().unwrap();
    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
        let mut pass = s.target.begin_pass(&mut encoder);
        s.rain.draw(&mut pass, &s.camera).unwrap();
    }
    ctx.queue().submit(std::iter::once(encoder.finish()));

    let pixels = s.target.read_pixels(ctx.device(), ctx.queue()).unwrap();
    assert_eq!(pixels.len(), 128 * 96 * 4);
    let background = &pixels[..4];
    assert!(pixels.chunks(4).any(|px| px != background));
}

#[derive(Default)]
struct CountingTracker(HashMap<ResourceKind, u32>);

impl ReleaseTracker for CountingTracker {
    fn released(&mut self, kind: ResourceKind) {
        *self.0.entry(kind).or_default() += 1;
    }
}

#[test]
fn test_destroy_once_and_reject_use() {
    let Some(mut s) = scene(1024) else { return };

    // Created before teardown so a pass can still be opened afterwards
    let mut encoder = s
        .rain
        .context()
        .unwrap()
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

    let mut tracker = CountingTracker::default();
    s.rain.destroy_with(&mut tracker);
    s.rain.destroy_with(&mut tracker);

    for kind in ResourceKind::RELEASE_ORDER {
        assert_eq!(tracker.0.get(&kind), Some(&1), "{:?}", kind);
    }
    assert!(s.rain.is_destroyed());
    assert!(matches!(
        s.rain.update_simulation(16, &s.camera),
        Err(RainError::Destroyed)
    ));
    assert!(matches!(s.rain.read_positions(), Err(RainError::Destroyed)));
    assert!(matches!(s.rain.context(), Err(RainError::Destroyed)));
    assert!(matches!(s.rain.kernel_params(), Err(RainError::Destroyed)));
    assert!(matches!(s.rain.handoff_counts(), Err(RainError::Destroyed)));
    {
        let mut pass = s.target.begin_pass(&mut encoder);
        assert!(matches!(
            s.rain.draw(&mut pass, &s.camera),
            Err(RainError::Destroyed)
        ));
    }
    drop(encoder);

    assert_eq!(s.rain.initial_data().len(), 1024);
    assert_eq!(s.rain.max_particles(), 1024);
}

/// Camera pinned at one eye position.
struct FixedEye(Vec3);

impl Camera for FixedEye {
    fn eye_position(&self) -> Vec3 {
        self.0
    }

    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.0, self.0 - Vec3::Z, Vec3::Y)
    }

    fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0)
    }
}

#[test]
fn test_cluster_scale_reaches_kernel() {
    let Some(context) = cpu_context(&KernelSource::builtin()) else { return };
    let context = context.expect("CPU context");

    let height = HeightField::new(16, 16, vec![0.0; 256]).unwrap();
    let normal = NormalField::from_height(&height, 1.0);
    let fields = FieldTextures::upload(context.device(), context.queue(), &height, &normal).unwrap();
    let target = HeadlessTarget::new(context.device(), 32, 32).unwrap();

    let config = RainConfig::new()
        .with_device(DeviceClass::Cpu)
        .with_max_particles(1024)
        .with_cluster_scale(20.0);
    let mut rain = Raindrops::new(context, &fields, target.render_target(), &config).unwrap();

    let initial = rain.initial_data().positions.clone();
    assert!(initial.iter().any(|p| p.x.abs() > 3.5));

    // A zero-length step over flat ground must leave every drop in place
    rain.update_simulation(0, &FixedEye(Vec3::new(0.0, 1.0, 0.0))).unwrap();
    assert_eq!(rain.kernel_params().unwrap().cluster_scale, 20.0);

    let after = rain.read_positions().unwrap();
    let changed = after.iter().zip(&initial).filter(|(a, b)| a != b).count();
    assert_eq!(changed, 0);
}

#[test]
fn test_oversized_field_fails_upload() {
    let Some(context) = cpu_context(&KernelSource::builtin()) else { return };
    let context = context.expect("CPU context");

    let width = context.device().limits().max_texture_dimension_2d + 1;
    let height = HeightField::new(width, 1, vec![0.0; width as usize]).unwrap();
    let normal = NormalField::from_height(&height, 1.0);

    let err = FieldTextures::upload(context.device(), context.queue(), &height, &normal)
        .err()
        .expect("upload should fail");
    assert!(matches!(err, RainError::Resource { what: "height field", .. }));
    assert!(err.is_construction_error());
}

#[test]
fn test_bad_kernel_is_fatal() {
    let kernel = KernelSource {
        label: "broken.wgsl".into(),
        source: "@compute @workgroup_size(128) fn rain_sim() { let x: f32 = ; }".into(),
    };
    let Some(result) = cpu_context(&kernel) else { return };
    match result {
        Err(RainError::KernelCompile { label, .. }) => assert_eq!(label, "broken.wgsl"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("broken kernel compiled"),
    }
}
