use std::path::PathBuf;

use clap::Parser;
use rainfall::prelude::*;

/// Headless rain demo: simulate and render N frames offscreen.
#[derive(Parser, Debug)]
#[command(name = "rainfall", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device class to run on (cpu or gpu)
    #[arg(short, long)]
    device: Option<DeviceClass>,

    /// Number of drops
    #[arg(short, long)]
    particles: Option<u32>,

    /// Frames to run
    #[arg(short, long, default_value_t = 300)]
    frames: u64,

    /// Fixed frame time in milliseconds instead of wall-clock time
    #[arg(long)]
    fixed_step: Option<u64>,

    /// Render target size, WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720", value_parser = parse_size)]
    size: (u32, u32),

    /// Height map image (red channel); procedural terrain if omitted
    #[arg(long)]
    heightmap: Option<PathBuf>,

    /// Write the last frame to this PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let w = w.parse().map_err(|e| format!("bad width: {e}"))?;
    let h = h.parse().map_err(|e| format!("bad height: {e}"))?;
    Ok((w, h))
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        if e.is_construction_error() {
            log::error!("Failed to set up the rain system: {}", e);
        } else {
            log::error!("{}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RainConfig::load(path)?,
        None => RainConfig::default(),
    };
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(count) = cli.particles {
        config.max_particles = count;
    }
    config.validate()?;

    let kernel = match &config.kernel_path {
        Some(path) => KernelSource::from_file(path)?,
        None => KernelSource::builtin(),
    };
    let context = ComputeContext::new(config.device, &kernel)?;

    let height = match &cli.heightmap {
        Some(path) => HeightField::from_image(path)?,
        None => HeightField::procedural(256, 256)?,
    };
    let normal = NormalField::from_height(&height, 8.0);
    let fields = FieldTextures::upload(context.device(), context.queue(), &height, &normal)?;

    let (width, height_px) = cli.size;
    let target = HeadlessTarget::new(context.device(), width, height_px)?;
    let mut rain = Raindrops::new(context, &fields, target.render_target(), &config)?;
    let mut camera = OrbitCamera::new(target.aspect());

    let mut clock = match cli.fixed_step {
        Some(step) => FrameClock::new().with_fixed_step(step),
        None => FrameClock::new(),
    };

    for _ in 0..cli.frames {
        let delta_ms = clock.tick();
        camera.orbit(delta_ms as f32 * 1e-4);

        rain.update_simulation(delta_ms, &camera)?;

        let ctx = rain.context()?;
        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = target.begin_pass(&mut encoder);
            rain.draw(&mut pass, &camera)?;
        }
        ctx.queue().submit(std::iter::once(encoder.finish()));

        if clock.fps_updated() {
            log::info!("frame {}: {:.1} fps", clock.frame(), clock.fps());
        }
    }

    if let Some(path) = &cli.output {
        let ctx = rain.context()?;
        target.save_png(ctx.device(), ctx.queue(), path)?;
    }

    let (acquires, releases) = rain.handoff_counts()?;
    log::info!(
        "Ran {} frames in {:.2?} ({} acquires, {} releases)",
        rain.frames(),
        clock.elapsed(),
        acquires,
        releases
    );

    rain.destroy();
    Ok(())
}
