//! Compute device selection and kernel compilation.
//!
//! A [`ComputeContext`] owns the logical device, its queue and the compiled
//! simulation kernel. The same device also serves the particle renderer, so
//! buffers written by the kernel can be drawn without leaving the GPU.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RainError, Result};

/// Built-in simulation kernel.
pub const RAIN_SIM_SOURCE: &str = include_str!("shaders/rain_sim.wgsl");

/// Name of the kernel entry point.
pub const KERNEL_ENTRY_POINT: &str = "rain_sim";

/// Class of device the simulation should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Software adapters (llvmpipe, WARP, SwiftShader).
    Cpu,
    /// Discrete, integrated or virtual GPUs.
    #[default]
    Gpu,
}

impl DeviceClass {
    /// Whether an adapter of the given type belongs to this class.
    pub fn matches(self, device_type: wgpu::DeviceType) -> bool {
        match self {
            DeviceClass::Cpu => device_type == wgpu::DeviceType::Cpu,
            DeviceClass::Gpu => matches!(
                device_type,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
            ),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Cpu => write!(f, "CPU"),
            DeviceClass::Gpu => write!(f, "GPU"),
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = RainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceClass::Cpu),
            "gpu" => Ok(DeviceClass::Gpu),
            other => Err(RainError::InvalidConfig(format!(
                "unknown device class `{other}` (expected `cpu` or `gpu`)"
            ))),
        }
    }
}

/// Kernel source text, treated as opaque until compiled.
#[derive(Debug, Clone)]
pub struct KernelSource {
    /// Label used for the shader module and in error messages.
    pub label: String,
    /// WGSL source.
    pub source: String,
}

impl KernelSource {
    /// The kernel shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            label: "rain_sim.wgsl".to_string(),
            source: RAIN_SIM_SOURCE.to_string(),
        }
    }

    /// Read a kernel from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| RainError::io(path, e))?;
        Ok(Self {
            label: path.display().to_string(),
            source,
        })
    }
}

impl Default for KernelSource {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Owned compute context: device, queue and compiled kernel program.
pub struct ComputeContext {
    class: DeviceClass,
    adapter_info: Option<wgpu::AdapterInfo>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    program: wgpu::ShaderModule,
}

impl ComputeContext {
    /// Select the first adapter of `class`, create a device on it and compile
    /// `kernel`.
    pub fn new(class: DeviceClass, kernel: &KernelSource) -> Result<Self> {
        pollster::block_on(Self::new_async(class, kernel))
    }

    /// Async version of [`ComputeContext::new`].
    pub async fn new_async(class: DeviceClass, kernel: &KernelSource) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = select_adapter(&instance, class)?;
        let info = adapter.get_info();
        log::info!(
            "Using {} adapter `{}` ({:?}, {:?})",
            class,
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Rain Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| {
            log::error!("Uncaptured wgpu error: {}", e);
        }));

        let program = compile(&device, kernel).await?;

        Ok(Self {
            class,
            adapter_info: Some(info),
            device,
            queue,
            program,
        })
    }

    /// Build a context on a device the caller already created for graphics.
    pub fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        class: DeviceClass,
        kernel: &KernelSource,
    ) -> Result<Self> {
        let program = pollster::block_on(compile(&device, kernel))?;
        Ok(Self {
            class,
            adapter_info: None,
            device,
            queue,
            program,
        })
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Adapter details, when this context selected the adapter itself.
    pub fn adapter_info(&self) -> Option<&wgpu::AdapterInfo> {
        self.adapter_info.as_ref()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The compiled kernel module.
    pub fn program(&self) -> &wgpu::ShaderModule {
        &self.program
    }

    /// Split into parts so teardown can release them one by one.
    pub(crate) fn into_parts(self) -> (wgpu::Device, wgpu::Queue, wgpu::ShaderModule) {
        (self.device, self.queue, self.program)
    }
}

fn select_adapter(instance: &wgpu::Instance, class: DeviceClass) -> Result<wgpu::Adapter> {
    for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
        let info = adapter.get_info();
        if !class.matches(info.device_type) {
            continue;
        }
        let caps = adapter.get_downlevel_capabilities();
        if !caps.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            log::debug!("Skipping `{}`: no compute shader support", info.name);
            continue;
        }
        return Ok(adapter);
    }
    Err(RainError::NoMatchingDevice(class))
}

/// Compile WGSL inside a validation scope so failures come back as errors
/// instead of going to the uncaptured handler.
pub(crate) async fn compile(device: &wgpu::Device, kernel: &KernelSource) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&kernel.label),
        source: wgpu::ShaderSource::Wgsl(kernel.source.as_str().into()),
    });
    match device.pop_error_scope().await {
        Some(err) => Err(RainError::KernelCompile {
            label: kernel.label.clone(),
            message: err.to_string(),
        }),
        None => Ok(module),
    }
}
