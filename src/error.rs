//! Error types for rainfall.
//!
//! Every failure surfaces immediately. Construction errors (no device, kernel
//! does not compile, resource creation) are fatal to [`Raindrops::new`], and
//! per-frame errors abort that frame's update and are returned to the caller.
//!
//! [`Raindrops::new`]: crate::Raindrops::new

use crate::device::DeviceClass;
use crate::shared::Owner;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RainError>;

/// Errors produced by the rain particle system.
#[derive(Debug, thiserror::Error)]
pub enum RainError {
    // ----- configuration -----
    /// No adapter of the requested class was found on any backend.
    #[error("no {0} adapter found on any backend")]
    NoMatchingDevice(DeviceClass),

    /// The compute kernel (or a render shader) failed validation.
    #[error("failed to compile `{label}`: {message}")]
    KernelCompile { label: String, message: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A kernel binding name is not part of the binding table.
    #[error("unknown kernel binding `{0}`")]
    UnknownBinding(String),

    // ----- resources -----
    /// Failed to create the logical device.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// A buffer, texture or pipeline could not be created.
    #[error("failed to create {what}: {message}")]
    Resource { what: &'static str, message: String },

    // ----- per-frame -----
    /// A shared resource was used by the side that does not hold it.
    #[error("`{resource}` is currently owned by {held_by}")]
    Ownership { resource: &'static str, held_by: Owner },

    /// A step of the per-frame compute protocol failed.
    #[error("simulation step failed: {0}")]
    Dispatch(String),

    /// Mapping a buffer for readback failed.
    #[error("failed to map GPU buffer: {0}")]
    BufferMapping(String),

    /// The system was used after `destroy()`.
    #[error("particle system has been destroyed")]
    Destroyed,

    // ----- assets -----
    /// Failed to read a file from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode or encode an image.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to parse a configuration file.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // ----- spawn -----
    /// The spawn rejection loop ran out of retries for one particle.
    #[error("particle {index}: no spawn height above {floor} after {retries} draws")]
    SpawnExhausted { index: u32, floor: f32, retries: u32 },
}

impl RainError {
    /// Wrap an I/O error together with the path that caused it.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        RainError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Shorthand for [`RainError::Resource`].
    pub fn resource(what: &'static str, message: impl ToString) -> Self {
        RainError::Resource {
            what,
            message: message.to_string(),
        }
    }

    /// Whether this error was raised while building the system rather than
    /// while stepping a frame.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            RainError::NoMatchingDevice(_)
                | RainError::KernelCompile { .. }
                | RainError::InvalidConfig(_)
                | RainError::UnknownBinding(_)
                | RainError::DeviceRequest(_)
                | RainError::Resource { .. }
                | RainError::SpawnExhausted { .. }
        )
    }
}
