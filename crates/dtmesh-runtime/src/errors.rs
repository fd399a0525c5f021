use thiserror::Error;

/// Represents errors that can occur while resolving devices and cluster coordinates from a [`DeviceRuntime`].
///
/// [`DeviceRuntime`]: crate::DeviceRuntime
#[derive(Error, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    #[error("invalid value '{value}' for environment variable '{name}'; {reason}")]
    InvalidEnvironmentVariable { name: String, value: String, reason: String },

    #[error("invalid device specification '{spec}'; {reason}")]
    InvalidDeviceSpec { spec: String, reason: String },

    #[error("TPU topology error: {message}")]
    TpuTopology { message: String },
}

impl Error {
    /// Creates a new [`Error::InvalidDeviceSpec`].
    pub fn invalid_device_spec<S: Into<String>, R: Into<String>>(spec: S, reason: R) -> Self {
        Self::InvalidDeviceSpec { spec: spec.into(), reason: reason.into() }
    }

    /// Creates a new [`Error::TpuTopology`].
    pub fn tpu_topology<M: Into<String>>(message: M) -> Self {
        Self::TpuTopology { message: message.into() }
    }
}
