// ===== DEVICE ENUM =====

/// Where a tensor's data resides
///
/// `GPU` data lives in a wgpu buffer and is only available with the `gpu`
/// feature. Moving a tensor between the two is explicit via `Tensor::to_device`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Device {
    #[default]
    CPU,
    GPU,
}

impl Device {
    #[must_use]
    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::GPU)
    }

    /// Returns `Device::GPU` if a GPU adapter could be initialized
    #[must_use]
    pub fn gpu() -> Option<Self> {
        #[cfg(feature = "gpu")]
        {
            if crate::gpu::is_gpu_available() {
                return Some(Device::GPU);
            }
        }
        None
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::CPU => write!(f, "cpu"),
            Device::GPU => write!(f, "gpu"),
        }
    }
}
