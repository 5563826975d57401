//! Tensor storage abstraction
//!
//! This module provides a unified interface for tensor data storage
//! that can be backed by either CPU memory or GPU buffers.

#[cfg(feature = "gpu")]
use crate::gpu::GpuBuffer;

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{EmberError, Result};

/// Host-resident element buffer, tagged with its width
#[derive(Clone, Debug, PartialEq)]
pub enum HostData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl HostData {
    pub fn dtype(&self) -> DType {
        match self {
            HostData::F32(_) => DType::F32,
            HostData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            HostData::F32(v) => v.len(),
            HostData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen (or copy) every element to f64
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            HostData::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            HostData::F64(v) => v.clone(),
        }
    }

    /// Build a buffer of `dtype` from f64 values, narrowing if needed
    pub fn from_f64(dtype: DType, values: Vec<f64>) -> Self {
        match dtype {
            DType::F32 => HostData::F32(values.into_iter().map(|x| x as f32).collect()),
            DType::F64 => HostData::F64(values),
        }
    }
}

/// Storage backend for tensor data
///
/// GPU storage is always f32; the buffer is reference counted so cloning a
/// tensor never copies device memory.
#[derive(Clone)]
pub enum Storage {
    /// CPU storage - data lives in main memory
    Host(HostData),

    /// GPU storage - data lives in GPU memory
    #[cfg(feature = "gpu")]
    Gpu(std::sync::Arc<GpuBuffer>),
}

impl Storage {
    pub fn dtype(&self) -> DType {
        match self {
            Storage::Host(data) => data.dtype(),
            #[cfg(feature = "gpu")]
            Storage::Gpu(_) => DType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Storage::Host(data) => data.len(),
            #[cfg(feature = "gpu")]
            Storage::Gpu(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> Device {
        match self {
            Storage::Host(_) => Device::CPU,
            #[cfg(feature = "gpu")]
            Storage::Gpu(_) => Device::GPU,
        }
    }

    /// Host view of the data; GPU storage is read back (a sync point)
    pub fn to_host(&self) -> Result<HostData> {
        match self {
            Storage::Host(data) => Ok(data.clone()),
            #[cfg(feature = "gpu")]
            Storage::Gpu(buffer) => Ok(HostData::F32(buffer.to_vec()?)),
        }
    }

    /// Copy to a specific device
    pub fn to_device(&self, device: Device) -> Result<Self> {
        match device {
            Device::CPU => Ok(Storage::Host(self.to_host()?)),
            Device::GPU => {
                #[cfg(feature = "gpu")]
                {
                    match self {
                        Storage::Gpu(_) => Ok(self.clone()),
                        Storage::Host(HostData::F32(data)) => {
                            let buffer = GpuBuffer::from_slice(data)?;
                            Ok(Storage::Gpu(std::sync::Arc::new(buffer)))
                        }
                        Storage::Host(HostData::F64(_)) => Err(EmberError::DTypeMismatch {
                            expected: DType::F32,
                            actual: DType::F64,
                        }),
                    }
                }
                #[cfg(not(feature = "gpu"))]
                {
                    Err(EmberError::DeviceError(
                        "GPU feature not enabled".to_string(),
                    ))
                }
            }
        }
    }

    /// Get the GPU buffer if this is GPU storage
    #[cfg(feature = "gpu")]
    pub fn gpu_buffer(&self) -> Option<&GpuBuffer> {
        match self {
            Storage::Gpu(buffer) => Some(buffer.as_ref()),
            Storage::Host(_) => None,
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Storage::Host(data) => write!(
                f,
                "Storage::Host({} {} elements)",
                data.len(),
                data.dtype()
            ),
            #[cfg(feature = "gpu")]
            Storage::Gpu(buffer) => write!(f, "Storage::Gpu({} elements)", buffer.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_data_widening() {
        let data = HostData::F32(vec![1.5, -2.0]);
        assert_eq!(data.to_f64_vec(), vec![1.5, -2.0]);
        assert_eq!(data.dtype(), DType::F32);
    }

    #[test]
    fn test_from_f64_narrows() {
        let data = HostData::from_f64(DType::F32, vec![0.25, 4.0]);
        assert_eq!(data, HostData::F32(vec![0.25, 4.0]));
    }

    #[test]
    fn test_host_storage_to_cpu_is_a_copy() {
        let storage = Storage::Host(HostData::F64(vec![1.0, 2.0, 3.0]));
        let moved = storage.to_device(Device::CPU).unwrap();
        assert_eq!(moved.len(), 3);
        assert_eq!(moved.dtype(), DType::F64);
        assert_eq!(moved.device(), Device::CPU);
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_gpu_unavailable_without_feature() {
        let storage = Storage::Host(HostData::F32(vec![1.0]));
        assert!(matches!(
            storage.to_device(Device::GPU),
            Err(EmberError::DeviceError(_))
        ));
    }
}
