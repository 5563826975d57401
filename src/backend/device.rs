//! wgpu device backend
//!
//! Device tensors are always f32. Each kernel call becomes one compute
//! dispatch; results stay on the device until read back.

use std::sync::Arc;

use tracing::trace;

use super::{Arg, Backend, Kernel, Layout};
use crate::device::Device;
use crate::dtype::{DType, Scalar};
use crate::error::{EmberError, Result};
use crate::gpu::{self, DeviceArg};
use crate::storage::Storage;
use crate::tensor::Tensor;

/// GPU backend
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceBackend;

fn device_args<'a>(args: &[Arg<'a>]) -> Result<Vec<DeviceArg<'a>>> {
    args.iter()
        .map(|arg| match *arg {
            Arg::Tensor(t) => t
                .storage()
                .gpu_buffer()
                .map(DeviceArg::Buffer)
                .ok_or_else(|| {
                    EmberError::DeviceError("device backend received a host tensor".to_string())
                }),
            Arg::Scalar(Scalar::F32(v)) => Ok(DeviceArg::Scalar(v)),
            Arg::Scalar(s) => Err(EmberError::DTypeMismatch {
                expected: DType::F32,
                actual: s.dtype(),
            }),
        })
        .collect()
}

impl Backend for DeviceBackend {
    fn name(&self) -> &'static str {
        "device"
    }

    fn device(&self) -> Device {
        Device::GPU
    }

    fn elementwise(&self, kernel: &Kernel, args: &[Arg<'_>]) -> Result<Tensor> {
        let layout = Layout::of(kernel, args)?;
        if layout.device != Device::GPU {
            return Err(EmberError::DeviceError(format!(
                "kernel `{}` got {} tensors on the device backend",
                kernel.name, layout.device
            )));
        }
        trace!(kernel = kernel.name, len = layout.len, "device elementwise");

        let buffer = gpu::launch(kernel, &device_args(args)?, layout.len)?;
        Tensor::from_storage(Storage::Gpu(Arc::new(buffer)), &layout.shape)
    }
}
