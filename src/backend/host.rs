//! Parallel host backend
//!
//! Evaluates kernels over host memory with rayon. Small tensors stay on the
//! calling thread; larger ones are split into chunks of at least
//! `MIN_PARALLEL_LEN` elements.

use rayon::prelude::*;
use tracing::trace;

use super::{Arg, Backend, Kernel, Layout, MAX_KERNEL_ARGS};
use crate::device::Device;
use crate::dtype::{DType, Scalar};
use crate::error::{EmberError, Result};
use crate::storage::{HostData, Storage};
use crate::tensor::Tensor;

const MIN_PARALLEL_LEN: usize = 4096;

/// Host-parallel backend
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

/// One kernel argument viewed at a fixed width
#[derive(Clone, Copy)]
enum Lane<'a, T> {
    Slice(&'a [T]),
    Splat(T),
}

impl<T: Copy> Lane<'_, T> {
    #[inline]
    fn at(&self, i: usize) -> T {
        match self {
            Lane::Slice(s) => s[i],
            Lane::Splat(v) => *v,
        }
    }
}

fn host_data<'a>(t: &'a Tensor) -> Result<&'a HostData> {
    match t.storage() {
        Storage::Host(data) => Ok(data),
        #[cfg(feature = "gpu")]
        Storage::Gpu(_) => Err(EmberError::DeviceError(
            "host backend received a GPU tensor".to_string(),
        )),
    }
}

fn lanes_f32<'a>(args: &[Arg<'a>]) -> Result<Vec<Lane<'a, f32>>> {
    args.iter()
        .map(|arg| match *arg {
            Arg::Tensor(t) => match host_data(t)? {
                HostData::F32(v) => Ok(Lane::Slice(v.as_slice())),
                other => Err(EmberError::DTypeMismatch {
                    expected: DType::F32,
                    actual: other.dtype(),
                }),
            },
            Arg::Scalar(Scalar::F32(v)) => Ok(Lane::Splat(v)),
            Arg::Scalar(s) => Err(EmberError::DTypeMismatch {
                expected: DType::F32,
                actual: s.dtype(),
            }),
        })
        .collect()
}

fn lanes_f64<'a>(args: &[Arg<'a>]) -> Result<Vec<Lane<'a, f64>>> {
    args.iter()
        .map(|arg| match *arg {
            Arg::Tensor(t) => match host_data(t)? {
                HostData::F64(v) => Ok(Lane::Slice(v.as_slice())),
                other => Err(EmberError::DTypeMismatch {
                    expected: DType::F64,
                    actual: other.dtype(),
                }),
            },
            Arg::Scalar(Scalar::F64(v)) => Ok(Lane::Splat(v)),
            Arg::Scalar(s) => Err(EmberError::DTypeMismatch {
                expected: DType::F64,
                actual: s.dtype(),
            }),
        })
        .collect()
}

fn run<T>(len: usize, lanes: &[Lane<'_, T>], f: fn(&[T]) -> T) -> Vec<T>
where
    T: Copy + Default + Send + Sync,
{
    let n = lanes.len();
    (0..len)
        .into_par_iter()
        .with_min_len(MIN_PARALLEL_LEN)
        .map(|i| {
            let mut buf = [T::default(); MAX_KERNEL_ARGS];
            for (slot, lane) in buf.iter_mut().zip(lanes) {
                *slot = lane.at(i);
            }
            f(&buf[..n])
        })
        .collect()
}

impl Backend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn device(&self) -> Device {
        Device::CPU
    }

    fn elementwise(&self, kernel: &Kernel, args: &[Arg<'_>]) -> Result<Tensor> {
        let layout = Layout::of(kernel, args)?;
        if layout.device != Device::CPU {
            return Err(EmberError::DeviceError(format!(
                "kernel `{}` got {} tensors on the host backend",
                kernel.name, layout.device
            )));
        }
        trace!(kernel = kernel.name, len = layout.len, dtype = %layout.dtype, "host launch");

        let data = match layout.dtype {
            DType::F32 => HostData::F32(run(layout.len, &lanes_f32(args)?, kernel.host_f32)),
            DType::F64 => HostData::F64(run(layout.len, &lanes_f64(args)?, kernel.host_f64)),
        };
        Tensor::from_host(data, &layout.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::kernel;

    const FMA: Kernel = kernel!("fma", |a, x, b| host: a * x + b, device: "a * x + b");

    #[test]
    fn test_tensor_and_scalar_lanes() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let y = HostBackend
            .elementwise(
                &FMA,
                &[
                    Arg::Scalar(Scalar::F32(2.0)),
                    Arg::Tensor(&x),
                    Arg::Scalar(Scalar::F32(0.5)),
                ],
            )
            .unwrap();
        assert_eq!(y.shape(), &[3]);
        assert_eq!(y.to_vec().unwrap(), vec![2.5, 4.5, 6.5]);
    }

    #[test]
    fn test_f64_path() {
        let x = Tensor::new_f64(vec![1.0, -1.0], &[2]).unwrap();
        let y = HostBackend
            .elementwise(
                &FMA,
                &[Arg::Tensor(&x), Arg::Tensor(&x), Arg::Scalar(Scalar::F64(1.0))],
            )
            .unwrap();
        assert_eq!(y.dtype(), DType::F64);
        assert_eq!(y.to_vec_f64().unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_large_input_keeps_order() {
        let n = 3 * MIN_PARALLEL_LEN + 17;
        let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let x = Tensor::new(data, &[n]).unwrap();
        let y = HostBackend
            .elementwise(
                &FMA,
                &[
                    Arg::Scalar(Scalar::F32(1.0)),
                    Arg::Tensor(&x),
                    Arg::Scalar(Scalar::F32(1.0)),
                ],
            )
            .unwrap()
            .to_vec()
            .unwrap();
        assert!(y.iter().enumerate().all(|(i, &v)| v == i as f32 + 1.0));
    }

    #[test]
    fn test_empty_tensor() {
        let x = Tensor::new(vec![], &[0, 4]).unwrap();
        let y = HostBackend
            .elementwise(
                &FMA,
                &[Arg::Tensor(&x), Arg::Tensor(&x), Arg::Tensor(&x)],
            )
            .unwrap();
        assert_eq!(y.shape(), &[0, 4]);
        assert!(y.is_empty());
    }
}
