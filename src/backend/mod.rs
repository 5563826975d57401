//! Backend dispatch
//!
//! Every operator expresses its numeric work as [`Kernel`] launches against a
//! [`Backend`]. Two implementations exist:
//! - [`HostBackend`]: data-parallel over host memory with rayon
//! - [`DeviceBackend`] (feature `gpu`): one wgpu compute dispatch per kernel
//!
//! The backend is chosen from where the input tensors live; inputs split
//! across devices are rejected rather than transferred.

mod host;
mod kernel;

#[cfg(feature = "gpu")]
mod device;

#[cfg(feature = "gpu")]
pub use device::DeviceBackend;
pub use host::HostBackend;
pub(crate) use kernel::kernel;
pub use kernel::{Kernel, MAX_KERNEL_ARGS};

use crate::device::Device;
use crate::dtype::{DType, Scalar};
use crate::error::{EmberError, Result};
use crate::tensor::Tensor;

/// A kernel argument: an elementwise tensor or a broadcast scalar
#[derive(Clone, Copy, Debug)]
pub enum Arg<'a> {
    Tensor(&'a Tensor),
    Scalar(Scalar),
}

impl<'a> From<&'a Tensor> for Arg<'a> {
    fn from(t: &'a Tensor) -> Self {
        Arg::Tensor(t)
    }
}

impl From<Scalar> for Arg<'_> {
    fn from(s: Scalar) -> Self {
        Arg::Scalar(s)
    }
}

/// Capability shared by the host and device backends
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Where tensors produced by this backend live
    fn device(&self) -> Device;

    /// Evaluate `kernel` elementwise and return a freshly allocated tensor
    ///
    /// # Errors
    /// Arity, shape, dtype, or residency mismatches among `args`.
    fn elementwise(&self, kernel: &Kernel, args: &[Arg<'_>]) -> Result<Tensor>;
}

static HOST: HostBackend = HostBackend;

#[cfg(feature = "gpu")]
static DEVICE: DeviceBackend = DeviceBackend;

/// Pick the backend for a set of input tensors
///
/// # Errors
/// `DeviceError` when inputs live on different devices.
pub fn select(inputs: &[&Tensor]) -> Result<&'static dyn Backend> {
    let device = common_device(inputs.iter().copied())?;
    backend_for(device)
}

pub fn backend_for(device: Device) -> Result<&'static dyn Backend> {
    match device {
        Device::CPU => Ok(&HOST),
        Device::GPU => {
            #[cfg(feature = "gpu")]
            {
                Ok(&DEVICE)
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

fn common_device<'a>(tensors: impl Iterator<Item = &'a Tensor>) -> Result<Device> {
    let mut found: Option<Device> = None;
    for t in tensors {
        match found {
            None => found = Some(t.device()),
            Some(d) if d != t.device() => {
                return Err(EmberError::DeviceError(format!(
                    "operands live on {d} and {}; move them to one device first",
                    t.device()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(found.unwrap_or_default())
}

/// Output layout of an elementwise launch, validated across all arguments
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Layout {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub device: Device,
    pub len: usize,
}

impl Layout {
    pub(crate) fn of(kernel: &Kernel, args: &[Arg<'_>]) -> Result<Self> {
        if args.len() != kernel.arity() || args.len() > MAX_KERNEL_ARGS {
            return Err(EmberError::KernelArity {
                kernel: kernel.name,
                expected: kernel.arity(),
                actual: args.len(),
            });
        }

        let mut tensors = args.iter().filter_map(|a| match a {
            Arg::Tensor(t) => Some(*t),
            Arg::Scalar(_) => None,
        });
        let first = tensors.next().ok_or_else(|| EmberError::TypeConstraint {
            function: kernel.name.to_string(),
            reason: "at least one argument must be a tensor".to_string(),
        })?;

        for t in tensors {
            if t.shape() != first.shape() {
                return Err(EmberError::ShapeMismatch(
                    first.shape().to_vec(),
                    t.shape().to_vec(),
                ));
            }
            if t.dtype() != first.dtype() {
                return Err(EmberError::DTypeMismatch {
                    expected: first.dtype(),
                    actual: t.dtype(),
                });
            }
        }
        for arg in args {
            if let Arg::Scalar(s) = arg
                && s.dtype() != first.dtype()
            {
                return Err(EmberError::DTypeMismatch {
                    expected: first.dtype(),
                    actual: s.dtype(),
                });
            }
        }
        let device = common_device(args.iter().filter_map(|a| match a {
            Arg::Tensor(t) => Some(*t),
            Arg::Scalar(_) => None,
        }))?;

        Ok(Layout {
            shape: first.shape().to_vec(),
            dtype: first.dtype(),
            device,
            len: first.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD: Kernel = kernel!("add", |x0, x1| host: x0 + x1, device: "x0 + x1");

    #[test]
    fn test_select_host_for_cpu_inputs() {
        let a = Tensor::scalar(1.0);
        let b = Tensor::scalar(2.0);
        let xp = select(&[&a, &b]).unwrap();
        assert_eq!(xp.name(), "host");
        assert_eq!(xp.device(), Device::CPU);
    }

    #[test]
    fn test_select_empty_defaults_to_host() {
        assert_eq!(select(&[]).unwrap().device(), Device::CPU);
    }

    #[test]
    fn test_layout_rejects_shape_mismatch() {
        let a = Tensor::new(vec![1.0, 2.0], &[2]).unwrap();
        let b = Tensor::new(vec![1.0, 2.0], &[1, 2]).unwrap();
        let err = Layout::of(&ADD, &[Arg::Tensor(&a), Arg::Tensor(&b)]).unwrap_err();
        assert!(matches!(err, EmberError::ShapeMismatch(_, _)));
    }

    #[test]
    fn test_layout_rejects_dtype_mismatch() {
        let a = Tensor::new(vec![1.0], &[1]).unwrap();
        let b = Tensor::new_f64(vec![1.0], &[1]).unwrap();
        let err = Layout::of(&ADD, &[Arg::Tensor(&a), Arg::Tensor(&b)]).unwrap_err();
        assert!(matches!(err, EmberError::DTypeMismatch { .. }));

        let err = Layout::of(&ADD, &[Arg::Tensor(&a), Arg::Scalar(Scalar::F64(1.0))]).unwrap_err();
        assert!(matches!(err, EmberError::DTypeMismatch { .. }));
    }

    #[test]
    fn test_layout_requires_a_tensor() {
        let err = Layout::of(
            &ADD,
            &[Arg::Scalar(Scalar::F32(1.0)), Arg::Scalar(Scalar::F32(2.0))],
        )
        .unwrap_err();
        assert!(matches!(err, EmberError::TypeConstraint { .. }));
    }

    #[test]
    fn test_layout_arity() {
        let a = Tensor::scalar(1.0);
        let err = Layout::of(&ADD, &[Arg::Tensor(&a)]).unwrap_err();
        assert!(matches!(
            err,
            EmberError::KernelArity {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }
}
