//! Differentiable primitive operators
//!
//! Elementwise arithmetic, exp/log/sin/cos, and Gaussian sampling, each with
//! a forward and a backward that follows the chain rule exactly. Operators
//! run on the host (rayon) or, with the `gpu` feature, as generated wgpu
//! compute kernels.
//!
//! ```ignore
//! use ember::{Tensor, Variable};
//!
//! let x = Variable::new(Tensor::new(vec![1.0, 2.0], &[2])?);
//! let y = (2.0 - &x)?;                      // SubFromConstant(2.0)
//! let grads = y.backward_step(&Tensor::ones(&[2], ember::DType::F32))?;
//! ```

pub mod backend;
pub mod config;
pub mod constant;
pub mod device;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod function;
pub mod gradient_check;
pub mod ops;
pub mod resolver;
pub mod storage;
pub mod tensor;
pub mod variable;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use backend::{Arg, Backend, HostBackend, Kernel};
pub use constant::{Coerced, Constant, force_type};
pub use device::Device;
pub use dispatch::{DispatchTable, Syntax};
pub use dtype::{DType, Scalar};
pub use error::{EmberError, Result};
pub use function::{Context, Function, TypeInfo};
pub use resolver::{Operand, Selection};
pub use tensor::Tensor;
pub use variable::Variable;

#[cfg(feature = "gpu")]
pub use backend::DeviceBackend;
#[cfg(feature = "gpu")]
pub use gpu::{get_gpu_context, is_gpu_available};
