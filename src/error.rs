use crate::dtype::DType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmberError {
    #[error("Shape mismatch: tensor has {elements} elements but data length is {len}")]
    ShapeDataMismatch {
        shape: Vec<usize>,
        elements: usize,
        len: usize,
    },

    #[error("Shapes {0:?} and {1:?} must be identical")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    #[error("DType mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },

    #[error("Type check failed for `{function}`: {reason}")]
    TypeConstraint { function: String, reason: String },

    #[error("Unsupported constant: {0}")]
    UnsupportedConstantType(String),

    #[error("Kernel `{kernel}` takes {expected} arguments, got {actual}")]
    KernelArity {
        kernel: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Context produced by `{actual}` cannot drive the backward of `{expected}`")]
    ContextMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Context is missing {0}; was forward run on this instance?")]
    MissingContext(&'static str),

    #[error("Backward of `{0}` already ran for this output")]
    BackwardConsumed(String),

    #[error("Variable was not produced by a function")]
    NoCreator,
}

pub type Result<T> = std::result::Result<T, EmberError>;
