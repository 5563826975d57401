use crate::device::Device;
use crate::dtype::DType;
use crate::error::{EmberError, Result};
use crate::function::TypeInfo;
use crate::storage::{HostData, Storage};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

// ===== TENSOR STRUCTURE =====

/// An n-dimensional array: a shape plus a flat, row-major storage
///
/// Tensors are immutable once built. Every operator returns freshly
/// allocated tensors and never writes into its inputs.
#[derive(Clone)]
pub struct Tensor {
    shape: Vec<usize>,
    storage: Storage,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype())
            .field("device", &self.device())
            .finish()
    }
}

// ===== TENSOR CONSTRUCTORS =====
impl Tensor {
    /// Create a new f32 tensor from data and shape
    ///
    /// # Errors
    /// `ShapeDataMismatch` if `data.len()` differs from the product of `shape`
    pub fn new(data: Vec<f32>, shape: &[usize]) -> Result<Tensor> {
        Self::from_host(HostData::F32(data), shape)
    }

    /// Create a new f64 tensor from data and shape
    pub fn new_f64(data: Vec<f64>, shape: &[usize]) -> Result<Tensor> {
        Self::from_host(HostData::F64(data), shape)
    }

    pub fn from_host(data: HostData, shape: &[usize]) -> Result<Tensor> {
        Self::from_storage(Storage::Host(data), shape)
    }

    pub(crate) fn from_storage(storage: Storage, shape: &[usize]) -> Result<Tensor> {
        let elements = shape.iter().product::<usize>();
        if storage.len() != elements {
            return Err(EmberError::ShapeDataMismatch {
                shape: shape.to_vec(),
                elements,
                len: storage.len(),
            });
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            storage,
        })
    }

    /// A one-element f32 tensor of shape `[1]`
    pub fn scalar(value: f32) -> Tensor {
        Tensor {
            shape: vec![1],
            storage: Storage::Host(HostData::F32(vec![value])),
        }
    }

    /// Create a tensor filled with a constant value
    pub fn full(value: f64, shape: &[usize], dtype: DType) -> Tensor {
        let size = shape.iter().product();
        Tensor {
            shape: shape.to_vec(),
            storage: Storage::Host(HostData::from_f64(dtype, vec![value; size])),
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize], dtype: DType) -> Tensor {
        Self::full(0.0, shape, dtype)
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: &[usize], dtype: DType) -> Tensor {
        Self::full(1.0, shape, dtype)
    }

    /// Create a tensor with values from the standard normal distribution N(0, 1)
    pub fn randn(shape: &[usize], dtype: DType) -> Tensor {
        Self::randn_with(shape, dtype, &mut rand::rng())
    }

    /// Standard normal draw from a caller-supplied generator
    pub fn randn_with<R: Rng + ?Sized>(shape: &[usize], dtype: DType, rng: &mut R) -> Tensor {
        let size: usize = shape.iter().product();
        let data = match dtype {
            DType::F32 => {
                HostData::F32((0..size).map(|_| StandardNormal.sample(rng)).collect())
            }
            DType::F64 => {
                HostData::F64((0..size).map(|_| StandardNormal.sample(rng)).collect())
            }
        };
        Tensor {
            shape: shape.to_vec(),
            storage: Storage::Host(data),
        }
    }
}

// ===== ACCESSORS =====
impl Tensor {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The dtype/shape descriptor used by type checks
    pub fn type_info(&self) -> TypeInfo {
        TypeInfo {
            dtype: self.dtype(),
            shape: self.shape.clone(),
        }
    }

    /// Copy the elements out to host memory
    pub fn to_host(&self) -> Result<HostData> {
        self.storage.to_host()
    }

    /// Elements as f32 (f64 tensors are narrowed)
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(match self.to_host()? {
            HostData::F32(v) => v,
            HostData::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        })
    }

    /// Elements widened to f64
    pub fn to_vec_f64(&self) -> Result<Vec<f64>> {
        Ok(self.to_host()?.to_f64_vec())
    }

    /// Copy this tensor to `device`
    ///
    /// # Errors
    /// `DeviceError` if the GPU is unavailable, `DTypeMismatch` for f64 data
    /// sent to the GPU.
    pub fn to_device(&self, device: Device) -> Result<Tensor> {
        Ok(Tensor {
            shape: self.shape.clone(),
            storage: self.storage.to_device(device)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Tensor::new(vec![1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
        assert!(matches!(
            err,
            EmberError::ShapeDataMismatch {
                elements: 4,
                len: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_constructors() {
        let z = Tensor::zeros(&[2, 3], DType::F64);
        assert_eq!(z.shape(), &[2, 3]);
        assert_eq!(z.dtype(), DType::F64);
        assert_eq!(z.to_vec_f64().unwrap(), vec![0.0; 6]);

        let o = Tensor::ones(&[4], DType::F32);
        assert_eq!(o.to_vec().unwrap(), vec![1.0; 4]);

        let s = Tensor::scalar(2.5);
        assert_eq!(s.shape(), &[1]);
        assert_eq!(s.device(), Device::CPU);
    }

    #[test]
    fn test_zero_dim_shape_is_one_element() {
        let t = Tensor::new(vec![7.0], &[]).unwrap();
        assert_eq!(t.len(), 1);
        assert!(t.shape().is_empty());
    }

    #[test]
    fn test_randn_seeded_is_reproducible() {
        let a = Tensor::randn_with(&[16], DType::F32, &mut StdRng::seed_from_u64(7));
        let b = Tensor::randn_with(&[16], DType::F32, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());
    }

    #[test]
    fn test_randn_statistics() {
        let t = Tensor::randn_with(&[10_000], DType::F64, &mut StdRng::seed_from_u64(1));
        let data = t.to_vec_f64().unwrap();
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
    }
}
