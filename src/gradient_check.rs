//! Finite-difference gradient checking
//!
//! Compares an operator's analytical backward against central differences
//! of the scalar loss `L = sum(y * grad_output)`, whose gradient with respect
//! to each input is exactly what backward returns for `grad_output`.

use tracing::warn;

use crate::error::{EmberError, Result};
use crate::function::{self, Function};
use crate::storage::HostData;
use crate::tensor::Tensor;

fn loss(f: &dyn Function, inputs: &[&Tensor], grad_output: &[f64]) -> Result<f64> {
    let (outputs, _) = function::forward(f, inputs)?;
    let y = outputs
        .first()
        .ok_or(EmberError::MissingContext("forward output"))?
        .to_vec_f64()?;
    Ok(y.iter().zip(grad_output).map(|(a, b)| a * b).sum())
}

fn perturbed(t: &Tensor, index: usize, delta: f64) -> Result<Tensor> {
    let mut data = t.to_vec_f64()?;
    data[index] += delta;
    Tensor::from_host(HostData::from_f64(t.dtype(), data), t.shape())?.to_device(t.device())
}

/// Check gradients using finite differences
///
/// `make` must build an equivalent operator on every call; each loss
/// evaluation gets a fresh instance. Errors are `|analytical - numerical|`
/// scaled by `max(1, |numerical|)`.
///
/// Returns `(max_error, mean_error, passed)`.
///
/// # Errors
/// Anything forward or backward reports, or a gradient count that does not
/// match the inputs.
pub fn check_gradients<F>(
    make: F,
    inputs: &[Tensor],
    grad_output: &Tensor,
    epsilon: f64,
    tolerance: f64,
) -> Result<(f64, f64, bool)>
where
    F: Fn() -> Box<dyn Function>,
{
    let refs: Vec<&Tensor> = inputs.iter().collect();
    let f = make();
    let (_, ctx) = function::forward(f.as_ref(), &refs)?;
    let analytical = function::backward(f.as_ref(), &refs, &[grad_output], ctx)?;
    if analytical.len() != inputs.len() {
        return Err(EmberError::TypeConstraint {
            function: f.label(),
            reason: format!(
                "backward returned {} gradients for {} inputs",
                analytical.len(),
                inputs.len()
            ),
        });
    }
    let gy = grad_output.to_vec_f64()?;

    let mut max_error: f64 = 0.0;
    let mut total_error = 0.0;
    let mut count = 0usize;

    for (k, input) in inputs.iter().enumerate() {
        let grad = analytical[k].to_vec_f64()?;
        for (i, &analytic) in grad.iter().enumerate() {
            let mut shifted = refs.clone();

            let plus = perturbed(input, i, epsilon)?;
            shifted[k] = &plus;
            let loss_plus = loss(make().as_ref(), &shifted, &gy)?;

            let minus = perturbed(input, i, -epsilon)?;
            shifted[k] = &minus;
            let loss_minus = loss(make().as_ref(), &shifted, &gy)?;

            // central diff
            let numerical = (loss_plus - loss_minus) / (2.0 * epsilon);
            let error = (analytic - numerical).abs() / numerical.abs().max(1.0);

            max_error = max_error.max(error);
            total_error += error;
            count += 1;

            if error > tolerance {
                warn!(
                    function = %f.label(),
                    input = k,
                    index = i,
                    analytic,
                    numerical,
                    error,
                    "gradient mismatch"
                );
            }
        }
    }

    let mean_error = if count == 0 {
        0.0
    } else {
        total_error / count as f64
    };
    Ok((max_error, mean_error, max_error <= tolerance))
}

/// [`check_gradients`] with defaults suited to f32 operators
pub fn check_gradients_simple<F>(make: F, inputs: &[Tensor], grad_output: &Tensor) -> Result<bool>
where
    F: Fn() -> Box<dyn Function>,
{
    let (max_err, mean_err, passed) = check_gradients(
        make,
        inputs,
        grad_output,
        1e-3, // epsilon
        1e-2, // tolerance
    )?;
    if !passed {
        warn!(max_err, mean_err, "gradient check failed");
    }
    Ok(passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::function::{Context, TypeInfo};
    use crate::ops::{Mul, Sin};

    #[test]
    fn test_correct_gradient_passes() {
        let x = Tensor::new_f64(vec![0.1, 0.7, -1.2], &[3]).unwrap();
        let gy = Tensor::new_f64(vec![1.0, -2.0, 0.5], &[3]).unwrap();
        let (max_err, _, passed) =
            check_gradients(|| Box::new(Sin), &[x], &gy, 1e-6, 1e-6).unwrap();
        assert!(passed, "max error {max_err}");
    }

    #[test]
    fn test_two_inputs() {
        let a = Tensor::new(vec![1.5, -0.5], &[2]).unwrap();
        let b = Tensor::new(vec![2.0, 3.0], &[2]).unwrap();
        let gy = Tensor::new(vec![1.0, 1.0], &[2]).unwrap();
        assert!(check_gradients_simple(|| Box::new(Mul), &[a, b], &gy).unwrap());
    }

    /// Forward is `y = 2x` but backward claims `gx = gy`
    struct Wrong;

    impl Function for Wrong {
        fn name(&self) -> &'static str {
            "wrong"
        }

        fn check_type_forward(&self, _inputs: &[TypeInfo]) -> Result<()> {
            Ok(())
        }

        fn forward(&self, _xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
            let (ys, _) = function::forward(&crate::ops::Add, &[inputs[0], inputs[0]])?;
            Ok((ys, Context::new("wrong")))
        }

        fn backward(
            &self,
            _xp: &dyn Backend,
            _inputs: &[&Tensor],
            grad_outputs: &[&Tensor],
            _ctx: Context,
        ) -> Result<Vec<Tensor>> {
            Ok(vec![grad_outputs[0].clone()])
        }
    }

    #[test]
    fn test_wrong_gradient_fails() {
        let x = Tensor::new_f64(vec![1.0, 2.0], &[2]).unwrap();
        let gy = Tensor::ones(&[2], crate::DType::F64);
        let (max_err, _, passed) =
            check_gradients(|| Box::new(Wrong), &[x], &gy, 1e-4, 1e-3).unwrap();
        assert!(!passed);
        assert!((max_err - 0.5).abs() < 1e-6, "max error {max_err}");
    }
}
