//! Gaussian sampling with the reparameterization trick
//!
//! `y = mean + exp(ln_var / 2) * eps`, with `eps ~ N(0, 1)` drawn once per
//! operator instance. Gradients flow to both `mean` and `ln_var`.

use std::cell::OnceCell;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::trace;

use super::kernels::{ADD, COPY, GAUSSIAN_LN_VAR_BWD, GAUSSIAN_NOISE};
use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::{EmberError, Result};
use crate::function::{
    Context, Function, TypeInfo, expect_arity, expect_dtype, expect_same_shape, unpack,
};
use crate::tensor::Tensor;

/// Draws `mean + exp(ln_var / 2) * eps`
///
/// `eps` is drawn on the first forward (or supplied up front) and reused by
/// every later forward on the same instance.
#[derive(Debug, Default)]
pub struct Gaussian {
    eps: OnceCell<Tensor>,
    seed: Option<u64>,
}

impl Gaussian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `eps` instead of drawing one
    pub fn with_eps(eps: Tensor) -> Self {
        Gaussian {
            eps: OnceCell::from(eps),
            seed: None,
        }
    }

    /// Draw `eps` from a generator seeded with `seed`
    pub fn with_seed(seed: u64) -> Self {
        Gaussian {
            eps: OnceCell::new(),
            seed: Some(seed),
        }
    }

    /// The noise sample, once drawn or supplied
    pub fn eps(&self) -> Option<&Tensor> {
        self.eps.get()
    }

    fn draw(&self, shape: &[usize], xp: &dyn Backend) -> Result<Tensor> {
        let eps = match self.seed {
            Some(seed) => Tensor::randn_with(shape, DType::F32, &mut StdRng::seed_from_u64(seed)),
            None => Tensor::randn(shape, DType::F32),
        };
        trace!(?shape, seeded = self.seed.is_some(), "drew gaussian eps");
        eps.to_device(xp.device())
    }
}

impl Function for Gaussian {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        expect_arity("gaussian", "inputs", inputs, 2)?;
        expect_dtype("gaussian", &inputs[0], DType::F32)?;
        expect_dtype("gaussian", &inputs[1], DType::F32)?;
        expect_same_shape("gaussian", &inputs[0], &inputs[1])
    }

    fn check_type_backward(&self, inputs: &[TypeInfo], grad_outputs: &[TypeInfo]) -> Result<()> {
        expect_arity("gaussian", "inputs", inputs, 2)?;
        expect_arity("gaussian", "output gradients", grad_outputs, 1)?;
        expect_dtype("gaussian", &grad_outputs[0], DType::F32)?;
        expect_same_shape("gaussian", &grad_outputs[0], &inputs[0])
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [mean, ln_var] = unpack::<2>(self.name(), inputs)?;
        if self.eps.get().is_none() {
            let drawn = self.draw(ln_var.shape(), xp)?;
            let _ = self.eps.set(drawn);
        }
        let eps = self.eps.get().ok_or(EmberError::MissingContext("eps"))?;
        // supplied or earlier noise may live elsewhere; follow the inputs
        let moved;
        let eps = if eps.device() == xp.device() {
            eps
        } else {
            moved = eps.to_device(xp.device())?;
            &moved
        };

        let noise = xp.elementwise(&GAUSSIAN_NOISE, &[ln_var.into(), eps.into()])?;
        let y = xp.elementwise(&ADD, &[mean.into(), (&noise).into()])?;
        Ok((vec![y], Context::new(self.name()).save(noise)))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [g] = unpack::<1>(self.name(), grad_outputs)?;
        let noise = ctx.saved(0)?;
        Ok(vec![
            xp.elementwise(&COPY, &[g.into()])?,
            xp.elementwise(&GAUSSIAN_LN_VAR_BWD, &[g.into(), noise.into()])?,
        ])
    }
}
