//! Per-element formulas shared by the operators
//!
//! Each formula is written once for the host and once in WGSL. Parameters
//! are bound positionally, so the argument order at each call site must
//! match the parameter list here.

use crate::backend::{Kernel, kernel};

// ===== GENERIC =====
pub(crate) const COPY: Kernel = kernel!("copy", |g| host: g, device: "g");
pub(crate) const NEG: Kernel = kernel!("neg", |x| host: -x, device: "-x");
pub(crate) const RECIP: Kernel = kernel!("recip", |x| host: 1.0 / x, device: "1.0 / x");

// ===== ARITHMETIC =====
pub(crate) const ABS: Kernel = kernel!("abs", |x| host: x.abs(), device: "abs(x)");
pub(crate) const ABS_BWD: Kernel = kernel!("abs_bwd", |x, gy|
    host: if x == 0.0 { 0.0 * gy } else { x.signum() * gy },
    device: "sign(x) * gy");

pub(crate) const ADD: Kernel = kernel!("add", |x0, x1| host: x0 + x1, device: "x0 + x1");
pub(crate) const SUB: Kernel = kernel!("sub", |x0, x1| host: x0 - x1, device: "x0 - x1");
pub(crate) const MUL: Kernel = kernel!("mul", |x0, x1| host: x0 * x1, device: "x0 * x1");
pub(crate) const DIV: Kernel = kernel!("div", |x0, x1| host: x0 / x1, device: "x0 / x1");

/// `gx1 = -gx0 * x0 / x1`, reusing the first gradient
pub(crate) const DIV_BWD_X1: Kernel = kernel!("div_bwd_x1", |gx0, x0, x1|
    host: -gx0 * x0 / x1,
    device: "-gx0 * x0 / x1");
pub(crate) const DIV_FROM_CONST_BWD: Kernel = kernel!("div_from_const_bwd", |x, gy, value|
    host: -value * gy / (x * x),
    device: "-value * gy / (x * x)");

pub(crate) const POW: Kernel = kernel!("pow", |x0, x1| host: x0.powf(x1), device: "powf(x0, x1)");
pub(crate) const POW_VV_BWD_X0: Kernel = kernel!("pow_vv_bwd_x0", |x0, x1, gy|
    host: x1 * x0.powf(x1 - 1.0) * gy,
    device: "x1 * powf(x0, x1 - 1.0) * gy");
pub(crate) const POW_VV_BWD_X1: Kernel = kernel!("pow_vv_bwd_x1", |x0, y, gy|
    host: x0.ln() * y * gy,
    device: "log(x0) * y * gy");
pub(crate) const POW_VC_BWD: Kernel = kernel!("pow_vc_bwd", |x, gy, value|
    host: value * x.powf(value - 1.0) * gy,
    device: "value * powf(x, value - 1.0) * gy");
pub(crate) const POW_CV_BWD: Kernel = kernel!("pow_cv_bwd", |y, gy, logv|
    host: logv * y * gy,
    device: "logv * y * gy");

// ===== TRANSCENDENTAL =====
pub(crate) const EXP: Kernel = kernel!("exp", |x| host: x.exp(), device: "exp(x)");
pub(crate) const LOG: Kernel = kernel!("log", |x| host: x.ln(), device: "log(x)");
pub(crate) const SIN: Kernel = kernel!("sin", |x| host: x.sin(), device: "sin(x)");
pub(crate) const COS: Kernel = kernel!("cos", |x| host: x.cos(), device: "cos(x)");
pub(crate) const SIN_BWD: Kernel = kernel!("sin_bwd", |x, gy| host: x.cos() * gy, device: "cos(x) * gy");
pub(crate) const COS_BWD: Kernel = kernel!("cos_bwd", |x, gy| host: -x.sin() * gy, device: "-sin(x) * gy");

// ===== GAUSSIAN =====
pub(crate) const GAUSSIAN_NOISE: Kernel = kernel!("gaussian_noise", |v, e|
    host: (v / 2.0).exp() * e,
    device: "exp(v / 2.0) * e");
pub(crate) const GAUSSIAN_LN_VAR_BWD: Kernel = kernel!("gaussian_ln_var_bwd", |g, noise|
    host: g * noise * 0.5,
    device: "g * noise * 0.5");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_bwd_sign_of_zero() {
        assert_eq!((ABS_BWD.host_f32)(&[0.0, 5.0]), 0.0);
        assert_eq!((ABS_BWD.host_f32)(&[-2.0, 5.0]), -5.0);
        assert_eq!((ABS_BWD.host_f64)(&[3.0, 0.5]), 0.5);
    }

    #[test]
    fn test_abs_bwd_zero_propagates_non_finite_grad() {
        // matches WGSL `sign(0.0) * gy`
        assert!((ABS_BWD.host_f32)(&[0.0, f32::INFINITY]).is_nan());
        assert!((ABS_BWD.host_f64)(&[0.0, f64::NAN]).is_nan());
        assert_eq!((ABS_BWD.host_f64)(&[0.0, -3.0]), 0.0);
    }

    #[test]
    fn test_pow_negative_base_integer_exponent() {
        assert_eq!((POW.host_f64)(&[-2.0, 3.0]), -8.0);
        assert!((POW.host_f64)(&[-2.0, 0.5]).is_nan());
    }

    #[test]
    fn test_device_expressions_only_use_declared_params() {
        for k in [
            DIV_BWD_X1,
            DIV_FROM_CONST_BWD,
            POW_VV_BWD_X1,
            POW_CV_BWD,
            GAUSSIAN_NOISE,
            GAUSSIAN_LN_VAR_BWD,
        ] {
            for p in k.params {
                assert!(k.device.contains(p), "{} does not use {p}", k.name);
            }
        }
    }
}
