//! Elementwise kernel descriptions
//!
//! A [`Kernel`] is one per-element formula over named parameters. It carries
//! the formula twice: as host functions (one per dtype) and as a WGSL
//! expression for the device backend. Both backends evaluate the same
//! parameters in the same order, so they agree by construction.

/// Upper bound on parameters per kernel
pub const MAX_KERNEL_ARGS: usize = 6;

/// A named elementwise map `out[i] = f(p0[i], p1[i], ...)`
///
/// Parameters bound to scalars are broadcast to every element.
#[derive(Clone, Copy)]
pub struct Kernel {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub host_f32: fn(&[f32]) -> f32,
    pub host_f64: fn(&[f64]) -> f64,
    /// WGSL expression over `params`; may call the `powf` helper
    pub device: &'static str,
}

impl Kernel {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("device", &self.device)
            .finish()
    }
}

/// Declare a [`Kernel`] from one host expression and one WGSL expression
///
/// ```ignore
/// const DIV_BWD_X1: Kernel = kernel!("div_bwd_x1", |gx0, x0, x1|
///     host: -gx0 * x0 / x1,
///     device: "-gx0 * x0 / x1");
/// ```
macro_rules! kernel {
    ($name:literal, |$($param:ident),+| host: $host:expr, device: $device:literal $(,)?) => {
        $crate::backend::Kernel {
            name: $name,
            params: &[$(stringify!($param)),+],
            host_f32: {
                fn eval(args: &[f32]) -> f32 {
                    match args {
                        &[$($param),+] => $host,
                        _ => unreachable!("kernel arity is checked before evaluation"),
                    }
                }
                eval
            },
            host_f64: {
                fn eval(args: &[f64]) -> f64 {
                    match args {
                        &[$($param),+] => $host,
                        _ => unreachable!("kernel arity is checked before evaluation"),
                    }
                }
                eval
            },
            device: $device,
        }
    };
}

pub(crate) use kernel;

#[cfg(test)]
mod tests {
    use super::*;

    const AXPY: Kernel = kernel!("axpy", |a, x, y| host: a * x + y, device: "a * x + y");

    #[test]
    fn test_kernel_macro_builds_both_widths() {
        assert_eq!(AXPY.name, "axpy");
        assert_eq!(AXPY.params, &["a", "x", "y"]);
        assert_eq!(AXPY.arity(), 3);
        assert_eq!((AXPY.host_f32)(&[2.0, 3.0, 1.0]), 7.0);
        assert_eq!((AXPY.host_f64)(&[0.5, 4.0, -1.0]), 1.0);
        assert_eq!(AXPY.device, "a * x + y");
    }
}
