use approx::assert_abs_diff_eq;
use ember::gradient_check::check_gradients_simple;
use ember::ops::Gaussian;
use ember::{DType, EmberError, Function, Tensor, Variable, function, resolver};

fn t(data: &[f32]) -> Tensor {
    Tensor::new(data.to_vec(), &[data.len()]).unwrap()
}

#[test]
fn test_unit_eps_scenario() {
    let mean = t(&[0.0]);
    let ln_var = t(&[0.0]);
    let f = Gaussian::with_eps(t(&[1.0]));

    let (ys, ctx) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    assert_abs_diff_eq!(ys[0].to_vec().unwrap()[0], 1.0, epsilon = 1e-6);

    let g = function::backward(&f, &[&mean, &ln_var], &[&t(&[2.0])], ctx).unwrap();
    assert_abs_diff_eq!(g[0].to_vec().unwrap()[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(g[1].to_vec().unwrap()[0], 1.0, epsilon = 1e-6);
}

#[test]
fn test_noise_scales_with_variance() {
    // ln_var = 2 ln 3 gives std 3
    let mean = t(&[1.0, -1.0]);
    let ln_var = t(&[2.0 * 3f32.ln(), 0.0]);
    let f = Gaussian::with_eps(t(&[0.5, -2.0]));
    let (ys, _) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    let y = ys[0].to_vec().unwrap();
    assert_abs_diff_eq!(y[0], 2.5, epsilon = 1e-5);
    assert_abs_diff_eq!(y[1], -3.0, epsilon = 1e-6);
}

#[test]
fn test_same_instance_reuses_eps() {
    let mean = Tensor::zeros(&[16], DType::F32);
    let ln_var = Tensor::zeros(&[16], DType::F32);
    let f = Gaussian::new();
    let (a, _) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    let (b, _) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    assert_eq!(a[0].to_vec().unwrap(), b[0].to_vec().unwrap());
}

#[test]
fn test_distinct_instances_draw_fresh_noise() {
    let mean = Tensor::zeros(&[16], DType::F32);
    let ln_var = Tensor::zeros(&[16], DType::F32);
    let (a, _) = function::forward(&Gaussian::new(), &[&mean, &ln_var]).unwrap();
    let (b, _) = function::forward(&Gaussian::new(), &[&mean, &ln_var]).unwrap();
    assert_ne!(a[0].to_vec().unwrap(), b[0].to_vec().unwrap());
}

#[test]
fn test_seeded_instances_reproduce() {
    let mean = Tensor::zeros(&[8], DType::F32);
    let ln_var = Tensor::ones(&[8], DType::F32);
    let (a, _) = function::forward(&Gaussian::with_seed(42), &[&mean, &ln_var]).unwrap();
    let (b, _) = function::forward(&Gaussian::with_seed(42), &[&mean, &ln_var]).unwrap();
    assert_eq!(a[0].to_vec().unwrap(), b[0].to_vec().unwrap());
}

#[test]
fn test_gradient_check_with_fixed_eps() {
    let mean = t(&[0.2, -0.4, 1.0]);
    let ln_var = t(&[-0.5, 0.3, 0.8]);
    let eps = t(&[0.7, -1.1, 0.4]);
    let gy = t(&[1.0, -0.5, 2.0]);
    assert!(
        check_gradients_simple(
            || Box::new(Gaussian::with_eps(eps.clone())),
            &[mean, ln_var],
            &gy
        )
        .unwrap()
    );
}

#[test]
fn test_forward_type_checks() {
    let a = t(&[0.0, 0.0]);
    let b = t(&[0.0]);
    let f64s = Tensor::zeros(&[2], DType::F64);
    let f = Gaussian::new();
    assert!(matches!(
        function::forward(&f, &[&a, &b]),
        Err(EmberError::TypeConstraint { .. })
    ));
    assert!(function::forward(&f, &[&f64s, &f64s]).is_err());
    assert!(function::forward(&f, &[&a]).is_err());
    assert!(f.eps().is_none());
}

#[test]
fn test_backward_type_checks() {
    let mean = t(&[0.0, 0.0]);
    let ln_var = t(&[0.0, 0.0]);
    let f = Gaussian::with_eps(t(&[1.0, 1.0]));

    let (_, ctx) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    let wrong_shape = t(&[1.0]);
    assert!(function::backward(&f, &[&mean, &ln_var], &[&wrong_shape], ctx).is_err());

    let (_, ctx) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    let g = t(&[1.0, 1.0]);
    assert!(function::backward(&f, &[&mean, &ln_var], &[&g, &g], ctx).is_err());

    let (_, ctx) = function::forward(&f, &[&mean, &ln_var]).unwrap();
    let wrong_dtype = Tensor::ones(&[2], DType::F64);
    assert!(function::backward(&f, &[&mean, &ln_var], &[&wrong_dtype], ctx).is_err());
}

#[test]
fn test_label_and_graph_entry() {
    assert_eq!(Gaussian::new().label(), "gaussian");
    let mean = Variable::new(t(&[0.0, 1.0]));
    let ln_var = Variable::new(t(&[0.0, 0.0]));
    let y = resolver::gaussian(&mean, &ln_var).unwrap();
    assert_eq!(y.creator_label().as_deref(), Some("gaussian"));
    assert_eq!(y.shape(), &[2]);
}
