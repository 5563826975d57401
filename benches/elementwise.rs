//! Elementwise operator benchmarks
//!
//! Forward and backward of the arithmetic and transcendental operators on the
//! host backend, plus the overhead of going through the resolver and the
//! operator overloads.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ember::ops::{Add, Div, Exp, Gaussian, Mul, MulConstant, PowVarConst, PowVarVar, Sin};
use ember::{Function, Tensor, Variable, function};

fn input_tensor(size: usize) -> Tensor {
    let data: Vec<f32> = (0..size).map(|i| (i as f32 * 0.01).sin() + 1.5).collect();
    Tensor::new(data, &[size]).unwrap()
}

const SIZES: [usize; 4] = [256, 4096, 65_536, 1 << 20];

// ===== FORWARD =====

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");

    for size in SIZES {
        let a = input_tensor(size);
        let b = input_tensor(size);
        let binary: [(&str, &dyn Function); 4] =
            [("add", &Add), ("mul", &Mul), ("div", &Div), ("pow", &PowVarVar)];
        for (name, f) in binary {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |bench, _| {
                bench.iter(|| function::forward(f, &[black_box(&a), black_box(&b)]).unwrap())
            });
        }

        let unary: [(&str, &dyn Function); 4] = [
            ("mul_constant", &MulConstant::new(0.5)),
            ("pow_constant", &PowVarConst::new(3.0)),
            ("exp", &Exp),
            ("sin", &Sin),
        ];
        for (name, f) in unary {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |bench, _| {
                bench.iter(|| function::forward(f, &[black_box(&a)]).unwrap())
            });
        }
    }

    group.finish();
}

// ===== BACKWARD =====

fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("backward");

    for size in SIZES {
        let a = input_tensor(size);
        let b = input_tensor(size);
        let gy = input_tensor(size);

        group.bench_with_input(BenchmarkId::new("div", size), &size, |bench, _| {
            bench.iter(|| {
                let (_, ctx) = function::forward(&Div, &[&a, &b]).unwrap();
                function::backward(&Div, &[&a, &b], &[black_box(&gy)], ctx).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("pow", size), &size, |bench, _| {
            bench.iter(|| {
                let (_, ctx) = function::forward(&PowVarVar, &[&a, &b]).unwrap();
                function::backward(&PowVarVar, &[&a, &b], &[black_box(&gy)], ctx).unwrap()
            })
        });

        let gaussian = Gaussian::with_seed(0);
        group.bench_with_input(BenchmarkId::new("gaussian", size), &size, |bench, _| {
            bench.iter(|| {
                let (_, ctx) = function::forward(&gaussian, &[&a, &b]).unwrap();
                function::backward(&gaussian, &[&a, &b], &[black_box(&gy)], ctx).unwrap()
            })
        });
    }

    group.finish();
}

// ===== GRAPH =====

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");

    for size in [256, 65_536] {
        let x = Variable::new(input_tensor(size));
        let y = Variable::new(input_tensor(size));

        group.bench_with_input(BenchmarkId::new("overloads", size), &size, |bench, _| {
            bench.iter(|| {
                let t = (black_box(&x) * black_box(&y)).unwrap();
                let t = (&t + 1.0).unwrap();
                (2.0 / &t).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("backward_step", size), &size, |bench, _| {
            let gy = Tensor::ones(&[size], ember::DType::F32);
            bench.iter(|| {
                let z = (&x / &y).unwrap();
                z.backward_step(black_box(&gy)).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_backward, bench_graph);
criterion_main!(benches);
