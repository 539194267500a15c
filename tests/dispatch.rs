//! Kernel tier selection: just-in-time backends, compiled kernels and the
//! generic fallback

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use saxpy3::ops::DynOps;
use saxpy3::{
    reference_mxm, BinaryOp, JitBackend, JitRun, KernelKey, KernelTier, Monoid, NumericJob, Saxpy3, SaxpyConfig,
    SaxpyError, SaxpyResult, Scalar, Semiring, SparseMatrix, TypeCode,
};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Run,
    NotSupported,
    CompileFailed,
    Disabled,
    OutOfMemory,
}

/// Backend that records every key it sees and answers with a fixed status
struct TestJit {
    behavior: Behavior,
    semiring: Semiring<f64, f64, f64>,
    calls: AtomicUsize,
    keys: Mutex<Vec<String>>,
}

impl TestJit {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            semiring: Semiring::plus_times(),
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        })
    }
}

impl JitBackend<f64, f64, f64> for TestJit {
    fn compile_and_run(&self, key: &KernelKey, job: &mut NumericJob<'_, f64, f64>) -> SaxpyResult<JitRun<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key.to_string());
        Ok(match self.behavior {
            Behavior::Run => JitRun::Ran(job.run(&DynOps::new(&self.semiring))?),
            Behavior::NotSupported => JitRun::NotSupported,
            Behavior::CompileFailed => JitRun::CompileFailed("linker exited with status 1".to_string()),
            Behavior::Disabled => JitRun::Disabled,
            Behavior::OutOfMemory => return Err(SaxpyError::out_of_memory("kernel cache", 1 << 30)),
        })
    }
}

fn operands() -> (SparseMatrix<f64>, SparseMatrix<f64>) {
    let a = SparseMatrix::from_triplets(
        5,
        4,
        &[(0, 0, 1.0), (2, 0, 2.0), (1, 1, 3.0), (4, 2, 4.0), (3, 3, 5.0), (0, 3, 6.0)],
        |x, _| *x,
    )
    .unwrap();
    let b = SparseMatrix::from_triplets(
        4,
        3,
        &[(0, 0, 1.0), (3, 0, 2.0), (1, 1, 3.0), (2, 2, 4.0), (0, 2, 5.0)],
        |x, _| *x,
    )
    .unwrap();
    (a, b)
}

#[test]
fn test_jit_runs_first() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let jit = TestJit::new(Behavior::Run);
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default()).with_jit(jit.clone());

    let product = engine.multiply(None, &a, &b).unwrap();
    assert_eq!(product.tier, KernelTier::Jit);
    assert_eq!(product.matrix.triplets(), reference_mxm(None, &a, &b, &semiring).triplets());
    assert_eq!(jit.calls.load(Ordering::SeqCst), 1);
    assert_eq!(jit.keys.lock().unwrap()[0], "saxpy3_plus_times_fp64__fp64_fp64__sparse_sparse");
}

#[test]
fn test_jit_statuses_fall_through() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let expected = reference_mxm(None, &a, &b, &semiring).triplets();
    let fallback = if cfg!(feature = "specialized-kernels") { KernelTier::Specialized } else { KernelTier::Generic };

    for behavior in [Behavior::NotSupported, Behavior::CompileFailed, Behavior::Disabled] {
        let jit = TestJit::new(behavior);
        let engine = Saxpy3::new(&semiring, SaxpyConfig::default()).with_jit(jit.clone());
        let product = engine.multiply(None, &a, &b).unwrap();
        assert_eq!(product.tier, fallback, "{:?}", behavior);
        assert_eq!(product.matrix.triplets(), expected);
        assert_eq!(jit.calls.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_jit_out_of_memory_is_fatal() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default()).with_jit(TestJit::new(Behavior::OutOfMemory));
    let err = engine.multiply(None, &a, &b).unwrap_err();
    assert!(err.is_out_of_memory());
}

#[test]
fn test_jit_disabled_by_configuration() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let jit = TestJit::new(Behavior::Run);
    let mut config = SaxpyConfig::default();
    config.dispatch.jit = false;
    let engine = Saxpy3::new(&semiring, config).with_jit(jit.clone());

    let product = engine.multiply(None, &a, &b).unwrap();
    assert_ne!(product.tier, KernelTier::Jit);
    assert_eq!(jit.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_generic_when_specialized_disabled() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::min_plus();
    let mut config = SaxpyConfig::default();
    config.dispatch.specialized = false;
    let engine = Saxpy3::new(&semiring, config);

    let product = engine.multiply(None, &a, &b).unwrap();
    assert_eq!(product.tier, KernelTier::Generic);
    assert_eq!(product.matrix.triplets(), reference_mxm(None, &a, &b, &semiring).triplets());
}

#[test]
fn test_tiers_agree() {
    let (a, b) = operands();
    for semiring in [
        Semiring::<f64, f64, f64>::plus_times(),
        Semiring::min_plus(),
        Semiring::max_second(),
        Semiring::any_pair(),
    ] {
        let fast = Saxpy3::new(&semiring, SaxpyConfig::default()).multiply(None, &a, &b).unwrap();
        let mut config = SaxpyConfig::default();
        config.dispatch.specialized = false;
        let slow = Saxpy3::new(&semiring, config).multiply(None, &a, &b).unwrap();
        assert_eq!(fast.matrix.triplets(), slow.matrix.triplets(), "{}", semiring.name());
        assert_eq!(slow.tier, KernelTier::Generic);
    }
}

#[test]
fn test_repeated_multiplication_is_stable() {
    let (a, b) = operands();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(2));
    let first = engine.multiply(None, &a, &b).unwrap();
    let second = engine.multiply(None, &a, &b).unwrap();
    assert_eq!(first.tier, second.tier);
    assert_eq!(first.matrix.triplets(), second.matrix.triplets());
}

#[test]
fn test_user_operator_on_builtin_type_is_generic() {
    let (a, b) = operands();
    let semiring = Semiring::new(Monoid::plus(), BinaryOp::new_user("absdiff", |x: &f64, y: &f64| (x - y).abs()));
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default());

    let product = engine.multiply(None, &a, &b).unwrap();
    assert_eq!(product.tier, KernelTier::Generic);
    assert_eq!(product.matrix.triplets(), reference_mxm(None, &a, &b, &semiring).triplets());
}

/// Gaussian integers stored as floats so that sums stay exact
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

impl Scalar for Complex {
    const TYPE: TypeCode = TypeCode::User("complex");

    fn is_truthy(&self) -> bool {
        self.re != 0.0 || self.im != 0.0
    }
}

fn complex_semiring() -> Semiring<Complex, Complex, Complex> {
    let add = Monoid::new_user("complex_plus", Complex::default(), |x: &Complex, y: &Complex| {
        Complex::new(x.re + y.re, x.im + y.im)
    });
    let multiply = BinaryOp::new_user("complex_times", |x: &Complex, y: &Complex| {
        Complex::new(x.re * y.re - x.im * y.im, x.re * y.im + x.im * y.re)
    });
    Semiring::new(add, multiply).with_name("plus_times_complex")
}

#[test]
fn test_user_type_runs_generic_kernel() {
    let n = 40;
    let triplets: Vec<_> = (0..n)
        .flat_map(|j| {
            [(j, j, Complex::new(1.0, 1.0)), ((j * 7 + 1) % n, j, Complex::new(2.0, -1.0)), (0, j, Complex::new(0.0, 3.0))]
        })
        .collect();
    let a = SparseMatrix::from_triplets(n, n, &triplets, |x, y| Complex::new(x.re + y.re, x.im + y.im)).unwrap();
    let semiring = complex_semiring();
    let expected = reference_mxm(None, &a, &a, &semiring).triplets();

    for (threads, chunk) in [(1, 65536.0), (4, 4.0)] {
        let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(threads).with_chunk(chunk));
        let product = engine.multiply(None, &a, &a).unwrap();
        assert_eq!(product.tier, KernelTier::Generic);
        assert_eq!(product.matrix.triplets(), expected);
    }
}
