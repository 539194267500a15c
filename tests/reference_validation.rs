//! Validate the engine against the naive reference and against sprs

use proptest::prelude::*;
use saxpy3::{
    reference_mxm, to_sprs, AxbMethod, Format, Saxpy3, SaxpyConfig, Scalar, Semiring, SparseMatrix,
};

/// Create a simple test matrix
fn create_test_matrix() -> SparseMatrix<f64> {
    // [1 2 0 0]
    // [0 3 4 0]
    // [0 0 5 6]
    // [7 0 0 8]
    SparseMatrix::from_csr(
        4,
        4,
        vec![0, 2, 4, 6, 8],
        vec![0, 1, 1, 2, 2, 3, 0, 3],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
    )
    .unwrap()
}

fn sparse_matrix<T: Scalar + std::fmt::Debug>(
    rows: usize,
    cols: usize,
    values: impl Strategy<Value = T> + Clone,
) -> impl Strategy<Value = SparseMatrix<T>> {
    proptest::collection::vec((0..rows, 0..cols, values), 0..=rows * cols)
        .prop_map(move |t| SparseMatrix::from_triplets(rows, cols, &t, |x, _| *x).unwrap())
}

fn operands() -> impl Strategy<Value = (SparseMatrix<i64>, SparseMatrix<i64>)> {
    (1usize..12, 1usize..12, 1usize..12)
        .prop_flat_map(|(m, k, n)| (sparse_matrix(m, k, -4i64..5), sparse_matrix(k, n, -4i64..5)))
}

/// Configurations that exercise coarse and fine tasks on one or more threads
fn configs() -> Vec<SaxpyConfig> {
    let mut configs = Vec::new();
    for method in [AxbMethod::Default, AxbMethod::Gustavson, AxbMethod::Hash] {
        configs.push(SaxpyConfig::default().with_threads(1).with_method(method));
        configs.push(SaxpyConfig::default().with_threads(4).with_chunk(2.0).with_method(method));
    }
    configs
}

fn check<A: Scalar, B: Scalar, Z: Scalar>(
    semiring: &Semiring<A, B, Z>,
    a: &SparseMatrix<A>,
    b: &SparseMatrix<B>,
) -> Result<(), TestCaseError> {
    let expected = reference_mxm(None, a, b, semiring).triplets();
    for config in configs() {
        let label = format!("{} {:?} threads={}", semiring.name(), config.method, config.system.n_threads);
        let engine = Saxpy3::new(semiring, config);
        let c = engine.multiply(None, a, b).unwrap().matrix;
        prop_assert_eq!(c.shape(), (a.n_rows(), b.n_cols()));
        prop_assert_eq!(c.triplets(), expected.clone(), "{}", label);
    }
    Ok(())
}

#[test]
fn test_engine_vs_sprs() {
    let a = create_test_matrix();
    let b = create_test_matrix();

    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default());
    let result = engine.multiply(None, &a, &b).unwrap().matrix;

    let a_sprs = to_sprs(&a).unwrap();
    let b_sprs = to_sprs(&b).unwrap();
    let result_sprs = &a_sprs * &b_sprs;
    let result_sprs = result_sprs.to_csc();

    assert_eq!(result.shape(), result_sprs.shape());
    let sprs_col_ptr: Vec<usize> = result_sprs.indptr().as_slice().unwrap().to_vec();
    assert_eq!(result.col_ptr(), sprs_col_ptr.as_slice(), "col_ptr mismatch");
    assert_eq!(result.row_idx(), result_sprs.indices(), "row_idx mismatch");

    for (&(_, _, ours), theirs) in result.triplets().iter().zip(result_sprs.data()) {
        assert!((ours - theirs).abs() < 1e-10, "value mismatch: {} vs {}", ours, theirs);
    }
}

#[test]
fn test_engine_vs_reference_fixed() {
    let a = create_test_matrix();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let expected = reference_mxm(None, &a, &a, &semiring);
    for config in configs() {
        let c = Saxpy3::new(&semiring, config).multiply(None, &a, &a).unwrap().matrix;
        assert_eq!(c.triplets(), expected.triplets());
    }
}

#[test]
fn test_operand_formats() {
    let a = create_test_matrix();
    let b = a.transpose();
    let semiring = Semiring::<f64, f64, f64>::min_plus();
    let expected = reference_mxm(None, &a, &b, &semiring).triplets();

    for a_format in [Format::Sparse, Format::Hypersparse, Format::Bitmap] {
        for b_format in [Format::Sparse, Format::Hypersparse, Format::Bitmap] {
            let a = a.convert(a_format).unwrap();
            let b = b.convert(b_format).unwrap();
            for config in configs() {
                let c = Saxpy3::new(&semiring, config).multiply(None, &a, &b).unwrap().matrix;
                assert_eq!(c.triplets(), expected, "A {:?}, B {:?}", a_format, b_format);
            }
        }
    }
}

#[test]
fn test_full_operands() {
    let dense = SparseMatrix::full(3, 3, saxpy3::Values::Full((1..=9).map(|x| x as i32).collect())).unwrap();
    let semiring = Semiring::<i32, i32, i32>::plus_times();
    let expected = reference_mxm(None, &dense, &dense, &semiring).triplets();
    assert_eq!(expected.len(), 9);
    for config in configs() {
        let c = Saxpy3::new(&semiring, config).multiply(None, &dense, &dense).unwrap().matrix;
        assert_eq!(c.triplets(), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_plus_times_matches_reference((a, b) in operands()) {
        check(&Semiring::plus_times(), &a, &b)?;
    }

    #[test]
    fn prop_min_plus_matches_reference((a, b) in operands()) {
        check(&Semiring::min_plus(), &a, &b)?;
    }

    #[test]
    fn prop_max_times_matches_reference((a, b) in operands()) {
        check(&Semiring::max_times(), &a, &b)?;
    }

    #[test]
    fn prop_plus_pair_matches_reference((a, b) in operands()) {
        check(&Semiring::plus_pair(), &a, &b)?;
    }

    #[test]
    fn prop_min_first_i_matches_reference((a, b) in operands()) {
        check(&Semiring::<i64, i64, i64>::min_first_i(), &a, &b)?;
    }

    #[test]
    fn prop_lor_land_matches_reference(
        (a, b) in (1usize..12, 1usize..12, 1usize..12).prop_flat_map(|(m, k, n)| {
            (sparse_matrix(m, k, any::<bool>()), sparse_matrix(k, n, any::<bool>()))
        })
    ) {
        check(&Semiring::lor_land(), &a, &b)?;
    }

    #[test]
    fn prop_hypersparse_b_output_is_pruned((a, b) in operands()) {
        let b = b.convert(Format::Hypersparse).unwrap();
        let semiring = Semiring::plus_times();
        let expected = reference_mxm(None, &a, &b, &semiring).triplets();
        let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(2).with_chunk(1.0));
        let c = engine.multiply(None, &a, &b).unwrap().matrix;
        prop_assert_eq!(c.format(), Format::Hypersparse);
        prop_assert_eq!(c.triplets(), expected);
        let cp = c.col_ptr();
        prop_assert!(cp.windows(2).all(|w| w[0] < w[1]), "empty vector kept: {:?}", cp);
    }
}
