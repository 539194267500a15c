//! Task scheduling, accumulator choice and workspace behaviour

use saxpy3::{
    reference_mxm, AxbMethod, Format, Saxpy3, SaxpyConfig, SaxpyError, Semiring, SparseMatrix, Values,
};

/// Power-law column lengths: column j of A holds about n / (j + 1) entries
fn skewed(n: usize) -> SparseMatrix<i64> {
    let triplets: Vec<_> = (0..n)
        .flat_map(|j| {
            let len = (n / (j + 1)).max(1);
            (0..len).map(move |t| ((t * 31 + j * 17) % n, j, ((t + j) % 5) as i64 - 2))
        })
        .collect();
    SparseMatrix::from_triplets(n, n, &triplets, |x, y| x + y).unwrap()
}

fn configs() -> Vec<SaxpyConfig> {
    let mut configs = Vec::new();
    for method in [AxbMethod::Default, AxbMethod::Gustavson, AxbMethod::Hash] {
        for (threads, chunk) in [(1, 65_536.0), (3, 16.0), (8, 1.0)] {
            for atomics in [true, false] {
                let mut config = SaxpyConfig::default().with_threads(threads).with_chunk(chunk).with_method(method);
                config.atomics = atomics;
                configs.push(config);
            }
        }
    }
    configs
}

#[test]
fn test_methods_threads_and_atomics_agree() {
    let a = skewed(120);
    let b = a.transpose();
    let semiring = Semiring::<i64, i64, i64>::plus_times();
    let expected = reference_mxm(None, &a, &b, &semiring).triplets();

    for config in configs() {
        let label = format!("{:?} threads={} atomics={}", config.method, config.system.n_threads, config.atomics);
        let product = Saxpy3::new(&semiring, config).multiply(None, &a, &b).unwrap();
        assert_eq!(product.matrix.triplets(), expected, "{}", label);
        assert_eq!(product.stats.ntasks, product.stats.nfine() + product.stats.ncoarse(), "{}", label);
    }
}

#[test]
fn test_method_hint_selects_tables() {
    let a = skewed(200);
    let semiring = Semiring::<i64, i64, i64>::plus_times();

    let gustavson = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(1).with_method(AxbMethod::Gustavson));
    let stats = gustavson.multiply(None, &a, &a).unwrap().stats;
    assert_eq!(stats.ncoarse_hash + stats.nfine_hash, 0);
    assert!(stats.ncoarse_gustavson >= 1);

    let hash = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(1).with_method(AxbMethod::Hash));
    let one_column = SparseMatrix::from_triplets(200, 1, &[(3, 0, 1i64), (150, 0, 2)], |x, _| *x).unwrap();
    let stats = hash.multiply(None, &a, &one_column).unwrap().stats;
    assert_eq!(stats.nfine_hash + stats.ncoarse_hash, 1);
}

#[test]
fn test_multithreaded_run_uses_several_tasks() {
    let a = skewed(300);
    let semiring = Semiring::<i64, i64, i64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(4).with_chunk(8.0));
    let product = engine.multiply(None, &a, &a).unwrap();
    assert!(product.stats.nthreads > 1);
    assert!(product.stats.ntasks > 1);
    assert_eq!(product.matrix.triplets(), reference_mxm(None, &a, &a, &semiring).triplets());
}

#[test]
fn test_workspace_limit_reports_out_of_memory() {
    let a = skewed(64);
    let semiring = Semiring::<i64, i64, i64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_workspace_limit(16));

    let err = engine.multiply(None, &a, &a).unwrap_err();
    assert!(err.is_out_of_memory());
    assert!(matches!(err, SaxpyError::OutOfMemory { bytes, .. } if bytes > 16));

    let roomy = Saxpy3::new(&semiring, SaxpyConfig::default().with_workspace_limit(1 << 30));
    assert!(roomy.multiply(None, &a, &a).is_ok());
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let a = skewed(8);
    let semiring = Semiring::<i64, i64, i64>::plus_times();
    let engine = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(0));
    assert!(matches!(engine.multiply(None, &a, &a), Err(SaxpyError::InvalidInput(_))));
}

#[test]
fn test_terminal_exit_does_not_change_results() {
    let n = 60;
    let triplets: Vec<_> = (0..n)
        .flat_map(|j| (0..n).filter(move |i| (i * j + i + j) % 4 == 0).map(move |i| (i, j, (i + j) % 3 == 0)))
        .collect();
    let a = SparseMatrix::from_triplets(n, n, &triplets, |x, _| *x).unwrap();
    let lor_land = Semiring::<bool, bool, bool>::lor_land();
    let expected = reference_mxm(None, &a, &a, &lor_land).triplets();

    for terminal_exit in [true, false] {
        for (threads, chunk) in [(1, 65_536.0), (4, 4.0)] {
            let mut config = SaxpyConfig::default().with_threads(threads).with_chunk(chunk);
            config.terminal_exit = terminal_exit;
            let c = Saxpy3::new(&lor_land, config).multiply(None, &a, &a).unwrap().matrix;
            assert_eq!(c.triplets(), expected, "terminal_exit={terminal_exit} threads={threads}");
        }
    }

    // max reaches its terminal at i64::MAX
    let b = SparseMatrix::from_triplets(3, 2, &[(0, 0, i64::MAX), (1, 0, 4), (2, 0, 9), (1, 1, -1)], |x, _| *x)
        .unwrap();
    let a = SparseMatrix::from_triplets(3, 3, &[(0, 0, i64::MAX), (0, 1, 5), (0, 2, 7), (2, 2, 1)], |x, _| *x)
        .unwrap();
    let max_min = Semiring::<i64, i64, i64>::max_min();
    let expected = reference_mxm(None, &a, &b, &max_min).triplets();
    assert_eq!(expected[0], (0, 0, i64::MAX));
    for terminal_exit in [true, false] {
        let mut config = SaxpyConfig::default();
        config.terminal_exit = terminal_exit;
        let c = Saxpy3::new(&max_min, config).multiply(None, &a, &b).unwrap().matrix;
        assert_eq!(c.triplets(), expected);
    }
}

#[test]
fn test_any_pair_output_is_iso() {
    let a = skewed(50);
    let semiring = Semiring::<i64, i64, i64>::any_pair();
    let product = Saxpy3::new(&semiring, SaxpyConfig::default().with_threads(3).with_chunk(4.0))
        .multiply(None, &a, &a)
        .unwrap();
    assert_eq!(product.matrix.values(), &Values::Iso(1));

    let plus_pair = Semiring::<i64, i64, i64>::plus_pair();
    let counts = Saxpy3::new(&plus_pair, SaxpyConfig::default()).multiply(None, &a, &a).unwrap().matrix;
    let pattern: Vec<_> = counts.triplets().into_iter().map(|(i, j, _)| (i, j)).collect();
    let iso: Vec<_> = product.matrix.triplets().into_iter().map(|(i, j, _)| (i, j)).collect();
    assert_eq!(pattern, iso);
    assert!(counts.triplets().iter().all(|&(_, _, z)| z >= 1));
}

#[test]
fn test_iso_operands() {
    let a = skewed(40).into_iso(3);
    let b = skewed(40).transpose().into_iso(2);
    let semiring = Semiring::<i64, i64, i64>::plus_times();
    let expected = reference_mxm(None, &a, &b, &semiring).triplets();

    for config in configs() {
        let c = Saxpy3::new(&semiring, config).multiply(None, &a, &b).unwrap().matrix;
        assert_eq!(c.triplets(), expected);
    }

    let any_times = Semiring::new(saxpy3::Monoid::any(), saxpy3::BinaryOp::times());
    let c = Saxpy3::new(&any_times, SaxpyConfig::default()).multiply(None, &a, &b).unwrap().matrix;
    assert_eq!(c.values(), &Values::Iso(6i64));
}

#[test]
fn test_positional_multiplier() {
    let a = skewed(30);
    let b = a.transpose();
    let semiring = Semiring::<i64, i64, i64>::min_first_i();
    let expected = reference_mxm(None, &a, &b, &semiring).triplets();
    for config in configs() {
        let c = Saxpy3::new(&semiring, config).multiply(None, &a, &b).unwrap().matrix;
        assert_eq!(c.triplets(), expected);
    }
    assert!(expected.iter().all(|&(i, _, z)| z == i as i64));
}

#[test]
fn test_hypersparse_b_keeps_only_nonempty_columns() {
    let a = SparseMatrix::from_triplets(4, 4, &[(0, 0, 1.0), (1, 1, 2.0)], |x, _| *x).unwrap();
    // Column 2 of B only hits the empty column 3 of A
    let b = SparseMatrix::from_triplets(4, 10, &[(0, 0, 1.0), (1, 5, 1.0), (3, 2, 1.0)], |x, _| *x)
        .unwrap()
        .convert(Format::Hypersparse)
        .unwrap();
    let semiring = Semiring::<f64, f64, f64>::plus_times();
    let c = Saxpy3::new(&semiring, SaxpyConfig::default()).multiply(None, &a, &b).unwrap().matrix;

    assert_eq!(c.format(), Format::Hypersparse);
    assert_eq!(c.col_ids(), &[0, 5]);
    assert_eq!(c.triplets(), vec![(0, 0, 1.0), (1, 5, 2.0)]);
}
