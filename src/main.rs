use saxpy3::{mxm, Mask, Saxpy3, SaxpyConfig, Semiring, SparseMatrix};
use tracing::Level;

fn main() {
    // First argument sets the log level, e.g. `saxpy3 debug`
    let level = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    println!("saxpy3 {}: masked sparse matrix multiplication", saxpy3::VERSION);

    let a = SparseMatrix::new(
        3,
        3,
        vec![0, 2, 3, 5],
        vec![0, 2, 1, 0, 2],
        vec![1i64, 4, 3, 2, 5],
    );
    let b = SparseMatrix::new(3, 3, vec![0, 2, 3, 4], vec![0, 2, 0, 1], vec![7i64, 8, 9, 10]);

    println!("\nMatrix A:\n{:?}", a.to_dense(0));
    println!("\nMatrix B:\n{:?}", b.to_dense(0));

    let config = SaxpyConfig::from_env();
    println!("\nConfiguration:");
    println!("  Threads: {}", config.system.n_threads);
    println!("  Chunk: {}", config.chunk);
    println!("  Method: {:?}", config.method);

    let plus_times = Semiring::<i64, i64, i64>::plus_times();
    let engine = Saxpy3::new(&plus_times, config.clone());
    match engine.multiply(None, &a, &b) {
        Ok(product) => {
            println!("\nC = A*B over {} ({} kernel):", plus_times.name(), product.tier);
            println!("{:?}", product.matrix.to_dense(0));
            println!("  Tasks: {:?}", product.stats);
        }
        Err(err) => eprintln!("multiplication failed: {err}"),
    }

    let min_plus = Semiring::<i64, i64, i64>::min_plus();
    let engine = Saxpy3::new(&min_plus, config);
    let m = SparseMatrix::<bool>::identity(3);
    match mxm(None, Some(Mask::new(&m).complement()), true, &a, &b, &engine) {
        Ok(c) => {
            println!("\nC<!I> = A*B over {}:", min_plus.name());
            for (i, j, z) in c.triplets() {
                println!("  ({i}, {j}) = {z}");
            }
        }
        Err(err) => eprintln!("multiplication failed: {err}"),
    }
}
