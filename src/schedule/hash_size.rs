//! Hash table sizing and the Gustavson/Hash choice

use crate::matrix::AxbMethod;

/// Accumulator used by a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableMethod {
    /// Dense table indexed by row, `cvlen` slots
    Gustavson,
    /// Open-addressing table with linear probing
    Hash,
}

/// Chooses the table for a task whose columns need at most `flmax` flops
///
/// Returns the method and the table size: `cvlen` for Gustavson, otherwise
/// twice the smallest power of two above `flmax`, which keeps any hash
/// table at most half full.
pub fn hash_table_size(
    flmax: usize,
    cvlen: usize,
    method: AxbMethod,
    gustavson_divisor: usize,
) -> (TableMethod, usize) {
    let flmax = flmax.max(1);
    let hash_size = flmax
        .checked_add(1)
        .and_then(usize::checked_next_power_of_two)
        .and_then(|p| p.checked_mul(2));

    let use_gustavson = match (method, hash_size) {
        (AxbMethod::Gustavson, _) | (_, None) => true,
        (AxbMethod::Hash, Some(size)) => size >= cvlen,
        (AxbMethod::Default, Some(size)) => size >= cvlen / gustavson_divisor.max(1),
    };

    match hash_size {
        Some(size) if !use_gustavson => (TableMethod::Hash, size),
        _ => (TableMethod::Gustavson, cvlen),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_sizes() {
        let huge = 1 << 40;
        assert_eq!(hash_table_size(1, huge, AxbMethod::Default, 16), (TableMethod::Hash, 4));
        assert_eq!(hash_table_size(0, huge, AxbMethod::Default, 16), (TableMethod::Hash, 4));
        assert_eq!(hash_table_size(3, huge, AxbMethod::Default, 16), (TableMethod::Hash, 8));
        assert_eq!(hash_table_size(1000, huge, AxbMethod::Default, 16), (TableMethod::Hash, 2048));
        assert_eq!(hash_table_size(1024, huge, AxbMethod::Default, 16), (TableMethod::Hash, 4096));
    }

    #[test]
    fn test_default_switches_at_a_sixteenth() {
        // 1000 flops give a 2048-slot table
        assert_eq!(hash_table_size(1000, 32_768, AxbMethod::Default, 16), (TableMethod::Gustavson, 32_768));
        assert_eq!(hash_table_size(1000, 32_784, AxbMethod::Default, 16), (TableMethod::Hash, 2048));
    }

    #[test]
    fn test_method_hints() {
        assert_eq!(hash_table_size(1, 1 << 20, AxbMethod::Gustavson, 16), (TableMethod::Gustavson, 1 << 20));
        assert_eq!(hash_table_size(1000, 4096, AxbMethod::Hash, 16), (TableMethod::Hash, 2048));
        assert_eq!(hash_table_size(1000, 2048, AxbMethod::Hash, 16), (TableMethod::Gustavson, 2048));
    }

    #[test]
    fn test_hash_never_exceeds_half_full() {
        for flmax in 1..5000 {
            let (method, size) = hash_table_size(flmax, usize::MAX, AxbMethod::Hash, 16);
            assert_eq!(method, TableMethod::Hash);
            assert!(size.is_power_of_two());
            assert!(size >= 2 * flmax);
        }
    }
}
