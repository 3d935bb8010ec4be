//! Dense linear algebra for the Newton KKT systems of the bundled solver.

use ndarray::{Array1, Array2};

// Solves `a * z = b` by LU factorization with partial pivoting. Returns
// `None` when a pivot degenerates, which callers treat as a signal to
// regularize and retry.
pub fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert_eq!(n, b.len());

    for k in 0..n {
        // Partial pivoting
        let mut pivot_row = k;
        let mut pivot_abs = a[[k, k]].abs();
        for row in k + 1..n {
            if a[[row, k]].abs() > pivot_abs {
                pivot_abs = a[[row, k]].abs();
                pivot_row = row;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs < 1e-300 {
            return None;
        }
        if pivot_row != k {
            for col in 0..n {
                a.swap([k, col], [pivot_row, col]);
            }
            b.swap(k, pivot_row);
        }

        // Elimination
        for row in k + 1..n {
            let factor = a[[row, k]] / a[[k, k]];
            if factor == 0.0 {
                continue;
            }
            for col in k..n {
                let subtrahend = factor * a[[k, col]];
                a[[row, col]] -= subtrahend;
            }
            b[row] -= factor * b[k];
        }
    }

    // Back substitution
    let mut z = Array1::zeros(n);
    for k in (0..n).rev() {
        let mut sum = b[k];
        for col in k + 1..n {
            sum -= a[[k, col]] * z[col];
        }
        z[k] = sum / a[[k, k]];
        if !z[k].is_finite() {
            return None;
        }
    }
    Some(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solves_a_known_system() {
        let a = array![[2.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let expected = array![1.0, -2.0, 3.0];
        let b = a.dot(&expected);
        let z = solve(a, b).unwrap();
        for i in 0..3 {
            assert!((z[i] - expected[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn requires_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let b = array![2.0, 3.0];
        let z = solve(a, b).unwrap();
        assert!((z[0] - 3.0).abs() < 1e-15);
        assert!((z[1] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn reports_singular_systems() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(solve(a, b).is_none());
    }
}
