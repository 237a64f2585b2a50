//! Dense linear algebra over flat row-major `Vec<f64>` buffers.
//!
//! Matrices are stored row-major with an explicit dimension, so a `d×d` matrix
//! is a `Vec<f64>` of length `d*d` with entry `(i, j)` at `m[i*d + j]`. The
//! ridge models here are small (context dimension in the tens), so plain
//! nested loops beat the constant factors of a general-purpose matrix crate.

/// Pivot threshold below which a matrix is treated as singular.
const PIVOT_EPS: f64 = 1e-12;

/// Dot product of two equal-length slices.
#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut s = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        s += x * y;
    }
    s
}

/// `m · x` for a row-major `dim×dim` matrix.
pub(crate) fn mat_vec(m: &[f64], dim: usize, x: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; dim];
    for (i, o) in out.iter_mut().enumerate() {
        *o = dot(&m[i * dim..(i + 1) * dim], x);
    }
    out
}

/// Accumulate `m += x · xᵗ` (rank-1 outer product) in place.
pub(crate) fn add_outer(m: &mut [f64], dim: usize, x: &[f64]) {
    for i in 0..dim {
        let xi = x[i];
        let row = &mut m[i * dim..(i + 1) * dim];
        for (j, r) in row.iter_mut().enumerate() {
            *r += xi * x[j];
        }
    }
}

/// Invert a `dim×dim` matrix by Gauss–Jordan elimination with partial
/// pivoting. Returns `None` when a pivot falls below [`PIVOT_EPS`], which the
/// callers report as a singular design matrix.
pub(crate) fn invert(m: &[f64], dim: usize) -> Option<Vec<f64>> {
    // Augmented [M | I], reduced in place.
    let mut a = m.to_vec();
    let mut inv = vec![0.0; dim * dim];
    for i in 0..dim {
        inv[i * dim + i] = 1.0;
    }

    for col in 0..dim {
        // Partial pivot: largest magnitude at or below the diagonal.
        let mut pivot_row = col;
        let mut pivot_abs = a[col * dim + col].abs();
        for row in (col + 1)..dim {
            let v = a[row * dim + col].abs();
            if v > pivot_abs {
                pivot_abs = v;
                pivot_row = row;
            }
        }
        if !pivot_abs.is_finite() || pivot_abs < PIVOT_EPS {
            return None;
        }
        if pivot_row != col {
            for j in 0..dim {
                a.swap(col * dim + j, pivot_row * dim + j);
                inv.swap(col * dim + j, pivot_row * dim + j);
            }
        }

        let pivot = a[col * dim + col];
        for j in 0..dim {
            a[col * dim + j] /= pivot;
            inv[col * dim + j] /= pivot;
        }

        for row in 0..dim {
            if row == col {
                continue;
            }
            let factor = a[row * dim + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..dim {
                a[row * dim + j] -= factor * a[col * dim + j];
                inv[row * dim + j] -= factor * inv[col * dim + j];
            }
        }
    }
    Some(inv)
}

/// Lower-triangular Cholesky factor `L` of a symmetric positive-definite
/// matrix (`m = L·Lᵗ`). Returns `None` when the matrix is not positive
/// definite within tolerance.
pub(crate) fn cholesky(m: &[f64], dim: usize) -> Option<Vec<f64>> {
    let mut l = vec![0.0; dim * dim];
    for i in 0..dim {
        for j in 0..=i {
            let mut s = m[i * dim + j];
            for k in 0..j {
                s -= l[i * dim + k] * l[j * dim + k];
            }
            if i == j {
                if !s.is_finite() || s <= 0.0 {
                    return None;
                }
                l[i * dim + j] = s.sqrt();
            } else {
                l[i * dim + j] = s / l[j * dim + j];
            }
        }
    }
    Some(l)
}
