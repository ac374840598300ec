//! Small dense linear algebra for normal equations.
//!
//! Fit problems here have at most five parameters, so row-major
//! `Vec<Vec<f64>>` with Gauss-Jordan elimination is sufficient.

use thiserror::Error;

/// Row-major dense matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Pivots smaller than this (relative to the largest row entry) are singular.
const PIVOT_EPS: f64 = 1e-14;

/// Errors raised by the dense solvers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
    #[error("dimension mismatch: matrix {rows} rows, vector {len}")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("matrix is singular at column {column}")]
    Singular { column: usize },
}

fn check_square(a: &[Vec<f64>]) -> Result<usize, LinalgError> {
    let n = a.len();
    for row in a {
        if row.len() != n {
            return Err(LinalgError::NotSquare {
                rows: n,
                cols: row.len(),
            });
        }
    }
    Ok(n)
}

/// Gauss-Jordan elimination with partial pivoting on an augmented matrix
/// `[A | B]`, leaving `[I | A^-1 B]`.
fn gauss_jordan(aug: &mut [Vec<f64>], n: usize) -> Result<(), LinalgError> {
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for (row, values) in aug.iter().enumerate().skip(col + 1) {
            if values[col].abs() > max_val {
                max_val = values[col].abs();
                max_row = row;
            }
        }
        aug.swap(col, max_row);

        let scale = aug[col][..n]
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()))
            .max(f64::MIN_POSITIVE);
        let pivot = aug[col][col];
        if !pivot.is_finite() || pivot.abs() <= PIVOT_EPS * scale {
            return Err(LinalgError::Singular { column: col });
        }

        for value in aug[col].iter_mut() {
            *value /= pivot;
        }

        let pivot_row = aug[col].clone();
        for (row, values) in aug.iter_mut().enumerate() {
            if row == col {
                continue;
            }
            let factor = values[col];
            if factor == 0.0 {
                continue;
            }
            for (value, p) in values.iter_mut().zip(&pivot_row) {
                *value -= factor * p;
            }
        }
    }
    Ok(())
}

/// Solve `A x = b`.
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, LinalgError> {
    let n = check_square(a)?;
    if b.len() != n {
        return Err(LinalgError::DimensionMismatch { rows: n, len: b.len() });
    }
    let mut aug: Matrix = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();
    gauss_jordan(&mut aug, n)?;
    Ok(aug.into_iter().map(|row| row[n]).collect())
}

/// Invert a square matrix.
pub fn invert(a: &[Vec<f64>]) -> Result<Matrix, LinalgError> {
    let n = check_square(a)?;
    let mut aug: Matrix = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();
    gauss_jordan(&mut aug, n)?;
    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// `g^T M g` for a gradient `g` and a square matrix `M`.
pub fn quadratic_form(g: &[f64], m: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    for (i, row) in m.iter().enumerate().take(g.len()) {
        for (j, value) in row.iter().enumerate().take(g.len()) {
            total += g[i] * value * g[j];
        }
    }
    total
}
