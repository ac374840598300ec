//! Savitzky-Golay smoothing and differentiation.
//!
//! Fits a local polynomial of degree `p` to a sliding window of `2m+1`
//! samples. Interior points use the symmetric kernel; the first and last
//! `m` points evaluate the polynomial fitted to the edge window at their
//! own offset instead of padding the signal.

use super::linalg::invert;
use thiserror::Error;

/// Error types for Savitzky-Golay operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SgError {
    /// Polynomial order must be less than window size.
    #[error("polynomial order {order} >= window size {window}")]
    OrderTooHigh { order: usize, window: usize },
    /// Window half-width must be positive.
    #[error("half-width must be > 0")]
    ZeroHalfWidth,
    /// Normal equations of the local fit are singular.
    #[error("local polynomial fit is singular")]
    Singular,
}

/// Coefficients that evaluate the `deriv_order`-th derivative of the local
/// polynomial at `offset` (relative to the window centre, in samples).
pub fn sg_coefficients_at(
    half_width: usize,
    poly_order: usize,
    deriv_order: usize,
    offset: f64,
) -> Result<Vec<f64>, SgError> {
    let m = half_width;
    if m == 0 {
        return Err(SgError::ZeroHalfWidth);
    }
    let window = 2 * m + 1;
    if poly_order >= window {
        return Err(SgError::OrderTooHigh {
            order: poly_order,
            window,
        });
    }
    let p = poly_order + 1;

    // Vandermonde rows J[i][k] = x_i^k for x_i in -m..=m
    let vander: Vec<Vec<f64>> = (0..window)
        .map(|i| {
            let x = i as f64 - m as f64;
            (0..p).map(|k| x.powi(k as i32)).collect()
        })
        .collect();

    let mut jtj = vec![vec![0.0; p]; p];
    for (r, row) in jtj.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = vander.iter().map(|v| v[r] * v[c]).sum();
        }
    }
    let inv = invert(&jtj).map_err(|_| SgError::Singular)?;

    // d^d/dx^d of sum_k a_k x^k at `offset`, with a = (J^T J)^-1 J^T y
    let basis: Vec<f64> = (0..p)
        .map(|k| {
            if k < deriv_order {
                0.0
            } else {
                let falling: f64 = (0..deriv_order).map(|j| (k - j) as f64).product();
                falling * offset.powi((k - deriv_order) as i32)
            }
        })
        .collect();

    Ok(vander
        .iter()
        .map(|row| {
            (0..p)
                .map(|k| {
                    let inv_row: f64 = (0..p).map(|l| basis[l] * inv[l][k]).sum();
                    inv_row * row[k]
                })
                .sum()
        })
        .collect())
}

/// Symmetric (centre) coefficients.
pub fn sg_coefficients(
    half_width: usize,
    poly_order: usize,
    deriv_order: usize,
) -> Result<Vec<f64>, SgError> {
    sg_coefficients_at(half_width, poly_order, deriv_order, 0.0)
}

/// A configured Savitzky-Golay filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavitzkyGolay {
    half_width: usize,
    poly_order: usize,
}

impl SavitzkyGolay {
    /// Create a filter with window `2 * half_width + 1`.
    pub fn new(half_width: usize, poly_order: usize) -> Result<Self, SgError> {
        // Validates the shape once up front.
        sg_coefficients(half_width, poly_order, 0)?;
        Ok(Self {
            half_width,
            poly_order,
        })
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }

    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    /// Smoothed signal, same length as the input.
    pub fn smooth(&self, data: &[f64]) -> Vec<f64> {
        self.apply(data, 0)
    }

    /// First derivative per sample step, same length as the input.
    pub fn derivative(&self, data: &[f64]) -> Vec<f64> {
        self.apply(data, 1)
    }

    fn apply(&self, data: &[f64], deriv_order: usize) -> Vec<f64> {
        let n = data.len();
        // Shrink the window for short signals.
        let m = self.half_width.min(n.saturating_sub(1) / 2);
        if m == 0 {
            return if deriv_order == 0 {
                data.to_vec()
            } else {
                vec![0.0; n]
            };
        }
        let order = self.poly_order.min(2 * m);
        let window = 2 * m + 1;

        let centre = match sg_coefficients(m, order, deriv_order) {
            Ok(c) => c,
            Err(_) => return data.to_vec(),
        };

        let mut out = vec![0.0; n];
        for i in m..n - m {
            out[i] = centre
                .iter()
                .zip(&data[i - m..=i + m])
                .map(|(c, v)| c * v)
                .sum();
        }

        for i in 0..m {
            let head = sg_coefficients_at(m, order, deriv_order, i as f64 - m as f64);
            let tail = sg_coefficients_at(m, order, deriv_order, m as f64 - i as f64);
            if let (Ok(head), Ok(tail)) = (head, tail) {
                out[i] = head.iter().zip(&data[..window]).map(|(c, v)| c * v).sum();
                out[n - 1 - i] = tail
                    .iter()
                    .zip(&data[n - window..])
                    .map(|(c, v)| c * v)
                    .sum();
            }
        }
        out
    }
}

/// Apply Savitzky-Golay smoothing to a signal.
pub fn sg_smooth(data: &[f64], half_width: usize, poly_order: usize) -> Vec<f64> {
    match SavitzkyGolay::new(half_width, poly_order) {
        Ok(sg) => sg.smooth(data),
        Err(_) => data.to_vec(),
    }
}

/// Apply Savitzky-Golay first derivative (per sample step) to a signal.
pub fn sg_derivative(data: &[f64], half_width: usize, poly_order: usize) -> Vec<f64> {
    match SavitzkyGolay::new(half_width, poly_order) {
        Ok(sg) => sg.derivative(data),
        Err(_) => vec![0.0; data.len()],
    }
}

/// Numerical gradient `dy/dx` on a possibly non-uniform grid.
///
/// Second-order central differences inside, one-sided at the ends.
pub fn gradient(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return vec![0.0; n];
    }
    let mut out = vec![0.0; n];
    out[0] = (y[1] - y[0]) / (x[1] - x[0]);
    out[n - 1] = (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);
    for i in 1..n - 1 {
        let h_prev = x[i] - x[i - 1];
        let h_next = x[i + 1] - x[i];
        let denom = h_prev * h_next * (h_prev + h_next);
        out[i] = (h_prev * h_prev * y[i + 1] - h_next * h_next * y[i - 1]
            + (h_next * h_next - h_prev * h_prev) * y[i])
            / denom;
    }
    out
}
