//!
//! Dense matrix/vector containers for transition/emission parameters
//! and dynamic programming tables.
//!
//! Rows of a parameter matrix are probability distributions. A row whose
//! entries all vanish is kept as a zero row: it marks an unreachable state.
//!
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Zip};

pub type Matrix = Array2<f64>;
pub type Vector = Array1<f64>;

///
/// Normalize a single row to sum 1, clamping negative drift to zero.
/// Returns the sum before normalization.
///
pub fn normalize_row(mut row: ArrayViewMut1<f64>) -> f64 {
    row.mapv_inplace(|x| if x < 0.0 { 0.0 } else { x });
    let z: f64 = row.sum();
    if z > 0.0 {
        row.mapv_inplace(|x| x / z);
    } else {
        row.fill(0.0);
    }
    z
}

///
/// Normalize every row of the matrix
///
pub fn normalize_rows(m: &mut Matrix) {
    for row in m.rows_mut() {
        normalize_row(row);
    }
}

///
/// Normalize a vector so that it sums to 1. Returns the sum before normalization.
///
pub fn normalize(v: &mut Vector) -> f64 {
    normalize_row(v.view_mut())
}

///
/// L1 norm of `a - b`
///
pub fn l1_diff(a: &Matrix, b: &Matrix) -> f64 {
    Zip::from(a).and(b).fold(0.0, |acc, x, y| acc + (x - y).abs())
}

///
/// Frobenius inner product `sum_ij a_ij b_ij`
///
pub fn scalar_product(a: &Matrix, b: &Matrix) -> f64 {
    Zip::from(a).and(b).fold(0.0, |acc, x, y| acc + x * y)
}

///
/// Check that every row sums to 1 within `eps`.
/// Zero rows (unreachable states) are accepted when `allow_zero_rows`.
///
pub fn is_row_stochastic(m: &Matrix, eps: f64, allow_zero_rows: bool) -> bool {
    m.rows()
        .into_iter()
        .all(|row| is_distribution(row, eps, allow_zero_rows))
}

pub fn is_distribution(row: ArrayView1<f64>, eps: f64, allow_zero: bool) -> bool {
    let z = row.sum();
    let non_negative = row.iter().all(|&x| x >= 0.0);
    non_negative && ((z - 1.0).abs() <= eps || (allow_zero && z == 0.0))
}
