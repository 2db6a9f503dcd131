//!
//! Gradients in the soft-max parameterization
//!
//! Each row of T and E is written as `p_ij = exp(theta_ij) / sum_k exp(theta_ik)`
//! over its nonzero entries, so an unconstrained step in `theta` keeps every
//! row stochastic and every structural zero at zero. For expected counts `c`
//! of some log-probability,
//!
//! ```text
//! d / d theta_ij = c_ij - p_ij sum_k c_ik
//! ```
//!
use super::task::Targets;
use crate::hmm::{Counts, Model, START_STATE};
use crate::matrix::{normalize_row, scalar_product, Matrix};
use ndarray::{Array2, ArrayViewMut1, Zip};

#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub transition: Matrix,
    pub emission: Matrix,
}

fn softmax_rows(counts: &Matrix, probs: &Matrix) -> Matrix {
    let mut g = counts.clone();
    for (mut row, p) in g.rows_mut().into_iter().zip(probs.rows()) {
        let total = row.sum();
        Zip::from(&mut row).and(&p).for_each(|x, &p| {
            *x = if p > 0.0 { *x - p * total } else { 0.0 };
        });
    }
    g
}

impl Gradient {
    pub fn zeros(model: &Model) -> Self {
        Gradient {
            transition: Array2::zeros(model.transition().dim()),
            emission: Array2::zeros(model.emission().dim()),
        }
    }
    ///
    /// Gradient of a function whose derivative with respect to every
    /// log-probability is given by (signed, weighted) expected counts
    ///
    pub fn from_counts(model: &Model, counts: &Counts) -> Self {
        let mut emission = softmax_rows(&counts.emission, model.emission());
        emission.row_mut(START_STATE).fill(0.0);
        Gradient {
            transition: softmax_rows(&counts.transition, model.transition()),
            emission,
        }
    }
    ///
    /// zero every row outside the targets
    ///
    pub fn masked(mut self, targets: &Targets) -> Self {
        for (i, mut row) in self.transition.rows_mut().into_iter().enumerate() {
            if !targets.transition.contains(i) {
                row.fill(0.0);
            }
        }
        for (i, mut row) in self.emission.rows_mut().into_iter().enumerate() {
            if !targets.emission.contains(i) {
                row.fill(0.0);
            }
        }
        self
    }
    pub fn dot(&self, other: &Gradient) -> f64 {
        scalar_product(&self.transition, &other.transition)
            + scalar_product(&self.emission, &other.emission)
    }
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
    ///
    /// `self += w * other`
    ///
    pub fn add_scaled(&mut self, other: &Gradient, w: f64) {
        self.transition.scaled_add(w, &other.transition);
        self.emission.scaled_add(w, &other.emission);
    }
    pub fn scaled(&self, w: f64) -> Gradient {
        Gradient {
            transition: &self.transition * w,
            emission: &self.emission * w,
        }
    }
}

///
/// `p_j <- p_j exp(alpha d_j)` on the nonzero entries, renormalized.
/// Rows without a direction are left as they are.
///
fn step_row(mut row: ArrayViewMut1<f64>, direction: ndarray::ArrayView1<f64>, alpha: f64) {
    if direction.iter().all(|&d| d == 0.0) {
        return;
    }
    let shift = row
        .iter()
        .zip(direction.iter())
        .filter(|&(&p, _)| p > 0.0)
        .map(|(_, &d)| alpha * d)
        .fold(f64::NEG_INFINITY, f64::max);
    Zip::from(&mut row).and(&direction).for_each(|p, &d| {
        if *p > 0.0 {
            *p *= (alpha * d - shift).exp();
        }
    });
    normalize_row(row);
}

impl Model {
    ///
    /// Copy of the model moved by `alpha * direction` in the soft-max parameters
    ///
    pub fn apply_step(&self, direction: &Gradient, alpha: f64) -> Model {
        let mut model = self.clone();
        for (row, d) in model
            .transition
            .rows_mut()
            .into_iter()
            .zip(direction.transition.rows())
        {
            step_row(row, d, alpha);
        }
        for (row, d) in model
            .emission
            .rows_mut()
            .into_iter()
            .zip(direction.emission.rows())
        {
            step_row(row, d, alpha);
        }
        model.finalize();
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::BG_STATE;
    use crate::random_seq::generate;

    #[test]
    fn rows_sum_to_zero() {
        let model = mock_model();
        let counts = model.expected_counts(&generate(50, 3));
        let g = Gradient::from_counts(&model, &counts);
        for row in g.transition.rows().into_iter().chain(g.emission.rows()) {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-9);
        }
        // structural zeros have no gradient
        assert_eq!(g.transition[[2, 4]], 0.0);
    }

    #[test]
    fn likelihood_gradient_matches_finite_difference() {
        let model = mock_model();
        let seq = generate(60, 5);
        let g = Gradient::from_counts(&model, &model.expected_counts(&seq));
        let h = 1e-5;
        let f = |alpha: f64| model.apply_step(&g, alpha).log_likelihood(&seq);
        let numeric = (f(h) - f(-h)) / (2.0 * h);
        assert_relative_eq!(numeric, g.dot(&g), max_relative = 1e-4);
    }

    #[test]
    fn step_keeps_rows_stochastic() {
        let model = mock_model();
        let counts = model.expected_counts(&generate(50, 4));
        let mut targets = Targets::empty(model.n_states());
        targets.add_background();
        let g = Gradient::from_counts(&model, &counts).masked(&targets);
        assert!(g.emission.row(2).iter().all(|&x| x == 0.0));
        let moved = model.apply_step(&g, 1e3);
        assert!(moved.check_consistency(1e-9));
        assert_eq!(moved.emission().row(2), model.emission().row(2));
        assert_ne!(moved.emission().row(BG_STATE), model.emission().row(BG_STATE));
        assert_eq!(moved.transition()[[2, 4]], 0.0);
    }

    #[test]
    fn algebra() {
        let model = mock_model();
        let g = Gradient::from_counts(&model, &model.expected_counts(&generate(20, 1)));
        let mut h = g.scaled(2.0);
        assert_abs_diff_eq!(h.norm(), 2.0 * g.norm(), epsilon = 1e-12);
        h.add_scaled(&g, -2.0);
        assert_abs_diff_eq!(h.norm(), 0.0, epsilon = 1e-12);
    }
}
