//!
//! Backward algorithm definitions
//!
use super::forward::Forward;
use super::model::Model;
use crate::common::Symbol;
use crate::error::{Error, Result};
use crate::matrix::{Matrix, Vector};
use ndarray::Array2;

impl Model {
    ///
    /// Run the Backward algorithm with the scale of a forward pass
    ///
    /// ```text
    /// b_L[i] = 1
    /// b_t[i] = (sum_j T[i][j] E[j][x[t]] b_t+1[j]) / c[t+1]
    /// ```
    ///
    /// Sequence ends are free, so every state may be the last one.
    /// With this convention `sum_j f_t[j] b_t[j] = 1` for every `t`.
    /// An impossible sequence (some `c[t] = 0`) gives an all-zero table.
    ///
    /// `scale` must have `L + 1` entries, as `Forward::scale` of the same sequence.
    ///
    pub fn compute_backward_prescaled(&self, seq: &[Symbol], scale: &Vector) -> Result<Matrix> {
        if scale.len() != seq.len() + 1 {
            return Err(Error::Config(format!(
                "scale of length {} does not match a sequence of length {}",
                scale.len(),
                seq.len()
            )));
        }
        Ok(self.backward_table(seq, scale))
    }
    ///
    /// Forward and Backward tables of a sequence, sharing one scale
    ///
    pub fn forward_backward(&self, seq: &[Symbol]) -> (Forward, Matrix) {
        let forward = self.compute_forward_scaled(seq);
        let backward = self.backward_table(seq, &forward.scale);
        (forward, backward)
    }
    /// `scale.len() == seq.len() + 1`
    fn backward_table(&self, seq: &[Symbol], scale: &Vector) -> Matrix {
        let n = self.n_states();
        let len = seq.len();
        let mut table = Array2::zeros((len + 1, n));
        if scale.iter().any(|&c| c <= 0.0) {
            return table;
        }
        table.row_mut(len).fill(1.0);

        for t in (0..len).rev() {
            let symbol = seq[t];
            for i in 0..n {
                let b: f64 = self
                    .succ(i)
                    .iter()
                    .map(|&j| self.transition[[i, j]] * self.emit(j, symbol) * table[[t + 1, j]])
                    .sum();
                table[[t, i]] = b / scale[t + 1];
            }
        }
        table
    }
    ///
    /// Posterior state occupancy `P(state j at t | x)` for `t = 0..=L`
    ///
    pub fn posterior(&self, forward: &Forward, backward: &Matrix) -> Matrix {
        &forward.table * backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::model::{MotifLayout, START_STATE};
    use crate::random_seq::generate;

    #[test]
    fn forward_backward_consistency() {
        let mut model = mock_model();
        model
            .add_motif_iupac(
                "CCGNNA",
                0.03,
                50.0,
                1.0,
                "m2",
                &MotifLayout {
                    insertions: vec![3],
                    self_transition: true,
                    ..Default::default()
                },
            )
            .unwrap();
        for seed in 0..5 {
            let seq = generate(60, seed);
            let (f, b) = model.forward_backward(&seq);
            let post = model.posterior(&f, &b);
            for t in 0..=seq.len() {
                assert_abs_diff_eq!(post.row(t).sum(), 1.0, epsilon = 1e-9);
            }
            assert_abs_diff_eq!(post[[0, START_STATE]], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn backward_full_probability() {
        // P(x) from the backward table at t=0 and the scales
        let model = mock_model();
        let seq = encode("GGTGACGTCA").unwrap();
        let f = model.compute_forward_scaled(&seq);
        let b = model.compute_backward_prescaled(&seq, &f.scale).unwrap();
        // b_0[start] * prod c = P(x)
        let log_p = b[[0, START_STATE]].ln() + f.scale.iter().map(|c| c.ln()).sum::<f64>();
        assert_abs_diff_eq!(log_p, f.log_likelihood, epsilon = 1e-9);
    }

    #[test]
    fn scale_of_another_sequence() {
        let model = mock_model();
        let seq = encode("GGTGACGTCA").unwrap();
        let f = model.compute_forward_scaled(&seq[..4]);
        assert!(matches!(
            model.compute_backward_prescaled(&seq, &f.scale),
            Err(Error::Config(_))
        ));
        // an empty sequence has the single scale entry c[0]
        let f = model.compute_forward_scaled(&[]);
        let b = model.compute_backward_prescaled(&[], &f.scale).unwrap();
        assert_eq!(b.dim(), (1, model.n_states()));
        assert!(b.iter().all(|&x| x == 1.0));
    }
}
