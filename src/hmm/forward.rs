//!
//! Forward algorithm definitions
//!
use super::model::{Model, START_STATE};
use crate::common::Symbol;
use crate::data::Seq;
use crate::matrix::{Matrix, Vector};
use crate::prob::{lp, Prob};
use ndarray::{Array1, Array2};
use rayon::prelude::*;

///
/// Result of the scaled forward recursion over a sequence of length `L`.
///
/// `table` has `L + 1` rows. Row `t` holds
///
/// ```text
/// f_t[j] = P(x[0..t], state j at t) / (c[1] c[2] ... c[t])
/// ```
///
/// with the scale `c[t]` chosen so that every row sums to 1 (`c[0] = 1`,
/// row `0` puts all mass on the start state).
///
#[derive(Clone, Debug)]
pub struct Forward {
    pub table: Matrix,
    pub scale: Vector,
    /// `sum_t log c[t]`, `-inf` if the sequence is impossible under the model
    pub log_likelihood: f64,
}

impl Forward {
    /// length of the emitted sequence
    pub fn len(&self) -> usize {
        self.table.nrows() - 1
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    ///
    /// Full probability `P(x)`
    ///
    pub fn likelihood(&self) -> Prob {
        lp(self.log_likelihood)
    }
    pub fn is_possible(&self) -> bool {
        self.log_likelihood.is_finite()
    }
}

impl Model {
    ///
    /// Run the scaled Forward algorithm
    ///
    /// ```text
    /// f_t[j] = (sum_i f_t-1[i] T[i][j]) E[j][x[t-1]] / c[t]
    /// ```
    ///
    /// If the sequence cannot be emitted, the remaining rows are left zero and the
    /// log-likelihood is `-inf`.
    ///
    pub fn compute_forward_scaled(&self, seq: &[Symbol]) -> Forward {
        let n = self.n_states();
        let len = seq.len();
        let mut table = Array2::zeros((len + 1, n));
        let mut scale = Array1::zeros(len + 1);
        table[[0, START_STATE]] = 1.0;
        scale[0] = 1.0;
        let mut log_likelihood = 0.0;

        for t in 1..=len {
            let symbol = seq[t - 1];
            let mut z = 0.0;
            for j in 0..n {
                let e = self.emit(j, symbol);
                if e == 0.0 {
                    continue;
                }
                let f: f64 = self
                    .pred(j)
                    .iter()
                    .map(|&i| table[[t - 1, i]] * self.transition[[i, j]])
                    .sum();
                table[[t, j]] = f * e;
                z += f * e;
            }
            scale[t] = z;
            if z > 0.0 {
                table.row_mut(t).mapv_inplace(|x| x / z);
                log_likelihood += z.ln();
            } else {
                log_likelihood = f64::NEG_INFINITY;
                break;
            }
        }

        Forward {
            table,
            scale,
            log_likelihood,
        }
    }
    ///
    /// `log P(x)` of a sequence
    ///
    pub fn log_likelihood(&self, seq: &[Symbol]) -> f64 {
        self.compute_forward_scaled(seq).log_likelihood
    }
    ///
    /// Weighted sum of the log-likelihoods with rayon parallel calculation
    ///
    pub fn log_likelihood_parallel(&self, seqs: &[&Seq], weighting: bool) -> f64 {
        seqs.par_iter()
            .map(|seq| seq.effective_weight(weighting) * self.log_likelihood(&seq.symbols))
            .sum()
    }
}
