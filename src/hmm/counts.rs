//!
//! Sufficient statistics: expected (Baum-Welch) and hard (Viterbi) counts
//!
use super::forward::Forward;
use super::model::{Model, START_STATE};
use crate::common::{is_nucleotide, support, Symbol, N_EMISSIONS};
use crate::data::Seq;
use crate::matrix::Matrix;
use ndarray::Array2;
use rayon::prelude::*;

///
/// Transition and emission counts of one or more sequences, and the summed
/// log-likelihood they were computed under.
///
#[derive(Clone, Debug)]
pub struct Counts {
    pub transition: Matrix,
    pub emission: Matrix,
    pub log_likelihood: f64,
}

impl Counts {
    pub fn zeros(n_states: usize) -> Self {
        Counts {
            transition: Array2::zeros((n_states, n_states)),
            emission: Array2::zeros((n_states, N_EMISSIONS)),
            log_likelihood: 0.0,
        }
    }
    ///
    /// `self += w * other`
    ///
    pub fn add_scaled(&mut self, other: &Counts, w: f64) {
        self.transition.scaled_add(w, &other.transition);
        self.emission.scaled_add(w, &other.emission);
        self.log_likelihood += w * other.log_likelihood;
    }
    pub fn scaled(mut self, w: f64) -> Self {
        self.transition *= w;
        self.emission *= w;
        self.log_likelihood *= w;
        self
    }
    fn add_emission(&mut self, model: &Model, state: usize, symbol: Symbol, w: f64) {
        if is_nucleotide(symbol) {
            self.emission[[state, symbol as usize]] += w;
        } else {
            // split a degenerate symbol in proportion to the emission of its support
            let e = model.emit(state, symbol);
            if e > 0.0 {
                for k in support(symbol) {
                    self.emission[[state, k]] += w * model.emission[[state, k]] / e;
                }
            }
        }
    }
}

impl std::ops::AddAssign<&Counts> for Counts {
    fn add_assign(&mut self, other: &Counts) {
        self.add_scaled(other, 1.0);
    }
}

impl Model {
    ///
    /// Expected counts of one sequence from its forward/backward tables
    ///
    /// ```text
    /// xi_t(i, j) = f_t[i] T[i][j] E[j][x[t]] b_t+1[j] / c[t+1]
    /// gamma_t(j) = f_t[j] b_t[j]
    /// ```
    ///
    pub fn expected_counts_from(&self, seq: &[Symbol], forward: &Forward, backward: &Matrix) -> Counts {
        let mut counts = Counts::zeros(self.n_states());
        counts.log_likelihood = forward.log_likelihood;
        if !forward.is_possible() {
            return counts;
        }
        let f = &forward.table;
        let c = &forward.scale;
        for (t, &symbol) in seq.iter().enumerate() {
            for i in 0..self.n_states() {
                let fi = f[[t, i]];
                if fi == 0.0 {
                    continue;
                }
                for &j in self.succ(i) {
                    let xi = fi
                        * self.transition[[i, j]]
                        * self.emit(j, symbol)
                        * backward[[t + 1, j]]
                        / c[t + 1];
                    counts.transition[[i, j]] += xi;
                }
            }
            for j in 0..self.n_states() {
                let gamma = f[[t + 1, j]] * backward[[t + 1, j]];
                if gamma > 0.0 && j != START_STATE {
                    counts.add_emission(self, j, symbol, gamma);
                }
            }
        }
        counts
    }
    ///
    /// Expected counts of one sequence
    ///
    pub fn expected_counts(&self, seq: &[Symbol]) -> Counts {
        let (forward, backward) = self.forward_backward(seq);
        self.expected_counts_from(seq, &forward, &backward)
    }
    ///
    /// Counts along the Viterbi path of one sequence
    ///
    pub fn viterbi_counts(&self, seq: &[Symbol]) -> Counts {
        let path = self.viterbi(seq);
        let mut counts = Counts::zeros(self.n_states());
        counts.log_likelihood = path.log_prob;
        let mut prev = START_STATE;
        for (&state, &symbol) in path.states.iter().zip(seq.iter()) {
            counts.transition[[prev, state]] += 1.0;
            counts.add_emission(self, state, symbol, 1.0);
            prev = state;
        }
        counts
    }
    ///
    /// Weighted expected counts of multiple sequences
    /// with rayon parallel calculation
    ///
    pub fn expected_counts_parallel(&self, seqs: &[&Seq], weighting: bool) -> Counts {
        self.counts_parallel(seqs, weighting, |seq| self.expected_counts(seq))
    }
    ///
    /// Weighted Viterbi counts of multiple sequences
    /// with rayon parallel calculation
    ///
    pub fn viterbi_counts_parallel(&self, seqs: &[&Seq], weighting: bool) -> Counts {
        self.counts_parallel(seqs, weighting, |seq| self.viterbi_counts(seq))
    }
    fn counts_parallel<F>(&self, seqs: &[&Seq], weighting: bool, f: F) -> Counts
    where
        F: Fn(&[Symbol]) -> Counts + Sync,
    {
        seqs.par_iter()
            .map(|seq| f(&seq.symbols).scaled(seq.effective_weight(weighting)))
            .reduce(
                || Counts::zeros(self.n_states()),
                |mut a, b| {
                    a += &b;
                    a
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::random_seq::generate;

    #[test]
    fn expected_counts_are_normalized() {
        let model = mock_model();
        let seq = generate(40, 1);
        let counts = model.expected_counts(&seq);
        // one transition per emitted symbol, one emission per symbol
        assert_abs_diff_eq!(counts.transition.sum(), 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(counts.emission.sum(), 40.0, epsilon = 1e-9);
        // the first transition leaves the start state
        assert_abs_diff_eq!(counts.transition.row(START_STATE).sum(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(counts.log_likelihood, model.log_likelihood(&seq), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_symbols_are_split() {
        let model = Model::new();
        let counts = model.expected_counts(&encode("RN").unwrap());
        let bg = crate::hmm::BG_STATE;
        assert_abs_diff_eq!(counts.emission[[bg, 0]], 0.5 + 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(counts.emission[[bg, 1]], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(counts.emission[[bg, 2]], 0.5 + 0.25, epsilon = 1e-12);
    }

    #[test]
    fn viterbi_counts_follow_path() {
        let model = mock_model();
        let seq = encode("AATGACGTA").unwrap();
        let counts = model.viterbi_counts(&seq);
        assert_eq!(counts.transition[[START_STATE, 1]], 1.0);
        assert_eq!(counts.transition[[1, 2]], 1.0);
        assert_eq!(counts.transition[[7, 1]], 1.0);
        assert_eq!(counts.emission[[2, 3]], 1.0);
        assert_eq!(counts.emission.sum(), 9.0);
    }

    #[test]
    fn parallel_counts_match_sequential() {
        let model = mock_model();
        let seqs: Vec<Seq> = (0..6)
            .map(|i| Seq::new(&format!("s{}", i), generate(30, i)))
            .collect();
        let refs: Vec<&Seq> = seqs.iter().collect();
        let par = model.expected_counts_parallel(&refs, false);
        let mut seq_sum = Counts::zeros(model.n_states());
        for s in seqs.iter() {
            seq_sum += &model.expected_counts(&s.symbols);
        }
        assert!(crate::matrix::l1_diff(&par.transition, &seq_sum.transition) < 1e-9);
        assert!(crate::matrix::l1_diff(&par.emission, &seq_sum.emission) < 1e-9);
        assert_abs_diff_eq!(par.log_likelihood, seq_sum.log_likelihood, epsilon = 1e-9);
    }
}
