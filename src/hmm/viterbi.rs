//!
//! Viterbi (max-product) decoding
//!
use super::model::{Model, START_STATE};
use crate::common::Symbol;
use crate::prob::{lp, p, Prob};

///
/// Most probable state path. `states[t]` is the state emitting `x[t]`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ViterbiPath {
    pub states: Vec<usize>,
    pub log_prob: f64,
}

impl ViterbiPath {
    pub fn prob(&self) -> Prob {
        lp(self.log_prob)
    }
    pub fn len(&self) -> usize {
        self.states.len()
    }
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Model {
    ///
    /// Run Viterbi algorithm in log space with back pointers.
    ///
    /// ```text
    /// v_t[j] = max_i v_t-1[i] T[i][j] E[j][x[t-1]]
    /// ```
    ///
    /// An impossible sequence gives an empty path with `log_prob = -inf`.
    ///
    pub fn viterbi(&self, seq: &[Symbol]) -> ViterbiPath {
        let n = self.n_states();
        let len = seq.len();
        if len == 0 {
            return ViterbiPath {
                states: Vec::new(),
                log_prob: 0.0,
            };
        }

        let mut v = vec![Prob::zero(); n];
        v[START_STATE] = Prob::one();
        let mut pointers: Vec<Vec<usize>> = Vec::with_capacity(len);

        for &symbol in seq.iter() {
            let mut next = vec![Prob::zero(); n];
            let mut pointer = vec![START_STATE; n];
            for j in 0..n {
                let e = self.emit(j, symbol);
                if e == 0.0 {
                    continue;
                }
                let mut best = Prob::zero();
                for &i in self.pred(j) {
                    let x = v[i] * p(self.transition[[i, j]]);
                    if x > best {
                        best = x;
                        pointer[j] = i;
                    }
                }
                next[j] = best * p(e);
            }
            pointers.push(pointer);
            v = next;
        }

        // best final state (first one on ties)
        let (last, best) = v
            .iter()
            .enumerate()
            .fold((START_STATE, Prob::zero()), |(k, b), (j, &x)| {
                if x > b {
                    (j, x)
                } else {
                    (k, b)
                }
            });
        if best.is_zero() {
            return ViterbiPath {
                states: Vec::new(),
                log_prob: f64::NEG_INFINITY,
            };
        }

        let mut states = vec![last; len];
        for t in (1..len).rev() {
            states[t - 1] = pointers[t][states[t]];
        }
        ViterbiPath {
            states,
            log_prob: best.to_log_value(),
        }
    }
    ///
    /// Number of maximal runs of states of `group` along the path
    ///
    pub fn count_motif(&self, path: &[usize], group: usize) -> usize {
        path.iter()
            .enumerate()
            .filter(|&(t, &s)| {
                self.group_id(s) == group && (t == 0 || self.group_id(path[t - 1]) != group)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::BG_STATE;
    use crate::random_seq::generate;

    #[test]
    fn viterbi_finds_site() {
        let model = mock_model();
        let seq = encode("AAATGACGTAAATGACGTCC").unwrap();
        let path = model.viterbi(&seq);
        assert_eq!(path.len(), seq.len());
        assert_eq!(
            path.states,
            vec![1, 1, 1, 2, 3, 4, 5, 6, 7, 1, 1, 1, 2, 3, 4, 5, 6, 7, 1, 1]
        );
        assert_eq!(model.count_motif(&path.states, 2), 2);
        assert_eq!(model.count_motif(&path.states, BG_STATE), 3);
    }

    #[test]
    fn viterbi_le_likelihood() {
        let model = mock_model();
        for seed in 0..10 {
            let seq = generate(50, seed);
            let path = model.viterbi(&seq);
            let ll = model.log_likelihood(&seq);
            assert!(path.log_prob <= ll + 1e-9);
        }
    }

    #[test]
    fn viterbi_background_only() {
        let model = crate::hmm::Model::new();
        let seq = encode("ACGT").unwrap();
        let path = model.viterbi(&seq);
        assert_eq!(path.states, vec![BG_STATE; 4]);
        assert_abs_diff_eq!(path.log_prob, 4.0 * 0.25f64.ln(), epsilon = 1e-12);
        assert!(model.viterbi(&[]).is_empty());
    }
}
