//!
//! Posterior probability of motif occurrences
//!
//! `P(at least one state of the present groups is visited | x)` is the
//! complement of the probability of the paths avoiding those states. Those
//! paths are summed by a forward pass of the restricted model, whose
//! transitions into present states are zero.
//!
use super::model::Model;
use crate::common::Symbol;
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;

///
/// Occurrence posterior of one sequence
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Occurrence {
    /// `P(at least one occurrence | x)`
    pub posterior: f64,
    /// `log P(x)`
    pub log_likelihood: f64,
    /// `log P(x, no occurrence)`
    pub restricted_log_likelihood: f64,
}

impl Model {
    ///
    /// Bit set over groups selected by name.
    /// An empty selection means every motif group.
    ///
    pub fn group_mask<S: AsRef<str>>(&self, names: &[S]) -> Result<FixedBitSet> {
        let mut mask = FixedBitSet::with_capacity(self.n_groups());
        if names.is_empty() {
            for g in self.motif_groups() {
                mask.insert(g);
            }
        } else {
            for name in names {
                let g = self
                    .find_group(name.as_ref())
                    .filter(|&g| self.group(g).is_motif())
                    .ok_or_else(|| Error::UnknownMotif(name.as_ref().to_string()))?;
                mask.insert(g);
            }
        }
        Ok(mask)
    }
    ///
    /// Names of the groups in the mask
    ///
    pub fn group_names(&self, mask: &FixedBitSet) -> Vec<String> {
        mask.ones().map(|g| self.group(g).name.clone()).collect()
    }
    ///
    /// Copy of the model where no path can enter a state of the present groups.
    /// Rows are not renormalized.
    ///
    pub fn restricted(&self, present: &FixedBitSet) -> Model {
        let mut model = self.clone();
        for g in present.ones() {
            for &s in self.group(g).states.iter() {
                model.transition.column_mut(s).fill(0.0);
            }
        }
        model.finalize();
        model
    }
    ///
    /// Occurrence posterior using a precomputed restricted model
    ///
    pub fn occurrence_with(&self, restricted: &Model, seq: &[Symbol]) -> Occurrence {
        let log_likelihood = self.log_likelihood(seq);
        let restricted_log_likelihood = restricted.log_likelihood(seq);
        let posterior = if log_likelihood.is_finite() {
            (1.0 - (restricted_log_likelihood - log_likelihood).exp()).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Occurrence {
            posterior,
            log_likelihood,
            restricted_log_likelihood,
        }
    }
    ///
    /// `P(at least one occurrence of the present groups | x)`
    ///
    pub fn posterior_atleast_one(&self, seq: &[Symbol], present: &FixedBitSet) -> f64 {
        self.occurrence_with(&self.restricted(present), seq).posterior
    }
    ///
    /// Expected number of positions emitted by states of the present groups
    ///
    pub fn expected_motif_positions(&self, seq: &[Symbol], present: &FixedBitSet) -> f64 {
        let (forward, backward) = self.forward_backward(seq);
        let post = self.posterior(&forward, &backward);
        (0..self.n_states())
            .filter(|&s| present.contains(self.group_id(s)))
            .map(|s| post.column(s).sum())
            .sum()
    }
    ///
    /// Joint occurrence posterior of two group selections `a` and `b`:
    /// `table[i][j] = P(occurrence of a is i, occurrence of b is j | x)`
    ///
    pub fn posterior_pair(&self, seq: &[Symbol], a: &FixedBitSet, b: &FixedBitSet) -> [[f64; 2]; 2] {
        let mut union = a.clone();
        union.union_with(b);
        let pa = self.posterior_atleast_one(seq, a);
        let pb = self.posterior_atleast_one(seq, b);
        let pu = self.posterior_atleast_one(seq, &union);
        let clamp = |x: f64| x.clamp(0.0, 1.0);
        [
            [clamp(1.0 - pu), clamp(pu - pa)],
            [clamp(pu - pb), clamp(pa + pb - pu)],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::model::MotifLayout;

    #[test]
    fn masks() {
        let mut model = mock_model();
        model
            .add_motif_iupac("CCGG", 0.03, 100.0, 1.0, "m2", &MotifLayout::default())
            .unwrap();
        let all = model.group_mask::<&str>(&[]).unwrap();
        assert_eq!(all.ones().collect::<Vec<_>>(), vec![2, 3]);
        let m2 = model.group_mask(&["m2"]).unwrap();
        assert_eq!(m2.ones().collect::<Vec<_>>(), vec![3]);
        assert_eq!(model.group_names(&m2), vec!["m2".to_string()]);
        assert!(matches!(
            model.group_mask(&["background"]),
            Err(Error::UnknownMotif(_))
        ));
    }

    #[test]
    fn posterior_of_site() {
        let model = mock_model();
        let present = model.group_mask::<&str>(&[]).unwrap();
        let with_site = model.posterior_atleast_one(&encode("AAAATGACGTAAAA").unwrap(), &present);
        let without = model.posterior_atleast_one(&encode("AAAAAAAAAAAAAA").unwrap(), &present);
        assert!(with_site > 0.9);
        assert!(without < 0.01);
        assert!(without >= 0.0);
    }

    #[test]
    fn posterior_matches_brute_force() {
        // the restricted model paths are exactly the background-only paths
        let model = mock_model();
        let present = model.group_mask::<&str>(&[]).unwrap();
        let seq = encode("TGACG").unwrap();
        let occ = model.occurrence_with(&model.restricted(&present), &seq);
        let t = model.transition();
        let bg_only = t[[0, 1]] * t[[1, 1]].powi(4) * 0.25f64.powi(5);
        assert_abs_diff_eq!(occ.restricted_log_likelihood, bg_only.ln(), epsilon = 1e-9);
        assert_abs_diff_eq!(
            occ.posterior,
            1.0 - bg_only / occ.log_likelihood.exp(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn pair_posterior() {
        let mut model = mock_model();
        model
            .add_motif_iupac("CCGG", 0.03, 100.0, 1.0, "m2", &MotifLayout::default())
            .unwrap();
        let a = model.group_mask(&["m1"]).unwrap();
        let b = model.group_mask(&["m2"]).unwrap();
        let seq = encode("AATGACGTAAAAAAA").unwrap();
        let table = model.posterior_pair(&seq, &a, &b);
        let total: f64 = table.iter().flatten().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        // m1 present, m2 absent dominates
        assert!(table[1][0] > 0.9);
        let expected = model.expected_motif_positions(&seq, &a);
        assert!(expected > 5.0 && expected < 6.5);
    }
}
