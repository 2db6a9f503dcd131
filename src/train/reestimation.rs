//!
//! M-step of Baum-Welch and Viterbi learning
//!
use super::task::Task;
use super::Targets;
use crate::data::{Collection, Seq};
use crate::error::{ensure_finite, Result};
use crate::hmm::{Counts, Model, START_STATE};
use crate::matrix::{l1_diff, normalize_row};
use crate::measure::Measure;
use crate::options::Options;
use log::debug;

///
/// Outcome of one generative iteration
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerativeStep {
    /// score of the model before the update
    pub score: f64,
    /// L1 change of the transition and emission matrices
    pub change: f64,
}

impl Model {
    ///
    /// Replace the target rows by normalized counts.
    ///
    /// Transition pseudo-counts are only added to existing edges. A row whose
    /// counts vanish becomes a zero row.
    ///
    /// Returns the L1 change of the parameters.
    ///
    pub fn reestimate(&mut self, counts: &Counts, targets: &Targets, options: &Options) -> f64 {
        let before_t = self.transition.clone();
        let before_e = self.emission.clone();
        for i in targets.transition.ones() {
            let mut row = counts.transition.row(i).to_owned();
            for (x, &p) in row.iter_mut().zip(before_t.row(i).iter()) {
                if p > 0.0 {
                    *x += options.transition_pseudo_count;
                } else {
                    *x = 0.0;
                }
            }
            if normalize_row(row.view_mut()) == 0.0 {
                debug!("state {} received no transition counts", i);
            }
            self.transition.row_mut(i).assign(&row);
        }
        for i in targets.emission.ones().filter(|&i| i != START_STATE) {
            let mut row = counts.emission.row(i).to_owned();
            row += options.emission_pseudo_count;
            normalize_row(row.view_mut());
            self.emission.row_mut(i).assign(&row);
        }
        self.finalize();
        l1_diff(&before_t, &self.transition) + l1_diff(&before_e, &self.emission)
    }
    ///
    /// One Baum-Welch (or Viterbi, for `Measure::Viterbi`) iteration of a task
    ///
    pub fn generative_step(
        &mut self,
        task: &Task,
        data: &Collection,
        options: &Options,
    ) -> Result<GenerativeStep> {
        let seqs: Vec<&Seq> = data
            .select(&task.contrasts)?
            .into_iter()
            .flat_map(|c| c.seqs())
            .collect();
        let counts = match task.measure {
            Measure::Viterbi => self.viterbi_counts_parallel(&seqs, options.weighting),
            _ => self.expected_counts_parallel(&seqs, options.weighting),
        };
        let score = ensure_finite(counts.log_likelihood, "log likelihood")?;
        let change = self.reestimate(&counts, &task.targets, options);
        Ok(GenerativeStep { score, change })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::random_seq::planted_contrast;
    use crate::train::task::define_training_tasks;

    fn mock_data() -> Collection {
        let site = encode("TGACGT").unwrap();
        let (contrast, _) = planted_contrast("main", "m1", &site, 10, 50, 2);
        Collection::new(vec![contrast])
    }

    #[test]
    fn baum_welch_does_not_decrease_likelihood() {
        let mut model = mock_model();
        let data = mock_data();
        let mut options = Options::with_measure(Measure::Likelihood);
        options.emission_pseudo_count = 0.0;
        let task = define_training_tasks(&model, &options).unwrap().remove(0);
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..5 {
            let step = model.generative_step(&task, &data, &options).unwrap();
            assert!(step.score >= previous - 1e-9);
            assert!(model.check_consistency(1e-9));
            previous = step.score;
        }
    }

    #[test]
    fn viterbi_counts_sharpen_the_site() {
        let mut model = mock_model();
        let data = mock_data();
        let options = Options::with_measure(Measure::Viterbi);
        let task = define_training_tasks(&model, &options).unwrap().remove(0);
        let step = model.generative_step(&task, &data, &options).unwrap();
        assert!(step.change > 0.0);
        assert_eq!(model.consensus(2), "TGACGT");
    }

    #[test]
    fn zero_counts_give_zero_row() {
        let mut model = mock_model();
        let mut counts = Counts::zeros(model.n_states());
        counts.emission[[3, 0]] = 2.0;
        let mut targets = Targets::empty(model.n_states());
        targets.transition.insert(2);
        targets.emission.insert(3);
        let options = Options {
            emission_pseudo_count: 0.0,
            ..Default::default()
        };
        let change = model.reestimate(&counts, &targets, &options);
        assert!(change > 0.0);
        assert!(model.transition().row(2).iter().all(|&x| x == 0.0));
        assert_eq!(model.emission()[[3, 0]], 1.0);
        assert!(model.succ(2).is_empty());
        // zero rows are accepted as unreachable states
        assert!(model.check_consistency(1e-9));
    }

    #[test]
    fn transition_pseudo_counts_only_on_edges() {
        let mut model = mock_model();
        let counts = Counts::zeros(model.n_states());
        let mut targets = Targets::empty(model.n_states());
        targets.transition.insert(crate::hmm::BG_STATE);
        let options = Options {
            transition_pseudo_count: 1.0,
            ..Default::default()
        };
        model.reestimate(&counts, &targets, &options);
        let row = model.transition().row(crate::hmm::BG_STATE);
        assert_abs_diff_eq!(row[1], 0.5);
        assert_abs_diff_eq!(row[2], 0.5);
        assert_eq!(row[3], 0.0);
    }
}
