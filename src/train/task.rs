//!
//! Training tasks: which measure learns which parameters on which data
//!
use crate::error::Result;
use crate::hmm::{Model, BG_STATE, START_STATE};
use crate::measure::Measure;
use crate::options::{BackgroundLearning, Options};
use fixedbitset::FixedBitSet;
use itertools::Itertools;

///
/// Rows of the transition and emission matrices a task may change
///
#[derive(Clone, Debug, PartialEq)]
pub struct Targets {
    pub transition: FixedBitSet,
    pub emission: FixedBitSet,
}

impl Targets {
    pub fn empty(n_states: usize) -> Self {
        Targets {
            transition: FixedBitSet::with_capacity(n_states),
            emission: FixedBitSet::with_capacity(n_states),
        }
    }
    ///
    /// every row of the states of the groups in `groups`
    ///
    pub fn of_groups(model: &Model, groups: &FixedBitSet) -> Self {
        let mut targets = Targets::empty(model.n_states());
        for g in groups.ones() {
            for &s in model.group(g).states.iter() {
                targets.transition.insert(s);
                targets.emission.insert(s);
            }
        }
        targets
    }
    ///
    /// add the background emission and the rows leaving start and background
    ///
    pub fn add_background(&mut self) {
        self.transition.insert(START_STATE);
        self.transition.insert(BG_STATE);
        self.emission.insert(BG_STATE);
    }
    pub fn is_empty(&self) -> bool {
        self.transition.count_ones(..) == 0 && self.emission.count_ones(..) == 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub measure: Measure,
    /// motif groups the measure is evaluated on
    pub motifs: FixedBitSet,
    /// contrast names, empty for all
    pub contrasts: Vec<String>,
    pub targets: Targets,
}

impl Task {
    pub fn describe(&self, model: &Model) -> String {
        let contrasts = if self.contrasts.is_empty() {
            "all".to_string()
        } else {
            self.contrasts.join(",")
        };
        format!(
            "{}[{}]@{}",
            self.measure,
            model.group_names(&self.motifs).iter().join(","),
            contrasts
        )
    }
}

///
/// Split learning into tasks.
///
/// Every objective becomes a task learning the parameters of its motifs.
/// Background parameters are
///
/// * untouched with `BackgroundLearning::Fixed`,
/// * learned by an extra Baum-Welch task on all data with `Em` (generative
///   objectives learn them themselves),
/// * part of every task with `Gradient`.
///
pub fn define_training_tasks(model: &Model, options: &Options) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for objective in options.objectives.iter() {
        if objective.measure == Measure::None {
            continue;
        }
        let motifs = model.group_mask(&objective.motifs)?;
        let mut targets = Targets::of_groups(model, &motifs);
        let background = match options.bg_learning {
            BackgroundLearning::Fixed => false,
            BackgroundLearning::Em => objective.measure.is_generative(),
            BackgroundLearning::Gradient => true,
        };
        if background {
            targets.add_background();
        }
        tasks.push(Task {
            measure: objective.measure,
            motifs,
            contrasts: objective.contrasts.clone(),
            targets,
        });
    }

    let hybrid = options.bg_learning == BackgroundLearning::Em
        && tasks.iter().any(|t| t.measure.is_discriminative());
    if hybrid {
        let mut targets = Targets::empty(model.n_states());
        targets.add_background();
        tasks.push(Task {
            measure: Measure::Likelihood,
            motifs: FixedBitSet::with_capacity(model.n_groups()),
            contrasts: Vec::new(),
            targets,
        });
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::hmm::model::tests::mock_model;
    use crate::options::Objective;

    #[test]
    fn hybrid_tasks() {
        let model = mock_model();
        let options = Options::default();
        let tasks = define_training_tasks(&model, &options).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].measure, Measure::MutualInformation);
        assert_eq!(tasks[0].describe(&model), "mi[m1]@all");
        assert!(tasks[0].targets.emission.contains(2));
        assert!(!tasks[0].targets.emission.contains(BG_STATE));
        assert_eq!(tasks[1].measure, Measure::Likelihood);
        assert_eq!(
            tasks[1].targets.emission.ones().collect::<Vec<_>>(),
            vec![BG_STATE]
        );
        assert_eq!(
            tasks[1].targets.transition.ones().collect::<Vec<_>>(),
            vec![START_STATE, BG_STATE]
        );
    }

    #[test]
    fn gradient_and_fixed_background() {
        let model = mock_model();
        let mut options = Options::default();
        options.bg_learning = BackgroundLearning::Gradient;
        let tasks = define_training_tasks(&model, &options).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].targets.emission.contains(BG_STATE));

        options.bg_learning = BackgroundLearning::Fixed;
        options.objectives = vec![Objective::new(Measure::Viterbi)];
        let tasks = define_training_tasks(&model, &options).unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].targets.transition.contains(BG_STATE));
        assert!(tasks[0].targets.transition.contains(7));
    }

    #[test]
    fn unknown_motif_in_objective() {
        let model = mock_model();
        let mut options = Options::default();
        options.objectives[0].motifs = vec!["nope".to_string()];
        assert!(matches!(
            define_training_tasks(&model, &options),
            Err(Error::UnknownMotif(_))
        ));
        options.objectives[0].measure = Measure::None;
        assert!(define_training_tasks(&model, &options).unwrap().is_empty());
    }
}
