//!
//! Termination criteria of the training loop
//!
use crate::options::Termination;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceReason {
    /// no task to learn
    NothingToLearn,
    MaxIterations,
    /// parameters changed less than `gamma_tolerance`
    ParameterChange,
    /// score improved less than `delta_tolerance` over `past` iterations
    ScoreImprovement,
    /// gradient norm below `epsilon_tolerance`
    GradientNorm,
}

impl std::fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            ConvergenceReason::NothingToLearn => "nothing to learn",
            ConvergenceReason::MaxIterations => "maximum number of iterations reached",
            ConvergenceReason::ParameterChange => "parameter change below tolerance",
            ConvergenceReason::ScoreImprovement => "score improvement below tolerance",
            ConvergenceReason::GradientNorm => "gradient norm below tolerance",
        };
        write!(f, "{}", s)
    }
}

///
/// Score history of a training run
///
#[derive(Clone, Debug)]
pub struct Monitor {
    termination: Termination,
    scores: Vec<f64>,
}

impl Monitor {
    pub fn new(termination: &Termination) -> Self {
        Monitor {
            termination: termination.clone(),
            scores: Vec::new(),
        }
    }
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
    ///
    /// Record the score of a finished iteration (0-based) and decide whether
    /// to stop.
    ///
    /// `change` is the parameter change of generative learning, `gradient_norm`
    /// the norm of the gradient of discriminative learning.
    ///
    pub fn check(
        &mut self,
        iteration: usize,
        score: f64,
        change: Option<f64>,
        gradient_norm: Option<f64>,
    ) -> Option<ConvergenceReason> {
        let t = &self.termination;
        self.scores.push(score);

        if let Some(change) = change {
            if change < t.gamma_tolerance {
                return Some(ConvergenceReason::ParameterChange);
            }
        }
        if let Some(norm) = gradient_norm {
            if norm < t.epsilon_tolerance * norm.max(1.0) {
                return Some(ConvergenceReason::GradientNorm);
            }
        }
        let n = self.scores.len();
        if n > t.past {
            let improvement = score - self.scores[n - 1 - t.past];
            let threshold = if t.absolute_improvement {
                t.delta_tolerance
            } else {
                t.delta_tolerance * score.abs()
            };
            if improvement < threshold {
                return Some(ConvergenceReason::ScoreImprovement);
            }
        }
        if iteration + 1 >= t.max_iter {
            return Some(ConvergenceReason::MaxIterations);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_iterations() {
        let t = Termination {
            max_iter: 3,
            ..Default::default()
        };
        let mut m = Monitor::new(&t);
        assert_eq!(m.check(0, 1.0, None, None), None);
        assert_eq!(m.check(1, 2.0, None, None), None);
        assert_eq!(m.check(2, 3.0, None, None), Some(ConvergenceReason::MaxIterations));
        assert_eq!(m.scores(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn relative_and_absolute_improvement() {
        let t = Termination {
            delta_tolerance: 0.01,
            ..Default::default()
        };
        let mut m = Monitor::new(&t);
        assert_eq!(m.check(0, 100.0, None, None), None);
        // 0.5 < 0.01 * 100.5
        assert_eq!(
            m.check(1, 100.5, None, None),
            Some(ConvergenceReason::ScoreImprovement)
        );

        let t = Termination {
            delta_tolerance: 0.01,
            absolute_improvement: true,
            ..Default::default()
        };
        let mut m = Monitor::new(&t);
        m.check(0, 100.0, None, None);
        assert_eq!(m.check(1, 100.5, None, None), None);
        // an unchanged score (failed line search) stops
        assert_eq!(
            m.check(2, 100.5, None, None),
            Some(ConvergenceReason::ScoreImprovement)
        );
    }

    #[test]
    fn improvement_over_past_iterations() {
        let t = Termination {
            delta_tolerance: 1.0,
            absolute_improvement: true,
            past: 2,
            ..Default::default()
        };
        let mut m = Monitor::new(&t);
        m.check(0, 0.0, None, None);
        m.check(1, 0.8, None, None);
        assert_eq!(m.check(2, 1.5, None, None), None);
        assert_eq!(
            m.check(3, 1.7, None, None),
            Some(ConvergenceReason::ScoreImprovement)
        );
    }

    #[test]
    fn parameter_change_and_gradient() {
        let mut m = Monitor::new(&Termination::default());
        assert_eq!(
            m.check(0, -10.0, Some(1e-5), None),
            Some(ConvergenceReason::ParameterChange)
        );
        let t = Termination {
            epsilon_tolerance: 1e-3,
            ..Default::default()
        };
        let mut m = Monitor::new(&t);
        assert_eq!(
            m.check(0, 1.0, None, Some(1e-4)),
            Some(ConvergenceReason::GradientNorm)
        );
        assert_eq!(m.check(1, 2.0, None, Some(0.5)), None);
    }
}
