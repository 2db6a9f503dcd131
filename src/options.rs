//!
//! Training configuration
//!
//! Every field has a default so a partial JSON file is enough to override a
//! few values.
//!
use crate::error::{Error, Result};
use crate::measure::Measure;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSearchMethod {
    /// step doubling until the score stops improving
    Exponential,
    /// strong Wolfe conditions
    MoreThuente,
}

///
/// How background emission and transitions are learned alongside a
/// discriminative objective
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundLearning {
    Fixed,
    /// Baum-Welch task next to the discriminative task (hybrid)
    Em,
    /// part of the discriminative gradient
    Gradient,
}

///
/// One objective: a measure on some motifs, evaluated on some contrasts.
/// Empty lists mean all motifs and all contrasts.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Objective {
    pub measure: Measure,
    pub motifs: Vec<String>,
    pub contrasts: Vec<String>,
}

impl Default for Objective {
    fn default() -> Self {
        Objective {
            measure: Measure::MutualInformation,
            motifs: Vec::new(),
            contrasts: Vec::new(),
        }
    }
}

impl Objective {
    pub fn new(measure: Measure) -> Self {
        Objective {
            measure,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Termination {
    pub max_iter: usize,
    /// L1 change of parameters (generative learning)
    pub gamma_tolerance: f64,
    /// score improvement over `past` iterations
    pub delta_tolerance: f64,
    /// gradient norm
    pub epsilon_tolerance: f64,
    pub past: usize,
    /// compare improvements absolutely instead of relative to the score
    pub absolute_improvement: bool,
}

impl Default for Termination {
    fn default() -> Self {
        Termination {
            max_iter: 1000,
            gamma_tolerance: 1e-4,
            delta_tolerance: 1e-4,
            epsilon_tolerance: 0.0,
            past: 1,
            absolute_improvement: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearch {
    pub method: LineSearchMethod,
    /// sufficient decrease
    pub mu: f64,
    /// curvature
    pub eta: f64,
    /// minimal relative shrink of the uncertainty interval
    pub delta: f64,
    /// maximal number of score/gradient evaluations
    pub max_steps: usize,
    pub initial_step: f64,
    /// Polak-Ribiere conjugate directions
    pub conjugate: bool,
    /// iterations between resets to the plain gradient
    pub restart_period: usize,
}

impl Default for LineSearch {
    fn default() -> Self {
        LineSearch {
            method: LineSearchMethod::Exponential,
            mu: 0.1,
            eta: 0.5,
            delta: 0.66,
            max_steps: 10,
            initial_step: 1.0,
            conjugate: true,
            restart_period: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sampling {
    pub do_sampling: bool,
    /// temperature of the hottest chain
    pub temperature: f64,
    pub n_iter: usize,
    /// column bounds; the initial motif length when unset
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub n_indels: usize,
    pub n_shift: usize,
    pub n_parallel: usize,
    /// iterations between replica exchanges
    pub swap_period: usize,
    /// floor of a perturbed transition
    pub eps: f64,
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling {
            do_sampling: false,
            temperature: 1e-3,
            n_iter: 100,
            min_size: None,
            max_size: None,
            n_indels: 5,
            n_shift: 5,
            n_parallel: 6,
            swap_period: 1,
            eps: 1e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassModel {
    pub class_prior: f64,
    /// `P(motif | signal)`
    pub conditional_motif_prior1: f64,
    /// `P(motif | control)`
    pub conditional_motif_prior2: f64,
    pub dont_learn_class_prior: bool,
    pub dont_learn_conditional_motif_prior: bool,
}

impl Default for ClassModel {
    fn default() -> Self {
        ClassModel {
            class_prior: 0.5,
            conditional_motif_prior1: 0.6,
            conditional_motif_prior2: 0.03,
            dont_learn_class_prior: false,
            dont_learn_conditional_motif_prior: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seeding {
    pub alpha: f64,
    pub lambda: f64,
    pub expected_seq_len: f64,
}

impl Default for Seeding {
    fn default() -> Self {
        Seeding {
            alpha: 0.03,
            lambda: 1.0,
            expected_seq_len: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub objectives: Vec<Objective>,
    pub bg_learning: BackgroundLearning,
    pub contingency_pseudo_count: f64,
    pub emission_pseudo_count: f64,
    pub transition_pseudo_count: f64,
    pub weighting: bool,
    pub random_salt: u64,
    pub termination: Termination,
    pub line_search: LineSearch,
    pub sampling: Sampling,
    pub class_model: ClassModel,
    pub seeding: Seeding,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            objectives: vec![Objective::default()],
            bg_learning: BackgroundLearning::Em,
            contingency_pseudo_count: 1.0,
            emission_pseudo_count: 1.0,
            transition_pseudo_count: 0.0,
            weighting: false,
            random_salt: 0,
            termination: Termination::default(),
            line_search: LineSearch::default(),
            sampling: Sampling::default(),
            class_model: ClassModel::default(),
            seeding: Seeding::default(),
        }
    }
}

impl Options {
    ///
    /// Options with a single objective
    ///
    pub fn with_measure(measure: Measure) -> Self {
        Options {
            objectives: vec![Objective::new(measure)],
            ..Default::default()
        }
    }
    pub fn validate(&self) -> Result<()> {
        let ls = &self.line_search;
        if !(0.0 < ls.mu && ls.mu < ls.eta && ls.eta < 1.0) {
            return Err(Error::Config(format!(
                "line search needs 0 < mu < eta < 1 (mu={} eta={})",
                ls.mu, ls.eta
            )));
        }
        if ls.max_steps == 0 || ls.initial_step <= 0.0 {
            return Err(Error::Config(
                "line search needs a positive step and evaluation budget".to_string(),
            ));
        }
        if self.termination.past == 0 {
            return Err(Error::Config("past must be at least 1".to_string()));
        }
        if let (Some(min), Some(max)) = (self.sampling.min_size, self.sampling.max_size) {
            if max < min {
                return Err(Error::Config(format!(
                    "max_size {} is smaller than min_size {}",
                    max, min
                )));
            }
        }
        if self.sampling.do_sampling && self.sampling.n_parallel == 0 {
            return Err(Error::Config("sampling needs at least one chain".to_string()));
        }
        for x in [
            self.contingency_pseudo_count,
            self.emission_pseudo_count,
            self.transition_pseudo_count,
        ] {
            if x < 0.0 {
                return Err(Error::Config(format!("negative pseudo count {}", x)));
            }
        }
        Ok(())
    }
    pub fn from_json_str(s: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(s)?;
        options.validate()?;
        Ok(options)
    }
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Options::from_json_str(&s)
    }
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert!(o.validate().is_ok());
        assert_eq!(o.objectives[0].measure, Measure::MutualInformation);
        assert_eq!(o.termination.max_iter, 1000);
        assert_eq!(o.line_search.method, LineSearchMethod::Exponential);
        assert_eq!(o.bg_learning, BackgroundLearning::Em);
    }

    #[test]
    fn partial_json() {
        let o = Options::from_json_str(
            r#"{
                "objectives": [{"measure": "mcc", "motifs": ["m1"]}],
                "line_search": {"method": "more_thuente"},
                "sampling": {"min_size": 4, "max_size": 8}
            }"#,
        )
        .unwrap();
        assert_eq!(o.objectives[0].measure, Measure::MatthewsCorrelation);
        assert_eq!(o.objectives[0].motifs, vec!["m1".to_string()]);
        assert!(o.objectives[0].contrasts.is_empty());
        assert_eq!(o.line_search.method, LineSearchMethod::MoreThuente);
        assert_eq!(o.line_search.mu, 0.1);
        assert_eq!(o.sampling.max_size, Some(8));

        // round trip
        let back = Options::from_json_str(&o.to_json().unwrap()).unwrap();
        assert_eq!(back, o);
    }

    #[test]
    fn invalid_combinations() {
        let mut o = Options::default();
        o.line_search.eta = 0.05;
        assert!(matches!(o.validate(), Err(Error::Config(_))));

        let mut o = Options::default();
        o.termination.past = 0;
        assert!(o.validate().is_err());

        let mut o = Options::default();
        o.sampling.min_size = Some(6);
        o.sampling.max_size = Some(5);
        assert!(o.validate().is_err());

        assert!(matches!(
            Options::from_json_str(r#"{"objectives": [{"measure": "foo"}]}"#),
            Err(Error::Json(_))
        ));
    }
}
