//!
//! Scores and gradients of training objectives
//!
//! Discriminative measures are evaluated separately for every motif of a task
//! on every contrast, and summed. The gradient needs the per-sequence
//! derivatives of the statistic, which depend on all sequences, so it takes two
//! passes: occurrence posteriors first, expected counts second.
//!
//! With `p = 1 - P(x, no occurrence) / P(x)`,
//!
//! ```text
//! dp / d theta = (1 - p) (d log P(x) - d log P(x, no occurrence)) / d theta
//! ```
//!
//! and both log-likelihood derivatives are soft-max gradients of expected
//! counts, under the model and under the restricted model.
//!
use super::gradient::Gradient;
use super::task::Task;
use crate::data::{Collection, Contrast, Seq};
use crate::error::{ensure_finite, Error, Result};
use crate::hmm::{ClassParams, Counts, Model};
use crate::measure::Measure;
use crate::options::Options;
use crate::stats::{self, Evaluation, SeqScore};
use fixedbitset::FixedBitSet;
use log::debug;
use rayon::prelude::*;

///
/// Occurrence posterior and log-likelihood of every sequence, by set
///
pub fn contrast_scores(
    model: &Model,
    restricted: &Model,
    contrast: &Contrast,
    weighting: bool,
) -> Vec<Vec<SeqScore>> {
    contrast
        .sets
        .iter()
        .map(|set| {
            set.seqs
                .par_iter()
                .map(|seq| {
                    let occurrence = model.occurrence_with(restricted, &seq.symbols);
                    SeqScore {
                        posterior: occurrence.posterior,
                        log_likelihood: occurrence.log_likelihood,
                        weight: seq.effective_weight(weighting),
                    }
                })
                .collect()
        })
        .collect()
}

///
/// Which sets of the contrast are the signal class of the motifs
///
pub fn signal_flags<S: AsRef<str>>(contrast: &Contrast, motifs: &[S]) -> Vec<bool> {
    contrast
        .sets
        .iter()
        .map(|set| set.is_signal_for(motifs))
        .collect()
}

///
/// Class parameters stored in the model, or the configured defaults: the
/// class prior for the first of two sets (uniform otherwise), and the
/// conditional motif priors of signal and control sets.
///
pub fn class_params_or_default(
    model: &Model,
    contrast: &Contrast,
    motif: &str,
    signal: &[bool],
    options: &Options,
) -> ClassParams {
    match model.class_params(&contrast.name, motif) {
        Some(params) if params.class_prior.len() == signal.len() => params.clone(),
        _ => {
            let n = signal.len();
            let cm = &options.class_model;
            let class_prior = if n == 2 {
                vec![cm.class_prior, 1.0 - cm.class_prior]
            } else {
                vec![1.0 / n as f64; n]
            };
            let motif_prior = signal
                .iter()
                .map(|&s| {
                    if s {
                        cm.conditional_motif_prior1
                    } else {
                        cm.conditional_motif_prior2
                    }
                })
                .collect();
            ClassParams {
                class_prior,
                motif_prior,
            }
        }
    }
}

fn check_two_class(measure: Measure, signal: &[bool]) -> Result<()> {
    if signal.iter().any(|&s| s) && signal.iter().any(|&s| !s) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} needs both signal and control sets in a contrast",
            measure
        )))
    }
}

///
/// Value and per-sequence derivatives of a measure on one contrast
///
pub fn evaluate_measure(
    measure: Measure,
    sets: &[Vec<SeqScore>],
    signal: &[bool],
    params: &ClassParams,
    pseudo_count: f64,
) -> Result<Evaluation> {
    if measure.is_two_class() {
        check_two_class(measure, signal)?;
    }
    match measure {
        Measure::MutualInformation => stats::mutual_information(sets, pseudo_count),
        Measure::RankInformation => stats::rank_information(sets, pseudo_count),
        Measure::MatthewsCorrelation => stats::matthews_correlation(sets, signal, pseudo_count),
        Measure::LogLikelihoodDifference => stats::loglik_difference(sets, signal),
        Measure::FrequencyDifference => stats::frequency_difference(sets, signal, pseudo_count),
        Measure::ClassLikelihood => stats::class_likelihood(sets, params),
        Measure::Likelihood => {
            let score = sets
                .iter()
                .flatten()
                .map(|s| s.weight * s.log_likelihood)
                .sum();
            Ok(Evaluation {
                score: ensure_finite(score, "log likelihood")?,
                d_posterior: sets.iter().map(|s| vec![0.0; s.len()]).collect(),
                d_log_likelihood: sets
                    .iter()
                    .map(|s| s.iter().map(|x| x.weight).collect())
                    .collect(),
            })
        }
        Measure::Viterbi | Measure::None => Err(Error::GradientNotImplemented(measure)),
    }
}

///
/// Counts whose soft-max gradient is the gradient of the statistic
///
fn gradient_counts(
    model: &Model,
    restricted: &Model,
    contrast: &Contrast,
    sets: &[Vec<SeqScore>],
    eval: &Evaluation,
) -> Counts {
    let items: Vec<(&Seq, f64, f64, f64)> = contrast
        .sets
        .iter()
        .enumerate()
        .flat_map(|(k, set)| {
            set.seqs.iter().enumerate().map(move |(i, seq)| {
                (
                    seq,
                    sets[k][i].posterior,
                    eval.d_posterior[k][i],
                    eval.d_log_likelihood[k][i],
                )
            })
        })
        .filter(|&(_, _, dp, dl)| dp != 0.0 || dl != 0.0)
        .collect();
    items
        .par_iter()
        .map(|&(seq, p, dp, dl)| {
            let full = model.expected_counts(&seq.symbols);
            let mut counts = Counts::zeros(model.n_states());
            counts.add_scaled(&full, dl + dp * (1.0 - p));
            if dp != 0.0 && p < 1.0 {
                let absent = restricted.expected_counts(&seq.symbols);
                counts.add_scaled(&absent, -dp * (1.0 - p));
            }
            counts
        })
        .reduce(
            || Counts::zeros(model.n_states()),
            |mut a, b| {
                a += &b;
                a
            },
        )
}

fn single_group(model: &Model, g: usize) -> FixedBitSet {
    let mut mask = FixedBitSet::with_capacity(model.n_groups());
    mask.insert(g);
    mask
}

impl Model {
    ///
    /// Score of a task on the data
    ///
    pub fn objective_score(&self, task: &Task, data: &Collection, options: &Options) -> Result<f64> {
        Ok(self.evaluate_task(task, data, options, false)?.0)
    }
    ///
    /// Score of a task and its gradient restricted to the task's targets
    ///
    pub fn objective_gradient(
        &self,
        task: &Task,
        data: &Collection,
        options: &Options,
    ) -> Result<(f64, Gradient)> {
        let (score, gradient) = self.evaluate_task(task, data, options, true)?;
        let gradient = gradient.unwrap_or_else(|| Gradient::zeros(self));
        Ok((score, gradient))
    }
    fn evaluate_task(
        &self,
        task: &Task,
        data: &Collection,
        options: &Options,
        with_gradient: bool,
    ) -> Result<(f64, Option<Gradient>)> {
        let contrasts = data.select(&task.contrasts)?;
        let weighting = options.weighting;
        let mut score = 0.0;
        let mut counts = Counts::zeros(self.n_states());

        match task.measure {
            Measure::None => return Ok((0.0, None)),
            Measure::Viterbi => {
                if with_gradient {
                    return Err(Error::GradientNotImplemented(Measure::Viterbi));
                }
                let seqs: Vec<&Seq> = contrasts.iter().flat_map(|c| c.seqs()).collect();
                let score = self.viterbi_counts_parallel(&seqs, weighting).log_likelihood;
                return Ok((ensure_finite(score, "viterbi log likelihood")?, None));
            }
            Measure::Likelihood => {
                let seqs: Vec<&Seq> = contrasts.iter().flat_map(|c| c.seqs()).collect();
                if with_gradient {
                    counts = self.expected_counts_parallel(&seqs, weighting);
                    score = counts.log_likelihood;
                } else {
                    score = self.log_likelihood_parallel(&seqs, weighting);
                }
                ensure_finite(score, "log likelihood")?;
            }
            measure => {
                for contrast in contrasts.iter() {
                    for g in task.motifs.ones() {
                        let name = &self.group(g).name;
                        let restricted = self.restricted(&single_group(self, g));
                        let sets = contrast_scores(self, &restricted, contrast, weighting);
                        let signal = signal_flags(contrast, &[name]);
                        let params = class_params_or_default(self, contrast, name, &signal, options);
                        let eval = evaluate_measure(
                            measure,
                            &sets,
                            &signal,
                            &params,
                            options.contingency_pseudo_count,
                        )?;
                        debug!("{} of {} on {}: {}", measure, name, contrast.name, eval.score);
                        score += eval.score;
                        if with_gradient {
                            counts += &gradient_counts(self, &restricted, contrast, &sets, &eval);
                        }
                    }
                }
            }
        }

        let gradient = if with_gradient {
            Some(Gradient::from_counts(self, &counts).masked(&task.targets))
        } else {
            None
        };
        Ok((score, gradient))
    }
    ///
    /// Re-estimate the class parameters used by a class likelihood task from
    /// the current occurrence posteriors and store them in the model
    ///
    pub fn update_class_params(&mut self, task: &Task, data: &Collection, options: &Options) -> Result<()> {
        if task.measure != Measure::ClassLikelihood {
            return Ok(());
        }
        let cm = &options.class_model;
        for contrast in data.select(&task.contrasts)? {
            for g in task.motifs.ones() {
                let name = self.group(g).name.clone();
                let restricted = self.restricted(&single_group(self, g));
                let sets = contrast_scores(self, &restricted, contrast, options.weighting);
                let signal = signal_flags(contrast, &[&name]);
                let params = class_params_or_default(self, contrast, &name, &signal, options);
                let params = stats::reestimate_class_params(
                    &sets,
                    &params,
                    options.contingency_pseudo_count,
                    !cm.dont_learn_class_prior,
                    !cm.dont_learn_conditional_motif_prior,
                );
                debug!(
                    "class parameters of {} on {}: {:?}",
                    name, contrast.name, params
                );
                self.set_class_params(&contrast.name, &name, params);
            }
        }
        Ok(())
    }
    ///
    /// Sum of the scores of all tasks defined by the options.
    /// Discriminative tasks only, if there are any.
    ///
    pub fn total_score(&self, data: &Collection, options: &Options) -> Result<f64> {
        let tasks = super::task::define_training_tasks(self, options)?;
        let discriminative = tasks.iter().any(|t| t.measure.is_discriminative());
        tasks
            .iter()
            .filter(|t| !discriminative || t.measure.is_discriminative())
            .map(|t| self.objective_score(t, data, options))
            .sum()
    }
}
