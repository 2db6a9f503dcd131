//!
//! Scoring entry point for seed selection
//!
//! `compute_score` evaluates a measure for a selection of motif groups on all
//! contrasts of a collection, without training.
//!
use crate::data::{Collection, Seq};
use crate::error::{ensure_finite, Result};
use crate::hmm::Model;
use crate::measure::Measure;
use crate::options::Options;
use crate::stats;
use crate::train::objective::{class_params_or_default, contrast_scores, evaluate_measure, signal_flags};
use log::{debug, warn};
use rayon::prelude::*;

///
/// Score of `measure` for the `present` motifs (all motifs if empty).
///
/// * `none`: 0
/// * `bw`: weighted log-likelihood of all sequences
/// * `viterbi`: weighted log-probability of the Viterbi paths
/// * discriminative measures: summed over contrasts, with an occurrence of any
///   present motif counting as an occurrence
///
/// With a non-empty `previous` selection, `mi` becomes the conditional mutual
/// information of the condition and the present motifs given the previous
/// ones. Other measures ignore `previous`.
///
pub fn compute_score<S: AsRef<str>>(
    model: &Model,
    data: &Collection,
    measure: Measure,
    present: &[S],
    previous: &[S],
    options: &Options,
) -> Result<f64> {
    let weighting = options.weighting;
    let pseudo_count = options.contingency_pseudo_count;
    if !previous.is_empty() && measure != Measure::MutualInformation {
        warn!("{} ignores the previous motifs", measure);
    }
    match measure {
        Measure::None => Ok(0.0),
        Measure::Likelihood => {
            let seqs: Vec<&Seq> = data.seqs().collect();
            ensure_finite(
                model.log_likelihood_parallel(&seqs, weighting),
                "log likelihood",
            )
        }
        Measure::Viterbi => {
            let seqs: Vec<&Seq> = data.seqs().collect();
            ensure_finite(
                model.viterbi_counts_parallel(&seqs, weighting).log_likelihood,
                "viterbi log likelihood",
            )
        }
        Measure::MutualInformation if !previous.is_empty() => {
            let present = model.group_mask(present)?;
            let previous = model.group_mask(previous)?;
            let mut score = 0.0;
            for contrast in data.contrasts.iter() {
                let sets: Vec<Vec<([[f64; 2]; 2], f64)>> = contrast
                    .sets
                    .iter()
                    .map(|set| {
                        set.seqs
                            .par_iter()
                            .map(|seq| {
                                (
                                    model.posterior_pair(&seq.symbols, &present, &previous),
                                    seq.effective_weight(weighting),
                                )
                            })
                            .collect()
                    })
                    .collect();
                let cmi = stats::conditional_mutual_information(&sets, pseudo_count)?;
                debug!("conditional mi on {}: {}", contrast.name, cmi);
                score += cmi;
            }
            Ok(score)
        }
        measure => {
            let mask = model.group_mask(present)?;
            let names = model.group_names(&mask);
            let key = names.join(",");
            let restricted = model.restricted(&mask);
            let mut score = 0.0;
            for contrast in data.contrasts.iter() {
                let sets = contrast_scores(model, &restricted, contrast, weighting);
                let signal = signal_flags(contrast, &names);
                let params = class_params_or_default(model, contrast, &key, &signal, options);
                let eval = evaluate_measure(measure, &sets, &signal, &params, pseudo_count)?;
                debug!("{} of {} on {}: {}", measure, key, contrast.name, eval.score);
                score += eval.score;
            }
            Ok(score)
        }
    }
}
