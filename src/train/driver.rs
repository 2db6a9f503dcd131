//!
//! Training loop
//!
//! Each iteration runs every task once: generative tasks re-estimate their
//! parameters, discriminative tasks do a line search along a conjugate gradient
//! direction. Structure sampling by parallel tempering follows parameter
//! learning when enabled.
//!
use super::gradient::Gradient;
use super::linesearch::{exponential_search, more_thuente, LineSearchResult};
use super::task::{define_training_tasks, Task};
use super::termination::{ConvergenceReason, Monitor};
use crate::data::Collection;
use crate::error::Result;
use crate::hmm::Model;
use crate::mcmc::proposal::{ModelState, Proposer};
use crate::mcmc::{ParallelTempering, SAState};
use crate::measure::Measure;
use crate::options::{LineSearchMethod, Options};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

///
/// Final score of one task
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskScore {
    pub measure: Measure,
    pub motifs: Vec<String>,
    pub score: f64,
}

#[derive(Clone, Debug)]
pub struct TrainingResult {
    pub model: Model,
    pub scores: Vec<TaskScore>,
    /// completed training iterations
    pub iterations: usize,
    pub reason: ConvergenceReason,
    /// accepted models of the coldest sampling chain with their scores
    pub trajectory: Vec<(Model, f64)>,
}

impl TrainingResult {
    pub fn total_score(&self) -> f64 {
        self.scores.iter().map(|s| s.score).sum()
    }
}

///
/// Previous gradient and direction of a discriminative task
///
#[derive(Clone, Debug, Default)]
struct ConjugateState {
    gradient: Option<Gradient>,
    direction: Option<Gradient>,
    since_restart: usize,
}

impl ConjugateState {
    ///
    /// Polak-Ribiere direction `d = g + beta d_prev` with
    /// `beta = max(0, g.(g - g_prev) / |g_prev|^2)`.
    ///
    /// Falls back to `g` every `restart_period` iterations, on the first
    /// iteration and when `d` is not an ascent direction.
    ///
    fn direction(&mut self, gradient: &Gradient, conjugate: bool, restart_period: usize) -> Gradient {
        let mut direction = gradient.clone();
        let mut restarted = true;
        if let (Some(g_prev), Some(d_prev)) = (&self.gradient, &self.direction) {
            let denom = g_prev.dot(g_prev);
            if conjugate && self.since_restart + 1 < restart_period.max(1) && denom > 0.0 {
                let beta = ((gradient.dot(gradient) - gradient.dot(g_prev)) / denom).max(0.0);
                if beta > 0.0 {
                    direction.add_scaled(d_prev, beta);
                    restarted = false;
                }
            }
        }
        if !restarted && direction.dot(gradient) <= 0.0 {
            debug!("conjugate direction is not ascending; restart");
            direction = gradient.clone();
            restarted = true;
        }
        self.since_restart = if restarted { 0 } else { self.since_restart + 1 };
        self.gradient = Some(gradient.clone());
        self.direction = Some(direction.clone());
        direction
    }
}

///
/// One line search of a discriminative task. Returns the score after the
/// iteration, the gradient norm and the accepted step. The model is unchanged
/// when no improving step was found.
///
fn discriminative_step(
    model: &mut Model,
    task: &Task,
    cg: &mut ConjugateState,
    data: &Collection,
    options: &Options,
) -> Result<(f64, f64, Option<f64>)> {
    model.update_class_params(task, data, options)?;
    let (score0, gradient) = model.objective_gradient(task, data, options)?;
    let norm = gradient.norm();
    if norm == 0.0 {
        debug!("zero gradient");
        return Ok((score0, norm, None));
    }
    let ls = &options.line_search;
    let direction = cg.direction(&gradient, ls.conjugate, ls.restart_period);
    let step = ls.initial_step / direction.norm();

    let result: Option<LineSearchResult> = match ls.method {
        LineSearchMethod::Exponential => {
            exponential_search(model, &direction, score0, step, ls.max_steps, |m| {
                m.objective_score(task, data, options)
            })?
        }
        LineSearchMethod::MoreThuente => {
            more_thuente(model, &direction, score0, &gradient, step, ls, |m| {
                m.objective_gradient(task, data, options)
            })?
        }
    };
    match result {
        Some(r) => {
            debug!(
                "line search accepted step {:e} after {} evaluations",
                r.step, r.n_evaluations
            );
            *model = r.model;
            Ok((r.score, norm, Some(r.step)))
        }
        None => {
            info!("line search found no improvement");
            Ok((score0, norm, None))
        }
    }
}

///
/// Train `model` on `data`.
///
/// Stops on the first termination criterion met after a full iteration.
///
pub fn train(model: Model, data: &Collection, options: &Options) -> Result<TrainingResult> {
    options.validate()?;
    let mut model = model;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(options.random_salt);
    let tasks = define_training_tasks(&model, options)?;
    let mut task_scores: Vec<TaskScore> = tasks
        .iter()
        .map(|t| TaskScore {
            measure: t.measure,
            motifs: model.group_names(&t.motifs),
            score: 0.0,
        })
        .collect();

    if tasks.is_empty() {
        info!("nothing to learn");
        return Ok(TrainingResult {
            model,
            scores: task_scores,
            iterations: 0,
            reason: ConvergenceReason::NothingToLearn,
            trajectory: Vec::new(),
        });
    }
    for task in tasks.iter() {
        info!("task {}", task.describe(&model));
    }

    let all_generative = tasks.iter().all(|t| t.measure.is_generative());
    let any_discriminative = tasks.iter().any(|t| t.measure.is_discriminative());
    let mut monitor = Monitor::new(&options.termination);
    let mut conjugate: Vec<ConjugateState> = vec![ConjugateState::default(); tasks.len()];
    let mut iterations = 0;
    let mut reason = ConvergenceReason::MaxIterations;

    for iteration in 0..options.termination.max_iter {
        let mut change = 0.0;
        let mut squared_norm = 0.0;
        for (k, task) in tasks.iter().enumerate() {
            let (score, step) = if task.measure.is_generative() {
                let step = model.generative_step(task, data, options)?;
                change += step.change;
                (step.score, None)
            } else {
                let (score, norm, step) =
                    discriminative_step(&mut model, task, &mut conjugate[k], data, options)?;
                squared_norm += norm * norm;
                (score, step)
            };
            match step {
                Some(step) => info!(
                    "iteration {} {} score={} step={:e}",
                    iteration,
                    task.describe(&model),
                    score,
                    step
                ),
                None => info!(
                    "iteration {} {} score={}",
                    iteration,
                    task.describe(&model),
                    score
                ),
            }
            task_scores[k].score = score;
        }
        iterations = iteration + 1;

        let score: f64 = task_scores
            .iter()
            .filter(|s| !any_discriminative || s.measure.is_discriminative())
            .map(|s| s.score)
            .sum();
        let stop = monitor.check(
            iteration,
            score,
            if all_generative { Some(change) } else { None },
            if any_discriminative {
                Some(squared_norm.sqrt())
            } else {
                None
            },
        );
        if let Some(r) = stop {
            reason = r;
            break;
        }
    }
    info!("training finished after {} iterations: {}", iterations, reason);

    let mut trajectory = Vec::new();
    if options.sampling.do_sampling {
        let s = &options.sampling;
        let proposer = Proposer::new(&model, options)?;
        let init = ModelState::new(model.clone(), &proposer, data, options)?;
        let initial_score = init.score();
        let pt = ParallelTempering::new(s.temperature, s.n_parallel, s.swap_period);
        let sample = pt.run(init, s.n_iter, &mut rng)?;
        info!(
            "sampling accepted {:?} moves and {} swaps",
            sample.n_accepted, sample.n_swaps
        );
        let best = sample.best().map(|b| (b.model.clone(), b.score));
        trajectory = sample
            .trajectory
            .into_iter()
            .map(|state| (state.model, state.score))
            .collect();
        match best {
            Some((best, score)) if score > initial_score => {
                info!("sampling improved the score from {} to {}", initial_score, score);
                model = best;
                // structure changed: refresh the per-task scores
                let tasks = define_training_tasks(&model, options)?;
                for (k, task) in tasks.iter().enumerate() {
                    task_scores[k].score = model.objective_score(task, data, options)?;
                }
            }
            _ => warn!("sampling did not improve the score"),
        }
    }

    Ok(TrainingResult {
        model,
        scores: task_scores,
        iterations,
        reason,
        trajectory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::encode;
    use crate::hmm::model::tests::mock_model;
    use crate::options::{BackgroundLearning, Objective};
    use crate::random_seq::planted_contrast;

    fn mock_data() -> Collection {
        let site = encode("TGACGT").unwrap();
        let (contrast, _) = planted_contrast("main", "m1", &site, 10, 40, 21);
        Collection::new(vec![contrast])
    }

    #[test]
    fn conjugate_direction_restarts() {
        let model = mock_model();
        let mut g1 = Gradient::zeros(&model);
        g1.emission[[2, 0]] = 1.0;
        g1.emission[[2, 1]] = -1.0;
        let mut g2 = Gradient::zeros(&model);
        g2.emission[[2, 0]] = 2.0;
        g2.emission[[2, 1]] = -2.0;

        let mut cg = ConjugateState::default();
        let d1 = cg.direction(&g1, true, 10);
        assert_eq!(d1, g1);
        // beta = (8 - 4) / 2 = 2, d = g2 + 2 g1
        let d2 = cg.direction(&g2, true, 10);
        assert_abs_diff_eq!(d2.emission[[2, 0]], 4.0);
        assert_eq!(cg.since_restart, 1);
        // period reached
        let mut cg = ConjugateState::default();
        cg.direction(&g1, true, 2);
        cg.direction(&g2, true, 2);
        let d = cg.direction(&g2, true, 2);
        assert_eq!(d, g2);
        // plain gradient ascent
        let mut cg = ConjugateState::default();
        cg.direction(&g1, false, 10);
        assert_eq!(cg.direction(&g2, false, 10), g2);
    }

    #[test]
    fn nothing_to_learn() {
        let options = Options::with_measure(Measure::None);
        let result = train(mock_model(), &mock_data(), &options).unwrap();
        assert_eq!(result.reason, ConvergenceReason::NothingToLearn);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.model.transition(), mock_model().transition());
        assert_eq!(result.model.emission(), mock_model().emission());
    }

    #[test]
    fn baum_welch_converges() {
        let mut options = Options::with_measure(Measure::Likelihood);
        options.termination.max_iter = 50;
        let result = train(mock_model(), &mock_data(), &options).unwrap();
        assert!(result.iterations <= 50);
        assert_ne!(result.reason, ConvergenceReason::NothingToLearn);
        assert!(result.model.check_consistency(1e-6));
        assert_eq!(result.scores.len(), 1);
        assert_eq!(result.scores[0].motifs, vec!["m1".to_string()]);
    }

    #[test]
    fn discriminative_training_improves_score() {
        let data = mock_data();
        for method in [LineSearchMethod::Exponential, LineSearchMethod::MoreThuente] {
            let mut options = Options::with_measure(Measure::MutualInformation);
            options.bg_learning = BackgroundLearning::Fixed;
            options.termination.max_iter = 5;
            options.line_search.method = method;
            let model = mock_model();
            let before = model.total_score(&data, &options).unwrap();
            let result = train(model, &data, &options).unwrap();
            let after = result.model.total_score(&data, &options).unwrap();
            assert!(after >= before - 1e-9, "{:?}: {} < {}", method, after, before);
            assert!(result.model.check_consistency(1e-6));
        }
    }

    #[test]
    fn hybrid_training_runs_both_tasks() {
        let mut options = Options::with_measure(Measure::MutualInformation);
        options.termination.max_iter = 3;
        let result = train(mock_model(), &mock_data(), &options).unwrap();
        let measures: Vec<Measure> = result.scores.iter().map(|s| s.measure).collect();
        assert_eq!(measures, vec![Measure::MutualInformation, Measure::Likelihood]);
        assert!(result.iterations <= 3);
    }

    #[test]
    fn sampling_records_trajectory() {
        let mut options = Options {
            objectives: vec![Objective::new(Measure::Likelihood)],
            ..Default::default()
        };
        options.termination.max_iter = 2;
        options.sampling.do_sampling = true;
        options.sampling.n_iter = 10;
        options.sampling.n_parallel = 2;
        options.sampling.min_size = Some(5);
        options.sampling.max_size = Some(7);
        let data = mock_data();
        let a = train(mock_model(), &data, &options).unwrap();
        let b = train(mock_model(), &data, &options).unwrap();
        assert!(!a.trajectory.is_empty());
        let scores_a: Vec<f64> = a.trajectory.iter().map(|(_, s)| *s).collect();
        let scores_b: Vec<f64> = b.trajectory.iter().map(|(_, s)| *s).collect();
        assert_eq!(scores_a, scores_b);
        let len = a.model.motif_length(2);
        assert!((5..=7).contains(&len));
        assert!(a.model.check_consistency(1e-6));
    }

    #[test]
    fn invalid_options_are_rejected() {
        let mut options = Options::default();
        options.line_search.mu = 0.9;
        assert!(train(mock_model(), &mock_data(), &options).is_err());
    }
}
