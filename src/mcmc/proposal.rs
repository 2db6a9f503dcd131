//!
//! Structural proposals on motif models and the sampled state
//!
//! A proposal is one of six mutations drawn uniformly. Mutations that cannot
//! be applied to the current model are drawn again.
//!
use super::SAState;
use crate::common::N_EMISSIONS;
use crate::data::Collection;
use crate::error::{Error, Result};
use crate::hmm::{Group, Model};
use crate::matrix::normalize_row;
use crate::options::{BackgroundLearning, Options};
use log::debug;
use rand::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// move mass between two symbols of one column
    ModifyColumn,
    /// exchange two columns
    SwapColumns,
    /// add `k` columns at one end
    AddColumns,
    /// delete `k` columns at one end
    DeleteColumns,
    /// delete `k` columns at one end and add `k` at the other
    Shift,
    /// move mass between two outgoing edges of one state
    ModifyTransition,
}

pub const MUTATIONS: [Mutation; 6] = [
    Mutation::ModifyColumn,
    Mutation::SwapColumns,
    Mutation::AddColumns,
    Mutation::DeleteColumns,
    Mutation::Shift,
    Mutation::ModifyTransition,
];

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Mutation::ModifyColumn => "modify_column",
            Mutation::SwapColumns => "swap",
            Mutation::AddColumns => "add",
            Mutation::DeleteColumns => "delete",
            Mutation::Shift => "shift",
            Mutation::ModifyTransition => "modify_transition",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum End {
    Left,
    Right,
}

///
/// Draws mutated copies of a model
///
#[derive(Clone, Debug)]
pub struct Proposer {
    n_indels: usize,
    n_shift: usize,
    eps: f64,
    /// (min, max) number of chain columns per motif name
    bounds: BTreeMap<String, (usize, usize)>,
    transitions: bool,
}

impl Proposer {
    ///
    /// Size bounds come from the options, or from the motif length in `model`
    /// when unset.
    ///
    pub fn new(model: &Model, options: &Options) -> Result<Self> {
        let s = &options.sampling;
        let bounds = model
            .motif_groups()
            .into_iter()
            .map(|g| {
                let group = model.group(g);
                let len = group.chain().len();
                let min = s.min_size.unwrap_or(len);
                let max = s.max_size.unwrap_or(len).max(min);
                (group.name.clone(), (min, max))
            })
            .collect();
        let proposer = Proposer {
            n_indels: s.n_indels,
            n_shift: s.n_shift,
            eps: s.eps,
            bounds,
            transitions: options.bg_learning != BackgroundLearning::Fixed,
        };
        proposer.ensure_eligible(model)?;
        Ok(proposer)
    }
    fn ensure_eligible(&self, model: &Model) -> Result<()> {
        if MUTATIONS.iter().any(|&m| self.is_eligible(model, m)) {
            Ok(())
        } else {
            Err(Error::Config(
                "no structural mutation applies to the model".to_string(),
            ))
        }
    }
    fn bounds(&self, group: &Group) -> (usize, usize) {
        let len = group.chain().len();
        self.bounds.get(&group.name).copied().unwrap_or((len, len))
    }
    ///
    /// Number of columns that can be added to a group
    ///
    fn n_addable(&self, group: &Group) -> usize {
        if group.n_insertions > 0 {
            return 0;
        }
        let (_, max) = self.bounds(group);
        self.n_indels.min(max.saturating_sub(group.chain().len()))
    }
    ///
    /// Number of columns that can be removed from one end of a group, keeping
    /// at least one core column and `min` columns.
    ///
    fn n_deletable(&self, group: &Group, end: End, limit: usize) -> usize {
        if group.n_insertions > 0 {
            return 0;
        }
        let (min, _) = self.bounds(group);
        let n = group.chain().len();
        let pad = match end {
            End::Left => group.pad_left,
            End::Right => group.pad_right,
        };
        let core = group.core().len();
        limit
            .min(n.saturating_sub(min.max(1)))
            .min(pad + core.saturating_sub(1))
    }
    fn max_deletable(&self, group: &Group, limit: usize) -> usize {
        self.n_deletable(group, End::Left, limit)
            .max(self.n_deletable(group, End::Right, limit))
    }
    fn rows_with_choice(model: &Model) -> Vec<usize> {
        (0..model.n_states())
            .filter(|&i| model.succ(i).len() >= 2)
            .collect()
    }
    fn eligible_groups(&self, model: &Model, mutation: Mutation) -> Vec<usize> {
        model
            .motif_groups()
            .into_iter()
            .filter(|&g| {
                let group = model.group(g);
                match mutation {
                    Mutation::ModifyColumn => !group.chain().is_empty(),
                    Mutation::SwapColumns => group.chain().len() >= 2,
                    Mutation::AddColumns => self.n_addable(group) > 0,
                    Mutation::DeleteColumns => self.max_deletable(group, self.n_indels) > 0,
                    Mutation::Shift => self.max_deletable(group, self.n_shift) > 0,
                    Mutation::ModifyTransition => false,
                }
            })
            .collect()
    }
    pub fn is_eligible(&self, model: &Model, mutation: Mutation) -> bool {
        match mutation {
            Mutation::ModifyTransition => {
                self.transitions && !Proposer::rows_with_choice(model).is_empty()
            }
            _ => !self.eligible_groups(model, mutation).is_empty(),
        }
    }
    ///
    /// Draw a mutation applicable to `model` and return the mutated copy.
    ///
    pub fn propose<R: Rng>(&self, model: &Model, rng: &mut R) -> Result<(Mutation, Model)> {
        self.ensure_eligible(model)?;
        let mutation = loop {
            let m = MUTATIONS[rng.gen_range(0..MUTATIONS.len())];
            if self.is_eligible(model, m) {
                break m;
            }
        };
        let model = match mutation {
            Mutation::ModifyTransition => self.modify_transition(model, rng),
            _ => {
                let groups = self.eligible_groups(model, mutation);
                let g = groups[rng.gen_range(0..groups.len())];
                match mutation {
                    Mutation::ModifyColumn => modify_column(model, g, rng),
                    Mutation::SwapColumns => swap_columns(model, g, rng),
                    Mutation::AddColumns => {
                        let k = rng.gen_range(1..=self.n_addable(model.group(g)));
                        let end = if rng.gen_bool(0.5) { End::Left } else { End::Right };
                        add_columns(model, g, end, k, rng)
                    }
                    Mutation::DeleteColumns => {
                        let (end, max) = self.pick_deletion_end(model.group(g), self.n_indels, rng);
                        let k = rng.gen_range(1..=max);
                        delete_columns(model, g, end, k)
                    }
                    _ => {
                        let (end, max) = self.pick_deletion_end(model.group(g), self.n_shift, rng);
                        let k = rng.gen_range(1..=max);
                        let other = match end {
                            End::Left => End::Right,
                            End::Right => End::Left,
                        };
                        let shrunk = delete_columns(model, g, end, k);
                        add_columns(&shrunk, g, other, k, rng)
                    }
                }
            }
        };
        debug!("proposed {}", mutation);
        Ok((mutation, model))
    }
    fn pick_deletion_end<R: Rng>(&self, group: &Group, limit: usize, rng: &mut R) -> (End, usize) {
        let ends: Vec<(End, usize)> = [End::Left, End::Right]
            .into_iter()
            .map(|end| (end, self.n_deletable(group, end, limit)))
            .filter(|&(_, n)| n > 0)
            .collect();
        ends[rng.gen_range(0..ends.len())]
    }
    fn modify_transition<R: Rng>(&self, model: &Model, rng: &mut R) -> Model {
        let rows = Proposer::rows_with_choice(model);
        let i = rows[rng.gen_range(0..rows.len())];
        let succ = model.succ(i);
        let a = succ[rng.gen_range(0..succ.len())];
        let b = loop {
            let b = succ[rng.gen_range(0..succ.len())];
            if b != a {
                break b;
            }
        };
        let mut m = model.clone();
        let available = (m.transition[[i, a]] - self.eps).max(0.0);
        let amount = rng.gen::<f64>() * available;
        m.transition[[i, a]] -= amount;
        m.transition[[i, b]] += amount;
        normalize_row(m.transition.row_mut(i));
        m.finalize();
        m
    }
}

fn random_column<R: Rng>(rng: &mut R) -> Vec<f64> {
    (0..N_EMISSIONS).map(|_| rng.gen::<f64>()).collect()
}

fn modify_column<R: Rng>(model: &Model, g: usize, rng: &mut R) -> Model {
    let chain = model.group(g).chain();
    let s = chain[rng.gen_range(0..chain.len())];
    let a = rng.gen_range(0..N_EMISSIONS);
    let b = (a + rng.gen_range(1..N_EMISSIONS)) % N_EMISSIONS;
    let mut m = model.clone();
    let amount = rng.gen::<f64>() * m.emission[[s, a]];
    m.emission[[s, a]] -= amount;
    m.emission[[s, b]] += amount;
    m
}

fn swap_columns<R: Rng>(model: &Model, g: usize, rng: &mut R) -> Model {
    let chain = model.group(g).chain();
    let i = rng.gen_range(0..chain.len());
    let j = (i + rng.gen_range(1..chain.len())) % chain.len();
    let (si, sj) = (chain[i], chain[j]);
    let mut m = model.clone();
    let row_i = m.emission.row(si).to_owned();
    let row_j = m.emission.row(sj).to_owned();
    m.emission.row_mut(si).assign(&row_j);
    m.emission.row_mut(sj).assign(&row_i);
    m
}

///
/// Add `k` columns with random profiles at one end of the chain of group `g`.
///
/// At the 5' end the new state takes over the incoming edges of the old first
/// state and leads into it; at the 3' end it takes over the outgoing edges of
/// the old last state, which now leads into the new one.
///
fn add_columns<R: Rng>(model: &Model, g: usize, end: End, k: usize, rng: &mut R) -> Model {
    let mut m = model.clone();
    for _ in 0..k {
        let emission = random_column(rng);
        m = match end {
            End::Left => {
                let at = m.group(g).first();
                let mut next = m.with_state_inserted(at, g, &emission);
                let old = at + 1;
                let incoming = next.transition.column(old).to_owned();
                next.transition.column_mut(at).assign(&incoming);
                next.transition.column_mut(old).fill(0.0);
                next.transition[[at, old]] = 1.0;
                if next.groups[g].pad_left > 0 {
                    next.groups[g].pad_left += 1;
                }
                next
            }
            End::Right => {
                let last = m.group(g).last();
                let at = last + 1;
                let mut next = m.with_state_inserted(at, g, &emission);
                let outgoing = next.transition.row(last).to_owned();
                next.transition.row_mut(at).assign(&outgoing);
                next.transition.row_mut(last).fill(0.0);
                next.transition[[last, at]] = 1.0;
                if next.groups[g].pad_right > 0 {
                    next.groups[g].pad_right += 1;
                }
                next
            }
        };
        m.finalize();
    }
    m
}

///
/// Remove `k` columns at one end of the chain of group `g`; padding columns
/// go first.
///
fn delete_columns(model: &Model, g: usize, end: End, k: usize) -> Model {
    let mut m = model.clone();
    for _ in 0..k {
        let group = m.group(g);
        let state = match end {
            End::Left => group.first(),
            End::Right => group.last(),
        };
        m = m.with_state_removed(state);
        let group = &mut m.groups[g];
        match end {
            End::Left => group.pad_left = group.pad_left.saturating_sub(1),
            End::Right => group.pad_right = group.pad_right.saturating_sub(1),
        }
    }
    m
}

///
/// Monte Carlo state: a model and its score on the training data
///
#[derive(Clone)]
pub struct ModelState<'a> {
    pub model: Model,
    pub score: f64,
    pub mutation: Option<Mutation>,
    proposer: &'a Proposer,
    data: &'a Collection,
    options: &'a Options,
}

impl<'a> ModelState<'a> {
    pub fn new(
        model: Model,
        proposer: &'a Proposer,
        data: &'a Collection,
        options: &'a Options,
    ) -> Result<Self> {
        let score = model.total_score(data, options)?;
        Ok(ModelState {
            model,
            score,
            mutation: None,
            proposer,
            data,
            options,
        })
    }
}

impl<'a> SAState for ModelState<'a> {
    fn score(&self) -> f64 {
        self.score
    }
    fn next<R: Rng>(&self, rng: &mut R) -> Result<Self> {
        let (mutation, model) = self.proposer.propose(&self.model, rng)?;
        let score = match model.total_score(self.data, self.options) {
            Ok(score) => score,
            Err(Error::Infinity(message)) => {
                debug!("{} gave a degenerate model: {}", mutation, message);
                f64::NEG_INFINITY
            }
            Err(e) => return Err(e),
        };
        Ok(ModelState {
            model,
            score,
            mutation: Some(mutation),
            proposer: self.proposer,
            data: self.data,
            options: self.options,
        })
    }
    fn as_string(&self) -> String {
        self.model
            .motif_groups()
            .into_iter()
            .map(|g| self.model.consensus(g))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::model::tests::mock_model;
    use crate::hmm::{MotifLayout, BG_STATE};
    use crate::mcmc::ParallelTempering;
    use crate::measure::Measure;
    use crate::random_seq::planted_contrast;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn options(min: usize, max: usize) -> Options {
        let mut options = Options::with_measure(Measure::Likelihood);
        options.sampling.min_size = Some(min);
        options.sampling.max_size = Some(max);
        options.sampling.n_indels = 2;
        options.sampling.n_shift = 2;
        options
    }

    #[test]
    fn add_right_keeps_chain_wiring() {
        let model = mock_model();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let m = add_columns(&model, 2, End::Right, 1, &mut rng);
        assert_eq!(m.n_states(), 9);
        assert_eq!(m.group(2).states, vec![2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(m.transition()[[7, 8]], 1.0);
        assert_eq!(m.transition()[[8, BG_STATE]], 1.0);
        assert_eq!(m.transition()[[7, BG_STATE]], 0.0);
        assert_eq!(m.consensus(2).len(), 7);
        assert!(m.check_consistency(1e-9));
    }

    #[test]
    fn add_left_takes_over_entry() {
        let model = mock_model();
        let entry = model.transition()[[BG_STATE, 2]];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let m = add_columns(&model, 2, End::Left, 2, &mut rng);
        assert_eq!(m.n_states(), 10);
        assert_eq!(m.group(2).states, (2..10).collect::<Vec<_>>());
        assert_abs_diff_eq!(m.transition()[[BG_STATE, 2]], entry);
        assert_eq!(m.transition()[[BG_STATE, 3]], 0.0);
        assert_eq!(m.transition()[[BG_STATE, 4]], 0.0);
        assert_eq!(m.transition()[[2, 3]], 1.0);
        assert_eq!(m.transition()[[3, 4]], 1.0);
        assert_eq!(&m.consensus(2)[2..], "TGACGT");
        assert!(m.check_consistency(1e-9));
    }

    #[test]
    fn delete_both_ends() {
        let model = mock_model();
        let entry = model.transition()[[BG_STATE, 2]];
        let m = delete_columns(&model, 2, End::Left, 1);
        assert_eq!(m.consensus(2), "GACGT");
        assert_abs_diff_eq!(m.transition()[[BG_STATE, 2]], entry, epsilon = 1e-12);
        assert!(m.check_consistency(1e-9));
        let m = delete_columns(&m, 2, End::Right, 2);
        assert_eq!(m.consensus(2), "GAC");
        assert_abs_diff_eq!(m.transition()[[4, BG_STATE]], 1.0, epsilon = 1e-12);
        assert!(m.check_consistency(1e-9));
    }

    #[test]
    fn shift_keeps_length() {
        let model = mock_model();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let shrunk = delete_columns(&model, 2, End::Left, 2);
        let m = add_columns(&shrunk, 2, End::Right, 2, &mut rng);
        assert_eq!(m.group(2).chain().len(), 6);
        assert_eq!(&m.consensus(2)[..4], "ACGT");
        assert!(m.check_consistency(1e-9));
    }

    #[test]
    fn padding_follows_the_end() {
        let mut model = Model::new();
        let layout = MotifLayout {
            pad_left: 1,
            pad_right: 1,
            ..Default::default()
        };
        model
            .add_motif_iupac("ACGT", 0.03, 100.0, 1.0, "p", &layout)
            .unwrap();
        let proposer = Proposer::new(&model, &options(2, 10)).unwrap();
        let g = model.find_group("p").unwrap();
        let group = model.group(g);
        assert_eq!(group.core().len(), 4);
        // keeps one core column
        assert_eq!(proposer.n_deletable(group, End::Left, 10), 4);
        let m = delete_columns(&model, g, End::Left, 2);
        assert_eq!(m.group(g).pad_left, 0);
        assert_eq!(m.group(g).core().len(), 3);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let m = add_columns(&model, g, End::Right, 1, &mut rng);
        assert_eq!(m.group(g).pad_right, 2);
        assert_eq!(m.group(g).core().len(), 4);
    }

    #[test]
    fn eligibility_follows_bounds() {
        let model = mock_model();
        let proposer = Proposer::new(&model, &options(6, 6)).unwrap();
        assert!(!proposer.is_eligible(&model, Mutation::AddColumns));
        assert!(!proposer.is_eligible(&model, Mutation::DeleteColumns));
        assert!(!proposer.is_eligible(&model, Mutation::Shift));
        assert!(proposer.is_eligible(&model, Mutation::ModifyColumn));
        assert!(proposer.is_eligible(&model, Mutation::SwapColumns));
        assert!(proposer.is_eligible(&model, Mutation::ModifyTransition));

        let proposer = Proposer::new(&model, &options(4, 8)).unwrap();
        assert!(proposer.is_eligible(&model, Mutation::AddColumns));
        assert!(proposer.is_eligible(&model, Mutation::DeleteColumns));
        assert!(proposer.is_eligible(&model, Mutation::Shift));

        let mut fixed = options(6, 6);
        fixed.bg_learning = BackgroundLearning::Fixed;
        let proposer = Proposer::new(&model, &fixed).unwrap();
        assert!(!proposer.is_eligible(&model, Mutation::ModifyTransition));

        // nothing to mutate at all
        assert!(matches!(
            Proposer::new(&Model::new(), &fixed),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn proposals_stay_stochastic_and_bounded() {
        let model = mock_model();
        let proposer = Proposer::new(&model, &options(4, 8)).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut current = model;
        let mut seen = Vec::new();
        for _ in 0..200 {
            let (mutation, next) = proposer.propose(&current, &mut rng).unwrap();
            assert!(next.check_consistency(1e-6));
            let len = next.group(2).chain().len();
            assert!((4..=8).contains(&len));
            if !seen.contains(&mutation) {
                seen.push(mutation);
            }
            current = next;
        }
        assert_eq!(seen.len(), MUTATIONS.len());
    }

    #[test]
    fn transition_floor() {
        let model = mock_model();
        let mut options = options(6, 6);
        options.sampling.eps = 0.005;
        let proposer = Proposer::new(&model, &options).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut m = model;
        for _ in 0..100 {
            m = proposer.modify_transition(&m, &mut rng);
            assert!(m.transition()[[BG_STATE, 2]] > 0.0);
            assert!(m.transition()[[BG_STATE, BG_STATE]] > 0.0);
        }
        assert!(m.check_consistency(1e-9));
    }

    #[test]
    fn tempering_over_models_is_reproducible() {
        let site = crate::common::encode("TGACGT").unwrap();
        let (contrast, _) = planted_contrast("main", "m1", &site, 6, 30, 4);
        let data = Collection::new(vec![contrast]);
        let model = mock_model();
        let options = options(4, 8);
        let proposer = Proposer::new(&model, &options).unwrap();
        let pt = ParallelTempering::new(1.0, 3, 1);
        let run = || {
            let init = ModelState::new(model.clone(), &proposer, &data, &options).unwrap();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
            pt.run(init, 15, &mut rng).unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.scores(), b.scores());
        let models_a: Vec<String> = a.trajectory.iter().map(|s| s.as_string()).collect();
        let models_b: Vec<String> = b.trajectory.iter().map(|s| s.as_string()).collect();
        assert_eq!(models_a, models_b);
        assert!(a.best().unwrap().score >= a.trajectory[0].score);
    }
}
