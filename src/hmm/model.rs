//!
//! Model topology
//!
//! State `0` is the non-emitting start state and state `1` is the background.
//! Every other state belongs to a motif group: a linear chain of states (left
//! padding, core positions, right padding) followed by insertion states that
//! branch off the core.
//!
//! Structural changes never resize matrices in place: a fresh pair of
//! transition/emission matrices is allocated, filled and swapped in.
//!
use crate::common::{degeneracy, encode, is_nucleotide, support, Symbol, N_EMISSIONS};
use crate::error::{Error, Result};
use crate::matrix::{is_distribution, is_row_stochastic, normalize_row, normalize_rows, Matrix};
use log::{debug, warn};
use ndarray::{s, Array2};
use std::collections::BTreeMap;
use std::str::FromStr;

/// index of the start state
pub const START_STATE: usize = 0;
/// index of the background state
pub const BG_STATE: usize = 1;
/// index of the first state that belongs to a motif
pub const FIRST_MOTIF_STATE: usize = 2;
/// upper bound of the probability to enter a motif from the background
pub const MAX_ENTRY_PROB: f64 = 0.5;
/// probability of branching into an insertion state
pub const INSERTION_PROB: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Special,
    Background,
    Motif,
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            GroupKind::Special => "special",
            GroupKind::Background => "background",
            GroupKind::Motif => "motif",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for GroupKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "special" => Ok(GroupKind::Special),
            "background" => Ok(GroupKind::Background),
            "motif" => Ok(GroupKind::Motif),
            _ => Err(format!("unknown group kind {:?}", s)),
        }
    }
}

///
/// Named set of states of one kind.
///
/// `states` lists the chain states (left padding, core, right padding) in
/// order, followed by the `n_insertions` insertion states.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub kind: GroupKind,
    pub name: String,
    pub states: Vec<usize>,
    pub pad_left: usize,
    pub pad_right: usize,
    pub n_insertions: usize,
}

impl Group {
    fn special(kind: GroupKind, name: &str, state: usize) -> Self {
        Group {
            kind,
            name: name.to_string(),
            states: vec![state],
            pad_left: 0,
            pad_right: 0,
            n_insertions: 0,
        }
    }
    pub fn is_motif(&self) -> bool {
        self.kind == GroupKind::Motif
    }
    ///
    /// Chain states: padding and core positions in 5' to 3' order
    ///
    pub fn chain(&self) -> &[usize] {
        &self.states[..self.states.len() - self.n_insertions]
    }
    ///
    /// Core positions only
    ///
    pub fn core(&self) -> &[usize] {
        let chain = self.chain();
        let end = chain.len().saturating_sub(self.pad_right).max(self.pad_left);
        &chain[self.pad_left.min(chain.len())..end.min(chain.len())]
    }
    pub fn insertions(&self) -> &[usize] {
        &self.states[self.states.len() - self.n_insertions..]
    }
    ///
    /// First chain state. Chains of a model are never empty (`check_group`).
    ///
    pub fn first(&self) -> usize {
        self.states[0]
    }
    ///
    /// Last chain state, the one that returns to background
    ///
    pub fn last(&self) -> usize {
        self.chain()[self.chain().len() - 1]
    }
}

///
/// Group names are single tokens of the parameter file.
///
pub fn check_group_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        Err(format!("invalid group name {:?}", name))
    } else {
        Ok(())
    }
}

///
/// Check the shape of the `index`-th group of a model
///
/// Group 0 is the start state and group 1 the background, each a single
/// state. All others are motifs with a non-empty core and insertion states
/// that follow a non-empty chain.
///
pub fn check_group(index: usize, group: &Group) -> std::result::Result<(), String> {
    check_group_name(&group.name)?;
    let (kind, state) = match index {
        0 => (GroupKind::Special, Some(START_STATE)),
        1 => (GroupKind::Background, Some(BG_STATE)),
        _ => (GroupKind::Motif, None),
    };
    if group.kind != kind {
        return Err(format!("group {} must be {}, found {}", index, kind, group.kind));
    }
    match state {
        Some(state) => {
            if group.states != [state] || group.n_insertions != 0 {
                return Err(format!("group {} must hold state {} only", index, state));
            }
        }
        None => {
            if group.n_insertions >= group.states.len() {
                return Err(format!("motif {} has no chain state", group.name));
            }
            let chain_len = group.states.len() - group.n_insertions;
            if group.pad_left + group.pad_right >= chain_len {
                return Err(format!("motif {} has no core position", group.name));
            }
        }
    }
    Ok(())
}

///
/// Shape of a motif chain besides its emission profile
///
/// * `insertions`: 1-based core positions after which an insertion state branches off
/// * `self_transition`: insertion states may loop on themselves
/// * `pad_left`, `pad_right`: number of padding states around the core
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotifLayout {
    pub insertions: Vec<usize>,
    pub self_transition: bool,
    pub pad_left: usize,
    pub pad_right: usize,
}

///
/// Class model used by the class posterior objective: prior of each set of a
/// contrast and probability of a motif occurrence conditional on the set.
///
#[derive(Clone, Debug, PartialEq)]
pub struct ClassParams {
    pub class_prior: Vec<f64>,
    pub motif_prior: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct Model {
    pub(crate) groups: Vec<Group>,
    /// `group_ids[state]` is the index of the group of the state
    pub(crate) group_ids: Vec<usize>,
    pub(crate) transition: Matrix,
    pub(crate) emission: Matrix,
    pub(crate) pred: Vec<Vec<usize>>,
    pub(crate) succ: Vec<Vec<usize>>,
    /// keyed by `(contrast, motif)`
    pub(crate) class_params: BTreeMap<(String, String), ClassParams>,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

//
// construction and accessors
//
impl Model {
    ///
    /// Model with the start and the background state only.
    /// The background emits uniformly.
    ///
    pub fn new() -> Self {
        let mut transition = Array2::zeros((2, 2));
        transition[[START_STATE, BG_STATE]] = 1.0;
        transition[[BG_STATE, BG_STATE]] = 1.0;
        let mut emission = Array2::zeros((2, N_EMISSIONS));
        emission.row_mut(BG_STATE).fill(1.0 / N_EMISSIONS as f64);
        let mut model = Model {
            groups: vec![
                Group::special(GroupKind::Special, "start", START_STATE),
                Group::special(GroupKind::Background, "background", BG_STATE),
            ],
            group_ids: vec![0, 1],
            transition,
            emission,
            pred: Vec::new(),
            succ: Vec::new(),
            class_params: BTreeMap::new(),
        };
        model.finalize();
        model
    }
    ///
    /// Assemble a model from its parts, checking the layout of the groups
    /// (`check_group`) and that they cover every state once
    ///
    pub fn from_parts(
        groups: Vec<Group>,
        transition: Matrix,
        emission: Matrix,
        class_params: BTreeMap<(String, String), ClassParams>,
    ) -> Result<Self> {
        let n = transition.nrows();
        if transition.ncols() != n || emission.nrows() != n || emission.ncols() != N_EMISSIONS {
            return Err(Error::Config(format!(
                "inconsistent matrix shapes: transition {:?} emission {:?}",
                transition.dim(),
                emission.dim()
            )));
        }
        if groups.len() < 2 {
            return Err(Error::Config(
                "a model needs the start and the background group".to_string(),
            ));
        }
        for (g, group) in groups.iter().enumerate() {
            check_group(g, group).map_err(Error::Config)?;
        }
        let mut group_ids = vec![usize::MAX; n];
        for (g, group) in groups.iter().enumerate() {
            for &state in group.states.iter() {
                if state >= n || group_ids[state] != usize::MAX {
                    return Err(Error::Config(format!(
                        "state {} of group {} is out of range or shared",
                        state, group.name
                    )));
                }
                group_ids[state] = g;
            }
        }
        if group_ids.iter().any(|&g| g == usize::MAX) {
            return Err(Error::Config("a state belongs to no group".to_string()));
        }
        let mut model = Model {
            groups,
            group_ids,
            transition,
            emission,
            pred: Vec::new(),
            succ: Vec::new(),
            class_params,
        };
        model.finalize();
        Ok(model)
    }
    pub fn n_states(&self) -> usize {
        self.transition.nrows()
    }
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
    pub fn group(&self, index: usize) -> &Group {
        &self.groups[index]
    }
    pub fn group_id(&self, state: usize) -> usize {
        self.group_ids[state]
    }
    pub fn transition(&self) -> &Matrix {
        &self.transition
    }
    pub fn emission(&self) -> &Matrix {
        &self.emission
    }
    ///
    /// states `i` with `T[i][j] > 0`
    ///
    pub fn pred(&self, j: usize) -> &[usize] {
        &self.pred[j]
    }
    ///
    /// states `j` with `T[i][j] > 0`
    ///
    pub fn succ(&self, i: usize) -> &[usize] {
        &self.succ[i]
    }
    pub fn class_params(&self, contrast: &str, motif: &str) -> Option<&ClassParams> {
        self.class_params
            .get(&(contrast.to_string(), motif.to_string()))
    }
    pub fn set_class_params(&mut self, contrast: &str, motif: &str, params: ClassParams) {
        self.class_params
            .insert((contrast.to_string(), motif.to_string()), params);
    }
    pub fn all_class_params(&self) -> &BTreeMap<(String, String), ClassParams> {
        &self.class_params
    }
    pub fn find_group(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }
    ///
    /// indices of the motif groups
    ///
    pub fn motif_groups(&self) -> Vec<usize> {
        (0..self.groups.len())
            .filter(|&g| self.groups[g].is_motif())
            .collect()
    }
    pub fn is_emitting(&self, state: usize) -> bool {
        state != START_STATE
    }
    ///
    /// Emission probability of a (possibly degenerate) symbol.
    /// The start state is non-emitting and treated as `E = 1`.
    ///
    #[inline]
    pub fn emit(&self, state: usize, symbol: Symbol) -> f64 {
        if state == START_STATE {
            1.0
        } else if is_nucleotide(symbol) {
            self.emission[[state, symbol as usize]]
        } else {
            support(symbol).map(|k| self.emission[[state, k]]).sum()
        }
    }
    ///
    /// Refresh predecessor/successor caches after the transition matrix changed
    ///
    pub fn finalize(&mut self) {
        let n = self.n_states();
        self.pred = vec![Vec::new(); n];
        self.succ = vec![Vec::new(); n];
        for i in 0..n {
            for j in 0..n {
                if self.transition[[i, j]] > 0.0 {
                    self.succ[i].push(j);
                    self.pred[j].push(i);
                }
            }
        }
    }
    ///
    /// Row-stochasticity of T and of E for emitting states.
    /// Zero rows are accepted as unreachable-state sentinels.
    ///
    pub fn check_consistency(&self, eps: f64) -> bool {
        let mut ok = true;
        if !is_row_stochastic(&self.transition, eps, true) {
            warn!("transition matrix is not row-stochastic");
            ok = false;
        }
        for state in 0..self.n_states() {
            if self.is_emitting(state) && !is_distribution(self.emission.row(state), eps, true) {
                warn!("emission of state {} is not a distribution", state);
                ok = false;
            }
        }
        for (g, group) in self.groups.iter().enumerate() {
            if group.states.iter().any(|&s| self.group_ids[s] != g) {
                warn!("group {} disagrees with the group index", group.name);
                ok = false;
            }
        }
        ok
    }
}

///
/// Emission profile of an IUPAC string. Symbols excluded by a position get
/// `alpha`; the rest of the mass is shared by the included symbols.
///
pub fn iupac_profile(iupac: &str, alpha: f64) -> Result<Matrix> {
    let symbols = encode(iupac)?;
    let mut profile = Array2::zeros((symbols.len(), N_EMISSIONS));
    for (i, &symbol) in symbols.iter().enumerate() {
        let k = degeneracy(symbol);
        let excluded = (N_EMISSIONS - k) as f64;
        let included = (1.0 - alpha * excluded) / k as f64;
        if included <= 0.0 || alpha < 0.0 {
            return Err(Error::Config(format!(
                "alpha={} leaves no probability for {:?}",
                alpha, iupac
            )));
        }
        profile.row_mut(i).fill(alpha);
        for x in support(symbol) {
            profile[[i, x]] = included;
        }
    }
    Ok(profile)
}

//
// adding motifs
//
impl Model {
    ///
    /// Allocate matrices for `n_add` more states, copying every existing entry
    ///
    fn grown(&self, n_add: usize) -> (Matrix, Matrix) {
        let n = self.n_states();
        let mut transition = Array2::zeros((n + n_add, n + n_add));
        transition
            .slice_mut(s![..n, ..n])
            .assign(&self.transition);
        let mut emission = Array2::zeros((n + n_add, N_EMISSIONS));
        emission.slice_mut(s![..n, ..]).assign(&self.emission);
        (transition, emission)
    }
    ///
    /// Add a motif group seeded by an emission profile (one row per core position).
    ///
    /// The background and the start state enter the motif with probability
    /// `lambda / expected_seq_len` (at most `MAX_ENTRY_PROB`), taken from their
    /// self/background transition. The last chain state returns to background.
    ///
    /// Fails with `Error::Config` if the entry would use up the remaining
    /// transition into the background, which keeps the background loop
    /// positive and every earlier entry probability unchanged.
    ///
    /// Returns the index of the new group.
    ///
    pub fn add_motif(
        &mut self,
        profile: &Matrix,
        expected_seq_len: f64,
        lambda: f64,
        name: &str,
        layout: &MotifLayout,
    ) -> Result<usize> {
        if expected_seq_len <= 0.0 || lambda < 0.0 {
            return Err(Error::Config(format!(
                "invalid expected length {} or prior weight {}",
                expected_seq_len, lambda
            )));
        }
        let entry = (lambda / expected_seq_len).min(MAX_ENTRY_PROB);
        let bg = self.emission.row(BG_STATE).to_owned();
        let chain_len = layout.pad_left + profile.nrows() + layout.pad_right;
        let mut chain = Array2::zeros((chain_len, N_EMISSIONS));
        for i in 0..chain_len {
            if i < layout.pad_left || i >= layout.pad_left + profile.nrows() {
                chain.row_mut(i).assign(&bg);
            } else {
                chain.row_mut(i).assign(&profile.row(i - layout.pad_left));
            }
        }
        self.add_chain(&chain, entry, name, layout)
    }
    ///
    /// `add_motif` with a profile derived from an IUPAC string
    ///
    pub fn add_motif_iupac(
        &mut self,
        iupac: &str,
        alpha: f64,
        expected_seq_len: f64,
        lambda: f64,
        name: &str,
        layout: &MotifLayout,
    ) -> Result<usize> {
        let profile = iupac_profile(iupac, alpha)?;
        self.add_motif(&profile, expected_seq_len, lambda, name, layout)
    }
    ///
    /// The background and the start state must keep a positive transition
    /// into the background after giving `entry` to new groups.
    ///
    fn check_entry(&self, entry: f64, name: &str) -> Result<()> {
        for src in [BG_STATE, START_STATE] {
            let remaining = self.transition[[src, BG_STATE]];
            if entry >= remaining {
                return Err(Error::Config(format!(
                    "entry probability {} of {} exceeds the remaining background transition {} of state {}",
                    entry, name, remaining, src
                )));
            }
        }
        Ok(())
    }
    ///
    /// Append a chain whose emissions (padding included) are given,
    /// entered from the background with probability `entry`.
    ///
    fn add_chain(
        &mut self,
        chain_emission: &Matrix,
        entry: f64,
        name: &str,
        layout: &MotifLayout,
    ) -> Result<usize> {
        check_group_name(name).map_err(Error::Config)?;
        self.check_entry(entry, name)?;
        let chain_len = chain_emission.nrows();
        if chain_len <= layout.pad_left + layout.pad_right {
            return Err(Error::Config(format!("motif {} has no core position", name)));
        }
        let motif_len = chain_len - layout.pad_left - layout.pad_right;
        let mut insertions = layout.insertions.clone();
        insertions.sort_unstable();
        insertions.dedup();
        if let Some(&position) = insertions
            .iter()
            .find(|&&position| position == 0 || position >= motif_len)
        {
            return Err(Error::InsertionNotInsideMotif {
                position,
                motif_len,
            });
        }

        let n_old = self.n_states();
        let n_add = chain_len + insertions.len();
        let (mut t, mut e) = self.grown(n_add);
        let chain: Vec<usize> = (n_old..n_old + chain_len).collect();
        let insertion_states: Vec<usize> = (n_old + chain_len..n_old + n_add).collect();

        // emissions
        for (i, &state) in chain.iter().enumerate() {
            e.row_mut(state).assign(&chain_emission.row(i));
            normalize_row(e.row_mut(state));
        }
        for &state in insertion_states.iter() {
            let bg = self.emission.row(BG_STATE);
            e.row_mut(state).assign(&bg);
        }

        // chain and exit
        for w in chain.windows(2) {
            t[[w[0], w[1]]] = 1.0;
        }
        t[[chain[chain_len - 1], BG_STATE]] = 1.0;

        // entry from background and start
        for src in [BG_STATE, START_STATE] {
            t[[src, chain[0]]] = entry;
            t[[src, BG_STATE]] -= entry;
        }

        // insertion branches
        let core = &chain[layout.pad_left..layout.pad_left + motif_len];
        for (&position, &ins) in insertions.iter().zip(insertion_states.iter()) {
            let before = core[position - 1];
            let after = core[position];
            t.row_mut(before).mapv_inplace(|x| x * (1.0 - INSERTION_PROB));
            t[[before, ins]] = INSERTION_PROB;
            t[[ins, after]] = 1.0;
            if layout.self_transition {
                t[[ins, ins]] = 1.0;
            }
        }
        normalize_rows(&mut t);

        let group = self.groups.len();
        let mut states = chain.clone();
        states.extend_from_slice(&insertion_states);
        self.groups.push(Group {
            kind: GroupKind::Motif,
            name: name.to_string(),
            states,
            pad_left: layout.pad_left,
            pad_right: layout.pad_right,
            n_insertions: insertions.len(),
        });
        self.group_ids.extend(std::iter::repeat(group).take(n_add));
        self.transition = t;
        self.emission = e;
        self.finalize();
        debug!(
            "added motif {} (group {}) with {} chain and {} insertion states",
            name,
            group,
            chain_len,
            insertions.len()
        );
        Ok(group)
    }
    ///
    /// Merge the motif groups of `other` into this model.
    ///
    /// Emissions and within-group transitions are copied. Only the transitions
    /// between the background (and start) and the group are recomputed: entry
    /// probabilities are taken from `other` and subtracted from the
    /// background self transition.
    ///
    /// With `only_additional`, groups whose name already exists are skipped.
    /// Returns the indices of the added groups. As in `add_motif`, nothing is
    /// merged if the entries would use up the background transition.
    ///
    pub fn add_motifs(&mut self, other: &Model, only_additional: bool) -> Result<Vec<usize>> {
        let selected: Vec<&Group> = other
            .groups
            .iter()
            .filter(|g| g.is_motif() && !(only_additional && self.find_group(&g.name).is_some()))
            .collect();
        for src in [BG_STATE, START_STATE] {
            let entry: f64 = selected
                .iter()
                .flat_map(|g| g.states.iter())
                .map(|&s| other.transition[[src, s]])
                .sum();
            if entry > 0.0 && entry >= self.transition[[src, BG_STATE]] {
                return Err(Error::Config(format!(
                    "merged entry probability {} exceeds the remaining background transition {} of state {}",
                    entry,
                    self.transition[[src, BG_STATE]],
                    src
                )));
            }
        }

        let mut added = Vec::new();
        for group in selected {
            let n_old = self.n_states();
            let n_add = group.states.len();
            let (mut t, mut e) = self.grown(n_add);
            let new_id = |k: usize| n_old + k;

            for (k, &s) in group.states.iter().enumerate() {
                e.row_mut(new_id(k)).assign(&other.emission.row(s));
                for (l, &u) in group.states.iter().enumerate() {
                    t[[new_id(k), new_id(l)]] = other.transition[[s, u]];
                }
                t[[new_id(k), BG_STATE]] = other.transition[[s, BG_STATE]];
                for src in [BG_STATE, START_STATE] {
                    let p = other.transition[[src, s]];
                    t[[src, new_id(k)]] = p;
                    t[[src, BG_STATE]] -= p;
                }
            }
            normalize_rows(&mut t);

            let g = self.groups.len();
            self.groups.push(Group {
                states: (0..n_add).map(new_id).collect(),
                ..group.clone()
            });
            self.group_ids.extend(std::iter::repeat(g).take(n_add));
            self.transition = t;
            self.emission = e;
            for ((contrast, motif), params) in other.class_params.iter() {
                if motif == &group.name {
                    self.class_params
                        .entry((contrast.clone(), motif.clone()))
                        .or_insert_with(|| params.clone());
                }
            }
            added.push(g);
        }
        self.finalize();
        Ok(added)
    }
    ///
    /// Model extended by the reverse complement of every motif group.
    ///
    /// Returns the model and pairs of `(group, reverse complement group)`.
    /// The reverse complement keeps the entry probability of the group; its
    /// insertion states are seeded afresh.
    ///
    pub fn add_revcomp_motifs(&self) -> Result<(Model, Vec<(usize, usize)>)> {
        let mut model = self.clone();
        let mut pairs = Vec::new();
        for g in self.motif_groups() {
            let group = &self.groups[g];
            let chain = group.chain();
            let n = chain.len();
            let mut rc = Array2::zeros((n, N_EMISSIONS));
            for i in 0..n {
                for k in 0..N_EMISSIONS {
                    rc[[i, k]] = self.emission[[chain[n - 1 - i], N_EMISSIONS - 1 - k]];
                }
            }
            let motif_len = n - group.pad_left - group.pad_right;
            let core = group.core();
            let insertions: Vec<usize> = group
                .insertions()
                .iter()
                .filter_map(|&ins| {
                    let before = self.pred[ins].iter().find(|&&p| p != ins)?;
                    let position = core.iter().position(|s| s == before)? + 1;
                    Some(motif_len - position)
                })
                .collect();
            let self_transition = group
                .insertions()
                .iter()
                .any(|&ins| self.transition[[ins, ins]] > 0.0);
            let layout = MotifLayout {
                insertions,
                self_transition,
                pad_left: group.pad_right,
                pad_right: group.pad_left,
            };
            let entry = self.transition[[BG_STATE, group.first()]];
            let h = model.add_chain(&rc, entry, &format!("{}_rc", group.name), &layout)?;
            pairs.push((g, h));
        }
        Ok((model, pairs))
    }
}

//
// structural mutation
//
impl Model {
    ///
    /// Copy of the model with a new state at index `at` in `group`.
    ///
    /// Existing states `>= at` are shifted by one. The new state has the given
    /// emission and no transitions yet: the caller wires it and calls `finalize`.
    ///
    pub fn with_state_inserted(&self, at: usize, group: usize, emission: &[f64]) -> Model {
        let n = self.n_states();
        let map = |i: usize| if i >= at { i + 1 } else { i };
        let mut t = Array2::zeros((n + 1, n + 1));
        let mut e = Array2::zeros((n + 1, N_EMISSIONS));
        for i in 0..n {
            for j in self.succ[i].iter().copied() {
                t[[map(i), map(j)]] = self.transition[[i, j]];
            }
            e.row_mut(map(i)).assign(&self.emission.row(i));
        }
        for (k, &x) in emission.iter().enumerate() {
            e[[at, k]] = x;
        }
        normalize_row(e.row_mut(at));

        let mut groups = self.groups.clone();
        for g in groups.iter_mut() {
            for s in g.states.iter_mut() {
                *s = map(*s);
            }
        }
        let position = groups[group]
            .states
            .iter()
            .position(|&s| s > at)
            .unwrap_or(groups[group].states.len());
        groups[group].states.insert(position, at);
        let mut group_ids = self.group_ids.clone();
        group_ids.insert(at, group);

        let mut model = Model {
            groups,
            group_ids,
            transition: t,
            emission: e,
            pred: Vec::new(),
            succ: Vec::new(),
            class_params: self.class_params.clone(),
        };
        model.finalize();
        model
    }
    ///
    /// Copy of the model without `state`. The state is marginalized out:
    ///
    /// ```text
    /// T'[i][j] = T[i][j] + T[i][s] T[s][j] / (1 - T[s][s])
    /// ```
    ///
    /// so a path that went through the removed state now skips it.
    ///
    pub fn with_state_removed(&self, state: usize) -> Model {
        let n = self.n_states();
        let map = |i: usize| if i > state { i - 1 } else { i };
        let stay = self.transition[[state, state]];
        let mut t = Array2::zeros((n - 1, n - 1));
        let mut e = Array2::zeros((n - 1, N_EMISSIONS));
        for i in (0..n).filter(|&i| i != state) {
            for j in (0..n).filter(|&j| j != state) {
                let through = if stay < 1.0 {
                    self.transition[[i, state]] * self.transition[[state, j]] / (1.0 - stay)
                } else {
                    0.0
                };
                t[[map(i), map(j)]] = self.transition[[i, j]] + through;
            }
            e.row_mut(map(i)).assign(&self.emission.row(i));
        }
        normalize_rows(&mut t);

        let mut groups = self.groups.clone();
        for g in groups.iter_mut() {
            g.states.retain(|&s| s != state);
            for s in g.states.iter_mut() {
                *s = map(*s);
            }
        }
        let mut group_ids = self.group_ids.clone();
        group_ids.remove(state);

        let mut model = Model {
            groups,
            group_ids,
            transition: t,
            emission: e,
            pred: Vec::new(),
            succ: Vec::new(),
            class_params: self.class_params.clone(),
        };
        model.finalize();
        model
    }
}
