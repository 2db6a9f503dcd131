//!
//! Summary statistics and reports of a model
//!
use super::model::{Model, BG_STATE, START_STATE};
use crate::common::{decode, decode_symbol, symbol_from_support, Symbol, N_EMISSIONS};
use itertools::Itertools;

///
/// An occurrence of a motif group on a decoded path
///
#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    pub group: usize,
    /// 0-based start position in the sequence
    pub start: usize,
    /// exclusive end position
    pub end: usize,
    pub site: String,
    /// `sum log(E[state][x] / E[bg][x])` along the run
    pub log_odds: f64,
}

///
/// Consensus letter of one emission distribution.
///
/// A single nucleotide if it has at least half of the mass and twice the second
/// best, otherwise the two-letter code if the best two have 3/4 of the mass, the
/// three-letter code if the best three have 0.9, and `N` otherwise.
///
pub fn consensus_letter(dist: &[f64]) -> char {
    let order: Vec<usize> = (0..N_EMISSIONS)
        .sorted_by(|&a, &b| dist[b].total_cmp(&dist[a]))
        .collect();
    let p = |i: usize| dist[order[i]];
    let letter = if p(0) >= 0.5 && p(0) >= 2.0 * p(1) {
        symbol_from_support(&order[..1])
    } else if p(0) + p(1) >= 0.75 {
        symbol_from_support(&order[..2])
    } else if p(0) + p(1) + p(2) >= 0.9 {
        symbol_from_support(&order[..3])
    } else {
        symbol_from_support(&order[..4])
    };
    decode_symbol(letter)
}

impl Model {
    ///
    /// Consensus string of the chain states of a group
    ///
    pub fn consensus(&self, group: usize) -> String {
        self.group(group)
            .chain()
            .iter()
            .map(|&s| consensus_letter(self.emission.row(s).as_slice().unwrap_or(&[0.25; 4])))
            .collect()
    }
    ///
    /// Number of chain states (core and padding) of a group
    ///
    pub fn motif_length(&self, group: usize) -> usize {
        self.group(group).chain().len()
    }
    ///
    /// Information content in bits of one state's emission against a uniform background
    ///
    pub fn position_information(&self, state: usize) -> f64 {
        self.emission
            .row(state)
            .iter()
            .filter(|&&x| x > 0.0)
            .map(|&x| x * (x / 0.25).log2())
            .sum()
    }
    ///
    /// Information content in bits summed over the chain states of a group
    ///
    pub fn information_content(&self, group: usize) -> f64 {
        self.group(group)
            .chain()
            .iter()
            .map(|&s| self.position_information(s))
            .sum()
    }
    ///
    /// One symbol per position: `-` for background, otherwise the group index
    /// (modulo 10) of the state
    ///
    pub fn path_to_string_group(&self, path: &[usize]) -> String {
        path.iter()
            .map(|&s| match self.group_id(s) {
                g if g == self.group_id(BG_STATE) || g == self.group_id(START_STATE) => '-',
                g => std::char::from_digit((g % 10) as u32, 10).unwrap_or('?'),
            })
            .collect()
    }
    ///
    /// State indices separated by spaces
    ///
    pub fn path_to_string_state(&self, path: &[usize]) -> String {
        path.iter().join(" ")
    }
    ///
    /// Motif occurrences along the Viterbi path of a sequence
    ///
    pub fn sites(&self, seq: &[Symbol]) -> Vec<Site> {
        let path = self.viterbi(seq).states;
        let mut sites = Vec::new();
        let mut t = 0;
        while t < path.len() {
            let g = self.group_id(path[t]);
            if !self.group(g).is_motif() {
                t += 1;
                continue;
            }
            let start = t;
            let mut log_odds = 0.0;
            while t < path.len() && self.group_id(path[t]) == g {
                log_odds += (self.emit(path[t], seq[t]) / self.emit(BG_STATE, seq[t])).ln();
                t += 1;
            }
            sites.push(Site {
                group: g,
                start,
                end: t,
                site: decode(&seq[start..t]),
                log_odds,
            });
        }
        sites
    }
    ///
    /// Graphviz rendering of the transitions with probability above `threshold`
    ///
    pub fn to_dot(&self, threshold: f64) -> String {
        let mut s = String::from("digraph {\n");
        for state in 0..self.n_states() {
            let group = self.group(self.group_id(state));
            let label = if self.is_emitting(state) {
                let row = self.emission.row(state);
                format!(
                    "{}:{}\\n{}",
                    group.name,
                    state,
                    consensus_letter(row.as_slice().unwrap_or(&[0.25; 4]))
                )
            } else {
                format!("{}:{}", group.name, state)
            };
            s.push_str(&format!("  {} [label=\"{}\"];\n", state, label));
        }
        for i in 0..self.n_states() {
            for &j in self.succ(i) {
                let p = self.transition[[i, j]];
                if p > threshold {
                    s.push_str(&format!("  {} -> {} [label=\"{:.3}\"];\n", i, j, p));
                }
            }
        }
        s.push_str("}\n");
        s
    }
}
