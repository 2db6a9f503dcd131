//!
//! Sequence collections grouped into sets and contrasts
//!
//! A `Contrast` is a labeled group of `Set`s (e.g. signal and control). A set
//! lists the names of the motifs expected to be enriched in it; discriminative
//! objectives treat sets containing a motif as its signal class.
//!
use crate::common::{encode, Sequence};
use crate::error::{Error, Result};
use std::collections::BTreeSet;

///
/// An encoded sequence with a weight
///
#[derive(Clone, Debug, PartialEq)]
pub struct Seq {
    pub name: String,
    pub symbols: Sequence,
    pub weight: f64,
}

impl Seq {
    pub fn new(name: &str, symbols: Sequence) -> Self {
        Seq {
            name: name.to_string(),
            symbols,
            weight: 1.0,
        }
    }
    pub fn from_str(name: &str, s: &str) -> Result<Self> {
        Ok(Seq::new(name, encode(s)?))
    }
    pub fn len(&self) -> usize {
        self.symbols.len()
    }
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
    ///
    /// weight used in statistics; `1` unless weighting is enabled
    ///
    pub fn effective_weight(&self, weighting: bool) -> f64 {
        if weighting {
            self.weight
        } else {
            1.0
        }
    }
}

impl AsRef<[u8]> for Seq {
    fn as_ref(&self) -> &[u8] {
        &self.symbols
    }
}

#[derive(Clone, Debug, Default)]
pub struct Set {
    pub name: String,
    /// names of the motifs enriched in this set
    pub motifs: BTreeSet<String>,
    pub seqs: Vec<Seq>,
}

impl Set {
    pub fn new(name: &str, motifs: &[&str], seqs: Vec<Seq>) -> Self {
        Set {
            name: name.to_string(),
            motifs: motifs.iter().map(|m| m.to_string()).collect(),
            seqs,
        }
    }
    ///
    /// Is any of the motifs enriched in this set
    ///
    pub fn is_signal_for<S: AsRef<str>>(&self, motifs: &[S]) -> bool {
        motifs.iter().any(|m| self.motifs.contains(m.as_ref()))
    }
    pub fn total_weight(&self, weighting: bool) -> f64 {
        self.seqs.iter().map(|s| s.effective_weight(weighting)).sum()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Contrast {
    pub name: String,
    pub sets: Vec<Set>,
}

impl Contrast {
    pub fn new(name: &str, sets: Vec<Set>) -> Self {
        Contrast {
            name: name.to_string(),
            sets,
        }
    }
    pub fn n_seqs(&self) -> usize {
        self.sets.iter().map(|s| s.seqs.len()).sum()
    }
    pub fn seqs(&self) -> impl Iterator<Item = &Seq> + '_ {
        self.sets.iter().flat_map(|s| s.seqs.iter())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Collection {
    pub contrasts: Vec<Contrast>,
}

impl Collection {
    pub fn new(contrasts: Vec<Contrast>) -> Self {
        Collection { contrasts }
    }
    pub fn n_seqs(&self) -> usize {
        self.contrasts.iter().map(|c| c.n_seqs()).sum()
    }
    pub fn seqs(&self) -> impl Iterator<Item = &Seq> + '_ {
        self.contrasts.iter().flat_map(|c| c.seqs())
    }
    ///
    /// Contrasts selected by name. An empty selection means every contrast.
    ///
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Contrast>> {
        if names.is_empty() {
            return Ok(self.contrasts.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.contrasts
                    .iter()
                    .find(|c| c.name == name.as_ref())
                    .ok_or_else(|| Error::UnknownContrast(name.as_ref().to_string()))
            })
            .collect()
    }
    ///
    /// Every sequence of the selected contrasts
    ///
    pub fn select_seqs<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Seq>> {
        Ok(self
            .select(names)?
            .into_iter()
            .flat_map(|c| c.seqs())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> Collection {
        let signal = Set::new(
            "signal",
            &["m1"],
            vec![
                Seq::from_str("s1", "ACGT").unwrap(),
                Seq::from_str("s2", "ACGTT").unwrap(),
            ],
        );
        let control = Set::new("control", &[], vec![Seq::from_str("c1", "TTT").unwrap()]);
        Collection::new(vec![Contrast::new("main", vec![signal, control])])
    }

    #[test]
    fn select_contrasts() {
        let data = mock();
        assert_eq!(data.n_seqs(), 3);
        assert_eq!(data.select::<&str>(&[]).unwrap().len(), 1);
        assert_eq!(data.select(&["main"]).unwrap()[0].n_seqs(), 3);
        assert!(matches!(
            data.select(&["other"]),
            Err(Error::UnknownContrast(_))
        ));
        assert_eq!(data.select_seqs(&["main"]).unwrap().len(), 3);
    }

    #[test]
    fn signal_sets() {
        let data = mock();
        let c = &data.contrasts[0];
        assert!(c.sets[0].is_signal_for(&["m1"]));
        assert!(!c.sets[1].is_signal_for(&["m1"]));
        assert!(!c.sets[0].is_signal_for(&["m2"]));
        assert_eq!(c.sets[0].total_weight(false), 2.0);
    }
}
