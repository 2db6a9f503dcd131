//!
//! Discriminative statistics of motif occurrences and their derivatives
//!
//! Every statistic is computed from one `SeqScore` per sequence, grouped by the
//! sets of a contrast, and returns its partial derivatives with respect to each
//! sequence's occurrence posterior and log-likelihood. Contingency tables get a
//! pseudo-count in every cell. Information is measured in bits.
//!
use crate::error::{ensure_finite, Result};
use crate::hmm::ClassParams;
use std::f64::consts::LN_2;

///
/// What a statistic sees of one sequence
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeqScore {
    /// `P(at least one occurrence | x)`
    pub posterior: f64,
    pub log_likelihood: f64,
    pub weight: f64,
}

///
/// Value of a statistic and `d score / d posterior`, `d score / d log_likelihood`
/// of each sequence, indexed `[set][seq]`
///
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub d_posterior: Vec<Vec<f64>>,
    pub d_log_likelihood: Vec<Vec<f64>>,
}

impl Evaluation {
    fn zeros(sets: &[Vec<SeqScore>]) -> Self {
        Evaluation {
            score: 0.0,
            d_posterior: sets.iter().map(|s| vec![0.0; s.len()]).collect(),
            d_log_likelihood: sets.iter().map(|s| vec![0.0; s.len()]).collect(),
        }
    }
    fn checked(self, what: &str) -> Result<Self> {
        ensure_finite(self.score, what)?;
        for d in self.d_posterior.iter().chain(self.d_log_likelihood.iter()) {
            for &x in d {
                ensure_finite(x, what)?;
            }
        }
        Ok(self)
    }
}

///
/// Expected occurrence counts per class: `counts[c] = [absent, present]`
///
#[derive(Clone, Debug, PartialEq)]
pub struct Contingency {
    pub counts: Vec<[f64; 2]>,
}

impl Contingency {
    pub fn from_classes<'a, I>(classes: I, pseudo_count: f64) -> Self
    where
        I: IntoIterator<Item = &'a [SeqScore]>,
    {
        let counts = classes
            .into_iter()
            .map(|seqs| {
                let mut row = [pseudo_count, pseudo_count];
                for s in seqs {
                    row[0] += s.weight * (1.0 - s.posterior);
                    row[1] += s.weight * s.posterior;
                }
                row
            })
            .collect();
        Contingency { counts }
    }
    pub fn total(&self) -> f64 {
        self.counts.iter().map(|r| r[0] + r[1]).sum()
    }
    pub fn occurrence_total(&self, o: usize) -> f64 {
        self.counts.iter().map(|r| r[o]).sum()
    }
    ///
    /// `I(class; occurrence)` in bits
    ///
    pub fn mutual_information(&self) -> f64 {
        let n = self.total();
        let n_o = [self.occurrence_total(0), self.occurrence_total(1)];
        let mut mi = 0.0;
        for row in self.counts.iter() {
            let n_c = row[0] + row[1];
            for o in 0..2 {
                if row[o] > 0.0 {
                    mi += row[o] / n * (row[o] * n / (n_c * n_o[o])).ln();
                }
            }
        }
        mi / LN_2
    }
    ///
    /// Change of the mutual information when unit mass of class `c` moves from
    /// absent to present:
    ///
    /// ```text
    /// (ln(n_c1 / n_c0) - ln(n_1 / n_0)) / (N ln 2)
    /// ```
    ///
    pub fn mi_gradient(&self, c: usize) -> f64 {
        let n = self.total();
        let row = self.counts[c];
        ((row[1] / row[0]).ln() - (self.occurrence_total(1) / self.occurrence_total(0)).ln())
            / (n * LN_2)
    }
}

///
/// Mutual information of set membership and motif occurrence
///
pub fn mutual_information(sets: &[Vec<SeqScore>], pseudo_count: f64) -> Result<Evaluation> {
    let table = Contingency::from_classes(sets.iter().map(|s| s.as_slice()), pseudo_count);
    let mut eval = Evaluation::zeros(sets);
    eval.score = table.mutual_information();
    for (c, set) in sets.iter().enumerate() {
        let g = table.mi_gradient(c);
        for (i, s) in set.iter().enumerate() {
            eval.d_posterior[c][i] = s.weight * g;
        }
    }
    eval.checked("mutual information")
}

///
/// Rank information: sequences are ranked in the order of the sets and of the
/// sequences within each set. The score is the mean over all cut points of the
/// mutual information of (rank above the cut) and motif occurrence.
///
pub fn rank_information(sets: &[Vec<SeqScore>], pseudo_count: f64) -> Result<Evaluation> {
    let ranked: Vec<SeqScore> = sets.iter().flatten().copied().collect();
    let n = ranked.len();
    let mut eval = Evaluation::zeros(sets);
    if n < 2 {
        return Ok(eval);
    }

    // prefix sums of present/absent mass
    let mut prefix = vec![[0.0, 0.0]; n + 1];
    for (r, s) in ranked.iter().enumerate() {
        prefix[r + 1][0] = prefix[r][0] + s.weight * (1.0 - s.posterior);
        prefix[r + 1][1] = prefix[r][1] + s.weight * s.posterior;
    }
    let total = prefix[n];

    // per cut k (top = ranks < k): score, and gradients of top/bottom members
    let n_cuts = (n - 1) as f64;
    let mut top_d = vec![0.0; n];
    let mut bottom_d = vec![0.0; n];
    for k in 1..n {
        let top = [prefix[k][0] + pseudo_count, prefix[k][1] + pseudo_count];
        let bottom = [
            total[0] - prefix[k][0] + pseudo_count,
            total[1] - prefix[k][1] + pseudo_count,
        ];
        let table = Contingency {
            counts: vec![top, bottom],
        };
        eval.score += table.mutual_information() / n_cuts;
        top_d[k] = table.mi_gradient(0) / n_cuts;
        bottom_d[k] = table.mi_gradient(1) / n_cuts;
    }

    // rank r is in the top for cuts k > r, in the bottom for cuts k <= r
    let mut top_suffix = vec![0.0; n + 1];
    for k in (1..n).rev() {
        top_suffix[k] = top_suffix[k + 1] + top_d[k];
    }
    let mut bottom_prefix = 0.0;
    let mut r = 0;
    for (c, set) in sets.iter().enumerate() {
        for (i, s) in set.iter().enumerate() {
            if r >= 1 {
                bottom_prefix += bottom_d[r];
            }
            eval.d_posterior[c][i] = s.weight * (top_suffix[r + 1] + bottom_prefix);
            r += 1;
        }
    }
    eval.checked("rank information")
}

///
/// Sums of weights and of weighted posteriors over signal and control sets
///
struct TwoClass {
    signal: [f64; 2],
    control: [f64; 2],
}

impl TwoClass {
    fn new(sets: &[Vec<SeqScore>], signal: &[bool]) -> Self {
        let mut t = TwoClass {
            signal: [0.0, 0.0],
            control: [0.0, 0.0],
        };
        for (set, &is_signal) in sets.iter().zip(signal.iter()) {
            let row = if is_signal {
                &mut t.signal
            } else {
                &mut t.control
            };
            for s in set {
                row[0] += s.weight;
                row[1] += s.weight * s.posterior;
            }
        }
        t
    }
}

///
/// Matthews correlation coefficient of (signal set) and (occurrence)
///
pub fn matthews_correlation(
    sets: &[Vec<SeqScore>],
    signal: &[bool],
    pseudo_count: f64,
) -> Result<Evaluation> {
    let t = TwoClass::new(sets, signal);
    let tp = t.signal[1] + pseudo_count;
    let fn_ = t.signal[0] - t.signal[1] + pseudo_count;
    let fp = t.control[1] + pseudo_count;
    let tn = t.control[0] - t.control[1] + pseudo_count;
    let a = tp + fp;
    let b = tp + fn_;
    let c = tn + fp;
    let d = tn + fn_;
    let den = (a * b * c * d).sqrt();
    let mcc = (tp * tn - fp * fn_) / den;
    let common = mcc / 2.0 * (1.0 / a - 1.0 / d);
    let d_signal = c / den - common;
    let d_control = -b / den - common;

    let mut eval = Evaluation::zeros(sets);
    eval.score = mcc;
    for (k, set) in sets.iter().enumerate() {
        let g = if signal[k] { d_signal } else { d_control };
        for (i, s) in set.iter().enumerate() {
            eval.d_posterior[k][i] = s.weight * g;
        }
    }
    eval.checked("matthews correlation coefficient")
}

///
/// Mean log-likelihood of the signal sets minus that of the control sets
///
pub fn loglik_difference(sets: &[Vec<SeqScore>], signal: &[bool]) -> Result<Evaluation> {
    let t = TwoClass::new(sets, signal);
    let mut eval = Evaluation::zeros(sets);
    for (k, set) in sets.iter().enumerate() {
        let (z, sign) = if signal[k] {
            (t.signal[0], 1.0)
        } else {
            (t.control[0], -1.0)
        };
        for (i, s) in set.iter().enumerate() {
            eval.score += sign * s.weight * s.log_likelihood / z;
            eval.d_log_likelihood[k][i] = sign * s.weight / z;
        }
    }
    eval.checked("log-likelihood difference")
}

///
/// Frequency of sequences with an occurrence in the signal sets minus that in
/// the control sets
///
pub fn frequency_difference(
    sets: &[Vec<SeqScore>],
    signal: &[bool],
    pseudo_count: f64,
) -> Result<Evaluation> {
    let t = TwoClass::new(sets, signal);
    let z_signal = t.signal[0] + 2.0 * pseudo_count;
    let z_control = t.control[0] + 2.0 * pseudo_count;
    let mut eval = Evaluation::zeros(sets);
    eval.score = (t.signal[1] + pseudo_count) / z_signal - (t.control[1] + pseudo_count) / z_control;
    for (k, set) in sets.iter().enumerate() {
        let g = if signal[k] {
            1.0 / z_signal
        } else {
            -1.0 / z_control
        };
        for (i, s) in set.iter().enumerate() {
            eval.d_posterior[k][i] = s.weight * g;
        }
    }
    eval.checked("frequency difference")
}

///
/// Log-likelihood of the set labels under the class posterior
///
/// ```text
/// P(c | x) ∝ P(c) (r_c p / rho + (1 - r_c)(1 - p) / (1 - rho))
/// ```
///
/// with `p` the occurrence posterior, `r_c = P(occurrence | c)` and
/// `rho = sum_c P(c) r_c`.
///
pub fn class_likelihood(sets: &[Vec<SeqScore>], params: &ClassParams) -> Result<Evaluation> {
    let prior = &params.class_prior;
    let r = &params.motif_prior;
    let rho: f64 = prior.iter().zip(r.iter()).map(|(pi, r)| pi * r).sum();
    let slope: Vec<f64> = r.iter().map(|r| r / rho - (1.0 - r) / (1.0 - rho)).collect();

    let mut eval = Evaluation::zeros(sets);
    for (c, set) in sets.iter().enumerate() {
        for (i, s) in set.iter().enumerate() {
            let p = s.posterior;
            let num: Vec<f64> = r
                .iter()
                .map(|r| r * p / rho + (1.0 - r) * (1.0 - p) / (1.0 - rho))
                .collect();
            let z: f64 = prior.iter().zip(num.iter()).map(|(pi, x)| pi * x).sum();
            let dz: f64 = prior.iter().zip(slope.iter()).map(|(pi, a)| pi * a).sum();
            eval.score += s.weight * (prior[c] * num[c] / z).ln();
            eval.d_posterior[c][i] = s.weight * (slope[c] / num[c] - dz / z);
        }
    }
    eval.checked("class likelihood")
}

///
/// Maximum a posteriori class parameters given the current posteriors.
/// Either part is kept fixed on request.
///
pub fn reestimate_class_params(
    sets: &[Vec<SeqScore>],
    params: &ClassParams,
    pseudo_count: f64,
    learn_class_prior: bool,
    learn_motif_prior: bool,
) -> ClassParams {
    let weights: Vec<f64> = sets
        .iter()
        .map(|set| set.iter().map(|s| s.weight).sum())
        .collect();
    let total: f64 = weights.iter().sum();
    let class_prior = if learn_class_prior {
        weights
            .iter()
            .map(|w| (w + pseudo_count) / (total + sets.len() as f64 * pseudo_count))
            .collect()
    } else {
        params.class_prior.clone()
    };
    let motif_prior = if learn_motif_prior {
        sets.iter()
            .zip(weights.iter())
            .map(|(set, w)| {
                let present: f64 = set.iter().map(|s| s.weight * s.posterior).sum();
                (present + pseudo_count) / (w + 2.0 * pseudo_count)
            })
            .collect()
    } else {
        params.motif_prior.clone()
    };
    ClassParams {
        class_prior,
        motif_prior,
    }
}

///
/// `I(class; A | B)` in bits from joint occurrence posteriors
/// (`table[a][b]` per sequence, see `Model::posterior_pair`)
///
pub fn conditional_mutual_information(
    sets: &[Vec<([[f64; 2]; 2], f64)>],
    pseudo_count: f64,
) -> Result<f64> {
    // n[c][a][b]
    let n: Vec<[[f64; 2]; 2]> = sets
        .iter()
        .map(|set| {
            let mut t = [[pseudo_count; 2]; 2];
            for (table, w) in set {
                for a in 0..2 {
                    for b in 0..2 {
                        t[a][b] += w * table[a][b];
                    }
                }
            }
            t
        })
        .collect();
    let total: f64 = n.iter().flatten().flatten().sum();
    let n_b = |b: usize| -> f64 { n.iter().map(|t| t[0][b] + t[1][b]).sum() };
    let n_ab = |a: usize, b: usize| -> f64 { n.iter().map(|t| t[a][b]).sum() };
    let mut cmi = 0.0;
    for t in n.iter() {
        for a in 0..2 {
            for b in 0..2 {
                let x = t[a][b];
                if x > 0.0 {
                    let n_cb = t[0][b] + t[1][b];
                    cmi += x / total * (x * n_b(b) / (n_cb * n_ab(a, b))).ln();
                }
            }
        }
    }
    ensure_finite(cmi / LN_2, "conditional mutual information")
}
