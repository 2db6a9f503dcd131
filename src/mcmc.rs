//!
//! Markov chain monte carlo over model structures
//!
//! Parallel tempering: one chain per temperature `T, T/2, T/4, ...`. Every
//! iteration each chain takes one Metropolis step at its own temperature, then
//! adjacent chains try to exchange their states. The last chain is the coldest
//! one and its trajectory is the reported sample.
//!
pub mod proposal;

use crate::error::Result;
use log::debug;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

pub trait SAState: Clone + Send {
    /// Score of the state, to be maximized
    fn score(&self) -> f64;
    /// get a randomly-picked neighbor state (using rng) with its score
    fn next<R: Rng>(&self, rng: &mut R) -> Result<Self>;
    /// output for logging
    fn as_string(&self) -> String;
}

///
/// accept a move from score `now` to `next` with prob `min(1, exp((next - now) / T))`
///
pub fn metropolis<R: Rng>(rng: &mut R, now: f64, next: f64, temperature: f64) -> bool {
    let p = ((next - now) / temperature).exp();
    !p.is_nan() && rng.gen_bool(p.min(1f64))
}

///
/// One tempered chain with its own random stream
///
#[derive(Clone, Debug)]
pub struct Chain<S> {
    pub temperature: f64,
    pub state: S,
    /// states visited, recorded every time the state changes
    pub history: Vec<S>,
    pub n_accepted: usize,
    rng: Xoshiro256PlusPlus,
}

impl<S: SAState> Chain<S> {
    fn step(&mut self, iteration: usize) -> Result<()> {
        let next = self.state.next(&mut self.rng)?;
        let accepted = metropolis(
            &mut self.rng,
            self.state.score(),
            next.score(),
            self.temperature,
        );
        debug!(
            "{}\t{:e}\t{}\t{}\t{}\t{}",
            iteration,
            self.temperature,
            self.state.score(),
            next.score(),
            accepted,
            next.as_string()
        );
        if accepted {
            self.state = next;
            self.history.push(self.state.clone());
            self.n_accepted += 1;
        }
        Ok(())
    }
}

///
/// Trajectory of the coldest chain
///
#[derive(Clone, Debug)]
pub struct Sample<S> {
    pub trajectory: Vec<S>,
    /// accepted moves per chain, hottest first
    pub n_accepted: Vec<usize>,
    pub n_swaps: usize,
}

impl<S: SAState> Sample<S> {
    ///
    /// highest scoring state of the trajectory
    ///
    pub fn best(&self) -> Option<&S> {
        self.trajectory
            .iter()
            .filter(|s| !s.score().is_nan())
            .max_by(|a, b| a.score().total_cmp(&b.score()))
    }
    pub fn scores(&self) -> Vec<f64> {
        self.trajectory.iter().map(|s| s.score()).collect()
    }
}

#[derive(Clone, Debug)]
pub struct ParallelTempering {
    /// temperature of the hottest chain
    pub temperature: f64,
    pub n_chains: usize,
    /// iterations between exchange attempts
    pub swap_period: usize,
}

impl ParallelTempering {
    pub fn new(temperature: f64, n_chains: usize, swap_period: usize) -> Self {
        ParallelTempering {
            temperature,
            n_chains: n_chains.max(1),
            swap_period: swap_period.max(1),
        }
    }
    ///
    /// temperatures from the hottest to the coldest chain
    ///
    pub fn temperatures(&self) -> Vec<f64> {
        (0..self.n_chains)
            .map(|i| self.temperature / 2f64.powi(i as i32))
            .collect()
    }
    ///
    /// Run `n_iter` iterations from `init`.
    ///
    /// Chain `i` draws from `rng` advanced by `i + 1` jumps, so the streams do
    /// not overlap; `rng` itself decides the exchanges.
    ///
    pub fn run<S: SAState>(
        &self,
        init: S,
        n_iter: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Sample<S>> {
        let mut stream = rng.clone();
        let mut chains: Vec<Chain<S>> = self
            .temperatures()
            .into_iter()
            .map(|temperature| {
                stream.jump();
                Chain {
                    temperature,
                    state: init.clone(),
                    history: vec![init.clone()],
                    n_accepted: 0,
                    rng: stream.clone(),
                }
            })
            .collect();

        let mut n_swaps = 0;
        for iteration in 0..n_iter {
            chains
                .par_iter_mut()
                .map(|chain| chain.step(iteration))
                .collect::<Result<Vec<()>>>()?;
            if (iteration + 1) % self.swap_period == 0 {
                n_swaps += exchange(&mut chains, rng);
            }
        }

        let n_accepted = chains.iter().map(|c| c.n_accepted).collect();
        let trajectory = chains.pop().map(|c| c.history).unwrap_or_default();
        debug!("parallel tempering finished with {} swaps", n_swaps);
        Ok(Sample {
            trajectory,
            n_accepted,
            n_swaps,
        })
    }
}

///
/// Replica exchange between neighboring chains `i` (hotter) and `i + 1`,
/// accepted with prob `min(1, exp((s_j - s_i)(1/T_i - 1/T_j)))`
///
fn exchange<S: SAState, R: Rng>(chains: &mut [Chain<S>], rng: &mut R) -> usize {
    let mut n_swaps = 0;
    for i in 1..chains.len() {
        let (left, right) = chains.split_at_mut(i);
        let hot = &mut left[i - 1];
        let cold = &mut right[0];
        let log_p = (cold.state.score() - hot.state.score())
            * (1.0 / hot.temperature - 1.0 / cold.temperature);
        let p = log_p.exp();
        if !p.is_nan() && rng.gen_bool(p.min(1f64)) {
            debug!(
                "swap chains {} and {} (scores {} and {})",
                i - 1,
                i,
                hot.state.score(),
                cold.state.score()
            );
            std::mem::swap(&mut hot.state, &mut cold.state);
            hot.history.push(hot.state.clone());
            cold.history.push(cold.state.clone());
            n_swaps += 1;
        }
    }
    n_swaps
}

#[cfg(test)]
mod tests {
    use super::*;

    ///
    /// random walk on integers with a single peak at 10
    ///
    #[derive(Clone, Debug, PartialEq)]
    struct Walk(i64);

    impl SAState for Walk {
        fn score(&self) -> f64 {
            -((self.0 - 10) as f64).powi(2)
        }
        fn next<R: Rng>(&self, rng: &mut R) -> Result<Self> {
            Ok(Walk(self.0 + if rng.gen_bool(0.5) { 1 } else { -1 }))
        }
        fn as_string(&self) -> String {
            format!("{}", self.0)
        }
    }

    #[test]
    fn metropolis_acceptance() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        // improvements are always accepted
        assert!((0..100).all(|_| metropolis(&mut rng, 0.0, 1.0, 1e-3)));
        // large losses at low temperature never
        assert!((0..100).all(|_| !metropolis(&mut rng, 0.0, -1.0, 1e-3)));
        assert!(!metropolis(&mut rng, f64::NEG_INFINITY, f64::NEG_INFINITY, 1.0));
    }

    #[test]
    fn temperature_ladder() {
        let pt = ParallelTempering::new(1.0, 4, 1);
        assert_eq!(pt.temperatures(), vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn coldest_chain_finds_peak() {
        let pt = ParallelTempering::new(4.0, 4, 1);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let sample = pt.run(Walk(0), 300, &mut rng).unwrap();
        assert_eq!(sample.trajectory[0], Walk(0));
        assert_eq!(sample.best().unwrap(), &Walk(10));
        assert_eq!(sample.n_accepted.len(), 4);
    }

    #[test]
    fn reproducible_with_same_seed() {
        let pt = ParallelTempering::new(2.0, 3, 2);
        let run = |seed: u64| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            pt.run(Walk(0), 100, &mut rng).unwrap()
        };
        let a = run(5);
        let b = run(5);
        assert_eq!(a.trajectory, b.trajectory);
        assert_eq!(a.n_swaps, b.n_swaps);
        let c = run(6);
        assert_ne!(a.trajectory, c.trajectory);
    }
}
