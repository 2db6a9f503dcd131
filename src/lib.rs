//!
//! Profile HMMs of DNA motifs in a background model
//!
//! * `hmm`: model topology, inference and parameter file
//! * `stats`: discriminative statistics and their derivatives
//! * `train`: generative and discriminative learning
//! * `mcmc`: structure sampling by parallel tempering
//! * `score`: scoring of motif selections
//!
pub mod common;
pub mod data;
pub mod error;
pub mod hmm;
pub mod matrix;
pub mod mcmc;
pub mod measure;
pub mod options;
pub mod prelude;
pub mod prob;
pub mod random_seq;
pub mod score;
pub mod stats;
pub mod train;

#[cfg(test)]
#[macro_use]
extern crate approx;
