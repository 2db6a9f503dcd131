//!
//! Parameter learning
//!
//! Training is split into tasks (see `task`). Generative tasks run one
//! Baum-Welch or Viterbi re-estimation per iteration, discriminative tasks one
//! line search along a (conjugate) gradient of their objective.
//!
pub mod driver;
pub mod gradient;
pub mod linesearch;
pub mod objective;
pub mod reestimation;
pub mod task;
pub mod termination;

pub use driver::{train, TaskScore, TrainingResult};
pub use gradient::Gradient;
pub use linesearch::{exponential_search, more_thuente, LineSearchResult};
pub use task::{define_training_tasks, Targets, Task};
pub use termination::{ConvergenceReason, Monitor};
