//!
//! Profile HMM of motifs embedded in a background
//!
//! * `model`: states, groups, transition/emission parameters and `add_motif`
//! * `forward`, `backward`: scaled recursions
//! * `viterbi`: max-product decoding
//! * `counts`: expected/hard sufficient statistics
//! * `posterior`: probability of at least one motif occurrence
//! * `summary`: consensus, information content and occurrence reports
//! * `io`: text parameter file
//!
pub mod backward;
pub mod counts;
pub mod forward;
pub mod io;
pub mod model;
pub mod posterior;
pub mod summary;
pub mod viterbi;

pub use counts::Counts;
pub use forward::Forward;
pub use model::{ClassParams, Group, GroupKind, Model, MotifLayout, BG_STATE, START_STATE};
pub use viterbi::ViterbiPath;
