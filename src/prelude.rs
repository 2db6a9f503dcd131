//!
//! globally-available parts
//!
pub use crate::common::{decode, encode, Sequence, Symbol};
pub use crate::data::{Collection, Contrast, Seq, Set};
pub use crate::error::{Error, Result};
pub use crate::hmm::{Model, MotifLayout};
pub use crate::measure::Measure;
pub use crate::options::Options;
pub use crate::score::compute_score;
pub use crate::train::{train, TrainingResult};
