//!
//! Errors raised while building, training and (de)serializing models
//!
use crate::measure::Measure;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// insertion positions are 1-based and must satisfy `0 < position < motif_len`
    #[error("insertion at position {position} is not inside the motif of length {motif_len}")]
    InsertionNotInsideMotif { position: usize, motif_len: usize },

    #[error("invalid nucleotide character {0:?}")]
    InvalidNucleotide(char),

    #[error("parameter file {0:?} does not exist")]
    ParameterFileMissing(PathBuf),

    #[error("could not read parameter file {path:?}: {source}")]
    ParameterFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `line` is 1-based
    #[error("syntax error in parameter file at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unsupported parameter file format version {0}")]
    UnsupportedVersion(usize),

    /// a score or a statistic became infinite or NaN
    #[error("calculation produced infinity: {0}")]
    Infinity(String),

    #[error("unknown measure {0:?}")]
    UnknownMeasure(String),

    #[error("unknown motif {0:?}")]
    UnknownMotif(String),

    #[error("unknown contrast {0:?}")]
    UnknownContrast(String),

    #[error("gradient is not implemented for measure {0}")]
    GradientNotImplemented(Measure),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

///
/// Turn a non-finite value into `Error::Infinity`
///
pub fn ensure_finite(value: f64, what: &str) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::Infinity(format!("{} = {}", what, value)))
    }
}
