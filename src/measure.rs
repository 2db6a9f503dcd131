//!
//! Objective functions a model can be scored or trained with
//!
use crate::error::Error;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum Measure {
    /// no learning
    None,
    /// Baum-Welch likelihood
    Likelihood,
    /// likelihood of the Viterbi path
    Viterbi,
    /// mutual information of class and motif occurrence
    MutualInformation,
    /// mean mutual information over all cut points of a ranked set
    RankInformation,
    /// class posterior (MMIE)
    ClassLikelihood,
    /// Matthews correlation coefficient
    MatthewsCorrelation,
    /// log-likelihood difference of signal and control
    LogLikelihoodDifference,
    /// difference of the frequency of sequences with an occurrence
    FrequencyDifference,
}

impl Measure {
    pub fn is_generative(&self) -> bool {
        matches!(self, Measure::Likelihood | Measure::Viterbi)
    }
    pub fn is_discriminative(&self) -> bool {
        !self.is_generative() && *self != Measure::None
    }
    ///
    /// needs signal/control labels (two classes) on the contrast
    ///
    pub fn is_two_class(&self) -> bool {
        matches!(
            self,
            Measure::MatthewsCorrelation
                | Measure::LogLikelihoodDifference
                | Measure::FrequencyDifference
        )
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Measure::None => "none",
            Measure::Likelihood => "bw",
            Measure::Viterbi => "viterbi",
            Measure::MutualInformation => "mi",
            Measure::RankInformation => "ri",
            Measure::ClassLikelihood => "mmie",
            Measure::MatthewsCorrelation => "mcc",
            Measure::LogLikelihoodDifference => "dlogl",
            Measure::FrequencyDifference => "dfreq",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Measure {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Measure::None),
            "bw" | "ml" | "likelihood" => Ok(Measure::Likelihood),
            "viterbi" => Ok(Measure::Viterbi),
            "mi" | "mico" => Ok(Measure::MutualInformation),
            "ri" | "rank" => Ok(Measure::RankInformation),
            "mmie" => Ok(Measure::ClassLikelihood),
            "mcc" => Ok(Measure::MatthewsCorrelation),
            "dlogl" => Ok(Measure::LogLikelihoodDifference),
            "dfreq" => Ok(Measure::FrequencyDifference),
            _ => Err(Error::UnknownMeasure(s.to_string())),
        }
    }
}
