///
/// Log-space probability used by max-product (Viterbi) decoding
/// and likelihood reporting.
///

///
/// Wrapper of f64 that stores `log p` of a probability `0 <= p <= 1`
///
/// Only the max-product operations are defined: products are sums of logs,
/// and the order of `Prob` is the order of `p`.
///
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Prob(f64);

///
/// short-hand of `Prob::from_prob`
///
pub fn p(p: f64) -> Prob {
    Prob::from_prob(p)
}

///
/// short-hand of `Prob::from_log_prob`
///
pub fn lp(lp: f64) -> Prob {
    Prob::from_log_prob(lp)
}

impl Prob {
    pub fn from_prob(value: f64) -> Prob {
        Prob(value.ln())
    }
    pub fn from_log_prob(log_value: f64) -> Prob {
        Prob(log_value)
    }
    /// `p = 0`, the identity of max
    pub fn zero() -> Prob {
        Prob(f64::NEG_INFINITY)
    }
    /// `p = 1`, the identity of product
    pub fn one() -> Prob {
        Prob(0.0)
    }
    ///
    /// Get the probability (in `[0, 1]`)
    pub fn to_value(self) -> f64 {
        self.0.exp()
    }
    ///
    /// Get the log probability
    pub fn to_log_value(self) -> f64 {
        self.0
    }
    ///
    /// Is `p == 0` or not? (log p = -inf)
    ///
    pub fn is_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

/// `log(px * py) = log(px) + log(py)`
impl std::ops::Mul for Prob {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        Prob(self.0 + other.0)
    }
}
