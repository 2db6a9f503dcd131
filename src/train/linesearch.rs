//!
//! Line searches along an ascent direction
//!
//! Both searches only evaluate candidates; the caller decides whether to
//! replace its model by the returned one.
//!
//! `more_thuente` follows the safeguarded interval update of Moré and Thuente
//! (as used by liblbfgs), applied to the minimization of `-score`.
//!
use super::gradient::Gradient;
use crate::error::{Error, Result};
use crate::hmm::Model;
use crate::options::LineSearch;
use log::{debug, warn};

///
/// An improving candidate found by a line search
///
#[derive(Clone, Debug)]
pub struct LineSearchResult {
    pub model: Model,
    pub score: f64,
    pub step: f64,
    pub n_evaluations: usize,
}

///
/// evaluation failures that reject a trial step instead of aborting training
///
fn is_trial_failure<T>(r: &Result<T>) -> bool {
    matches!(r, Err(Error::Infinity(_)))
}

///
/// Exponential search: starting at `step`, halve until the score improves over
/// `score0`, then double while it keeps improving. The last improving
/// candidate is kept when a trial fails its health check.
///
/// Returns `None` if no improving step is found within `max_steps` evaluations.
///
pub fn exponential_search<F>(
    model: &Model,
    direction: &Gradient,
    score0: f64,
    step: f64,
    max_steps: usize,
    mut eval: F,
) -> Result<Option<LineSearchResult>>
where
    F: FnMut(&Model) -> Result<f64>,
{
    let mut best: Option<LineSearchResult> = None;
    let mut alpha = step;
    for n in 1..=max_steps {
        let candidate = model.apply_step(direction, alpha);
        let healthy = candidate.check_consistency(1e-6);
        let r = if healthy {
            eval(&candidate)
        } else {
            Err(Error::Infinity("inconsistent candidate".to_string()))
        };
        if r.is_err() && !is_trial_failure(&r) {
            return r.map(|_| None);
        }
        let improved = match (&r, &best) {
            (Ok(score), Some(b)) => *score > b.score,
            (Ok(score), None) => *score > score0,
            _ => false,
        };
        debug!("exponential search step={} score={:?} improved={}", alpha, r.as_ref().ok(), improved);
        if improved {
            best = Some(LineSearchResult {
                model: candidate,
                score: r.unwrap_or(score0),
                step: alpha,
                n_evaluations: n,
            });
            alpha *= 2.0;
        } else if best.is_some() {
            break;
        } else {
            alpha /= 2.0;
        }
    }
    Ok(best)
}

//
// Moré-Thuente
//

/// minimizer of the cubic interpolating (u, fu, du) and (v, fv, dv)
fn cubic_minimizer(u: f64, fu: f64, du: f64, v: f64, fv: f64, dv: f64) -> f64 {
    let d = v - u;
    let theta = (fu - fv) * 3.0 / d + du + dv;
    let s = theta.abs().max(du.abs()).max(dv.abs());
    let a = theta / s;
    let mut gamma = s * (a * a - (du / s) * (dv / s)).max(0.0).sqrt();
    if v < u {
        gamma = -gamma;
    }
    let p = gamma - du + theta;
    let q = gamma - du + gamma + dv;
    u + p / q * d
}

/// same as `cubic_minimizer`, falling back to the interval ends
fn cubic_minimizer2(u: f64, fu: f64, du: f64, v: f64, fv: f64, dv: f64, min: f64, max: f64) -> f64 {
    let d = v - u;
    let theta = (fu - fv) * 3.0 / d + du + dv;
    let s = theta.abs().max(du.abs()).max(dv.abs());
    let a = theta / s;
    let mut gamma = s * (a * a - (du / s) * (dv / s)).max(0.0).sqrt();
    if u < v {
        gamma = -gamma;
    }
    let p = gamma - dv + theta;
    let q = gamma - dv + gamma + du;
    let r = p / q;
    if r < 0.0 && gamma != 0.0 {
        v - r * d
    } else if a < 0.0 {
        max
    } else {
        min
    }
}

/// minimizer of the quadratic interpolating (u, fu, du) and (v, fv)
fn quadratic_minimizer(u: f64, fu: f64, du: f64, v: f64, fv: f64) -> f64 {
    let a = v - u;
    u + du / ((fu - fv) / a + du) / 2.0 * a
}

/// minimizer of the quadratic interpolating (u, du) and (v, dv)
fn quadratic_minimizer2(u: f64, du: f64, v: f64, dv: f64) -> f64 {
    let a = u - v;
    v + dv / (dv - du) * a
}

///
/// End point of the interval of uncertainty: step, function value and derivative
///
#[derive(Clone, Copy, Debug)]
struct Point {
    t: f64,
    f: f64,
    d: f64,
}

///
/// Update the interval `[x, y]` with the trial point `t` and return the next trial
///
fn update_trial_interval(
    x: &mut Point,
    y: &mut Point,
    t: Point,
    tmin: f64,
    tmax: f64,
    width_factor: f64,
    brackt: &mut bool,
) -> Option<f64> {
    let dsign = t.d * x.d.signum() < 0.0;
    if *brackt {
        if t.t <= x.t.min(y.t) || x.t.max(y.t) <= t.t {
            return None;
        }
        if 0.0 <= x.d * (t.t - x.t) || tmax < tmin {
            return None;
        }
    }

    let bound;
    let mut newt;
    if x.f < t.f {
        // higher function value: the minimum is bracketed
        *brackt = true;
        bound = true;
        let mc = cubic_minimizer(x.t, x.f, x.d, t.t, t.f, t.d);
        let mq = quadratic_minimizer(x.t, x.f, x.d, t.t, t.f);
        newt = if (mc - x.t).abs() < (mq - x.t).abs() {
            mc
        } else {
            mc + 0.5 * (mq - mc)
        };
    } else if dsign {
        // derivatives of opposite sign: the minimum is bracketed
        *brackt = true;
        bound = false;
        let mc = cubic_minimizer(x.t, x.f, x.d, t.t, t.f, t.d);
        let mq = quadratic_minimizer2(x.t, x.d, t.t, t.d);
        newt = if (mc - t.t).abs() > (mq - t.t).abs() {
            mc
        } else {
            mq
        };
    } else if t.d.abs() < x.d.abs() {
        // lower value, same sign, decreasing derivative magnitude
        bound = true;
        let mc = cubic_minimizer2(x.t, x.f, x.d, t.t, t.f, t.d, tmin, tmax);
        let mq = quadratic_minimizer2(x.t, x.d, t.t, t.d);
        newt = if *brackt {
            if (t.t - mc).abs() < (t.t - mq).abs() {
                mc
            } else {
                mq
            }
        } else if (t.t - mc).abs() > (t.t - mq).abs() {
            mc
        } else {
            mq
        };
    } else {
        bound = false;
        newt = if *brackt {
            cubic_minimizer(t.t, t.f, t.d, y.t, y.f, y.d)
        } else if x.t < t.t {
            tmax
        } else {
            tmin
        };
    }

    if x.f < t.f {
        *y = t;
    } else {
        if dsign {
            *y = *x;
        }
        *x = t;
    }

    if tmax < newt {
        newt = tmax;
    }
    if newt < tmin {
        newt = tmin;
    }
    if *brackt && bound {
        let mq = x.t + width_factor * (y.t - x.t);
        if x.t < y.t {
            newt = newt.min(mq);
        } else {
            newt = newt.max(mq);
        }
    }
    Some(newt)
}

const MIN_STEP: f64 = 1e-20;
const MAX_STEP: f64 = 1e20;
const XTOL: f64 = 1e-16;

///
/// Moré-Thuente search for a step satisfying the strong Wolfe conditions
///
/// ```text
/// f(a) >= f(0) + mu a f'(0)
/// |f'(a)| <= eta |f'(0)|
/// ```
///
/// `eval` returns the score of a candidate and its gradient; the directional
/// derivative is the gradient dotted with `direction`. `delta` is the minimal
/// shrink of the interval of uncertainty before bisecting.
///
/// When the evaluation budget runs out, the best improving candidate seen is
/// returned, or `None`.
///
pub fn more_thuente<F>(
    model: &Model,
    direction: &Gradient,
    score0: f64,
    gradient0: &Gradient,
    step: f64,
    params: &LineSearch,
    mut eval: F,
) -> Result<Option<LineSearchResult>>
where
    F: FnMut(&Model) -> Result<(f64, Gradient)>,
{
    // minimize phi(a) = -score along the direction
    let dginit = -gradient0.dot(direction);
    if dginit >= 0.0 {
        warn!("line search direction is not an ascent direction");
        return Ok(None);
    }
    let finit = -score0;
    let dgtest = params.mu * dginit;

    let mut stp = step.clamp(MIN_STEP, MAX_STEP);
    let mut brackt = false;
    let mut stage1 = true;
    let mut width = MAX_STEP - MIN_STEP;
    let mut prev_width = 2.0 * width;
    let mut x = Point {
        t: 0.0,
        f: finit,
        d: dginit,
    };
    let mut y = x;
    let mut interval_ok = true;
    let mut best: Option<LineSearchResult> = None;

    for count in 1..=params.max_steps {
        let (stmin, stmax) = if brackt {
            (x.t.min(y.t), x.t.max(y.t))
        } else {
            (x.t, stp + 4.0 * (stp - x.t))
        };
        stp = stp.clamp(MIN_STEP, MAX_STEP);
        if brackt && (stp <= stmin || stp >= stmax || !interval_ok || stmax - stmin <= XTOL * stmax) {
            stp = x.t;
        }

        let candidate = model.apply_step(direction, stp);
        let r = eval(&candidate);
        if r.is_err() && !is_trial_failure(&r) {
            return r.map(|_| None);
        }
        let (score, gradient) = match r {
            Ok(v) => v,
            Err(_) => {
                // no value beyond this step: shrink towards the best point
                debug!("line search trial at step {} failed", stp);
                stp = x.t + 0.5 * (stp - x.t);
                continue;
            }
        };
        let f = -score;
        let dg = -gradient.dot(direction);
        debug!("more-thuente step={} score={} derivative={}", stp, score, -dg);

        let ftest1 = finit + stp * dgtest;
        let result = LineSearchResult {
            model: candidate,
            score,
            step: stp,
            n_evaluations: count,
        };
        if f <= ftest1 && dg.abs() <= params.eta * (-dginit) {
            // strong Wolfe conditions hold
            return Ok(Some(result));
        }
        if score > score0 && best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(result);
        }

        if brackt && (stp <= stmin || stmax <= stp || !interval_ok) {
            debug!("line search stopped by rounding errors");
            break;
        }
        if stp == MAX_STEP && f <= ftest1 && dg <= dgtest {
            break;
        }
        if stp == MIN_STEP && (ftest1 < f || dgtest <= dg) {
            break;
        }
        if brackt && stmax - stmin <= XTOL * stmax {
            break;
        }

        if stage1 && f <= ftest1 && params.mu.min(params.eta) * dginit <= dg {
            stage1 = false;
        }

        let trial = Point { t: stp, f, d: dg };
        let next = if stage1 && ftest1 < f && f <= x.f {
            // modified function values in the first stage
            let modify = |p: Point| Point {
                t: p.t,
                f: p.f - p.t * dgtest,
                d: p.d - dgtest,
            };
            let restore = |p: Point| Point {
                t: p.t,
                f: p.f + p.t * dgtest,
                d: p.d + dgtest,
            };
            let mut xm = modify(x);
            let mut ym = modify(y);
            let next = update_trial_interval(
                &mut xm,
                &mut ym,
                modify(trial),
                stmin,
                stmax,
                params.delta,
                &mut brackt,
            );
            x = restore(xm);
            y = restore(ym);
            next
        } else {
            update_trial_interval(&mut x, &mut y, trial, stmin, stmax, params.delta, &mut brackt)
        };
        match next {
            Some(t) => {
                interval_ok = true;
                stp = t;
            }
            None => interval_ok = false,
        }

        if brackt {
            if params.delta * prev_width <= (y.t - x.t).abs() {
                stp = x.t + 0.5 * (y.t - x.t);
            }
            prev_width = width;
            width = (y.t - x.t).abs();
        }
    }
    Ok(best)
}
