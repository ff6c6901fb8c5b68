//! One-dimensional solvers on bounded intervals.
//!
//! Thin wrappers around argmin's Brent methods so the likelihood code can pass
//! plain closures and get `AppError`s back.

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::brent::{BrentOpt, BrentRoot};

use crate::error::{AppError, ErrorKind};

const MAX_ITERS: u64 = 200;

struct Scalar<F> {
    f: F,
}

impl<F> CostFunction for Scalar<F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok((self.f)(*x))
    }
}

fn solver_error(what: &str, e: ArgminError) -> AppError {
    AppError::new(ErrorKind::RootFinding, format!("{what} failed: {e}"))
}

/// Minimize `f` over `[lo, hi]` with Brent's method.
pub fn minimize_bounded<F>(f: F, lo: f64, hi: f64) -> Result<f64, AppError>
where
    F: Fn(f64) -> f64,
{
    if !(lo.is_finite() && hi.is_finite() && hi > lo) {
        return Err(AppError::invalid(format!("Invalid minimization bounds [{lo}, {hi}].")));
    }
    let solver = BrentOpt::new(lo, hi);
    let res = Executor::new(Scalar { f }, solver)
        .configure(|state| state.max_iters(MAX_ITERS))
        .run()
        .map_err(|e| solver_error("Bounded minimization", e))?;

    res.state()
        .get_best_param()
        .copied()
        .ok_or_else(|| AppError::new(ErrorKind::RootFinding, "Bounded minimization returned no parameter."))
}

/// Find the zero of `f` inside `[lo, hi]`.
///
/// The endpoints must bracket a sign change. A missing bracket is reported as
/// [`ErrorKind::RootFinding`]; callers only get here once they have established
/// the bracket themselves, so this always means a logic error upstream.
pub fn find_root<F>(f: F, lo: f64, hi: f64, tol: f64) -> Result<f64, AppError>
where
    F: Fn(f64) -> f64,
{
    let f_lo = f(lo);
    let f_hi = f(hi);
    if !(f_lo.is_finite() && f_hi.is_finite()) || f_lo * f_hi > 0.0 {
        return Err(AppError::new(
            ErrorKind::RootFinding,
            format!("Root not bracketed on [{lo}, {hi}]: f(lo)={f_lo}, f(hi)={f_hi}."),
        ));
    }
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }

    let solver = BrentRoot::new(lo, hi, tol);
    let res = Executor::new(Scalar { f }, solver)
        .configure(|state| state.param(0.5 * (lo + hi)).max_iters(MAX_ITERS))
        .run()
        .map_err(|e| solver_error("Root finding", e))?;

    res.state()
        .get_best_param()
        .copied()
        .ok_or_else(|| AppError::new(ErrorKind::RootFinding, "Root finding returned no parameter."))
}
