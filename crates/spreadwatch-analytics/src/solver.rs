//! Brent root finder used by the yield solve.

use crate::error::{AnalyticsError, AnalyticsResult};

/// Default tolerance for root finding.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root finding.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for the root finder.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

/// Brent's method: inverse quadratic interpolation and secant steps,
/// falling back to bisection. Requires `f(a)` and `f(b)` of opposite sign.
#[allow(clippy::many_single_char_names)]
pub fn brent<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> AnalyticsResult<f64>
where
    F: Fn(f64) -> f64,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a);
    let mut fb = f(b);

    if !fa.is_finite() || !fb.is_finite() || fa * fb > 0.0 {
        return Err(AnalyticsError::InvalidBracket { a, b, fa, fb });
    }

    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..config.max_iterations {
        if fb.abs() < config.tolerance || (b - a).abs() < config.tolerance {
            return Ok(b);
        }

        let mut use_bisection = true;
        let mut s = 0.0;
        let m = (a + b) / 2.0;

        if (fa - fc).abs() > 1e-15 && (fb - fc).abs() > 1e-15 {
            let r = fb / fc;
            let p = fa / fc;
            let q = fa / fb;
            s = b
                - (q * (q - r) * (b - a) + (1.0 - r) * (b - c) * p)
                    / ((q - 1.0) * (r - 1.0) * (p - 1.0));
        } else if (fb - fa).abs() > 1e-15 {
            s = b - fb * (b - a) / (fb - fa);
        }

        if s > m.min(b) && s < m.max(b) && (s - b).abs() < e.abs() / 2.0 {
            use_bisection = false;
        }

        if use_bisection {
            s = m;
            e = b - a;
            d = e;
        } else {
            e = d;
            d = s - b;
        }

        c = b;
        fc = fb;

        let fs = f(s);
        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(AnalyticsError::ConvergenceFailed {
        iterations: config.max_iterations,
        residual: fb,
    })
}
