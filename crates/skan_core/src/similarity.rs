use crate::solvers::State;
use crate::traits::OdeSystem;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Validity range of the pressure-gradient exponent. Below `M_MIN` the
/// boundary layer separates and the similarity solution ceases to exist;
/// the empirical first-guess correlation in the bracket finder is only
/// calibrated on this range.
pub const M_MIN: f64 = -0.0905;
pub const M_MAX: f64 = 2.0;

/// Parameters of the Falkner-Skan similarity equation
///
///   f''' + ((m+1)/2)·f·f'' + m·(1 - f'²) = 0
///   f(0) = f'(0) = 0,  f'(∞) = 1
///
/// for an external velocity power law `U_e ∝ x^m`, with `β = 2m/(m+1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimilarityParameters {
    pub m: f64,
    pub beta: f64,
}

impl SimilarityParameters {
    pub fn new(m: f64) -> Result<Self> {
        if !m.is_finite() {
            bail!("Pressure-gradient exponent must be finite, got {m}.");
        }
        if !(M_MIN..=M_MAX).contains(&m) {
            bail!(
                "Pressure-gradient exponent m = {} outside the similarity range [{}, {}].",
                m,
                M_MIN,
                M_MAX
            );
        }
        Ok(Self {
            m,
            beta: 2.0 * m / (m + 1.0),
        })
    }
}

/// The similarity equation rewritten as a first-order system in
/// `Y = [f, f', f'']`.
impl OdeSystem<f64> for SimilarityParameters {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        out[0] = x[1];
        out[1] = x[2];
        out[2] = -0.5 * (self.m + 1.0) * x[0] * x[2] - self.m * (1.0 - x[1] * x[1]);
    }
}

/// Initial condition of a shooting trial: `f(0) = f'(0) = 0`, `f''(0) = y3`.
pub fn trial_state(y3: f64) -> State {
    State::new(0.0, 0.0, y3)
}

/// Linearly spaced samples of the similarity variable μ on `[0, mu_max]`.
/// `mu_max = 10` stands in for infinity; the far-field boundary condition is
/// evaluated at the last node.
pub fn similarity_grid(n: usize, mu_max: f64) -> Vec<f64> {
    (0..n)
        .map(|i| mu_max * i as f64 / (n - 1) as f64)
        .collect()
}

/// Mean pointwise residual of the similarity equation over a trajectory,
/// with `f'''` reconstructed by finite differences (central in the interior,
/// one-sided at the ends). Near zero for a genuine solution; a diagnostic
/// for callers that want to audit a best-effort result.
pub fn equation_residual(params: SimilarityParameters, grid: &[f64], trajectory: &[State]) -> f64 {
    let n = trajectory.len();
    if n < 3 || grid.len() != n {
        return f64::NAN;
    }
    let dmu = grid[1] - grid[0];
    let mut acc = 0.0;
    for i in 0..n {
        let fppp = if i == 0 {
            (trajectory[1].z - trajectory[0].z) / dmu
        } else if i == n - 1 {
            (trajectory[n - 1].z - trajectory[n - 2].z) / dmu
        } else {
            (trajectory[i + 1].z - trajectory[i - 1].z) / (2.0 * dmu)
        };
        let s = trajectory[i];
        acc += fppp + 0.5 * (params.m + 1.0) * s.x * s.z + params.m * (1.0 - s.y * s.y);
    }
    acc / n as f64
}
