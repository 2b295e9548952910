use crate::bracket::find_bracket;
use crate::shooting::{refine, ShootingResult, ShootingSettings};
use crate::similarity::{similarity_grid, SimilarityParameters};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Grid resolution used for the similarity solve; 100 nodes on [0, 10] with
/// μ = 10 standing in for the far field.
const GRID_NODES: usize = 100;
const MU_MAX: f64 = 10.0;
/// Trial f''(0) values swept by the bracket finder.
const BRACKET_CANDIDATES: usize = 100;

/// A laminar boundary layer under a power-law pressure gradient,
/// `U_e(x) = c0·(x/L)^m`, solved through the Falkner-Skan transformation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FalknerSkanBl {
    /// Kinematic viscosity.
    pub nu: f64,
    /// Edge-velocity scale and reference length of the power law.
    pub c0: f64,
    pub l: f64,
    pub params: SimilarityParameters,
}

impl FalknerSkanBl {
    pub fn new(nu: f64, m: f64, c0: f64, l: f64) -> Result<Self> {
        if nu <= 0.0 || !nu.is_finite() {
            bail!("Kinematic viscosity must be positive and finite, got {nu}.");
        }
        if l <= 0.0 || !l.is_finite() {
            bail!("Reference length must be positive and finite, got {l}.");
        }
        if !c0.is_finite() {
            bail!("Edge-velocity scale must be finite, got {c0}.");
        }
        Ok(Self {
            nu,
            c0,
            l,
            params: SimilarityParameters::new(m)?,
        })
    }

    /// External velocity at position `x`.
    pub fn u_e(&self, x: f64) -> f64 {
        self.c0 * (x / self.l).powf(self.params.m)
    }

    /// Similarity variable at the physical point `(x, y)`, using the
    /// `(m+1)/2`-normalized transformation `μ = y·√((m+1)·U_e/(2νx))`.
    /// The inverse map in [`Self::y_from_mu`] uses the Blasius convention;
    /// the two coincide at `m = 1`.
    pub fn mu(&self, x: f64, y: f64) -> f64 {
        let m = self.params.m;
        y * (self.c0 * (m + 1.0) / (2.0 * self.nu * self.l)).sqrt()
            * (x / self.l).powf((m - 1.0) / 2.0)
    }

    /// Wall-normal position corresponding to `mu` at station `x`.
    pub fn y_from_mu(&self, x: f64, mu: f64) -> f64 {
        mu * (self.nu * x / self.u_e(x)).sqrt()
    }

    /// Solves the similarity equation: bracket the wall curvature, refine it
    /// by shooting, and return the μ grid together with the `[f, f', f'']`
    /// profiles. Inspect [`ShootingResult::converged`] before trusting the
    /// tolerance.
    pub fn f_function(&self, settings: ShootingSettings) -> Result<(Vec<f64>, ShootingResult)> {
        let grid = similarity_grid(GRID_NODES, MU_MAX);
        let bracket = find_bracket(self.params, &grid, BRACKET_CANDIDATES, settings.substeps)
            .context("Bracketing the wall curvature failed.")?;
        let result = refine(self.params, &grid, bracket, settings)?;
        Ok((grid, result))
    }

    /// Velocity profile at station `x` as `(y, vx)` pairs: the similarity
    /// solution mapped back to physical coordinates and scaled by the local
    /// edge velocity.
    pub fn velocity_profile(
        &self,
        x: f64,
        settings: ShootingSettings,
    ) -> Result<Vec<(f64, f64)>> {
        if x <= 0.0 || !x.is_finite() {
            bail!("Profile station x must be positive and finite, got {x}.");
        }
        let (grid, result) = self.f_function(settings)?;
        let u_e = self.u_e(x);
        Ok(grid
            .iter()
            .zip(&result.trajectory)
            .map(|(&mu, state)| (self.y_from_mu(x, mu), state.y * u_e))
            .collect())
    }
}
