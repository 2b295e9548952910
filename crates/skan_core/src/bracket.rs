use crate::similarity::{trial_state, SimilarityParameters};
use crate::solvers::integrate;
use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Half-width of the search interval around the empirical first guess.
const SEARCH_HALF_WIDTH: f64 = 0.33;

/// Two shooting trials believed to straddle the far-field condition
/// `f'(∞) = 1`: the candidate wall curvatures and the `f'` each produced at
/// the end of the grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bracket {
    pub y3: [f64; 2],
    pub fp_inf: [f64; 2],
}

/// Empirical correlation for `f''(0)` as a function of `m`, calibrated on
/// the valid similarity range. Good to roughly ±0.3, which is what makes a
/// narrow fixed-width candidate sweep viable.
pub fn first_guess(m: f64) -> f64 {
    0.33 + 0.77 * (2.207 * (m + 0.45696)).ln()
}

/// Sweeps `candidates` trial values of `f''(0)` across the guess interval
/// and picks a pair bracketing the far-field condition.
///
/// Trials whose integration diverges are dropped (wall curvatures far from
/// the true value send the similarity system to infinity well before
/// `μ = 10`). Among the survivors, in priority order:
///
/// 1. an adjacent pair where the residual `f'(∞) - 1` and `f''(∞)` both
///    change sign — requiring both guards against spurious crossings from
///    trials on the edge of divergence;
/// 2. failing a joint crossing, the first plain residual sign change;
/// 3. no sign change at all: the two trials closest to the target, provided
///    the closest is interior to the sweep. A closest-at-the-edge sweep
///    means the true `f''(0)` lies outside the interval, which is a
///    configuration error, not something to paper over.
pub fn find_bracket(
    params: SimilarityParameters,
    grid: &[f64],
    candidates: usize,
    substeps: usize,
) -> Result<Bracket> {
    if candidates < 2 {
        bail!("Need at least two bracket candidates, got {}.", candidates);
    }
    if grid.len() < 2 {
        bail!("Grid must contain at least two nodes.");
    }

    let guess = first_guess(params.m);
    let lo = guess - SEARCH_HALF_WIDTH;
    let hi = guess + SEARCH_HALF_WIDTH;
    debug!(
        "bracket sweep: m = {}, f''(0) guess = {guess:.4}, interval [{lo:.4}, {hi:.4}]",
        params.m
    );

    // Surviving trials, in sweep order: (y3, f'(end), f''(end)).
    let mut survivors: Vec<(f64, f64, f64)> = Vec::with_capacity(candidates);
    for i in 0..candidates {
        let y3 = lo + (hi - lo) * i as f64 / (candidates - 1) as f64;
        match integrate(&params, trial_state(y3), grid, substeps) {
            Ok(trajectory) => {
                let end = trajectory[trajectory.len() - 1];
                survivors.push((y3, end.y, end.z));
            }
            Err(err) => {
                debug!("trial y3 = {y3:.4} excluded: {err}");
            }
        }
    }

    if survivors.len() < 2 {
        bail!(
            "Only {} of {} bracket trials integrated to μ = {}; \
             the f''(0) search interval must be widened.",
            survivors.len(),
            candidates,
            grid[grid.len() - 1]
        );
    }

    let resid: Vec<f64> = survivors.iter().map(|s| s.1 - 1.0).collect();
    let resid_min = resid.iter().cloned().fold(f64::INFINITY, f64::min);
    let resid_max = resid.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if resid_min * resid_max < 0.0 {
        let joint = (0..survivors.len() - 1).find(|&i| {
            resid[i] * resid[i + 1] < 0.0 && survivors[i].2 * survivors[i + 1].2 < 0.0
        });
        let pair = joint
            .or_else(|| (0..survivors.len() - 1).find(|&i| resid[i] * resid[i + 1] < 0.0));
        if let Some(i) = pair {
            debug!(
                "bracket: y3 in [{:.6}, {:.6}], f'(∞) in [{:.6}, {:.6}]{}",
                survivors[i].0,
                survivors[i + 1].0,
                survivors[i].1,
                survivors[i + 1].1,
                if joint.is_none() {
                    " (f''(∞) did not co-cross)"
                } else {
                    ""
                }
            );
            return Ok(Bracket {
                y3: [survivors[i].0, survivors[i + 1].0],
                fp_inf: [survivors[i].1, survivors[i + 1].1],
            });
        }
    }

    // No sign change: fall back to the two trials closest to f'(∞) = 1.
    let mut order: Vec<usize> = (0..survivors.len()).collect();
    order.sort_by(|&a, &b| resid[a].abs().total_cmp(&resid[b].abs()));
    if order[0] == 0 || order[0] == survivors.len() - 1 {
        bail!(
            "No f'(∞) = 1 crossing inside [{:.4}, {:.4}] and the closest trial \
             sits at the sweep edge; the f''(0) search interval must be widened.",
            lo,
            hi
        );
    }
    let (a, b) = (order[0], order[1]);
    Ok(Bracket {
        y3: [survivors[a].0, survivors[b].0],
        fp_inf: [survivors[a].1, survivors[b].1],
    })
}
