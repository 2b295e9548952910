//! The `skan_core` crate solves the Falkner-Skan boundary-layer similarity
//! equation, a third-order two-point boundary value problem, by a shooting
//! method: trial integrations over the unknown wall curvature `f''(0)`,
//! a sweep to bracket the far-field condition `f'(∞) = 1`, and a
//! false-position refinement of the bracket.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `OdeSystem` (right-hand
//!   sides), `Steppable` (fixed-step integrators).
//! - **Solvers**: RK4 stepper and a grid-driven `integrate` that signals
//!   divergence as a typed error.
//! - **Similarity**: the Falkner-Skan ODE system and its parameters.
//! - **Bracket / Shooting**: the two cooperating solver stages.
//! - **Profile**: the physical boundary-layer wrapper mapping the similarity
//!   solution back to `(y, vx)` velocity profiles.

pub mod bracket;
pub mod profile;
pub mod shooting;
pub mod similarity;
pub mod solvers;
pub mod traits;
