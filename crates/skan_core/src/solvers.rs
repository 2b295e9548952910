use crate::traits::{OdeSystem, Scalar, Steppable};
use nalgebra::Vector3;
use thiserror::Error;

/// State of the similarity system: `[f, f', f'']`.
pub type State = Vector3<f64>;

/// One state per node of the independent-variable grid.
pub type Trajectory = Vec<State>;

/// Failure of a trial integration. Divergence is a per-trial condition the
/// caller can recover from; an invalid grid is a caller mistake.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration diverged near μ = {mu:.4} (non-finite state)")]
    Diverged { mu: f64 },
    #[error("grid must be a non-empty, strictly increasing sequence")]
    InvalidGrid,
}

/// Classic Runge-Kutta 4th Order Stepper
pub struct Rk4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Rk4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Rk4<T> {
    fn step(&mut self, system: &impl OdeSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Integrates a 3-state system across `grid`, returning the state at every
/// grid node. Each grid interval is subdivided into `substeps` RK4 steps.
///
/// Fails with [`IntegrationError::Diverged`] as soon as any state component
/// stops being finite, so a caller probing an unknown initial condition can
/// tell a blown-up trial apart from any other failure.
pub fn integrate(
    system: &impl OdeSystem<f64>,
    initial_state: State,
    grid: &[f64],
    substeps: usize,
) -> Result<Trajectory, IntegrationError> {
    if grid.is_empty() || substeps == 0 || grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(IntegrationError::InvalidGrid);
    }

    let mut stepper = Rk4::new(system.dimension());
    let mut state = [initial_state.x, initial_state.y, initial_state.z];
    let mut t = grid[0];

    let mut trajectory = Vec::with_capacity(grid.len());
    trajectory.push(initial_state);

    for node in grid.windows(2) {
        let dt = (node[1] - node[0]) / substeps as f64;
        for _ in 0..substeps {
            stepper.step(system, &mut t, &mut state, dt);
            if !state.iter().all(|v| v.is_finite()) {
                return Err(IntegrationError::Diverged { mu: t });
            }
        }
        trajectory.push(State::new(state[0], state[1], state[2]));
    }

    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::{integrate, IntegrationError, State};
    use crate::traits::OdeSystem;

    struct Decay {
        rate: f64,
    }

    impl OdeSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            3
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = self.rate * x[0];
            out[1] = self.rate * x[1];
            out[2] = self.rate * x[2];
        }
    }

    /// y' = y^2 blows up in finite time from y(0) = 1.
    struct FiniteTimeBlowup;

    impl OdeSystem<f64> for FiniteTimeBlowup {
        fn dimension(&self) -> usize {
            3
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[0] * x[0];
            out[1] = 0.0;
            out[2] = 0.0;
        }
    }

    fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let grid = linspace(0.0, 2.0, 21);
        let trajectory = integrate(
            &Decay { rate: -1.0 },
            State::new(1.0, 2.0, -0.5),
            &grid,
            10,
        )
        .expect("decay system should integrate");
        assert_eq!(trajectory.len(), grid.len());
        let expected = (-2.0_f64).exp();
        let last = trajectory[trajectory.len() - 1];
        assert!((last.x - expected).abs() < 1e-8);
        assert!((last.y - 2.0 * expected).abs() < 1e-8);
        assert!((last.z + 0.5 * expected).abs() < 1e-8);
    }

    #[test]
    fn finite_time_blowup_reports_divergence() {
        let grid = linspace(0.0, 2.0, 41);
        let result = integrate(&FiniteTimeBlowup, State::new(1.0, 0.0, 0.0), &grid, 20);
        match result {
            Err(IntegrationError::Diverged { mu }) => assert!(mu > 0.5 && mu <= 2.0),
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_grids() {
        let state = State::new(0.0, 0.0, 0.0);
        assert!(matches!(
            integrate(&Decay { rate: -1.0 }, state, &[], 10),
            Err(IntegrationError::InvalidGrid)
        ));
        assert!(matches!(
            integrate(&Decay { rate: -1.0 }, state, &[0.0, 1.0, 0.5], 10),
            Err(IntegrationError::InvalidGrid)
        ));
        assert!(matches!(
            integrate(&Decay { rate: -1.0 }, state, &[0.0, 1.0], 0),
            Err(IntegrationError::InvalidGrid)
        ));
    }
}
