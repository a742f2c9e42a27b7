use crate::math::Vec2;
use crate::settings::WorldSettings;

/// Per-step solver parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub dt: f64,
    pub inv_dt: f64,
    /// `dt * inv_dt0`, scales warm-start impulses when the step size varies.
    pub dt_ratio: f64,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
    pub baumgarte: f64,
    pub allowed_penetration: f64,
    pub velocity_threshold: f64,
}

impl TimeStep {
    pub fn new(dt: f64, inv_dt0: f64, settings: &WorldSettings) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self {
            dt,
            inv_dt,
            dt_ratio: inv_dt0 * dt,
            velocity_iterations: settings.velocity_iterations,
            position_iterations: settings.position_iterations,
            warm_starting: settings.warm_starting,
            baumgarte: settings.baumgarte,
            allowed_penetration: settings.allowed_penetration,
            velocity_threshold: settings.velocity_threshold,
        }
    }
}

/// Solver copy of a body's center of mass position and angle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f64,
}

/// Solver copy of a body's velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f64,
}

/// Island state shared by the contact and joint solvers, indexed by
/// island body index.
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dt_ratio_tracks_previous_step() {
        let settings = WorldSettings::default();
        let step = TimeStep::new(1.0 / 30.0, 60.0, &settings);
        assert!((step.dt_ratio - 2.0).abs() < 1e-12);
        assert!((step.inv_dt - 30.0).abs() < 1e-9);

        let first = TimeStep::new(1.0 / 60.0, 0.0, &settings);
        assert_eq!(first.dt_ratio, 0.0);
    }
}
