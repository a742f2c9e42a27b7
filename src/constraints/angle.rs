use crate::dynamics::SolverData;
use crate::error::{PhysicsError, Result};
use crate::math::Vec2;
use crate::objects::Body;

use super::{Constraint, JointBodies};

/// Holds the relative angle `angle_b - angle_a` at `target_angle`.
///
/// Solved purely at the velocity level with a Baumgarte-style bias, so
/// there is no position pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleJoint {
    pub target_angle: f64,
    /// Fraction of the angular error removed per step.
    pub bias_factor: f64,
    /// Zero is rigid; values toward one soften the joint.
    pub softness: f64,
    /// Caps the impulse applied per iteration.
    pub max_impulse: Option<f64>,

    bias: f64,
    mass_factor: f64,
    impulse: f64,
}

impl AngleJoint {
    pub fn new(target_angle: f64) -> Self {
        Self {
            target_angle,
            bias_factor: 0.2,
            softness: 0.0,
            max_impulse: None,
            bias: 0.0,
            mass_factor: 0.0,
            impulse: 0.0,
        }
    }

    /// Locks the current relative angle of two bodies.
    pub fn between(body_a: &Body, body_b: &Body) -> Self {
        Self::new(body_b.angle() - body_a.angle())
    }

    pub fn with_bias_factor(mut self, bias_factor: f64) -> Self {
        self.bias_factor = bias_factor;
        self
    }

    pub fn with_softness(mut self, softness: f64) -> Self {
        self.softness = softness;
        self
    }

    pub fn with_max_impulse(mut self, max_impulse: f64) -> Self {
        self.max_impulse = Some(max_impulse);
        self
    }
}

impl Constraint for AngleJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let error = data.positions[b.index].a - data.positions[a.index].a - self.target_angle;

        self.bias = -self.bias_factor * data.step.inv_dt * error;

        let inv_i = a.inv_i + b.inv_i;
        self.mass_factor = if inv_i > 0.0 {
            (1.0 - self.softness) / inv_i
        } else {
            0.0
        };
        self.impulse = 0.0;
    }

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let w_a = data.velocities[a.index].w;
        let w_b = data.velocities[b.index].w;

        let mut p = (self.bias - w_b + w_a) * self.mass_factor;
        if let Some(max_impulse) = self.max_impulse {
            p = p.signum() * p.abs().min(max_impulse);
        }
        self.impulse += p;

        data.velocities[a.index].w -= a.inv_i * p;
        data.velocities[b.index].w += b.inv_i * p;
    }

    fn solve_position_constraints(&mut self, _bodies: &JointBodies, _data: &mut SolverData<'_>) -> bool {
        true
    }

    fn reaction_force(&self, _inv_dt: f64) -> Vec2 {
        Vec2::ZERO
    }

    fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.impulse
    }

    fn constraint_error(&self, body_a: &Body, body_b: &Body) -> f64 {
        (body_b.sweep().a - body_a.sweep().a - self.target_angle).abs()
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.bias_factor) {
            return Err(PhysicsError::joint(format!(
                "angle joint bias factor {} must be within [0, 1]",
                self.bias_factor
            )));
        }
        if !(0.0..1.0).contains(&self.softness) {
            return Err(PhysicsError::joint(format!(
                "angle joint softness {} must be within [0, 1)",
                self.softness
            )));
        }
        if let Some(max_impulse) = self.max_impulse {
            if !(max_impulse >= 0.0) {
                return Err(PhysicsError::joint("max impulse must be non-negative"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{Position, SolverBody, TimeStep, Velocity};
    use crate::settings::WorldSettings;
    const EPSILON: f64 = 1e-9;

    fn run(joint: &mut AngleJoint, angle_b: f64, w_b: f64) -> f64 {
        let bodies = JointBodies {
            a: SolverBody {
                index: 0,
                ..Default::default()
            },
            b: SolverBody {
                index: 1,
                local_center: Vec2::ZERO,
                inv_mass: 1.0,
                inv_i: 1.0,
            },
        };
        let mut positions = vec![
            Position::default(),
            Position {
                c: Vec2::ZERO,
                a: angle_b,
            },
        ];
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::ZERO,
                w: w_b,
            },
        ];
        let mut data = SolverData {
            step: TimeStep::new(0.1, 10.0, &WorldSettings::default()),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(&bodies, &mut data);
        joint.solve_velocity_constraints(&bodies, &mut data);
        data.velocities[1].w
    }

    #[test]
    fn test_bias_drives_toward_target() {
        let mut joint = AngleJoint::new(0.0);
        // bias = -0.2 * 10 * 0.5 = -1
        let w = run(&mut joint, 0.5, 0.0);
        assert!((w - -1.0).abs() < EPSILON);
    }

    #[test]
    fn test_max_impulse_caps_correction() {
        let mut joint = AngleJoint::new(0.0).with_max_impulse(0.25);
        let w = run(&mut joint, 0.0, 4.0);
        assert!((w - 3.75).abs() < EPSILON);
        assert!((joint.reaction_torque(10.0) + 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_validation() {
        assert!(AngleJoint::new(0.0).with_softness(1.0).validate().is_err());
        assert!(AngleJoint::new(0.0).with_bias_factor(2.0).validate().is_err());
        assert!(AngleJoint::new(0.0).validate().is_ok());
    }
}
