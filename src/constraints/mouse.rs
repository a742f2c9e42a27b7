use crate::dynamics::SolverData;
use crate::error::{PhysicsError, Result};
use crate::math::{Mat22, Rot, Vec2};
use crate::objects::Body;

use super::{Constraint, JointBodies, Softness};

/// Soft spring pulling a point on body B toward a world target.
///
/// Body A only anchors the joint in the world (usually the ground body)
/// and receives no impulse.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJoint {
    pub target: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f64,
    pub softness: Softness,

    impulse: Vec2,
    r_b: Vec2,
    mass: Mat22,
    c: Vec2,
    gamma: f64,
}

impl MouseJoint {
    /// Grabs `body_b` at the world point `target`.
    pub fn new(body_b: &Body, target: Vec2, max_force: f64) -> Self {
        Self {
            target,
            local_anchor_b: body_b.local_point(target),
            max_force,
            softness: Softness::new(5.0, 0.7),
            impulse: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat22::ZERO,
            c: Vec2::ZERO,
            gamma: 0.0,
        }
    }

    pub fn with_softness(mut self, softness: Softness) -> Self {
        self.softness = softness;
        self
    }
}

impl Constraint for MouseJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let b = bodies.b;
        let pb = data.positions[b.index];
        let mass = if b.inv_mass > 0.0 { 1.0 / b.inv_mass } else { 0.0 };

        let (gamma, beta) = self.softness.coefficients(mass, data.step.dt);
        self.gamma = gamma;

        self.r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);
        let r_b = self.r_b;

        let k = Mat22::new(
            Vec2::new(
                b.inv_mass + b.inv_i * r_b.y * r_b.y + self.gamma,
                -b.inv_i * r_b.x * r_b.y,
            ),
            Vec2::new(
                -b.inv_i * r_b.x * r_b.y,
                b.inv_mass + b.inv_i * r_b.x * r_b.x + self.gamma,
            ),
        );
        self.mass = k.inverse();

        self.c = (pb.c + r_b - self.target) * beta;

        let vb = &mut data.velocities[b.index];
        // Cheap rotational damping.
        vb.w *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            vb.v += self.impulse * b.inv_mass;
            vb.w += b.inv_i * r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let b = bodies.b;
        let mut vb = data.velocities[b.index];

        let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        let impulse = self.mass * -(cdot + self.c + self.impulse * self.gamma);

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.magnitude_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.magnitude();
        }
        let impulse = self.impulse - old_impulse;

        vb.v += impulse * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(impulse);
        data.velocities[b.index] = vb;
    }

    fn solve_position_constraints(&mut self, _bodies: &JointBodies, _data: &mut SolverData<'_>) -> bool {
        true
    }

    fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.impulse * inv_dt
    }

    fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }

    fn constraint_error(&self, _body_a: &Body, body_b: &Body) -> f64 {
        body_b.world_point(self.local_anchor_b).distance(self.target)
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_force.is_finite() && self.max_force >= 0.0) {
            return Err(PhysicsError::joint(format!(
                "mouse joint max force {} must be non-negative",
                self.max_force
            )));
        }
        if !self.target.is_finite() {
            return Err(PhysicsError::joint("mouse joint target must be finite"));
        }
        self.softness.validate()
    }
}
