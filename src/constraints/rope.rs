use crate::dynamics::SolverData;
use crate::error::{PhysicsError, Result};
use crate::math::{Rot, Vec2};
use crate::objects::Body;
use crate::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};

use super::{Constraint, JointBodies};

/// Limits the distance between two anchors to `max_length`. The rope may
/// go slack.
#[derive(Debug, Clone, PartialEq)]
pub struct RopeJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_length: f64,

    impulse: f64,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
    length: f64,
}

impl RopeJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, max_length: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            max_length,
            impulse: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            length: 0.0,
        }
    }

    /// Whether the rope was taut at the start of the last step.
    pub fn is_taut(&self) -> bool {
        self.length > self.max_length
    }
}

impl Constraint for RopeJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let pa = data.positions[a.index];
        let pb = data.positions[b.index];

        self.r_a = Rot::from_angle(pa.a).mul_vec(self.local_anchor_a - a.local_center);
        self.r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);
        self.u = pb.c + self.r_b - pa.c - self.r_a;
        self.length = self.u.magnitude();

        if self.length > LINEAR_SLOP {
            self.u *= 1.0 / self.length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let inv_mass = a.inv_mass + a.inv_i * cr_a * cr_a + b.inv_mass + b.inv_i * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = self.u * self.impulse;
            let va = &mut data.velocities[a.index];
            va.v -= p * a.inv_mass;
            va.w -= a.inv_i * self.r_a.cross(p);
            let vb = &mut data.velocities[b.index];
            vb.v += p * b.inv_mass;
            vb.w += b.inv_i * self.r_b.cross(p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let mut va = data.velocities[a.index];
        let mut vb = data.velocities[b.index];

        let vp_a = va.v + Vec2::scalar_cross(va.w, self.r_a);
        let vp_b = vb.v + Vec2::scalar_cross(vb.w, self.r_b);
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);

        // Predictive: allow closing the slack within this step.
        if c < 0.0 {
            cdot += data.step.inv_dt * c;
        }

        let impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (self.impulse + impulse).min(0.0);
        let impulse = self.impulse - old_impulse;

        let p = self.u * impulse;
        va.v -= p * a.inv_mass;
        va.w -= a.inv_i * self.r_a.cross(p);
        vb.v += p * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(p);

        data.velocities[a.index] = va;
        data.velocities[b.index] = vb;
    }

    fn solve_position_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) -> bool {
        let (a, b) = (bodies.a, bodies.b);
        let mut pa = data.positions[a.index];
        let mut pb = data.positions[b.index];

        let r_a = Rot::from_angle(pa.a).mul_vec(self.local_anchor_a - a.local_center);
        let r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);
        let (u, length) = (pb.c + r_b - pa.c - r_a).normalize_with_length();
        let c = (length - self.max_length).clamp(0.0, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = u * impulse;

        pa.c -= p * a.inv_mass;
        pa.a -= a.inv_i * r_a.cross(p);
        pb.c += p * b.inv_mass;
        pb.a += b.inv_i * r_b.cross(p);

        data.positions[a.index] = pa;
        data.positions[b.index] = pb;

        length - self.max_length < LINEAR_SLOP
    }

    fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.u * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, _inv_dt: f64) -> f64 {
        0.0
    }

    fn constraint_error(&self, body_a: &Body, body_b: &Body) -> f64 {
        let p_a = body_a.world_point(self.local_anchor_a);
        let p_b = body_b.world_point(self.local_anchor_b);
        (p_a.distance(p_b) - self.max_length).max(0.0)
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_length.is_finite() && self.max_length >= 0.0) {
            return Err(PhysicsError::joint(format!(
                "rope max length {} must be non-negative",
                self.max_length
            )));
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

    fn setup(x: f64, vx: f64) -> (JointBodies, Vec<Position>, Vec<Velocity>) {
        let bodies = JointBodies {
            a: SolverBody {
                index: 0,
                ..Default::default()
            },
            b: SolverBody {
                index: 1,
                local_center: Vec2::ZERO,
                inv_mass: 1.0,
                inv_i: 0.0,
            },
        };
        let positions = vec![
            Position::default(),
            Position {
                c: Vec2::new(x, 0.0),
                a: 0.0,
            },
        ];
        let velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::new(vx, 0.0),
                w: 0.0,
            },
        ];
        (bodies, positions, velocities)
    }

    #[test]
    fn test_slack_rope_allows_motion() {
        let (bodies, mut positions, mut velocities) = setup(1.0, 5.0);
        let mut rope = RopeJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0);
        let mut data = SolverData {
            step: TimeStep::new(1.0 / 60.0, 60.0, &WorldSettings::default()),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        rope.init_velocity_constraints(&bodies, &mut data);
        rope.solve_velocity_constraints(&bodies, &mut data);
        assert!((data.velocities[1].v.x - 5.0).abs() < EPSILON);
        assert!(!rope.is_taut());
    }

    #[test]
    fn test_taut_rope_stops_outward_motion() {
        let (bodies, mut positions, mut velocities) = setup(2.0, 5.0);
        let mut rope = RopeJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0);
        let mut data = SolverData {
            step: TimeStep::new(1.0 / 60.0, 60.0, &WorldSettings::default()),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        rope.init_velocity_constraints(&bodies, &mut data);
        rope.solve_velocity_constraints(&bodies, &mut data);
        assert!(data.velocities[1].v.x.abs() < EPSILON);
    }

    #[test]
    fn test_error_is_zero_when_slack() {
        use crate::objects::BodyDef;
        let rope = RopeJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0);
        let a = Body::new(&BodyDef::default());
        let near = Body::new(&BodyDef::dynamic().at(Vec2::new(1.0, 0.0)));
        let far = Body::new(&BodyDef::dynamic().at(Vec2::new(3.0, 0.0)));
        assert_eq!(rope.constraint_error(&a, &near), 0.0);
        assert!((rope.constraint_error(&a, &far) - 1.0).abs() < EPSILON);
    }
}
