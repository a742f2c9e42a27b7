use crate::dynamics::SolverData;
use crate::error::{PhysicsError, Result};
use crate::math::{Rot, Vec2};
use crate::objects::Body;
use crate::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};

use super::{Constraint, JointBodies, Softness};

/// Keeps two anchor points at a fixed distance. With softness it behaves
/// like a damped spring.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJoint {
    /// Anchor on body A, relative to its origin.
    pub local_anchor_a: Vec2,
    /// Anchor on body B, relative to its origin.
    pub local_anchor_b: Vec2,
    /// Rest length.
    pub length: f64,
    /// `None` makes the joint rigid.
    pub softness: Option<Softness>,

    impulse: f64,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f64,
    gamma: f64,
    bias: f64,
}

impl DistanceJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, length: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            length,
            softness: None,
            impulse: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    /// Connects two world anchors; the rest length is their current distance.
    pub fn between(body_a: &Body, body_b: &Body, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self::new(
            body_a.local_point(anchor_a),
            body_b.local_point(anchor_b),
            anchor_a.distance(anchor_b),
        )
    }

    pub fn with_softness(mut self, softness: Softness) -> Self {
        self.softness = Some(softness);
        self
    }
}

impl Constraint for DistanceJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let c_a = data.positions[a.index].c;
        let q_a = Rot::from_angle(data.positions[a.index].a);
        let c_b = data.positions[b.index].c;
        let q_b = Rot::from_angle(data.positions[b.index].a);

        self.r_a = q_a.mul_vec(self.local_anchor_a - a.local_center);
        self.r_b = q_b.mul_vec(self.local_anchor_b - b.local_center);
        self.u = c_b + self.r_b - c_a - self.r_a;

        let length = self.u.magnitude();
        if length > LINEAR_SLOP {
            self.u *= 1.0 / length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let mut inv_mass =
            a.inv_mass + a.inv_i * cr_a * cr_a + b.inv_mass + b.inv_i * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        match self.softness {
            Some(softness) => {
                let c = length - self.length;
                let (gamma, beta) = softness.coefficients(self.mass, data.step.dt);
                self.gamma = gamma;
                self.bias = c * beta;
                inv_mass += self.gamma;
                self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
            }
            None => {
                self.gamma = 0.0;
                self.bias = 0.0;
            }
        }

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
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        va.v -= p * a.inv_mass;
        va.w -= a.inv_i * self.r_a.cross(p);
        vb.v += p * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(p);

        data.velocities[a.index] = va;
        data.velocities[b.index] = vb;
    }

    fn solve_position_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) -> bool {
        if self.softness.is_some() {
            // Springs are not position-corrected.
            return true;
        }

        let (a, b) = (bodies.a, bodies.b);
        let mut pa = data.positions[a.index];
        let mut pb = data.positions[b.index];

        let r_a = Rot::from_angle(pa.a).mul_vec(self.local_anchor_a - a.local_center);
        let r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);
        let (u, length) = (pb.c + r_b - pa.c - r_a).normalize_with_length();
        let c = (length - self.length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = u * impulse;

        pa.c -= p * a.inv_mass;
        pa.a -= a.inv_i * r_a.cross(p);
        pb.c += p * b.inv_mass;
        pb.a += b.inv_i * r_b.cross(p);

        data.positions[a.index] = pa;
        data.positions[b.index] = pb;

        c.abs() < LINEAR_SLOP
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
        (p_a.distance(p_b) - self.length).abs()
    }

    fn validate(&self) -> Result<()> {
        if !(self.length.is_finite() && self.length >= 0.0) {
            return Err(PhysicsError::joint(format!(
                "distance joint length {} must be non-negative",
                self.length
            )));
        }
        match &self.softness {
            Some(softness) => softness.validate(),
            None => Ok(()),
        }
    }
}
