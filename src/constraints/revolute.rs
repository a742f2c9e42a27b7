use crate::dynamics::SolverData;
use crate::error::{PhysicsError, Result};
use crate::math::{Mat22, Rot, Vec2};
use crate::objects::Body;
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};

use super::{Constraint, JointBodies};

/// Pins two bodies together at a shared anchor, leaving relative rotation
/// free. An optional limit bounds the relative angle and an optional motor
/// drives it.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// `angle_b - angle_a` at which the joint angle reads zero.
    pub reference_angle: f64,
    pub enable_limit: bool,
    pub lower_angle: f64,
    pub upper_angle: f64,
    pub enable_motor: bool,
    /// Target relative angular velocity in rad/s.
    pub motor_speed: f64,
    pub max_motor_torque: f64,

    impulse: Vec2,
    motor_impulse: f64,
    lower_impulse: f64,
    upper_impulse: f64,
    r_a: Vec2,
    r_b: Vec2,
    k: Mat22,
    angle: f64,
    axial_mass: f64,
}

impl RevoluteJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat22::ZERO,
            angle: 0.0,
            axial_mass: 0.0,
        }
    }

    /// Joint at a world anchor, with the current relative angle as reference.
    pub fn at_world_anchor(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self::new(
            body_a.local_point(anchor),
            body_b.local_point(anchor),
            body_b.angle() - body_a.angle(),
        )
    }

    pub fn with_limit(mut self, lower: f64, upper: f64) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    pub fn with_motor(mut self, speed: f64, max_torque: f64) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_torque = max_torque;
        self
    }

    /// Current joint angle relative to the reference angle.
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> f64 {
        body_b.sweep().a - body_a.sweep().a - self.reference_angle
    }

    /// Motor torque applied during the last step.
    pub fn motor_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.motor_impulse
    }

    fn point_mass(&self, bodies: &JointBodies, r_a: Vec2, r_b: Vec2) -> Mat22 {
        let (m_a, m_b, i_a, i_b) = (bodies.a.inv_mass, bodies.b.inv_mass, bodies.a.inv_i, bodies.b.inv_i);
        let ex_x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let ey_x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let ey_y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        Mat22::new(Vec2::new(ex_x, ey_x), Vec2::new(ey_x, ey_y))
    }
}

impl Constraint for RevoluteJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let a_a = data.positions[a.index].a;
        let a_b = data.positions[b.index].a;

        self.r_a = Rot::from_angle(a_a).mul_vec(self.local_anchor_a - a.local_center);
        self.r_b = Rot::from_angle(a_b).mul_vec(self.local_anchor_b - b.local_center);
        self.k = self.point_mass(bodies, self.r_a, self.r_b);

        self.axial_mass = a.inv_i + b.inv_i;
        let fixed_rotation = self.axial_mass == 0.0;
        if self.axial_mass > 0.0 {
            self.axial_mass = 1.0 / self.axial_mass;
        }

        self.angle = a_b - a_a - self.reference_angle;
        if !self.enable_limit || fixed_rotation {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            let ratio = data.step.dt_ratio;
            self.impulse *= ratio;
            self.motor_impulse *= ratio;
            self.lower_impulse *= ratio;
            self.upper_impulse *= ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;

            let va = &mut data.velocities[a.index];
            va.v -= p * a.inv_mass;
            va.w -= a.inv_i * (self.r_a.cross(p) + axial_impulse);
            let vb = &mut data.velocities[b.index];
            vb.v += p * b.inv_mass;
            vb.w += b.inv_i * (self.r_b.cross(p) + axial_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let mut va = data.velocities[a.index];
        let mut vb = data.velocities[b.index];
        let fixed_rotation = a.inv_i + b.inv_i == 0.0;

        if self.enable_motor && !fixed_rotation {
            let cdot = vb.w - va.w - self.motor_speed;
            let impulse = -self.axial_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;

            va.w -= a.inv_i * impulse;
            vb.w += b.inv_i * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit.
            {
                let c = self.angle - self.lower_angle;
                let cdot = vb.w - va.w;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.lower_impulse - old_impulse;

                va.w -= a.inv_i * impulse;
                vb.w += b.inv_i * impulse;
            }

            // Upper limit. The signs are flipped to keep the impulse positive.
            {
                let c = self.upper_angle - self.angle;
                let cdot = va.w - vb.w;
                let impulse = -self.axial_mass * (cdot + c.max(0.0) * data.step.inv_dt);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (old_impulse + impulse).max(0.0);
                let impulse = self.upper_impulse - old_impulse;

                va.w += a.inv_i * impulse;
                vb.w -= b.inv_i * impulse;
            }
        }

        // Point-to-point.
        let cdot = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
        let impulse = self.k.solve(-cdot);
        self.impulse += impulse;

        va.v -= impulse * a.inv_mass;
        va.w -= a.inv_i * self.r_a.cross(impulse);
        vb.v += impulse * b.inv_mass;
        vb.w += b.inv_i * self.r_b.cross(impulse);

        data.velocities[a.index] = va;
        data.velocities[b.index] = vb;
    }

    fn solve_position_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) -> bool {
        let (a, b) = (bodies.a, bodies.b);
        let mut pa = data.positions[a.index];
        let mut pb = data.positions[b.index];

        let mut angular_error = 0.0;
        let fixed_rotation = a.inv_i + b.inv_i == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = pb.a - pa.a - self.reference_angle;
            let mut c = 0.0;

            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                c = (angle - self.lower_angle).clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
            } else if angle <= self.lower_angle {
                c = (angle - self.lower_angle + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0);
            } else if angle >= self.upper_angle {
                c = (angle - self.upper_angle - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION);
            }

            let limit_impulse = -self.axial_mass * c;
            pa.a -= a.inv_i * limit_impulse;
            pb.a += b.inv_i * limit_impulse;
            angular_error = c.abs();
        }

        let r_a = Rot::from_angle(pa.a).mul_vec(self.local_anchor_a - a.local_center);
        let r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);

        let c = pb.c + r_b - pa.c - r_a;
        let position_error = c.magnitude();

        let k = self.point_mass(bodies, r_a, r_b);
        let impulse = -k.solve(c);

        pa.c -= impulse * a.inv_mass;
        pa.a -= a.inv_i * r_a.cross(impulse);
        pb.c += impulse * b.inv_mass;
        pb.a += b.inv_i * r_b.cross(impulse);

        data.positions[a.index] = pa;
        data.positions[b.index] = pb;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.impulse * inv_dt
    }

    fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * (self.motor_impulse + self.lower_impulse - self.upper_impulse)
    }

    fn constraint_error(&self, body_a: &Body, body_b: &Body) -> f64 {
        body_a
            .world_point(self.local_anchor_a)
            .distance(body_b.world_point(self.local_anchor_b))
    }

    fn validate(&self) -> Result<()> {
        if self.enable_limit && self.lower_angle > self.upper_angle {
            return Err(PhysicsError::joint(format!(
                "revolute lower angle {} exceeds upper angle {}",
                self.lower_angle, self.upper_angle
            )));
        }
        if self.enable_motor && !(self.max_motor_torque >= 0.0) {
            return Err(PhysicsError::joint("max motor torque must be non-negative"));
        }
        Ok(())
    }
}
