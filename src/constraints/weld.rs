use crate::dynamics::SolverData;
use crate::error::Result;
use crate::math::{Mat33, Rot, Vec2, Vec3};
use crate::objects::Body;
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};

use super::{Constraint, JointBodies, Softness};

/// Glues two bodies together: anchor points coincide and the relative
/// angle stays at the reference angle. Softness applies to the angle only.
#[derive(Debug, Clone, PartialEq)]
pub struct WeldJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f64,
    pub softness: Option<Softness>,

    impulse: Vec3,
    r_a: Vec2,
    r_b: Vec2,
    mass: Mat33,
    gamma: f64,
    bias: f64,
}

/// Effective mass of the combined point and angle constraint.
fn effective_mass(bodies: &JointBodies, r_a: Vec2, r_b: Vec2) -> Mat33 {
    let (m_a, m_b, i_a, i_b) = (bodies.a.inv_mass, bodies.b.inv_mass, bodies.a.inv_i, bodies.b.inv_i);
    let ex = Vec3::new(
        m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
        -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
        -r_a.y * i_a - r_b.y * i_b,
    );
    let ey = Vec3::new(
        ex.y,
        m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
        r_a.x * i_a + r_b.x * i_b,
    );
    let ez = Vec3::new(ex.z, ey.z, i_a + i_b);
    Mat33::new(ex, ey, ez)
}

impl WeldJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f64) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            softness: None,
            impulse: Vec3::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat33::default(),
            gamma: 0.0,
            bias: 0.0,
        }
    }

    pub fn at_world_anchor(body_a: &Body, body_b: &Body, anchor: Vec2) -> Self {
        Self::new(
            body_a.local_point(anchor),
            body_b.local_point(anchor),
            body_b.angle() - body_a.angle(),
        )
    }

    pub fn with_softness(mut self, softness: Softness) -> Self {
        self.softness = Some(softness);
        self
    }
}

impl Constraint for WeldJoint {
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let a_a = data.positions[a.index].a;
        let a_b = data.positions[b.index].a;

        self.r_a = Rot::from_angle(a_a).mul_vec(self.local_anchor_a - a.local_center);
        self.r_b = Rot::from_angle(a_b).mul_vec(self.local_anchor_b - b.local_center);
        let k = effective_mass(bodies, self.r_a, self.r_b);

        match self.softness {
            Some(softness) => {
                self.mass = k.inverse22();

                let mut inv_m = a.inv_i + b.inv_i;
                let m = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };

                let c = a_b - a_a - self.reference_angle;
                let (gamma, beta) = softness.coefficients(m, data.step.dt);
                self.gamma = gamma;
                self.bias = c * beta;

                inv_m += self.gamma;
                self.mass.ez.z = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
            }
            None if k.ez.z == 0.0 => {
                self.mass = k.inverse22();
                self.gamma = 0.0;
                self.bias = 0.0;
            }
            None => {
                self.mass = k.sym_inverse33();
                self.gamma = 0.0;
                self.bias = 0.0;
            }
        }

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            let p = Vec2::new(self.impulse.x, self.impulse.y);

            let va = &mut data.velocities[a.index];
            va.v -= p * a.inv_mass;
            va.w -= a.inv_i * (self.r_a.cross(p) + self.impulse.z);
            let vb = &mut data.velocities[b.index];
            vb.v += p * b.inv_mass;
            vb.w += b.inv_i * (self.r_b.cross(p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
        }
    }

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) {
        let (a, b) = (bodies.a, bodies.b);
        let mut va = data.velocities[a.index];
        let mut vb = data.velocities[b.index];

        if self.softness.is_some() {
            let cdot2 = vb.w - va.w;
            let impulse2 = -self.mass.ez.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            va.w -= a.inv_i * impulse2;
            vb.w += b.inv_i * impulse2;

            let cdot1 = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let impulse1 = -self.mass.mul22(cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            va.v -= impulse1 * a.inv_mass;
            va.w -= a.inv_i * self.r_a.cross(impulse1);
            vb.v += impulse1 * b.inv_mass;
            vb.w += b.inv_i * self.r_b.cross(impulse1);
        } else {
            let cdot1 = vb.v + Vec2::scalar_cross(vb.w, self.r_b) - va.v - Vec2::scalar_cross(va.w, self.r_a);
            let cdot2 = vb.w - va.w;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -(self.mass * cdot);
            self.impulse += impulse;

            let p = Vec2::new(impulse.x, impulse.y);
            va.v -= p * a.inv_mass;
            va.w -= a.inv_i * (self.r_a.cross(p) + impulse.z);
            vb.v += p * b.inv_mass;
            vb.w += b.inv_i * (self.r_b.cross(p) + impulse.z);
        }

        data.velocities[a.index] = va;
        data.velocities[b.index] = vb;
    }

    fn solve_position_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) -> bool {
        let (a, b) = (bodies.a, bodies.b);
        let mut pa = data.positions[a.index];
        let mut pb = data.positions[b.index];

        let r_a = Rot::from_angle(pa.a).mul_vec(self.local_anchor_a - a.local_center);
        let r_b = Rot::from_angle(pb.a).mul_vec(self.local_anchor_b - b.local_center);
        let k = effective_mass(bodies, r_a, r_b);

        let c1 = pb.c + r_b - pa.c - r_a;
        let position_error = c1.magnitude();
        let mut angular_error = 0.0;

        if self.softness.is_some() {
            let p = -k.solve22(c1);
            pa.c -= p * a.inv_mass;
            pa.a -= a.inv_i * r_a.cross(p);
            pb.c += p * b.inv_mass;
            pb.a += b.inv_i * r_b.cross(p);
        } else {
            let c2 = pb.a - pa.a - self.reference_angle;
            angular_error = c2.abs();

            let impulse = if k.ez.z > 0.0 {
                -k.solve33(Vec3::new(c1.x, c1.y, c2))
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vec2::new(impulse.x, impulse.y);
            pa.c -= p * a.inv_mass;
            pa.a -= a.inv_i * (r_a.cross(p) + impulse.z);
            pb.c += p * b.inv_mass;
            pb.a += b.inv_i * (r_b.cross(p) + impulse.z);
        }

        data.positions[a.index] = pa;
        data.positions[b.index] = pb;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        Vec2::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: f64) -> f64 {
        inv_dt * self.impulse.z
    }

    fn constraint_error(&self, body_a: &Body, body_b: &Body) -> f64 {
        let gap = body_a
            .world_point(self.local_anchor_a)
            .distance(body_b.world_point(self.local_anchor_b));
        let angle = body_b.sweep().a - body_a.sweep().a - self.reference_angle;
        gap + angle.abs()
    }

    fn validate(&self) -> Result<()> {
        match &self.softness {
            Some(softness) => softness.validate(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{Position, SolverBody, TimeStep, Velocity};
    use crate::settings::WorldSettings;
    const EPSILON: f64 = 1e-9;

    fn bodies() -> JointBodies {
        JointBodies {
            a: SolverBody {
                index: 0,
                ..Default::default()
            },
            b: SolverBody {
                index: 1,
                local_center: Vec2::ZERO,
                inv_mass: 1.0,
                inv_i: 2.0,
            },
        }
    }

    #[test]
    fn test_rigid_weld_stops_all_relative_motion() {
        let mut joint = WeldJoint::new(Vec2::ZERO, Vec2::new(-1.0, 0.0), 0.0);
        let bodies = bodies();
        let mut positions = vec![
            Position::default(),
            Position {
                c: Vec2::new(1.0, 0.0),
                a: 0.0,
            },
        ];
        let mut velocities = vec![
            Velocity::default(),
            Velocity {
                v: Vec2::new(0.5, -2.0),
                w: 1.5,
            },
        ];
        let mut data = SolverData {
            step: TimeStep::new(1.0 / 60.0, 60.0, &WorldSettings::default()),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        joint.init_velocity_constraints(&bodies, &mut data);
        joint.solve_velocity_constraints(&bodies, &mut data);

        assert!(data.velocities[1].v.magnitude() < EPSILON);
        assert!(data.velocities[1].w.abs() < EPSILON);
    }

    #[test]
    fn test_position_pass_fixes_angle() {
        let mut joint = WeldJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        let bodies = bodies();
        let mut positions = vec![
            Position::default(),
            Position {
                c: Vec2::ZERO,
                a: 0.1,
            },
        ];
        let mut velocities = vec![Velocity::default(); 2];
        let mut data = SolverData {
            step: TimeStep::new(1.0 / 60.0, 60.0, &WorldSettings::default()),
            positions: &mut positions,
            velocities: &mut velocities,
        };
        assert!(!joint.solve_position_constraints(&bodies, &mut data));
        assert!(data.positions[1].a.abs() < EPSILON);
        assert!(joint.solve_position_constraints(&bodies, &mut data));
    }

    #[test]
    fn test_error_combines_gap_and_angle() {
        use crate::objects::BodyDef;
        let joint = WeldJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0);
        let a = Body::new(&BodyDef::default());
        let b = Body::new(&BodyDef::dynamic().at(Vec2::new(0.3, 0.4)).with_angle(0.5));
        assert!((joint.constraint_error(&a, &b) - 1.0).abs() < EPSILON);
    }
}
