//! Sequential impulse solver for contact constraints.
//!
//! Velocity constraints handle non-penetration, friction and restitution
//! with warm-started accumulated impulses. Position constraints then push
//! overlapping shapes apart with a Baumgarte-scaled, clamped correction.

use crate::collision::{Manifold, ManifoldKind, WorldManifold};
use crate::math::{Mat22, Rot, Transform, Vec2};
use crate::settings::{MAX_CONDITION_NUMBER, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS};

use super::time_step::{Position, TimeStep, Velocity};

/// Mass properties of one side of a constraint, indexed into the island.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverBody {
    pub index: usize,
    pub local_center: Vec2,
    pub inv_mass: f64,
    pub inv_i: f64,
}

/// Input for one touching contact.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContactSolverDef {
    pub manifold: Manifold,
    pub radius_a: f64,
    pub radius_b: f64,
    pub friction: f64,
    pub restitution: f64,
    pub tangent_speed: f64,
    pub body_a: SolverBody,
    pub body_b: SolverBody,
}

/// Accumulated impulses of a solved contact, reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f64; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f64,
    tangent_impulse: f64,
    normal_mass: f64,
    tangent_mass: f64,
    velocity_bias: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat22,
    k: Mat22,
    body_a: SolverBody,
    body_b: SolverBody,
    friction: f64,
    restitution: f64,
    tangent_speed: f64,
    /// Solved point count; drops to one for an ill-conditioned block.
    point_count: usize,
    /// Manifold point count, used when storing impulses.
    manifold_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct PositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    body_a: SolverBody,
    body_b: SolverBody,
    kind: ManifoldKind,
    radius_a: f64,
    radius_b: f64,
    point_count: usize,
}

pub(crate) struct ContactSolver {
    step: TimeStep,
    manifolds: Vec<Manifold>,
    velocity_constraints: Vec<VelocityConstraint>,
    position_constraints: Vec<PositionConstraint>,
}

struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f64,
}

impl PositionSolverManifold {
    fn new(pc: &PositionConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        match pc.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.apply(pc.local_point);
                let point_b = xf_b.apply(pc.local_points[0]);
                let mut normal = Vec2::X_AXIS;
                if point_a.distance_squared(point_b) > f64::EPSILON * f64::EPSILON {
                    normal = (point_b - point_a).normalize();
                }
                Self {
                    normal,
                    point: (point_a + point_b) * 0.5,
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.rotation.mul_vec(pc.local_normal);
                let plane_point = xf_a.apply(pc.local_point);
                let clip_point = xf_b.apply(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.rotation.mul_vec(pc.local_normal);
                let plane_point = xf_b.apply(pc.local_point);
                let clip_point = xf_a.apply(pc.local_points[index]);
                Self {
                    // Point from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

fn body_transform(position: &Position, local_center: Vec2) -> Transform {
    let rotation = Rot::from_angle(position.a);
    Transform {
        position: position.c - rotation.mul_vec(local_center),
        rotation,
    }
}

/// Tries the complementarity cases in order: both points active, only the
/// first, only the second, neither. `None` when no case is feasible.
fn block_solve(
    vc: &VelocityConstraint,
    cp1: &VelocityConstraintPoint,
    cp2: &VelocityConstraintPoint,
    b: Vec2,
) -> Option<Vec2> {
    let x = -(vc.normal_mass * b);
    if x.x >= 0.0 && x.y >= 0.0 {
        return Some(x);
    }

    let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
    let vn2 = vc.k.ex.y * x.x + b.y;
    if x.x >= 0.0 && vn2 >= 0.0 {
        return Some(x);
    }

    let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
    let vn1 = vc.k.ey.x * x.y + b.x;
    if x.y >= 0.0 && vn1 >= 0.0 {
        return Some(x);
    }

    if b.x >= 0.0 && b.y >= 0.0 {
        return Some(Vec2::ZERO);
    }
    None
}

impl ContactSolver {
    pub fn new(step: TimeStep, defs: &[ContactSolverDef]) -> Self {
        let mut velocity_constraints = Vec::with_capacity(defs.len());
        let mut position_constraints = Vec::with_capacity(defs.len());

        for def in defs {
            let manifold = &def.manifold;
            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut vc = VelocityConstraint {
                body_a: def.body_a,
                body_b: def.body_b,
                friction: def.friction,
                restitution: def.restitution,
                tangent_speed: def.tangent_speed,
                point_count,
                manifold_count: point_count,
                ..Default::default()
            };
            let mut pc = PositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                body_a: def.body_a,
                body_b: def.body_b,
                kind: manifold.kind,
                radius_a: def.radius_a,
                radius_b: def.radius_b,
                point_count,
            };

            for (j, mp) in manifold.points().iter().enumerate() {
                let vcp = &mut vc.points[j];
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
                pc.local_points[j] = mp.local_point;
            }

            velocity_constraints.push(vc);
            position_constraints.push(pc);
        }

        Self {
            step,
            manifolds: defs.iter().map(|def| def.manifold).collect(),
            velocity_constraints,
            position_constraints,
        }
    }

    pub fn initialize_velocity_constraints(&mut self, positions: &[Position], velocities: &[Velocity]) {
        for ((vc, pc), manifold) in self
            .velocity_constraints
            .iter_mut()
            .zip(&self.position_constraints)
            .zip(&self.manifolds)
        {
            let (a, b) = (vc.body_a, vc.body_b);
            let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

            let c_a = positions[a.index].c;
            let c_b = positions[b.index].c;
            let v_a = velocities[a.index].v;
            let w_a = velocities[a.index].w;
            let v_b = velocities[b.index].v;
            let w_b = velocities[b.index].w;

            let xf_a = body_transform(&positions[a.index], a.local_center);
            let xf_b = body_transform(&positions[b.index], b.local_center);
            let wm = WorldManifold::new(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = wm.normal;
            let tangent = vc.normal.cross_scalar(1.0);

            for j in 0..vc.point_count {
                let vcp = &mut vc.points[j];
                vcp.r_a = wm.points[j] - c_a;
                vcp.r_b = wm.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution bias only above the threshold to avoid jitter.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a),
                );
                if v_rel < -self.step.velocity_threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            if vc.point_count == 2 {
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];

                let rn1_a = cp1.r_a.cross(vc.normal);
                let rn1_b = cp1.r_b.cross(vc.normal);
                let rn2_a = cp2.r_a.cross(vc.normal);
                let rn2_b = cp2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    vc.k = Mat22::new(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.inverse();
                } else {
                    // Redundant points: solve only the first.
                    vc.point_count = 1;
                }
            }
        }
    }

    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (a, b) = (vc.body_a, vc.body_b);
            let mut v_a = velocities[a.index].v;
            let mut w_a = velocities[a.index].w;
            let mut v_b = velocities[b.index].v;
            let mut w_b = velocities[b.index].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);

            for vcp in &vc.points[..vc.point_count] {
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                w_a -= a.inv_i * vcp.r_a.cross(p);
                v_a -= p * a.inv_mass;
                w_b += b.inv_i * vcp.r_b.cross(p);
                v_b += p * b.inv_mass;
            }

            velocities[a.index] = Velocity { v: v_a, w: w_a };
            velocities[b.index] = Velocity { v: v_b, w: w_b };
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let (a, b) = (vc.body_a, vc.body_b);
            let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

            let mut v_a = velocities[a.index].v;
            let mut w_a = velocities[a.index].w;
            let mut v_b = velocities[b.index].v;
            let mut w_b = velocities[b.index].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);
            let friction = vc.friction;

            // Friction first: non-penetration matters more.
            for vcp in &mut vc.points[..vc.point_count] {
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * -vt;

                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            }

            if vc.point_count == 1 {
                let vcp = &mut vc.points[0];
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);
                let vn = dv.dot(normal);
                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = normal * lambda;
                v_a -= p * m_a;
                w_a -= i_a * vcp.r_a.cross(p);
                v_b += p * m_b;
                w_b += i_b * vcp.r_b.cross(p);
            } else {
                // Block solver for the two-point mixed LCP:
                //   vn = A * x + b, vn >= 0, x >= 0, vn_i * x_i = 0
                // with b' = b - A * a for the accumulated impulse a. The
                // four complementarity cases are tried in order.
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];

                let a_old = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);

                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1.r_b) - v_a - Vec2::scalar_cross(w_a, cp1.r_a);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2.r_b) - v_a - Vec2::scalar_cross(w_a, cp2.r_a);

                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let mut rhs = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                rhs -= vc.k * a_old;

                let solution = block_solve(vc, &cp1, &cp2, rhs);

                if let Some(x) = solution {
                    let d = x - a_old;
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (cp1.r_a.cross(p1) + cp2.r_a.cross(p2));
                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (cp1.r_b.cross(p1) + cp2.r_b.cross(p2));

                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
                // No solution: keep the previous impulses for this iteration.
            }

            velocities[a.index] = Velocity { v: v_a, w: w_a };
            velocities[b.index] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Accumulated impulses per contact, in the order the contacts were given.
    pub fn impulses(&self) -> impl Iterator<Item = ContactImpulse> + '_ {
        self.velocity_constraints.iter().map(|vc| {
            let mut impulse = ContactImpulse {
                count: vc.manifold_count,
                ..Default::default()
            };
            for j in 0..vc.manifold_count {
                impulse.normal_impulses[j] = vc.points[j].normal_impulse;
                impulse.tangent_impulses[j] = vc.points[j].tangent_impulse;
            }
            impulse
        })
    }

    /// Non-linear Gauss-Seidel pass over the contact positions. Returns
    /// `true` once the worst overlap is within three times the allowed
    /// penetration.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let mut min_separation = 0.0_f64;

        for pc in &self.position_constraints {
            let (a, b) = (pc.body_a, pc.body_b);
            let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_i, b.inv_i);

            let mut pos_a = positions[a.index];
            let mut pos_b = positions[b.index];

            for j in 0..pc.point_count {
                let xf_a = body_transform(&pos_a, a.local_center);
                let xf_b = body_transform(&pos_b, b.local_center);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let r_a = psm.point - pos_a.c;
                let r_b = psm.point - pos_b.c;

                min_separation = min_separation.min(psm.separation);

                // Leave a little overlap so contacts persist.
                let c = (self.step.baumgarte * (psm.separation + self.step.allowed_penetration))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = r_a.cross(psm.normal);
                let rn_b = r_b.cross(psm.normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = psm.normal * impulse;
                pos_a.c -= p * m_a;
                pos_a.a -= i_a * r_a.cross(p);
                pos_b.c += p * m_b;
                pos_b.a += i_b * r_b.cross(p);
            }

            positions[a.index] = pos_a;
            positions[b.index] = pos_b;
        }

        min_separation >= -3.0 * self.step.allowed_penetration
    }
}
