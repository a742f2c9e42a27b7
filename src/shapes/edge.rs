use crate::collision::{RayCastInput, RayCastOutput, AABB};
use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec2};
use crate::settings::POLYGON_RADIUS;

/// Line segment `vertex1 -> vertex2`.
///
/// A one-sided edge collides only from the right of its direction (the
/// outside of a counter-clockwise loop) and uses the ghost vertices
/// `vertex0`/`vertex3` to suppress collisions against internal chain corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub vertex0: Vec2,
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    pub vertex3: Vec2,
    pub one_sided: bool,
    pub radius: f64,
}

impl Edge {
    /// Two-sided segment between `a` and `b`.
    pub fn new(a: Vec2, b: Vec2) -> Result<Self> {
        validate_segment(a, b)?;
        Ok(Self {
            vertex0: a,
            vertex1: a,
            vertex2: b,
            vertex3: b,
            one_sided: false,
            radius: POLYGON_RADIUS,
        })
    }

    /// One-sided segment `v1 -> v2` with ghost neighbors `v0` and `v3`.
    pub fn new_one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Result<Self> {
        validate_segment(v1, v2)?;
        if !(v0.is_finite() && v3.is_finite()) {
            return Err(PhysicsError::geometry("edge ghost vertices must be finite"));
        }
        Ok(Self {
            vertex0: v0,
            vertex1: v1,
            vertex2: v2,
            vertex3: v3,
            one_sided: true,
            radius: POLYGON_RADIUS,
        })
    }

    /// Calculates the length of the segment.
    pub fn length(&self) -> f64 {
        self.vertex1.distance(self.vertex2)
    }

    /// Returns the direction vector of the segment (from vertex1 to vertex2).
    pub fn direction(&self) -> Vec2 {
        self.vertex2 - self.vertex1
    }

    /// Segment intersection. One-sided edges ignore rays arriving from behind.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        // Put the ray into the edge's frame of reference.
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let e = v2 - v1;

        // Normal points to the right, looking from v1 at v2
        let normal = e.cross_scalar(1.0).normalize();

        // q = p1 + t * d
        // dot(normal, q - v1) = 0
        // dot(normal, p1 - v1) + t * dot(normal, d) = 0
        let numerator = normal.dot(v1 - p1);
        if self.one_sided && numerator > 0.0 {
            return None;
        }

        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }

        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + d * t;

        // q = v1 + s * r
        // s = dot(q - v1, r) / dot(r, r)
        let rr = e.magnitude_squared();
        if rr == 0.0 {
            return None;
        }
        let s = (q - v1).dot(e) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = xf.rotation.mul_vec(normal);
        Some(RayCastOutput {
            normal: if numerator > 0.0 {
                -world_normal
            } else {
                world_normal
            },
            fraction: t,
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let v1 = xf.apply(self.vertex1);
        let v2 = xf.apply(self.vertex2);
        AABB::new(v1.min(v2), v1.max(v2)).fattened(self.radius)
    }
}

fn validate_segment(a: Vec2, b: Vec2) -> Result<()> {
    if !(a.is_finite() && b.is_finite()) {
        return Err(PhysicsError::geometry("edge vertices must be finite"));
    }
    if a.distance_squared(b) <= f64::EPSILON * f64::EPSILON {
        return Err(PhysicsError::geometry("edge has zero length"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_edge_new() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 6.0);
        let edge = Edge::new(a, b).unwrap();
        assert_eq!(edge.vertex1, a);
        assert_eq!(edge.vertex2, b);
        assert!(!edge.one_sided);
        assert!((edge.length() - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_edge_rejects_zero_length() {
        let p = Vec2::new(1.0, 1.0);
        assert!(Edge::new(p, p).is_err());
    }

    #[test]
    fn test_two_sided_ray_cast_from_both_sides() {
        let edge = Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let xf = Transform::identity();
        let down = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&down, &xf).unwrap();
        assert!((hit.fraction - 0.5).abs() < EPSILON);
        assert!((hit.normal.y - 1.0).abs() < EPSILON);

        let up = RayCastInput {
            p1: Vec2::new(0.0, -2.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        let hit = edge.ray_cast(&up, &xf).unwrap();
        assert!((hit.normal.y + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_one_sided_ray_cast_ignores_back_face() {
        // Right-to-left direction: the solid side faces up.
        let edge = Edge::new_one_sided(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(-2.0, 0.0),
        )
        .unwrap();
        let xf = Transform::identity();
        let down = RayCastInput {
            p1: Vec2::new(0.0, 2.0),
            p2: Vec2::new(0.0, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&down, &xf).is_some());
        let up = RayCastInput {
            p1: Vec2::new(0.0, -2.0),
            p2: Vec2::new(0.0, 2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&up, &xf).is_none());
    }

    #[test]
    fn test_edge_ray_misses_past_end() {
        let edge = Edge::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let input = RayCastInput {
            p1: Vec2::new(3.0, 2.0),
            p2: Vec2::new(3.0, -2.0),
            max_fraction: 1.0,
        };
        assert!(edge.ray_cast(&input, &Transform::identity()).is_none());
    }
}
