use std::f64::consts::PI;

use super::MassData;
use crate::collision::{RayCastInput, RayCastOutput, AABB};
use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center in body-local coordinates.
    pub(crate) position: Vec2,
    pub(crate) radius: f64,
}

impl Circle {
    /// Circle centered on the body origin.
    pub fn new(radius: f64) -> Result<Self> {
        Self::with_center(Vec2::ZERO, radius)
    }

    pub fn with_center(position: Vec2, radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(PhysicsError::geometry(format!(
                "circle radius must be finite and positive, got {radius}"
            )));
        }
        if !position.is_finite() {
            return Err(PhysicsError::geometry("circle center must be finite"));
        }
        Ok(Self { position, radius })
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let center = xf.apply(self.position);
        (p - center).magnitude_squared() <= self.radius * self.radius
    }

    /// Solves `|p1 + t * d - c| = r` for the smallest `t` in range.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let position = xf.apply(self.position);
        let s = input.p1 - position;
        let b = s.magnitude_squared() - self.radius * self.radius;

        let r = input.p2 - input.p1;
        let c = s.dot(r);
        let rr = r.magnitude_squared();
        let sigma = c * c - rr * b;

        if sigma < 0.0 || rr < f64::EPSILON {
            return None;
        }

        let a = -(c + sigma.sqrt());
        if 0.0 <= a && a <= input.max_fraction * rr {
            let fraction = a / rr;
            return Some(RayCastOutput {
                normal: (s + r * fraction).normalize(),
                fraction,
            });
        }
        None
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let p = xf.apply(self.position);
        AABB::from_center(p, Vec2::new(self.radius, self.radius))
    }

    pub fn compute_mass(&self, density: f64) -> MassData {
        let r2 = self.radius * self.radius;
        let mass = density * PI * r2;
        MassData {
            mass,
            center: self.position,
            // inertia about the local origin
            inertia: mass * (0.5 * r2 + self.position.magnitude_squared()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_circle_new() {
        let c = Circle::new(5.0).unwrap();
        assert_eq!(c.radius, 5.0);
        assert_eq!(c.position, Vec2::ZERO);
    }

    #[test]
    fn test_circle_rejects_bad_radius() {
        assert!(Circle::new(-1.0).is_err());
        assert!(Circle::new(0.0).is_err());
        assert!(Circle::new(f64::NAN).is_err());
    }

    #[test]
    fn test_circle_mass() {
        let c = Circle::new(2.0).unwrap();
        let md = c.compute_mass(1.0);
        assert!((md.mass - 4.0 * PI).abs() < EPSILON);
        assert!((md.inertia - 0.5 * md.mass * 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_circle_test_point_and_aabb() {
        let c = Circle::with_center(Vec2::new(1.0, 0.0), 0.5).unwrap();
        let xf = Transform::new(Vec2::new(0.0, 2.0), 0.0);
        assert!(c.test_point(&xf, Vec2::new(1.2, 2.0)));
        assert!(!c.test_point(&xf, Vec2::new(0.0, 2.0)));
        let aabb = c.compute_aabb(&xf);
        assert!((aabb.min.x - 0.5).abs() < EPSILON);
        assert!((aabb.max.y - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_circle_ray_cast() {
        let c = Circle::new(1.0).unwrap();
        let xf = Transform::identity();
        let input = RayCastInput {
            p1: Vec2::new(-3.0, 0.0),
            p2: Vec2::new(3.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = c.ray_cast(&input, &xf).unwrap();
        assert!((hit.fraction - 2.0 / 6.0).abs() < EPSILON);
        assert!((hit.normal.x + 1.0).abs() < EPSILON);

        let short = RayCastInput {
            max_fraction: 0.2,
            ..input
        };
        assert!(c.ray_cast(&short, &xf).is_none());
    }
}
