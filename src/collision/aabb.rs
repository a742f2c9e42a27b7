// Defines an Axis-Aligned Bounding Box

use super::ray::{RayCastInput, RayCastOutput};
use crate::math::vec2::Vec2;

/// An Axis-Aligned Bounding Box defined by its minimum and maximum corner points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AABB {
    pub min: Vec2,
    pub max: Vec2,
}

impl AABB {
    /// Creates a new AABB.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        // Ensure min coordinates are <= max coordinates
        AABB {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Box of half extents `extents` around `center`.
    pub fn from_center(center: Vec2, extents: Vec2) -> Self {
        AABB::new(center - extents, center + extents)
    }

    /// Checks if this AABB overlaps with another AABB. Touching boxes overlap.
    pub fn overlaps(&self, other: &AABB) -> bool {
        !(other.min.x > self.max.x
            || other.min.y > self.max.y
            || self.min.x > other.max.x
            || self.min.y > other.max.y)
    }

    /// Merges another AABB into this one, expanding this AABB to contain both.
    pub fn merge(&mut self, other: &AABB) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Smallest box containing both inputs.
    pub fn combine(a: &AABB, b: &AABB) -> AABB {
        AABB {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Half widths.
    pub fn extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Perimeter, the surface-area heuristic used by the dynamic tree.
    pub fn perimeter(&self) -> f64 {
        let wx = self.max.x - self.min.x;
        let wy = self.max.y - self.min.y;
        2.0 * (wx + wy)
    }

    /// Grows the box by `margin` on every side.
    pub fn fattened(&self, margin: f64) -> AABB {
        let r = Vec2::new(margin, margin);
        AABB {
            min: self.min - r,
            max: self.max + r,
        }
    }

    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_finite() && self.max.is_finite()
    }

    /// Creates an AABB that encompasses a set of points.
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min_pt = *first;
        let mut max_pt = *first;
        for point in rest {
            min_pt = min_pt.min(*point);
            max_pt = max_pt.max(*point);
        }
        Some(AABB {
            min: min_pt,
            max: max_pt,
        })
    }

    /// Slab test of a segment against the box. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = f64::MIN;
        let mut tmax = f64::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let mut normal = Vec2::ZERO;

        let axes = [
            (p.x, d.x, self.min.x, self.max.x, Vec2::X_AXIS),
            (p.y, d.y, self.min.y, self.max.y, Vec2::UP),
        ];
        for (p_i, d_i, lower, upper, axis) in axes {
            if d_i.abs() < f64::EPSILON {
                // Parallel to the slab.
                if p_i < lower || upper < p_i {
                    return None;
                }
            } else {
                let inv_d = 1.0 / d_i;
                let mut t1 = (lower - p_i) * inv_d;
                let mut t2 = (upper - p_i) * inv_d;
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }
                if t1 > tmin {
                    normal = axis * s;
                    tmin = t1;
                }
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }
        Some(RayCastOutput {
            normal,
            fraction: tmin,
        })
    }
}
