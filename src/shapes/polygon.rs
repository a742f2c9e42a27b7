use super::MassData;
use crate::collision::{RayCastInput, RayCastOutput, AABB};
use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};

/// Convex polygon in body-local coordinates, wound counter-clockwise.
///
/// Construction validates the input so every live polygon is convex, has
/// between 3 and [`MAX_POLYGON_VERTICES`] vertices and non-degenerate edges.
/// Each `normals[i]` is the outward unit normal of the edge
/// `vertices[i] -> vertices[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub(crate) vertices: Vec<Vec2>,
    pub(crate) normals: Vec<Vec2>,
    pub(crate) centroid: Vec2,
    /// Skin radius, always [`POLYGON_RADIUS`].
    pub(crate) radius: f64,
}

impl Polygon {
    /// Creates a new polygon from a set of points.
    ///
    /// Nearly coincident points are welded. Clockwise input is reversed.
    /// Fails on fewer than 3 or more than 8 points, non-finite coordinates,
    /// and collinear or non-convex input.
    pub fn new(points: &[Vec2]) -> Result<Self> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::geometry(format!(
                "polygon needs 3..={} vertices, got {}",
                MAX_POLYGON_VERTICES,
                points.len()
            )));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(PhysicsError::geometry("polygon vertices must be finite"));
        }

        let weld_tolerance = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut vertices: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if vertices
                .iter()
                .all(|v| v.distance_squared(p) >= weld_tolerance)
            {
                vertices.push(p);
            }
        }
        if vertices.len() < 3 {
            return Err(PhysicsError::geometry(
                "polygon is degenerate after welding close vertices",
            ));
        }

        let area = signed_area(&vertices);
        if area.abs() <= f64::EPSILON {
            return Err(PhysicsError::geometry("polygon vertices are collinear"));
        }
        if area < 0.0 {
            vertices.reverse();
        }

        let n = vertices.len();
        for i in 0..n {
            let p = vertices[i];
            let e = vertices[(i + 1) % n] - p;
            for (j, &v) in vertices.iter().enumerate() {
                if j == i || j == (i + 1) % n {
                    continue;
                }
                // Every other vertex must be strictly left of each edge.
                if e.cross(v - p) <= 0.0 {
                    return Err(PhysicsError::geometry("polygon is not convex"));
                }
            }
        }

        let normals = compute_normals(&vertices);
        let centroid = compute_centroid(&vertices);
        Ok(Self {
            vertices,
            normals,
            centroid,
            radius: POLYGON_RADIUS,
        })
    }

    /// Axis-aligned box with half-widths `hx` and `hy`, centered on the origin.
    pub fn new_box(hx: f64, hy: f64) -> Result<Self> {
        if !(hx.is_finite() && hy.is_finite()) || hx <= 0.0 || hy <= 0.0 {
            return Err(PhysicsError::geometry(format!(
                "box half-extents must be finite and positive, got ({hx}, {hy})"
            )));
        }
        Ok(Self {
            vertices: vec![
                Vec2::new(-hx, -hy),
                Vec2::new(hx, -hy),
                Vec2::new(hx, hy),
                Vec2::new(-hx, hy),
            ],
            normals: vec![
                Vec2::new(0.0, -1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(-1.0, 0.0),
            ],
            centroid: Vec2::ZERO,
            radius: POLYGON_RADIUS,
        })
    }

    /// Box with half-widths `hx`, `hy` centered at `center` and rotated by `angle`.
    pub fn new_oriented_box(hx: f64, hy: f64, center: Vec2, angle: f64) -> Result<Self> {
        let mut poly = Self::new_box(hx, hy)?;
        let xf = Transform::new(center, angle);
        for v in poly.vertices.iter_mut() {
            *v = xf.apply(*v);
        }
        for n in poly.normals.iter_mut() {
            *n = xf.rotation.mul_vec(*n);
        }
        poly.centroid = center;
        Ok(poly)
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Outward unit normals, one per edge.
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn count(&self) -> usize {
        self.vertices.len()
    }

    /// Calculates the area of the polygon using the Shoelace formula.
    pub fn calculate_area(&self) -> f64 {
        signed_area(&self.vertices).abs()
    }

    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.apply_inverse(p);
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(local - *v) <= 0.0)
    }

    /// Clips the segment against every edge half-plane. Rays starting inside report no hit.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for (i, (v, n)) in self.vertices.iter().zip(&self.normals).enumerate() {
            // p = p1 + a * d
            // dot(normal, p - v) = 0
            // dot(normal, p1 - v) + a * dot(normal, d) = 0
            let numerator = n.dot(*v - p1);
            let denominator = n.dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Entering this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Leaving this half-space.
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            normal: xf.rotation.mul_vec(self.normals[i]),
            fraction: lower,
        })
    }

    pub fn compute_aabb(&self, xf: &Transform) -> AABB {
        let mut lower = xf.apply(self.vertices[0]);
        let mut upper = lower;
        for v in self.vertices.iter().skip(1) {
            let p = xf.apply(*v);
            lower = lower.min(p);
            upper = upper.max(p);
        }
        AABB {
            min: lower,
            max: upper,
        }
        .fattened(self.radius)
    }

    /// Mass properties from a triangle fan around the vertex average.
    ///
    /// The reference point keeps the fan inside the polygon, which keeps the
    /// integration accurate far from the origin.
    pub fn compute_mass(&self, density: f64) -> MassData {
        let count = self.vertices.len() as f64;
        let s = self
            .vertices
            .iter()
            .fold(Vec2::ZERO, |acc, v| acc + *v)
            * (1.0 / count);

        const INV3: f64 = 1.0 / 3.0;
        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        let n = self.vertices.len();
        for i in 0..n {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % n] - s;

            let d = e1.cross(e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;

            center += (e1 + e2) * (triangle_area * INV3);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        center *= 1.0 / area;
        let world_center = center + s;

        // Shift inertia from the reference point to the local origin.
        let inertia = density * inertia
            + mass * (world_center.magnitude_squared() - center.magnitude_squared());

        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

fn signed_area(vertices: &[Vec2]) -> f64 {
    let n = vertices.len();
    let mut area = 0.0;
    for i in 0..n {
        area += vertices[i].cross(vertices[(i + 1) % n]);
    }
    0.5 * area
}

fn compute_normals(vertices: &[Vec2]) -> Vec<Vec2> {
    let n = vertices.len();
    (0..n)
        .map(|i| (vertices[(i + 1) % n] - vertices[i]).cross_scalar(1.0).normalize())
        .collect()
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    let n = vertices.len();
    let origin = vertices[0];
    let mut centroid = Vec2::ZERO;
    let mut area = 0.0;
    for i in 1..(n - 1) {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let triangle_area = 0.5 * e1.cross(e2);
        area += triangle_area;
        centroid += (e1 + e2) * (triangle_area / 3.0);
    }
    centroid * (1.0 / area) + origin
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    fn square() -> Polygon {
        Polygon::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_polygon_accessors_expose_validated_geometry() {
        // Clockwise input comes back counter-clockwise.
        let poly = Polygon::new(&[
            Vec2::new(0.0, 2.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(poly.vertices().len(), 4);
        assert_eq!(poly.normals().len(), 4);
        assert!((poly.centroid() - Vec2::new(1.0, 1.0)).magnitude() < EPSILON);
        assert_eq!(poly.radius(), POLYGON_RADIUS);

        let vs = poly.vertices();
        for (i, n) in poly.normals().iter().enumerate() {
            let edge = vs[(i + 1) % vs.len()] - vs[i];
            assert!((n.magnitude() - 1.0).abs() < EPSILON);
            assert!(edge.cross(*n) < 0.0);
            assert!(n.dot(vs[i] - poly.centroid()) > 0.0);
        }
    }

    #[test]
    fn test_polygon_new_rejects_too_few_vertices() {
        let err = Polygon::new(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_polygon_new_rejects_too_many_vertices() {
        let points: Vec<Vec2> = (0..9)
            .map(|i| Vec2::new(1.0, 0.0).rotate(i as f64 * 0.6))
            .collect();
        assert!(Polygon::new(&points).is_err());
    }

    #[test]
    fn test_polygon_rejects_non_convex_and_collinear() {
        let dart = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5),
            Vec2::new(1.0, 2.0),
        ];
        assert!(Polygon::new(&dart).is_err());

        let line = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ];
        assert!(Polygon::new(&line).is_err());
    }

    #[test]
    fn test_polygon_welds_near_duplicates() {
        let tri = Polygon::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0 + 1e-5, 0.0),
            Vec2::new(0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(tri.count(), 3);
    }

    #[test]
    fn test_polygon_reverses_clockwise_input() {
        let cw = Polygon::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.0),
        ])
        .unwrap();
        assert!(signed_area(&cw.vertices) > 0.0);
        // Normals point away from the centroid.
        for (v, n) in cw.vertices.iter().zip(&cw.normals) {
            assert!(n.dot(*v - cw.centroid) > 0.0);
        }
    }

    #[test]
    fn test_polygon_area_and_centroid() {
        let sq = square();
        assert!((sq.calculate_area() - 4.0).abs() < EPSILON);
        assert!((sq.centroid.x - 1.0).abs() < EPSILON);
        assert!((sq.centroid.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_box_mass_matches_closed_form() {
        let b = Polygon::new_box(1.0, 0.5).unwrap();
        let md = b.compute_mass(2.0);
        // 2 x 1 box, density 2
        assert!((md.mass - 4.0).abs() < EPSILON);
        assert!(md.center.magnitude() < EPSILON);
        let expected = md.mass * (2.0 * 2.0 + 1.0 * 1.0) / 12.0;
        assert!((md.inertia - expected).abs() < EPSILON);
    }

    #[test]
    fn test_offset_polygon_inertia_uses_parallel_axis() {
        let md = square().compute_mass(1.0);
        assert!((md.mass - 4.0).abs() < EPSILON);
        assert!((md.center.x - 1.0).abs() < EPSILON);
        let about_center = md.mass * (4.0 + 4.0) / 12.0;
        let about_origin = about_center + md.mass * md.center.magnitude_squared();
        assert!((md.inertia - about_origin).abs() < EPSILON);
    }

    #[test]
    fn test_oriented_box() {
        let b = Polygon::new_oriented_box(1.0, 1.0, Vec2::new(3.0, 0.0), 0.25).unwrap();
        assert!((b.centroid.x - 3.0).abs() < EPSILON);
        let md = b.compute_mass(1.0);
        assert!((md.center.x - 3.0).abs() < EPSILON);
        assert!(md.center.y.abs() < EPSILON);
    }

    #[test]
    fn test_polygon_test_point() {
        let sq = square();
        let xf = Transform::new(Vec2::new(10.0, 0.0), 0.0);
        assert!(sq.test_point(&xf, Vec2::new(11.0, 1.0)));
        assert!(!sq.test_point(&xf, Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn test_polygon_ray_cast() {
        let b = Polygon::new_box(1.0, 1.0).unwrap();
        let xf = Transform::identity();
        let input = RayCastInput {
            p1: Vec2::new(0.0, 5.0),
            p2: Vec2::new(0.0, -5.0),
            max_fraction: 1.0,
        };
        let hit = b.ray_cast(&input, &xf).unwrap();
        assert!((hit.fraction - 0.4).abs() < EPSILON);
        assert!((hit.normal.y - 1.0).abs() < EPSILON);

        let inside = RayCastInput {
            p1: Vec2::ZERO,
            ..input
        };
        assert!(b.ray_cast(&inside, &xf).is_none());
    }

    #[test]
    fn test_polygon_aabb_includes_skin() {
        let b = Polygon::new_box(1.0, 2.0).unwrap();
        let aabb = b.compute_aabb(&Transform::identity());
        assert!((aabb.max.x - (1.0 + POLYGON_RADIUS)).abs() < EPSILON);
        assert!((aabb.min.y + 2.0 + POLYGON_RADIUS).abs() < EPSILON);
    }
}
