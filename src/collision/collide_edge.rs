//! Edge (and chain segment) against circles and polygons.
//!
//! One-sided edges only collide from their right-hand side and consult the
//! ghost vertices so shapes sliding along a chain do not snag on the
//! internal vertices.

use super::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldKind,
};
use crate::math::{Transform, Vec2};
use crate::settings::MAX_MANIFOLD_POINTS;
use crate::shapes::{Circle, Edge, Polygon};

/// Edge (A) against circle (B), resolved by Voronoi region of the segment.
pub fn collide_edge_and_circle(
    edge_a: &Edge,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the frame of the edge.
    let q = xf_a.apply_inverse(xf_b.apply(circle_b.position));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Normal points to the right for a CCW winding
    let mut n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    if edge_a.one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    let mut cf = ContactFeature {
        index_b: 0,
        type_b: FeatureType::Vertex,
        ..Default::default()
    };

    // Region A
    if v <= 0.0 {
        let p = a;
        if q.distance_squared(p) > radius * radius {
            return manifold;
        }

        // Is the circle in region AB of the previous edge?
        if edge_a.one_sided {
            let a1 = edge_a.vertex0;
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);
            if u1 > 0.0 {
                return manifold;
            }
        }

        cf.index_a = 0;
        cf.type_a = FeatureType::Vertex;
        manifold.point_count = 1;
        manifold.kind = ManifoldKind::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = cf;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region B
    if u <= 0.0 {
        let p = b;
        if q.distance_squared(p) > radius * radius {
            return manifold;
        }

        // Is the circle in region AB of the next edge?
        if edge_a.one_sided {
            let b2 = edge_a.vertex3;
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);
            if v2 > 0.0 {
                return manifold;
            }
        }

        cf.index_a = 1;
        cf.type_a = FeatureType::Vertex;
        manifold.point_count = 1;
        manifold.kind = ManifoldKind::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0].id = cf;
        manifold.points[0].local_point = circle_b.position;
        return manifold;
    }

    // Region AB
    let den = e.magnitude_squared();
    debug_assert!(den > 0.0);
    let p = (a * u + b * v) * (1.0 / den);
    if q.distance_squared(p) > radius * radius {
        return manifold;
    }

    if offset < 0.0 {
        n = -n;
    }
    n = n.normalize();

    cf.index_a = 0;
    cf.type_a = FeatureType::Face;
    manifold.point_count = 1;
    manifold.kind = ManifoldKind::FaceA;
    manifold.local_normal = n;
    manifold.local_point = a;
    manifold.points[0].id = cf;
    manifold.points[0].local_point = circle_b.position;
    manifold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    Unknown,
    EdgeA,
    EdgeB,
}

#[derive(Debug, Clone, Copy)]
struct EpAxis {
    normal: Vec2,
    kind: AxisKind,
    index: usize,
    separation: f64,
}

/// Polygon vertices and normals expressed in the edge's frame.
struct TempPolygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
}

struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f64,
    side_normal2: Vec2,
    side_offset2: f64,
}

fn compute_edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: AxisKind::EdgeA,
        index: 0,
        separation: f64::MIN,
        normal: Vec2::ZERO,
    };

    let axes = [normal1, -normal1];

    // Find axis with least overlap (min-max problem)
    for (j, axis_j) in axes.iter().enumerate() {
        // Deepest polygon vertex along axis j
        let sj = polygon_b
            .vertices
            .iter()
            .map(|v| axis_j.dot(*v - v1))
            .fold(f64::MAX, f64::min);

        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = *axis_j;
        }
    }
    axis
}

fn compute_polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: AxisKind::Unknown,
        index: 0,
        separation: f64::MIN,
        normal: Vec2::ZERO,
    };

    for (i, (nb, vb)) in polygon_b.normals.iter().zip(&polygon_b.vertices).enumerate() {
        let n = -*nb;

        let s1 = n.dot(*vb - v1);
        let s2 = n.dot(*vb - v2);
        let s = s1.min(s2);

        if s > axis.separation {
            axis.kind = AxisKind::EdgeB;
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }
    axis
}

/// Edge (A) against polygon (B).
///
/// Separating axis test between the edge normal and the polygon normals.
/// For one-sided edges the chosen axis is checked against the Gauss map of
/// the neighboring segments so internal chain vertices are skipped.
pub fn collide_edge_and_polygon(
    edge_a: &Edge,
    xf_a: &Transform,
    polygon_b: &Polygon,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.mul_t(*xf_b);

    let centroid_b = xf.apply(polygon_b.centroid);

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;

    let edge1 = (v2 - v1).normalize();

    // Normal points to the right for a CCW winding
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    if edge_a.one_sided && offset1 < 0.0 {
        return manifold;
    }

    // Get polygonB in frameA
    let temp_polygon_b = TempPolygon {
        vertices: polygon_b.vertices.iter().map(|v| xf.apply(*v)).collect(),
        normals: polygon_b
            .normals
            .iter()
            .map(|n| xf.rotation.mul_vec(*n))
            .collect(),
    };
    let count_b = temp_polygon_b.vertices.len();

    let radius = polygon_b.radius + edge_a.radius;

    let edge_axis = compute_edge_separation(&temp_polygon_b, v1, normal1);
    if edge_axis.separation > radius {
        return manifold;
    }

    let polygon_axis = compute_polygon_separation(&temp_polygon_b, v1, v2);
    if polygon_axis.separation > radius {
        return manifold;
    }

    // Use hysteresis for jitter reduction.
    const RELATIVE_TOL: f64 = 0.98;
    const ABSOLUTE_TOL: f64 = 0.001;

    let mut primary_axis = if polygon_axis.separation - radius
        > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if edge_a.one_sided {
        // Check Gauss Map
        let edge0 = (v1 - edge_a.vertex0).normalize();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = edge0.cross(edge1) >= 0.0;

        let edge2 = (edge_a.vertex3 - v2).normalize();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = edge1.cross(edge2) >= 0.0;

        const SIN_TOL: f64 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        if side1 {
            if convex1 {
                if primary_axis.normal.cross(normal0) > SIN_TOL {
                    // Skip region
                    return manifold;
                }
                // Admit region
            } else {
                // Snap region
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if normal2.cross(primary_axis.normal) > SIN_TOL {
                // Skip region
                return manifold;
            }
            // Admit region
        } else {
            // Snap region
            primary_axis = edge_axis;
        }
    }

    let clip_points: [ClipVertex; 2];
    let mut reference: ReferenceFace;
    if primary_axis.kind == AxisKind::EdgeA {
        manifold.kind = ManifoldKind::FaceA;

        // Search for the polygon normal that is most anti-parallel to the edge normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp_polygon_b.normals[0]);
        for (i, n) in temp_polygon_b.normals.iter().enumerate().skip(1) {
            let value = primary_axis.normal.dot(*n);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = (i1 + 1) % count_b;

        let feature = |index_b: usize| ContactFeature {
            index_a: 0,
            index_b: index_b as u8,
            type_a: FeatureType::Face,
            type_b: FeatureType::Vertex,
        };
        clip_points = [
            ClipVertex {
                v: temp_polygon_b.vertices[i1],
                id: feature(i1),
            },
            ClipVertex {
                v: temp_polygon_b.vertices[i2],
                id: feature(i2),
            },
        ];

        reference = ReferenceFace {
            i1: 0,
            i2: 1,
            v1,
            v2,
            normal: primary_axis.normal,
            side_normal1: -edge1,
            side_offset1: 0.0,
            side_normal2: edge1,
            side_offset2: 0.0,
        };
    } else {
        manifold.kind = ManifoldKind::FaceB;

        let feature = |index_a: usize| ContactFeature {
            index_a: index_a as u8,
            index_b: primary_axis.index as u8,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Face,
        };
        clip_points = [
            ClipVertex {
                v: v2,
                id: feature(1),
            },
            ClipVertex {
                v: v1,
                id: feature(0),
            },
        ];

        let i1 = primary_axis.index;
        let i2 = (i1 + 1) % count_b;
        let normal = temp_polygon_b.normals[i1];
        // CCW winding
        let side_normal1 = Vec2::new(normal.y, -normal.x);
        reference = ReferenceFace {
            i1,
            i2,
            v1: temp_polygon_b.vertices[i1],
            v2: temp_polygon_b.vertices[i2],
            normal,
            side_normal1,
            side_offset1: 0.0,
            side_normal2: -side_normal1,
            side_offset2: 0.0,
        };
    }

    reference.side_offset1 = reference.side_normal1.dot(reference.v1);
    reference.side_offset2 = reference.side_normal2.dot(reference.v2);

    // Clip incident edge against reference face side planes
    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(
        &mut clip_points1,
        &clip_points,
        reference.side_normal1,
        reference.side_offset1,
        reference.i1,
    );
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    let np = clip_segment_to_line(
        &mut clip_points2,
        &clip_points1,
        reference.side_normal2,
        reference.side_offset2,
        reference.i2,
    );
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    if primary_axis.kind == AxisKind::EdgeA {
        manifold.local_normal = reference.normal;
        manifold.local_point = reference.v1;
    } else {
        manifold.local_normal = polygon_b.normals[reference.i1];
        manifold.local_point = polygon_b.vertices[reference.i1];
    }

    let mut point_count = 0;
    for clip in clip_points2.iter() {
        let separation = reference.normal.dot(clip.v - reference.v1);
        if separation <= radius {
            let cp = &mut manifold.points[point_count];
            if primary_axis.kind == AxisKind::EdgeA {
                cp.local_point = xf.apply_inverse(clip.v);
                cp.id = clip.id;
            } else {
                cp.local_point = clip.v;
                cp.id = clip.id.flipped();
            }
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::WorldManifold;
    const EPSILON: f64 = 1e-9;

    fn floor() -> Edge {
        Edge::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)).unwrap()
    }

    #[test]
    fn test_edge_circle_face_region() {
        let edge = floor();
        let circle = Circle::new(0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(1.0, 0.4), 0.0);
        let m = collide_edge_and_circle(&edge, &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldKind::FaceA);
        let wm = WorldManifold::new(&m, &Transform::identity(), edge.radius, &xf_b, 0.5);
        assert!((wm.normal.y - 1.0).abs() < EPSILON);
        assert!((wm.depth() - (0.1 + edge.radius)).abs() < EPSILON);
    }

    #[test]
    fn test_edge_circle_vertex_region() {
        let edge = floor();
        let circle = Circle::new(0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(5.3, 0.1), 0.0);
        let m = collide_edge_and_circle(&edge, &Transform::identity(), &circle, &xf_b);
        assert_eq!(m.point_count, 1);
        assert_eq!(m.kind, ManifoldKind::Circles);
        assert_eq!(m.points[0].id.index_a, 1);
    }

    #[test]
    fn test_one_sided_edge_ignores_back_side() {
        // Direction right-to-left keeps the solid side facing up.
        let edge = Edge::new_one_sided(
            Vec2::new(6.0, 0.0),
            Vec2::new(5.0, 0.0),
            Vec2::new(-5.0, 0.0),
            Vec2::new(-6.0, 0.0),
        )
        .unwrap();
        let circle = Circle::new(0.5).unwrap();
        let above = Transform::new(Vec2::new(0.0, 0.4), 0.0);
        let below = Transform::new(Vec2::new(0.0, -0.4), 0.0);
        let hit = collide_edge_and_circle(&edge, &Transform::identity(), &circle, &above);
        let miss = collide_edge_and_circle(&edge, &Transform::identity(), &circle, &below);
        assert_eq!(hit.point_count, 1);
        assert_eq!(miss.point_count, 0);
    }

    #[test]
    fn test_edge_polygon_resting_box() {
        let edge = floor();
        let b = Polygon::new_box(0.5, 0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(0.0, 0.49), 0.0);
        let m = collide_edge_and_polygon(&edge, &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 2);
        let wm = WorldManifold::new(&m, &Transform::identity(), edge.radius, &xf_b, b.radius);
        assert!((wm.normal.y - 1.0).abs() < EPSILON);
        for s in &wm.separations[..2] {
            assert!((s + 0.01 + edge.radius + b.radius).abs() < EPSILON);
        }
    }

    #[test]
    fn test_edge_polygon_separated() {
        let edge = floor();
        let b = Polygon::new_box(0.5, 0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(0.0, 2.0), 0.0);
        let m = collide_edge_and_polygon(&edge, &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 0);
    }
}
