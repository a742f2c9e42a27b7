use super::manifold::{
    clip_segment_to_line, ClipVertex, ContactFeature, FeatureType, Manifold, ManifoldKind,
};
use super::separation::find_max_separation;
use crate::math::Transform;
use crate::settings::{LINEAR_SLOP, MAX_MANIFOLD_POINTS};
use crate::shapes::Polygon;

/// Edge of `poly2` most anti-parallel to `edge1` of `poly1`, in world space.
fn find_incident_edge(
    poly1: &Polygon,
    xf1: &Transform,
    edge1: usize,
    poly2: &Polygon,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    // Reference edge normal in poly2's frame.
    let normal1 = xf2
        .rotation
        .mul_t_vec(xf1.rotation.mul_vec(poly1.normals[edge1]));

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = f64::MAX;
    for (i, n) in poly2.normals.iter().enumerate() {
        let dot = normal1.dot(*n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.count();
    let feature = |vertex: usize| ContactFeature {
        index_a: edge1 as u8,
        index_b: vertex as u8,
        type_a: FeatureType::Face,
        type_b: FeatureType::Vertex,
    };
    [
        ClipVertex {
            v: xf2.apply(poly2.vertices[i1]),
            id: feature(i1),
        },
        ClipVertex {
            v: xf2.apply(poly2.vertices[i2]),
            id: feature(i2),
        },
    ]
}

/// Polygon against polygon by the separating axis test.
///
/// The reference face is the face of maximum separation on either polygon;
/// polygon A is preferred unless B wins by more than a small tolerance, which
/// keeps the choice stable frame to frame. The incident edge is clipped to
/// the reference face's side planes, giving up to two points.
pub fn collide_polygons(
    poly_a: &Polygon,
    xf_a: &Transform,
    poly_b: &Polygon,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let tolerance = 0.1 * LINEAR_SLOP;
    let (poly1, xf1, poly2, xf2, edge1, flip) = if separation_b > separation_a + tolerance {
        manifold.kind = ManifoldKind::FaceB;
        (poly_b, xf_b, poly_a, xf_a, edge_b, true)
    } else {
        manifold.kind = ManifoldKind::FaceA;
        (poly_a, xf_a, poly_b, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.count();

    let v11 = poly1.vertices[iv1];
    let v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = (v11 + v12) * 0.5;

    let tangent = xf1.rotation.mul_vec(local_tangent);
    let normal = tangent.cross_scalar(1.0);

    let v11 = xf1.apply(v11);
    let v12 = xf1.apply(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by the polytope skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against the extruded edge1 side edges.
    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    let np = clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inverse(clip.v);
            cp.id = if flip { clip.id.flipped() } else { clip.id };
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
    use crate::math::Vec2;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_separated_polygons_produce_no_points() {
        let a = Polygon::new_box(1.0, 1.0).unwrap();
        let b = Polygon::new_box(0.5, 0.5).unwrap();
        let xf_b = Transform::new(Vec2::new(3.0, 0.2), 0.3);
        let m = collide_polygons(&a, &Transform::identity(), &b, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_stacked_boxes_two_point_manifold() {
        let ground = Polygon::new_box(5.0, 0.5).unwrap();
        let b = Polygon::new_box(0.5, 0.5).unwrap();
        let xf_a = Transform::identity();
        let xf_b = Transform::new(Vec2::new(0.0, 0.95), 0.0);
        let m = collide_polygons(&ground, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 2);
        let wm = WorldManifold::new(&m, &xf_a, ground.radius, &xf_b, b.radius);
        // Normal from A (ground) to B (box above).
        assert!((wm.normal.y - 1.0).abs() < EPSILON);
        for i in 0..2 {
            assert!((wm.separations[i] + 0.05 + 2.0 * ground.radius).abs() < EPSILON);
        }
        // Ids differ so warm starting can tell the points apart.
        assert_ne!(m.points[0].id, m.points[1].id);
    }

    #[test]
    fn test_reference_face_on_b_normal_still_points_a_to_b() {
        let small = Polygon::new_box(0.5, 0.5).unwrap();
        let big = Polygon::new_box(5.0, 0.5).unwrap();
        let xf_a = Transform::new(Vec2::new(0.0, 0.95), 0.0);
        let xf_b = Transform::identity();
        let m = collide_polygons(&small, &xf_a, &big, &xf_b);
        assert!(m.point_count > 0);
        let wm = WorldManifold::new(&m, &xf_a, small.radius, &xf_b, big.radius);
        assert!((wm.normal.y + 1.0).abs() < EPSILON);
    }
}
