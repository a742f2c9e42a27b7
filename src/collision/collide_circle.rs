use super::manifold::{ContactId, Manifold, ManifoldKind};
use crate::math::Transform;
use crate::shapes::{Circle, Polygon};

/// Circle against circle. Produces at most one point.
pub fn collide_circles(
    circle_a: &Circle,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.position);
    let p_b = xf_b.apply(circle_b.position);

    let dist_sqr = p_a.distance_squared(p_b);
    let radius = circle_a.radius + circle_b.radius;
    if dist_sqr > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldKind::Circles;
    manifold.local_point = circle_a.position;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::default();
    manifold
}

/// Polygon (A) against circle (B).
pub fn collide_polygon_and_circle(
    polygon_a: &Polygon,
    xf_a: &Transform,
    circle_b: &Circle,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon's frame.
    let c = xf_b.apply(circle_b.position);
    let c_local = xf_a.apply_inverse(c);

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = f64::MIN;
    let radius = polygon_a.radius + circle_b.radius;
    for (i, (v, n)) in polygon_a.vertices.iter().zip(&polygon_a.normals).enumerate() {
        let s = n.dot(c_local - *v);
        if s > radius {
            // Early out.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let count = polygon_a.count();
    let v1 = polygon_a.vertices[normal_index];
    let v2 = polygon_a.vertices[(normal_index + 1) % count];

    manifold.kind = ManifoldKind::FaceA;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.position;
    manifold.points[0].id = ContactId::default();

    // Center is inside the polygon.
    if separation < f64::EPSILON {
        manifold.local_normal = polygon_a.normals[normal_index];
        manifold.local_point = (v1 + v2) * 0.5;
        return manifold;
    }

    // Barycentric coordinates of the center along the face.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = (v1 + v2) * 0.5;
        let s = (c_local - face_center).dot(polygon_a.normals[normal_index]);
        if s > radius {
            return Manifold::default();
        }
        manifold.local_normal = polygon_a.normals[normal_index];
        manifold.local_point = face_center;
    }
    manifold
}
