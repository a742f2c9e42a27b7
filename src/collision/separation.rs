//! Separating axis queries between convex polygons.

use crate::math::Transform;
use crate::shapes::Polygon;

/// Edge of `poly1` with the largest separation from `poly2`.
///
/// Returns `(edge_index, separation)`. A positive separation means the edge
/// normal is a separating axis.
pub fn find_max_separation(
    poly1: &Polygon,
    xf1: &Transform,
    poly2: &Polygon,
    xf2: &Transform,
) -> (usize, f64) {
    // Work in poly2's frame.
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = f64::MIN;
    for (i, (n1, v1)) in poly1.normals.iter().zip(&poly1.vertices).enumerate() {
        let n = xf.rotation.mul_vec(*n1);
        let v1 = xf.apply(*v1);

        // Deepest point of poly2 along this normal.
        let si = poly2
            .vertices
            .iter()
            .map(|v2| n.dot(*v2 - v1))
            .fold(f64::MAX, f64::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}
