//! Narrow-phase dispatch by shape kind.

use super::collide_circle::{collide_circles, collide_polygon_and_circle};
use super::collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
use super::collide_polygon::collide_polygons;
use super::manifold::Manifold;
use crate::math::Transform;
use crate::shapes::{Shape, ShapeKind};

/// Whether the narrow phase can produce a manifold for this pair of kinds.
///
/// Segments (edges and chain children) have no area and never collide with
/// each other.
pub fn is_supported_pair(a: ShapeKind, b: ShapeKind) -> bool {
    let segment = |k: ShapeKind| matches!(k, ShapeKind::Edge | ShapeKind::Chain);
    !(segment(a) && segment(b))
}

/// Whether `a` must take the A role when paired with `b`.
///
/// The higher ranked kind is always shape A so every collider receives its
/// arguments in one order: chain, edge, polygon, circle.
pub fn takes_role_a(a: ShapeKind, b: ShapeKind) -> bool {
    a >= b
}

/// Contact manifold between child `child_a` of `shape_a` and child
/// `child_b` of `shape_b`.
///
/// Expects canonical order (see [`takes_role_a`]). Shape B is never a chain,
/// so only `child_a` selects a segment. Unsupported or reversed pairs yield
/// an empty manifold.
pub fn evaluate(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    _child_b: usize,
    xf_b: &Transform,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_and_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(chain), Shape::Circle(b)) => {
            collide_edge_and_circle(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        (Shape::Chain(chain), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        _ => Manifold::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;
    use crate::shapes::{Chain, Circle, Edge, Polygon};

    #[test]
    fn test_segment_pairs_unsupported() {
        assert!(!is_supported_pair(ShapeKind::Edge, ShapeKind::Chain));
        assert!(!is_supported_pair(ShapeKind::Edge, ShapeKind::Edge));
        assert!(is_supported_pair(ShapeKind::Chain, ShapeKind::Circle));
        assert!(is_supported_pair(ShapeKind::Polygon, ShapeKind::Polygon));
    }

    #[test]
    fn test_role_order() {
        assert!(takes_role_a(ShapeKind::Polygon, ShapeKind::Circle));
        assert!(!takes_role_a(ShapeKind::Circle, ShapeKind::Edge));
        assert!(takes_role_a(ShapeKind::Chain, ShapeKind::Polygon));
    }

    #[test]
    fn test_dispatch_chain_child() {
        let chain = Shape::Chain(
            Chain::new_open(
                &[
                    Vec2::new(-10.0, 0.0),
                    Vec2::new(0.0, 0.0),
                    Vec2::new(10.0, 0.0),
                ],
                None,
                None,
            )
            .unwrap(),
        );
        let ball = Shape::Circle(Circle::new(0.5).unwrap());
        let xf_b = Transform::new(Vec2::new(5.0, -0.4), 0.0);
        // Left-to-right chain is solid below.
        let m = evaluate(&chain, 1, &Transform::identity(), &ball, 0, &xf_b);
        assert_eq!(m.point_count, 1);
        // Child 0 spans x in [-10, 0]; the ball at x = 5 is out of reach.
        let m = evaluate(&chain, 0, &Transform::identity(), &ball, 0, &xf_b);
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_dispatch_unsupported_pair_is_empty() {
        let a = Shape::Edge(Edge::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)).unwrap());
        let b = Shape::Edge(Edge::new(Vec2::new(0.0, 0.0), Vec2::new(0.0, 1.0)).unwrap());
        let m = evaluate(&a, 0, &Transform::identity(), &b, 0, &Transform::identity());
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn test_dispatch_polygon_pair() {
        let a = Shape::Polygon(Polygon::new_box(1.0, 1.0).unwrap());
        let b = Shape::Polygon(Polygon::new_box(1.0, 1.0).unwrap());
        let xf_b = Transform::new(Vec2::new(0.0, 1.9), 0.0);
        let m = evaluate(&a, 0, &Transform::identity(), &b, 0, &xf_b);
        assert_eq!(m.point_count, 2);
    }
}
