pub mod chain;
pub mod circle;
pub mod edge;
pub mod polygon;

pub use chain::Chain;
pub use circle::Circle;
pub use edge::Edge;
pub use polygon::Polygon;

use crate::collision::{RayCastInput, RayCastOutput, AABB};
use crate::math::{Transform, Vec2};

/// Mass properties of a shape. `inertia` is taken about the shape origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: f64,
    pub center: Vec2,
    pub inertia: f64,
}

/// Discriminant of [`Shape`], ordered by collision dispatch rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShapeKind {
    Circle,
    Polygon,
    Edge,
    Chain,
}

/// Geometry attached to a body through a fixture.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
    Edge(Edge),
    Chain(Chain),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::Edge(_) => ShapeKind::Edge,
            Shape::Chain(_) => ShapeKind::Chain,
        }
    }

    /// Skin radius used by the narrow phase.
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(e) => e.radius,
            Shape::Chain(c) => c.radius,
        }
    }

    /// Number of broad-phase children. Chains have one per segment.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(c) => c.child_count(),
            _ => 1,
        }
    }

    /// Whether a world point lies inside the shape. Edges and chains have no interior.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => c.test_point(xf, p),
            Shape::Polygon(poly) => poly.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => c.ray_cast(input, xf),
            Shape::Polygon(p) => p.ray_cast(input, xf),
            Shape::Edge(e) => e.ray_cast(input, xf),
            Shape::Chain(c) => c.child_edge(child_index).ray_cast(input, xf),
        }
    }

    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> AABB {
        match self {
            Shape::Circle(c) => c.compute_aabb(xf),
            Shape::Polygon(p) => p.compute_aabb(xf),
            Shape::Edge(e) => e.compute_aabb(xf),
            Shape::Chain(c) => c.compute_aabb(xf, child_index),
        }
    }

    pub fn compute_mass(&self, density: f64) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Edge(_) | Shape::Chain(_) => MassData::default(),
        }
    }

    /// Circles and polygons enclose area and therefore carry mass.
    pub fn is_solid(&self) -> bool {
        matches!(self, Shape::Circle(_) | Shape::Polygon(_))
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}

impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}

impl From<Edge> for Shape {
    fn from(e: Edge) -> Self {
        Shape::Edge(e)
    }
}

impl From<Chain> for Shape {
    fn from(c: Chain) -> Self {
        Shape::Chain(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_child_count_and_kind() {
        let circle: Shape = Circle::new(1.0).unwrap().into();
        assert_eq!(circle.kind(), ShapeKind::Circle);
        assert_eq!(circle.child_count(), 1);

        let chain: Shape = Chain::new_open(
            &[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0)],
            None,
            None,
        )
        .unwrap()
        .into();
        assert_eq!(chain.child_count(), 2);
        assert!(!chain.is_solid());
        assert_eq!(chain.compute_mass(1.0).mass, 0.0);
    }

    #[test]
    fn test_kind_rank_order() {
        assert!(ShapeKind::Chain > ShapeKind::Edge);
        assert!(ShapeKind::Edge > ShapeKind::Polygon);
        assert!(ShapeKind::Polygon > ShapeKind::Circle);
    }
}
