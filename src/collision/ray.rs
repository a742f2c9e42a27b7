use crate::math::vec2::Vec2;

/// Segment from `p1` toward `p2`, clipped at `p1 + max_fraction * (p2 - p1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f64,
}

/// Hit along a ray: the surface normal and the fraction of the input segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f64,
}
