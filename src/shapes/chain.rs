use super::edge::Edge;
use crate::collision::AABB;
use crate::error::{PhysicsError, Result};
use crate::math::{Transform, Vec2};
use crate::settings::{LINEAR_SLOP, POLYGON_RADIUS};

/// Connected sequence of one-sided segments.
///
/// Each segment is exposed as a child [`Edge`] whose ghost vertices come
/// from its neighbors, so bodies slide across the joints without catching
/// on internal corners. A loop repeats its first vertex at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub vertices: Vec<Vec2>,
    pub prev_vertex: Vec2,
    pub next_vertex: Vec2,
    pub looped: bool,
    pub radius: f64,
}

impl Chain {
    /// Closed loop through `vertices`. Counter-clockwise loops are solid on the outside.
    pub fn new_loop(vertices: &[Vec2]) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(PhysicsError::geometry(format!(
                "chain loop needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        validate_spacing(vertices)?;
        let first = vertices[0];
        let last = vertices[vertices.len() - 1];
        if first.distance_squared(last) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::geometry(
                "chain loop must not repeat its first vertex",
            ));
        }

        let mut points = vertices.to_vec();
        points.push(first);
        let count = points.len();
        Ok(Self {
            prev_vertex: points[count - 2],
            next_vertex: points[1],
            vertices: points,
            looped: true,
            radius: POLYGON_RADIUS,
        })
    }

    /// Open chain. Missing ghost neighbors extend the end segments in a straight line.
    pub fn new_open(vertices: &[Vec2], prev: Option<Vec2>, next: Option<Vec2>) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(PhysicsError::geometry(format!(
                "chain needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        validate_spacing(vertices)?;

        let n = vertices.len();
        let prev_vertex = prev.unwrap_or(vertices[0] * 2.0 - vertices[1]);
        let next_vertex = next.unwrap_or(vertices[n - 1] * 2.0 - vertices[n - 2]);
        if !(prev_vertex.is_finite() && next_vertex.is_finite()) {
            return Err(PhysicsError::geometry("chain ghost vertices must be finite"));
        }
        Ok(Self {
            vertices: vertices.to_vec(),
            prev_vertex,
            next_vertex,
            looped: false,
            radius: POLYGON_RADIUS,
        })
    }

    /// One child per segment.
    pub fn child_count(&self) -> usize {
        self.vertices.len() - 1
    }

    /// The ghosted edge for segment `index`.
    pub fn child_edge(&self, index: usize) -> Edge {
        debug_assert!(index < self.child_count());
        let v = &self.vertices;
        let vertex0 = if index > 0 {
            v[index - 1]
        } else {
            self.prev_vertex
        };
        let vertex3 = if index + 2 < v.len() {
            v[index + 2]
        } else {
            self.next_vertex
        };
        Edge {
            vertex0,
            vertex1: v[index],
            vertex2: v[index + 1],
            vertex3,
            one_sided: true,
            radius: self.radius,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> AABB {
        let i1 = child_index;
        let i2 = if child_index + 1 < self.vertices.len() {
            child_index + 1
        } else {
            0
        };
        let v1 = xf.apply(self.vertices[i1]);
        let v2 = xf.apply(self.vertices[i2]);
        AABB::new(v1.min(v2), v1.max(v2)).fattened(self.radius)
    }
}

fn validate_spacing(vertices: &[Vec2]) -> Result<()> {
    if vertices.iter().any(|v| !v.is_finite()) {
        return Err(PhysicsError::geometry("chain vertices must be finite"));
    }
    for pair in vertices.windows(2) {
        if pair[0].distance_squared(pair[1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::geometry(
                "chain vertices are too close together",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_children_wrap_around() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let chain = Chain::new_loop(&square).unwrap();
        assert_eq!(chain.child_count(), 4);

        let first = chain.child_edge(0);
        assert_eq!(first.vertex0, Vec2::new(0.0, 1.0));
        assert_eq!(first.vertex3, Vec2::new(1.0, 1.0));

        let last = chain.child_edge(3);
        assert_eq!(last.vertex1, Vec2::new(0.0, 1.0));
        assert_eq!(last.vertex2, Vec2::new(0.0, 0.0));
        assert_eq!(last.vertex3, Vec2::new(1.0, 0.0));
        assert!(last.one_sided);
    }

    #[test]
    fn test_open_chain_extends_ghosts() {
        let chain = Chain::new_open(
            &[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)],
            None,
            None,
        )
        .unwrap();
        let edge = chain.child_edge(0);
        assert_eq!(edge.vertex0, Vec2::new(-1.0, 0.0));
        assert_eq!(edge.vertex3, Vec2::new(2.0, 0.0));
    }

    #[test]
    fn test_chain_rejects_bad_input() {
        assert!(Chain::new_open(&[Vec2::ZERO], None, None).is_err());
        assert!(Chain::new_loop(&[Vec2::ZERO, Vec2::new(1.0, 0.0)]).is_err());
        assert!(Chain::new_open(
            &[Vec2::ZERO, Vec2::new(0.001, 0.0), Vec2::new(1.0, 0.0)],
            None,
            None
        )
        .is_err());
    }
}
