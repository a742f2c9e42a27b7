use super::rot::Rot;
use super::vec2::Vec2;

/// Rigid frame: a translation and a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: Rot,
}

impl Transform {
    /// Creates a new transform from a position and an angle in radians.
    pub fn new(position: Vec2, angle: f64) -> Self {
        Self {
            position,
            rotation: Rot::from_angle(angle),
        }
    }

    /// Creates an identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: Rot::IDENTITY,
        }
    }

    /// Applies the transform (rotation then translation) to a point.
    pub fn apply(self, point: Vec2) -> Vec2 {
        self.rotation.mul_vec(point) + self.position
    }

    /// Applies the inverse transform (inverse translation then inverse rotation) to a point.
    pub fn apply_inverse(self, point: Vec2) -> Vec2 {
        self.rotation.mul_t_vec(point - self.position)
    }

    /// Composition `self * other`: maps other's local frame into self's parent frame.
    pub fn mul(self, other: Transform) -> Transform {
        Transform {
            rotation: self.rotation.mul(other.rotation),
            position: self.rotation.mul_vec(other.position) + self.position,
        }
    }

    /// Composition `self^-1 * other`: expresses other in self's local frame.
    pub fn mul_t(self, other: Transform) -> Transform {
        Transform {
            rotation: self.rotation.mul_t(other.rotation),
            position: self.rotation.mul_t_vec(other.position - self.position),
        }
    }

    pub fn angle(self) -> f64 {
        self.rotation.angle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_transform_apply_identity() {
        let t = Transform::identity();
        let p = Vec2::new(5.0, -3.0);
        let tp = t.apply(p);
        assert!((tp.x - p.x).abs() < EPSILON);
        assert!((tp.y - p.y).abs() < EPSILON);
    }

    #[test]
    fn test_transform_apply_translation() {
        let t = Transform::new(Vec2::new(10.0, 5.0), 0.0);
        let tp = t.apply(Vec2::new(1.0, 2.0));
        assert!((tp.x - 11.0).abs() < EPSILON);
        assert!((tp.y - 7.0).abs() < EPSILON);
    }

    #[test]
    fn test_transform_apply_combined() {
        // Rotation of (1,0) -> (0,1), then translation -> (10, 6)
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 2.0);
        let tp = t.apply(Vec2::new(1.0, 0.0));
        assert!((tp.x - 10.0).abs() < EPSILON);
        assert!((tp.y - 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_transform_apply_inverse_combined() {
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 4.0);
        let p_local = Vec2::new(1.0, 1.0);
        let p_local_again = t.apply_inverse(t.apply(p_local));
        assert!((p_local_again.x - p_local.x).abs() < EPSILON);
        assert!((p_local_again.y - p_local.y).abs() < EPSILON);
    }

    #[test]
    fn test_transform_mul_t_relative_frame() {
        let a = Transform::new(Vec2::new(1.0, 2.0), 0.3);
        let b = Transform::new(Vec2::new(-4.0, 0.5), -1.2);
        let rel = a.mul_t(b);
        let p = Vec2::new(0.7, -0.2);
        // b(p) expressed in a's frame
        let expected = a.apply_inverse(b.apply(p));
        let got = rel.apply(p);
        assert!((expected.x - got.x).abs() < EPSILON);
        assert!((expected.y - got.y).abs() < EPSILON);

        let round = a.mul(rel);
        assert!((round.position.x - b.position.x).abs() < EPSILON);
        assert!((round.angle() - b.angle()).abs() < EPSILON);
    }
}
