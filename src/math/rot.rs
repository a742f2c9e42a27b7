use super::vec2::Vec2;

/// Rotation stored as a sine/cosine pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rot {
    pub s: f64,
    pub c: f64,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: 0.0, c: 1.0 };

    /// Builds the rotation for an angle in radians.
    pub fn from_angle(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    /// Angle in radians, in `(-pi, pi]`.
    pub fn angle(self) -> f64 {
        self.s.atan2(self.c)
    }

    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates a vector.
    pub fn mul_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotates a vector.
    pub fn mul_t_vec(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composition `self * other`.
    pub fn mul(self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Composition `self^T * other`.
    pub fn mul_t(self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}
