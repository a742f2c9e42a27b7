use super::vec2::{Vec2, Vec3};
use std::ops::{Add, Mul};

/// 2x2 matrix stored in column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat22 {
    pub ex: Vec2,
    pub ey: Vec2,
}

impl Mat22 {
    pub const ZERO: Mat22 = Mat22 {
        ex: Vec2::ZERO,
        ey: Vec2::ZERO,
    };

    pub fn new(ex: Vec2, ey: Vec2) -> Self {
        Self { ex, ey }
    }

    /// Inverse of the matrix, or zero when singular.
    pub fn inverse(&self) -> Mat22 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat22 {
            ex: Vec2::new(det * d, -det * c),
            ey: Vec2::new(-det * b, det * a),
        }
    }

    /// Solves `A * x = b` without forming the inverse. Singular input yields zero.
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }
}

impl Mul<Vec2> for Mat22 {
    type Output = Vec2;

    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

impl Add for Mat22 {
    type Output = Mat22;

    fn add(self, other: Mat22) -> Mat22 {
        Mat22::new(self.ex + other.ex, self.ey + other.ey)
    }
}

/// 3x3 matrix stored in column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mat33 {
    pub ex: Vec3,
    pub ey: Vec3,
    pub ez: Vec3,
}

impl Mat33 {
    pub fn new(ex: Vec3, ey: Vec3, ez: Vec3) -> Self {
        Self { ex, ey, ez }
    }

    /// Solves `A * x = b`. Singular input yields zero.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec3::new(
            det * b.dot(self.ey.cross(self.ez)),
            det * self.ex.dot(b.cross(self.ez)),
            det * self.ex.dot(self.ey.cross(b)),
        )
    }

    /// Solves the upper-left 2x2 block against `b`.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let (a11, a12, a21, a22) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// Inverse of the upper-left 2x2 block, padded with zeros.
    pub fn inverse22(&self) -> Mat33 {
        let (a, b, c, d) = (self.ex.x, self.ey.x, self.ex.y, self.ey.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Mat33 {
            ex: Vec3::new(det * d, -det * c, 0.0),
            ey: Vec3::new(-det * b, det * a, 0.0),
            ez: Vec3::ZERO,
        }
    }

    /// Inverse of a symmetric matrix. Singular input yields zero.
    pub fn sym_inverse33(&self) -> Mat33 {
        let mut det = self.ex.dot(self.ey.cross(self.ez));
        if det != 0.0 {
            det = 1.0 / det;
        }

        let (a11, a12, a13) = (self.ex.x, self.ey.x, self.ez.x);
        let (a22, a23) = (self.ey.y, self.ez.y);
        let a33 = self.ez.z;

        let ex = Vec3::new(
            det * (a22 * a33 - a23 * a23),
            det * (a13 * a23 - a12 * a33),
            det * (a12 * a23 - a13 * a22),
        );
        let ey = Vec3::new(
            ex.y,
            det * (a11 * a33 - a13 * a13),
            det * (a13 * a12 - a11 * a23),
        );
        let ez = Vec3::new(ex.z, ey.z, det * (a11 * a22 - a12 * a12));
        Mat33 { ex, ey, ez }
    }

    /// Multiplies the upper-left 2x2 block by `v`.
    pub fn mul22(&self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.ex.x * v.x + self.ey.x * v.y,
            self.ex.y * v.x + self.ey.y * v.y,
        )
    }
}

impl Mul<Vec3> for Mat33 {
    type Output = Vec3;

    fn mul(self, v: Vec3) -> Vec3 {
        self.ex * v.x + self.ey * v.y + self.ez * v.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_mat22_solve_matches_inverse() {
        let m = Mat22::new(Vec2::new(4.0, 1.0), Vec2::new(2.0, 3.0));
        let b = Vec2::new(1.0, -2.0);
        let x1 = m.solve(b);
        let x2 = m.inverse() * b;
        assert!((x1.x - x2.x).abs() < EPSILON);
        assert!((x1.y - x2.y).abs() < EPSILON);
        let back = m * x1;
        assert!((back.x - b.x).abs() < EPSILON);
        assert!((back.y - b.y).abs() < EPSILON);
    }

    #[test]
    fn test_mat22_singular_is_zero() {
        let m = Mat22::new(Vec2::new(1.0, 2.0), Vec2::new(2.0, 4.0));
        assert_eq!(m.solve(Vec2::new(1.0, 1.0)), Vec2::ZERO);
    }

    #[test]
    fn test_mat33_solve_and_sym_inverse() {
        let m = Mat33::new(
            Vec3::new(4.0, 1.0, 0.5),
            Vec3::new(1.0, 3.0, 0.2),
            Vec3::new(0.5, 0.2, 2.0),
        );
        let b = Vec3::new(1.0, 2.0, 3.0);
        let x = m.solve33(b);
        let back = m * x;
        assert!((back.x - b.x).abs() < EPSILON);
        assert!((back.y - b.y).abs() < EPSILON);
        assert!((back.z - b.z).abs() < EPSILON);

        let inv = m.sym_inverse33();
        let x2 = inv * b;
        assert!((x2.x - x.x).abs() < EPSILON);
        assert!((x2.y - x.y).abs() < EPSILON);
        assert!((x2.z - x.z).abs() < EPSILON);
    }

    #[test]
    fn test_mat33_block22() {
        let m = Mat33::new(
            Vec3::new(2.0, 0.0, 9.0),
            Vec3::new(0.0, 4.0, 9.0),
            Vec3::new(9.0, 9.0, 9.0),
        );
        let x = m.solve22(Vec2::new(2.0, 4.0));
        assert!((x.x - 1.0).abs() < EPSILON);
        assert!((x.y - 1.0).abs() < EPSILON);
        let inv = m.inverse22();
        assert!((inv.ex.x - 0.5).abs() < EPSILON);
        assert!((inv.ey.y - 0.25).abs() < EPSILON);
        assert_eq!(inv.ez, Vec3::ZERO);
    }
}
