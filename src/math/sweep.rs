use super::rot::Rot;
use super::transform::Transform;
use super::vec2::Vec2;
use std::f64::consts::PI;

/// Motion of a body's center of mass over one step, used for time of impact.
///
/// `c0`/`a0` hold the pose at `alpha0`, `c`/`a` the pose at the end of the
/// step. `local_center` lets the body origin be recovered from the center.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sweep {
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f64,
    pub a: f64,
    /// Fraction of the current step already consumed, in `[0, 1)`.
    pub alpha0: f64,
}

impl Sweep {
    /// Interpolated body transform at `beta` in `[0, 1]`.
    pub fn transform_at(&self, beta: f64) -> Transform {
        let center = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let rotation = Rot::from_angle(angle);
        Transform {
            position: center - rotation.mul_vec(self.local_center),
            rotation,
        }
    }

    /// Moves the start of the sweep forward to `alpha`.
    pub fn advance(&mut self, alpha: f64) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wraps the angles so `a0` stays within one turn of zero.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}
