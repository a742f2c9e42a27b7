//! Conservative advancement between two swept convex proxies.
//!
//! Finds the first time in `[0, t_max]` at which the proxies come within
//! `target` of each other, using the GJK simplex to pick a separating axis
//! and root finding along that axis.

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Sweep, Transform, Vec2};
use crate::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_ROOT_ITERATIONS, MAX_TOI_ITERATIONS};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Sweep interval is `[0, t_max]`.
    pub t_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    /// The iteration budget ran out before converging.
    Failed,
    /// Already overlapping at the start of the interval.
    Overlapped,
    /// Reached the target separation at `t`.
    Touching,
    /// Never closer than the target within the interval.
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

/// Separation between the proxies along a fixed axis, as a function of time.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    /// Builds the axis from the cached simplex at time `t1`.
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f64,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        let mut f = Self {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationKind::Points,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
        };

        if cache.count == 1 {
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0]));
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0]));
            f.axis = (point_b - point_a).normalize();
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            f.kind = SeparationKind::FaceB;
            let local_b1 = proxy_b.vertex(cache.index_b[0]);
            let local_b2 = proxy_b.vertex(cache.index_b[1]);

            f.axis = (local_b2 - local_b1).cross_scalar(1.0).normalize();
            let normal = xf_b.rotation.mul_vec(f.axis);

            f.local_point = (local_b1 + local_b2) * 0.5;
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0]));

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        } else {
            // Two points on A and one or two points on B.
            f.kind = SeparationKind::FaceA;
            let local_a1 = proxy_a.vertex(cache.index_a[0]);
            let local_a2 = proxy_a.vertex(cache.index_a[1]);

            f.axis = (local_a2 - local_a1).cross_scalar(1.0).normalize();
            let normal = xf_a.rotation.mul_vec(f.axis);

            f.local_point = (local_a1 + local_a2) * 0.5;
            let point_a = xf_a.apply(f.local_point);
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0]));

            if (point_b - point_a).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
        }
        f
    }

    fn transforms(&self, t: f64) -> (Transform, Transform) {
        (self.sweep_a.transform_at(t), self.sweep_b.transform_at(t))
    }

    /// Deepest pair of support points along the axis at time `t`.
    fn find_min_separation(&self, t: f64) -> (usize, usize, f64) {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.rotation.mul_t_vec(self.axis);
                let axis_b = xf_b.rotation.mul_t_vec(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = xf_a.rotation.mul_vec(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.rotation.mul_t_vec(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = xf_b.rotation.mul_vec(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.rotation.mul_t_vec(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of a fixed vertex pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f64) -> f64 {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.rotation.mul_vec(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.rotation.mul_vec(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Time of impact between two swept proxies.
///
/// The proxies are advanced until their core shapes are within
/// `total_radius - 3 * LINEAR_SLOP` (but never closer than `LINEAR_SLOP`),
/// so the returned pose leaves a small overlap of the skins for the contact
/// solver to work with. Rotation is handled, but fast spinning can exhaust
/// the iteration budget and report [`ToiState::Failed`].
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    // Large rotations make the root finder hard, so keep angles small.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut cache = SimplexCache::default();
    let mut iterations = 0;

    // Walk toward the target separation along successive axes.
    let output = loop {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        // Distance between the cores at t1. The simplex from this query
        // provides the separating axis.
        let distance_input = DistanceInput {
            proxy_a: *proxy_a,
            proxy_b: *proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: false,
        };
        let distance_output = distance(&mut cache, &distance_input);

        // The cores overlap: no separating axis exists.
        if distance_output.distance <= 0.0 {
            break ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
            };
        }

        if distance_output.distance < target + tolerance {
            break ToiOutput {
                state: ToiState::Touching,
                t: t1,
            };
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Resolve the deepest points along the axis, pushing back t2 until
        // either the proxies separate or t1 advances.
        let mut result = None;
        let mut t2 = t_max;
        let mut push_back_iterations = 0;
        loop {
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Final configuration separated along this axis.
            if s2 > target + tolerance {
                result = Some(ToiOutput {
                    state: ToiState::Separated,
                    t: t_max,
                });
                break;
            }

            // Close enough at t2: advance the sweeps.
            if s2 > target - tolerance {
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Initial separation below target: the axis was a poor choice.
            if s1 < target - tolerance {
                result = Some(ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                });
                break;
            }

            if s1 <= target + tolerance {
                result = Some(ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                });
                break;
            }

            // 1D root of f(t) - target, mixing bisection and secant steps.
            let mut root_iterations = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iterations & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iterations += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }

                // Keep the bracket around the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iterations == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iterations += 1;
            if push_back_iterations == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iterations += 1;

        if let Some(output) = result {
            break output;
        }

        if iterations == MAX_TOI_ITERATIONS {
            break ToiOutput {
                state: ToiState::Failed,
                t: t1,
            };
        }
    };

    if output.state == ToiState::Failed {
        debug!(t = output.t, iterations, "time of impact iteration budget exhausted");
    }
    trace!(state = ?output.state, t = output.t, iterations, "time of impact");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Polygon, Shape};
    const EPSILON: f64 = 1e-3;

    fn still(c: Vec2) -> Sweep {
        Sweep {
            c0: c,
            c,
            ..Default::default()
        }
    }

    fn moving(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            c0: from,
            c: to,
            ..Default::default()
        }
    }

    fn circle_proxy(radius: f64) -> DistanceProxy {
        DistanceProxy::new(&Shape::Circle(Circle::new(radius).unwrap()), 0)
    }

    #[test]
    fn test_approaching_circles_touch() {
        let input = ToiInput {
            proxy_a: circle_proxy(0.5),
            proxy_b: circle_proxy(0.5),
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);
        // Centers 1 - 3 * slop apart.
        let expected = (10.0 - (1.0 - 3.0 * LINEAR_SLOP)) / 20.0;
        assert!((output.t - expected).abs() < EPSILON);
    }

    #[test]
    fn test_circles_that_never_meet_are_separated() {
        let input = ToiInput {
            proxy_a: circle_proxy(0.5),
            proxy_b: circle_proxy(0.5),
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::new(10.0, 0.0), Vec2::new(5.0, 0.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn test_box_falling_onto_box() {
        let ground = Polygon::new_box(5.0, 0.5).unwrap();
        let block = Polygon::new_box(0.5, 0.5).unwrap();
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&Shape::Polygon(ground), 0),
            proxy_b: DistanceProxy::new(&Shape::Polygon(block), 0),
            sweep_a: still(Vec2::ZERO),
            sweep_b: moving(Vec2::new(0.0, 10.0), Vec2::new(0.0, -10.0)),
            t_max: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Touching);

        // Core gap at t is the target separation.
        let y = 10.0 - 20.0 * output.t;
        let gap = y - 1.0;
        let target = (2.0 * crate::settings::POLYGON_RADIUS - 3.0 * LINEAR_SLOP).max(LINEAR_SLOP);
        assert!((gap - target).abs() <= 0.25 * LINEAR_SLOP + 1e-9);
    }

    #[test]
    fn test_overlapping_cores_report_overlapped() {
        let input = ToiInput {
            proxy_a: circle_proxy(0.5),
            proxy_b: circle_proxy(0.5),
            sweep_a: still(Vec2::ZERO),
            sweep_b: still(Vec2::ZERO),
            t_max: 1.0,
        };
        assert_eq!(time_of_impact(&input).state, ToiState::Overlapped);
    }
}
