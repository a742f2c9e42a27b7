use crate::collision::{evaluate, test_overlap, Manifold, WorldManifold};
use crate::common::{mix_friction, mix_restitution};
use crate::math::Transform;
use crate::objects::{BodyHandle, Fixture, FixtureHandle};
use crate::shapes::Shape;

/// Identity of a contact: the two fixture children in dispatch order.
///
/// Fixture A always has the higher-ranked shape kind, so a circle touching
/// a polygon is keyed as `(polygon, circle)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactKey {
    pub fixture_a: FixtureHandle,
    pub child_a: usize,
    pub fixture_b: FixtureHandle,
    pub child_b: usize,
}

/// A potential collision between two fixture children whose fat AABBs
/// overlap. It is touching when the manifold has points.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) key: ContactKey,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) radius_a: f64,
    pub(crate) radius_b: f64,
    pub(crate) manifold: Manifold,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    pub(crate) tangent_speed: f64,
    pub(crate) sensor: bool,
    pub(crate) touching: bool,
    pub(crate) enabled: bool,
    /// Set when filtering data changed and the pair must be re-filtered.
    pub(crate) filter_flag: bool,
    pub(crate) island_flag: bool,
}

impl Contact {
    pub(crate) fn new(key: ContactKey, fixture_a: &Fixture, fixture_b: &Fixture) -> Self {
        Self {
            key,
            body_a: fixture_a.body,
            body_b: fixture_b.body,
            radius_a: fixture_a.shape.radius(),
            radius_b: fixture_b.shape.radius(),
            manifold: Manifold::default(),
            friction: mix_friction(fixture_a.friction(), fixture_b.friction()),
            restitution: mix_restitution(fixture_a.restitution(), fixture_b.restitution()),
            tangent_speed: 0.0,
            sensor: fixture_a.is_sensor || fixture_b.is_sensor,
            touching: false,
            enabled: true,
            filter_flag: false,
            island_flag: false,
        }
    }

    pub fn key(&self) -> ContactKey {
        self.key
    }

    pub fn fixture_a(&self) -> FixtureHandle {
        self.key.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureHandle {
        self.key.fixture_b
    }

    pub fn child_index_a(&self) -> usize {
        self.key.child_a
    }

    pub fn child_index_b(&self) -> usize {
        self.key.child_b
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// World-space normal, points and separations for the given body
    /// transforms.
    pub fn world_manifold(&self, xf_a: &Transform, xf_b: &Transform) -> WorldManifold {
        WorldManifold::new(&self.manifold, xf_a, self.radius_a, xf_b, self.radius_b)
    }

    pub fn is_touching(&self) -> bool {
        self.touching
    }

    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Disabled contacts are skipped by the solver for the current step.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn restitution(&self) -> f64 {
        self.restitution
    }

    pub fn tangent_speed(&self) -> f64 {
        self.tangent_speed
    }

    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction.max(0.0);
    }

    pub fn set_restitution(&mut self, restitution: f64) {
        self.restitution = restitution.max(0.0);
    }

    /// Surface speed along the tangent, for conveyor belts.
    pub fn set_tangent_speed(&mut self, speed: f64) {
        self.tangent_speed = speed;
    }

    pub(crate) fn flag_for_filtering(&mut self) {
        self.filter_flag = true;
    }

    /// Re-evaluates the manifold, carrying impulses over for matching
    /// feature ids. Returns the previous manifold and touching state.
    pub(crate) fn update(
        &mut self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) -> (Manifold, bool) {
        let old_manifold = self.manifold;
        let was_touching = self.touching;
        self.enabled = true;

        if self.sensor {
            self.touching = test_overlap(
                shape_a,
                self.key.child_a,
                shape_b,
                self.key.child_b,
                xf_a,
                xf_b,
            );
            self.manifold = Manifold::default();
        } else {
            self.manifold = evaluate(
                shape_a,
                self.key.child_a,
                xf_a,
                shape_b,
                self.key.child_b,
                xf_b,
            );
            self.touching = self.manifold.point_count > 0;

            for point in self.manifold.points.iter_mut().take(self.manifold.point_count) {
                point.normal_impulse = 0.0;
                point.tangent_impulse = 0.0;
                if let Some(old) = old_manifold
                    .points()
                    .iter()
                    .find(|old| old.id == point.id)
                {
                    point.normal_impulse = old.normal_impulse;
                    point.tangent_impulse = old.tangent_impulse;
                }
            }
        }

        (old_manifold, was_touching)
    }
}
