use crate::collision::{RayCastInput, AABB};
use crate::math::Vec2;
use crate::objects::FixtureHandle;

use super::World;

/// A fixture hit by [`World::ray_cast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastHit {
    pub fixture: FixtureHandle,
    pub child: usize,
    pub point: Vec2,
    pub normal: Vec2,
    /// Fraction of the segment from `p1` to `p2`.
    pub fraction: f64,
}

impl World {
    /// Calls `callback` for every fixture whose fat AABB overlaps `aabb`.
    /// Returning `false` stops the query.
    ///
    /// Fixtures with several children may be reported more than once.
    pub fn query_aabb<F>(&self, aabb: &AABB, mut callback: F)
    where
        F: FnMut(FixtureHandle) -> bool,
    {
        self.broad_phase.query(aabb, |proxy_id| {
            match self.broad_phase.user_data(proxy_id) {
                Some(key) => callback(key.fixture),
                None => true,
            }
        });
    }

    /// Fixtures whose shape contains `point`.
    pub fn query_point(&self, point: Vec2) -> Vec<FixtureHandle> {
        let probe = AABB::from_center(point, Vec2::new(1e-9, 1e-9));
        let mut found = Vec::new();

        self.query_aabb(&probe, |handle| {
            let hit = self.fixtures.get(handle).is_some_and(|fixture| {
                self.bodies
                    .get(fixture.body)
                    .is_some_and(|body| fixture.test_point(&body.xf, point))
            });
            if hit && !found.contains(&handle) {
                found.push(handle);
            }
            true
        });
        found
    }

    /// Casts a segment from `p1` to `p2` through the world.
    ///
    /// The callback receives each hit, in no particular order, and steers
    /// the cast with its return value:
    /// * `-1` ignores the fixture and continues,
    /// * `0` stops the cast,
    /// * a fraction clips the segment there,
    /// * `1` continues without clipping.
    pub fn ray_cast<F>(&self, p1: Vec2, p2: Vec2, mut callback: F)
    where
        F: FnMut(&RayCastHit) -> f64,
    {
        if (p2 - p1).magnitude_squared() == 0.0 {
            return;
        }
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };

        self.broad_phase.ray_cast(&input, |sub_input, proxy_id| {
            let Some(key) = self.broad_phase.user_data(proxy_id) else {
                return sub_input.max_fraction;
            };
            let Some(fixture) = self.fixtures.get(key.fixture) else {
                return sub_input.max_fraction;
            };
            let Some(body) = self.bodies.get(fixture.body) else {
                return sub_input.max_fraction;
            };

            match fixture.ray_cast(sub_input, &body.xf, key.child) {
                Some(output) => {
                    let fraction = output.fraction;
                    callback(&RayCastHit {
                        fixture: key.fixture,
                        child: key.child,
                        point: p1 + (p2 - p1) * fraction,
                        normal: output.normal,
                        fraction,
                    })
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// The hit closest to `p1`, if any.
    pub fn ray_cast_closest(&self, p1: Vec2, p2: Vec2) -> Option<RayCastHit> {
        let mut closest: Option<RayCastHit> = None;
        self.ray_cast(p1, p2, |hit| {
            closest = Some(*hit);
            hit.fraction
        });
        closest
    }
}

#[cfg(test)]
mod tests {
    use crate::math::Vec2;
    use crate::objects::{BodyDef, FixtureDef};
    use crate::shapes::{Circle, Polygon};
    use crate::world::World;
    const EPSILON: f64 = 1e-9;

    fn scene() -> World {
        let mut world = World::new(Vec2::ZERO).unwrap();
        for x in [0.0, 5.0] {
            let body = world.create_body(&BodyDef::default().at(Vec2::new(x, 0.0))).unwrap();
            world
                .create_fixture(body, &FixtureDef::new(Polygon::new_box(1.0, 1.0).unwrap()))
                .unwrap();
        }
        world
    }

    #[test]
    fn test_ray_cast_closest() {
        let world = scene();
        let hit = world
            .ray_cast_closest(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0))
            .unwrap();
        assert!((hit.point.x - 6.0).abs() < EPSILON);
        assert!((hit.normal.x - 1.0).abs() < EPSILON);
        assert!((hit.fraction - 0.2).abs() < EPSILON);
    }

    #[test]
    fn test_ray_cast_all_hits() {
        let world = scene();
        let mut hits = 0;
        world.ray_cast(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0), |_| {
            hits += 1;
            1.0
        });
        assert_eq!(hits, 2);

        let mut misses = 0;
        world.ray_cast(Vec2::new(10.0, 5.0), Vec2::new(-10.0, 5.0), |_| {
            misses += 1;
            1.0
        });
        assert_eq!(misses, 0);
    }

    #[test]
    fn test_query_point() {
        let mut world = scene();
        let body = world.create_body(&BodyDef::default()).unwrap();
        let circle = world
            .create_fixture(body, &FixtureDef::new(Circle::new(0.5).unwrap()))
            .unwrap();

        let found = world.query_point(Vec2::new(0.1, 0.1));
        assert_eq!(found.len(), 2);
        assert!(found.contains(&circle));
        assert!(world.query_point(Vec2::new(2.5, 0.0)).is_empty());
    }

    #[test]
    fn test_query_aabb_stops_early() {
        let world = scene();
        let mut seen = 0;
        let everything = crate::collision::AABB::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0));
        world.query_aabb(&everything, |_| {
            seen += 1;
            false
        });
        assert_eq!(seen, 1);
    }
}
