use std::f64::consts::PI;

use proptest::prelude::*;

use rigid2d::collision::{
    collide_circles, collide_polygons, distance, time_of_impact, DistanceInput, DistanceProxy,
    SimplexCache, ToiInput, ToiState, WorldManifold,
};
use rigid2d::math::Sweep;
use rigid2d::settings::{LINEAR_SLOP, POLYGON_RADIUS};
use rigid2d::{BodyDef, Circle, Edge, FixtureDef, Polygon, Shape, Transform, Vec2, World};

const EPSILON: f64 = 1e-9;

/// Convex polygon with vertices on a circle of `radius`, jittered in angle
/// but kept in order.
fn convex_polygon(radius: f64) -> impl Strategy<Value = Polygon> {
    (3usize..=8)
        .prop_flat_map(move |n| {
            (
                Just(n),
                prop::collection::vec(-0.3f64..0.3, n),
                0.0..2.0 * PI,
            )
        })
        .prop_map(move |(n, jitter, phase)| {
            let step = 2.0 * PI / n as f64;
            let points: Vec<Vec2> = jitter
                .iter()
                .enumerate()
                .map(|(i, j)| {
                    let angle = phase + (i as f64 + j) * step;
                    Vec2::new(radius * angle.cos(), radius * angle.sin())
                })
                .collect();
            Polygon::new(&points).unwrap()
        })
}

fn unit_direction() -> impl Strategy<Value = Vec2> {
    (0.0..2.0 * PI).prop_map(|a| Vec2::new(a.cos(), a.sin()))
}

proptest! {
    #[test]
    fn polygon_mass_is_idempotent(polygon in convex_polygon(1.5), density in 0.1f64..10.0) {
        let first = polygon.compute_mass(density);
        let second = polygon.compute_mass(density);
        prop_assert_eq!(first, second);

        let rebuilt = Polygon::new(polygon.vertices()).unwrap();
        prop_assert_eq!(rebuilt.compute_mass(density), first);

        prop_assert!(first.mass > 0.0);
        prop_assert!((first.mass - density * polygon.calculate_area()).abs() < EPSILON);
        prop_assert!(first.inertia > 0.0);
    }

    #[test]
    fn separated_polygons_do_not_collide(
        poly_a in convex_polygon(1.0),
        poly_b in convex_polygon(0.75),
        direction in unit_direction(),
        gap in 0.05f64..3.0,
        angle_b in -PI..PI,
    ) {
        // Circumradii bound each polygon, so the cores are `gap` apart or more.
        let offset = direction * (1.0 + 0.75 + 2.0 * POLYGON_RADIUS + gap);
        let xf_a = Transform::identity();
        let xf_b = Transform::new(offset, angle_b);
        prop_assert_eq!(collide_polygons(&poly_a, &xf_a, &poly_b, &xf_b).point_count, 0);

        let mut world = World::new(Vec2::ZERO).unwrap();
        let mut bodies = Vec::new();
        for (shape, position, angle) in [(poly_a, Vec2::ZERO, 0.0), (poly_b, offset, angle_b)] {
            let body = world
                .create_body(&BodyDef::dynamic().at(position).with_angle(angle))
                .unwrap();
            world.create_fixture(body, &FixtureDef::new(shape)).unwrap();
            bodies.push(body);
        }
        for _ in 0..3 {
            world.step(1.0 / 60.0).unwrap();
        }
        for body in bodies {
            let body = world.body(body).unwrap();
            prop_assert_eq!(body.linear_velocity(), Vec2::ZERO);
            prop_assert_eq!(body.angular_velocity(), 0.0);
        }
        prop_assert!(world.contacts().all(|c| !c.is_touching()));
    }

    #[test]
    fn circle_penetration_matches_center_distance(
        center in (-10.0f64..10.0, -10.0f64..10.0),
        r1 in 0.1f64..2.0,
        r2 in 0.1f64..2.0,
        direction in unit_direction(),
        fraction in 0.01f64..0.99,
    ) {
        let c1 = Vec2::new(center.0, center.1);
        let d = fraction * (r1 + r2);
        let c2 = c1 + direction * d;

        let circle_a = Circle::new(r1).unwrap();
        let circle_b = Circle::new(r2).unwrap();
        let xf_a = Transform::new(c1, 0.0);
        let xf_b = Transform::new(c2, 0.0);

        let manifold = collide_circles(&circle_a, &xf_a, &circle_b, &xf_b);
        prop_assert_eq!(manifold.point_count, 1);

        let world_manifold = WorldManifold::new(&manifold, &xf_a, r1, &xf_b, r2);
        prop_assert!((world_manifold.depth() - (r1 + r2 - d)).abs() < 1e-9);
        prop_assert!((world_manifold.normal - direction).magnitude() < 1e-9);
    }

    #[test]
    fn time_of_impact_is_conservative(
        radius in 0.05f64..0.5,
        x0 in -3.0f64..3.0,
        y0 in 1.0f64..5.0,
        x1 in -3.0f64..3.0,
        y1 in -5.0f64..-1.0,
    ) {
        let circle = Shape::from(Circle::new(radius).unwrap());
        let edge = Shape::from(Edge::new(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0)).unwrap());
        let proxy_a = DistanceProxy::new(&circle, 0);
        let proxy_b = DistanceProxy::new(&edge, 0);

        let sweep_a = Sweep {
            c0: Vec2::new(x0, y0),
            c: Vec2::new(x1, y1),
            ..Default::default()
        };
        let sweep_b = Sweep::default();

        let output = time_of_impact(&ToiInput {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            t_max: 1.0,
        });
        prop_assert_eq!(output.state, ToiState::Touching);
        prop_assert!(output.t > 0.0 && output.t < 1.0);

        // No sampled time before the reported one is already at the target.
        let target = LINEAR_SLOP.max(radius + POLYGON_RADIUS - 3.0 * LINEAR_SLOP);
        let tolerance = 0.25 * LINEAR_SLOP;
        let separation = |t: f64| {
            let mut cache = SimplexCache::default();
            distance(&mut cache, &DistanceInput {
                proxy_a,
                proxy_b,
                transform_a: sweep_a.transform_at(t),
                transform_b: sweep_b.transform_at(t),
                use_radii: false,
            })
            .distance
        };
        let samples = 1000;
        for i in 0..samples {
            let t = output.t * i as f64 / samples as f64;
            prop_assert!(separation(t) >= target - tolerance - EPSILON, "touched at {} before {}", t, output.t);
        }
        prop_assert!((separation(output.t) - target).abs() <= tolerance + EPSILON);
    }
}
