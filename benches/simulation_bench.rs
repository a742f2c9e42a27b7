use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rigid2d::{
    BodyDef, Circle, FixtureDef, JointDef, Polygon, RevoluteJoint, Vec2, World, WorldSettings,
};

const DT: f64 = 1.0 / 60.0;
const STEPS: usize = 30;

fn world_with_ground(settings: WorldSettings) -> World {
    let mut world = World::with_settings(Vec2::new(0.0, -10.0), settings).unwrap();
    let ground = world.create_body(&BodyDef::default()).unwrap();
    world
        .create_fixture(ground, &FixtureDef::new(Polygon::new_box(50.0, 0.5).unwrap()))
        .unwrap();
    world
}

fn simulate(world: &mut World) {
    for _ in 0..STEPS {
        world.step(black_box(DT)).unwrap();
    }
}

// --- Helper for creating stack benchmarks ---
fn run_circle_stack_bench(world: &mut World, num_circles: usize) {
    let radius = 0.5;
    let shape = FixtureDef::new(Circle::new(radius).unwrap());

    for i in 0..num_circles {
        // Stack with slight gap
        let y = 0.5 + radius + i as f64 * radius * 2.1;
        let body = world
            .create_body(&BodyDef::dynamic().at(Vec2::new(0.0, y)))
            .unwrap();
        world.create_fixture(body, &shape).unwrap();
    }
    simulate(world);
}

// --- Helper for creating chain benchmarks ---
fn run_revolute_chain_bench(world: &mut World, num_links: usize) {
    let link = FixtureDef::new(Polygon::new_box(0.25, 0.05).unwrap()).with_density(20.0);
    let y = 20.0;

    let mut prev = world.ground_body();
    for i in 0..num_links {
        let body = world
            .create_body(&BodyDef::dynamic().at(Vec2::new(0.25 + 0.5 * i as f64, y)))
            .unwrap();
        world.create_fixture(body, &link).unwrap();

        let anchor = Vec2::new(0.5 * i as f64, y);
        let joint = RevoluteJoint::at_world_anchor(
            world.body(prev).unwrap(),
            world.body(body).unwrap(),
            anchor,
        );
        world.create_joint(JointDef::new(prev, body, joint)).unwrap();
        prev = body;
    }
    simulate(world);
}

fn run_pyramid_bench(world: &mut World, base: usize) {
    let half = 0.5;
    let shape = FixtureDef::new(Polygon::new_box(half, half).unwrap()).with_density(5.0);

    for row in 0..base {
        let count = base - row;
        let x0 = -(count as f64 - 1.0) * half * 1.125;
        for i in 0..count {
            let position = Vec2::new(
                x0 + i as f64 * 2.0 * half * 1.125,
                0.5 + half + row as f64 * 2.0 * half,
            );
            let body = world.create_body(&BodyDef::dynamic().at(position)).unwrap();
            world.create_fixture(body, &shape).unwrap();
        }
    }
    simulate(world);
}

// Benchmark for a stack of circles falling under gravity
fn bench_circle_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("circle_stack");

    for num_circles in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(num_circles), num_circles, |b, &n| {
            b.iter(|| {
                // Fewer iterations for benchmark speed
                let settings = WorldSettings {
                    velocity_iterations: 4,
                    position_iterations: 2,
                    ..Default::default()
                };
                let mut world = world_with_ground(settings);
                run_circle_stack_bench(&mut world, black_box(n));
            });
        });
    }
    group.finish();
}

// Benchmark for a chain of bodies linked by revolute joints
fn bench_revolute_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("revolute_chain");

    for num_links in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(num_links), num_links, |b, &n| {
            b.iter(|| {
                let mut world = world_with_ground(WorldSettings::default());
                run_revolute_chain_bench(&mut world, black_box(n));
            });
        });
    }
    group.finish();
}

fn bench_box_pyramid(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_pyramid");
    group.sample_size(20);

    for base in [5, 10, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(base), base, |b, &n| {
            b.iter(|| {
                let mut world = world_with_ground(WorldSettings::default());
                run_pyramid_bench(&mut world, black_box(n));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_circle_stack, bench_revolute_chain, bench_box_pyramid);
criterion_main!(benches);
