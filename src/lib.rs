//! Step-driven 2D rigid-body physics.
//!
//! A [`World`] owns bodies, the fixtures (shapes with material and
//! filtering) attached to them, and joints between them. Each call to
//! [`World::step`] runs the broad phase, refreshes contact manifolds,
//! solves islands of touching bodies with sequential impulses and finally
//! clamps fast bodies at their first time of impact.
//!
//! ```
//! use rigid2d::{BodyDef, Circle, FixtureDef, Polygon, Vec2, World};
//!
//! let mut world = World::new(Vec2::new(0.0, -10.0)).unwrap();
//! let ground = world.create_body(&BodyDef::default()).unwrap();
//! world
//!     .create_fixture(ground, &FixtureDef::new(Polygon::new_box(10.0, 0.5).unwrap()))
//!     .unwrap();
//!
//! let ball = world
//!     .create_body(&BodyDef::dynamic().at(Vec2::new(0.0, 4.0)))
//!     .unwrap();
//! world
//!     .create_fixture(ball, &FixtureDef::new(Circle::new(0.5).unwrap()))
//!     .unwrap();
//!
//! for _ in 0..120 {
//!     world.step(1.0 / 60.0).unwrap();
//! }
//! assert!(world.body(ball).unwrap().position().y < 1.1);
//! ```

pub mod collision;
pub mod common;
pub mod constraints;
pub mod dynamics;
pub mod error;
pub mod integration;
pub mod math;
pub mod objects;
pub mod settings;
pub mod shapes;
pub mod world;

// Re-export key types for easier use
pub use collision::{RayCastInput, RayCastOutput, AABB};
pub use common::Material;
pub use constraints::{
    AngleJoint, Constraint, DistanceJoint, Joint, JointDef, JointHandle, JointKind, JointState,
    MouseJoint, RevoluteJoint, RopeJoint, Softness, WeldJoint,
};
pub use dynamics::{Contact, ContactImpulse, ContactKey};
pub use error::{PhysicsError, Result};
pub use math::{Rot, Transform, Vec2};
pub use objects::{Body, BodyDef, BodyHandle, BodyType, Filter, Fixture, FixtureDef, FixtureHandle};
pub use settings::WorldSettings;
pub use shapes::{Chain, Circle, Edge, MassData, Polygon, Shape, ShapeKind};
pub use world::{ContactFilter, ContactListener, RayCastHit, World, WorldEvent};
