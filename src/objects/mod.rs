//! Bodies and the fixtures attached to them.

pub mod fixture;
pub mod rigid_body;

pub use fixture::{Filter, Fixture, FixtureDef, FixtureProxyKey};
pub use rigid_body::{Body, BodyDef, BodyType};

slotmap::new_key_type! {
    /// Stable handle to a [`Body`] in a world.
    pub struct BodyHandle;
    /// Stable handle to a [`Fixture`] in a world.
    pub struct FixtureHandle;
}
