//! The simulation world and its stepping pipeline.
pub mod callbacks;
pub mod physics_world;
pub mod query;

pub use callbacks::{ContactFilter, ContactListener};
pub use physics_world::{World, WorldEvent};
pub use query::RayCastHit;
