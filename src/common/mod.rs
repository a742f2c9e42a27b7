pub mod material;

pub use material::{mix_friction, mix_restitution, Material};
