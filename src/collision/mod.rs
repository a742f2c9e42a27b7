//! Collision detection: bounding volumes, the broad phase, narrow-phase
//! manifolds, GJK distance and time of impact.

pub mod aabb;
pub mod broad_phase;
pub mod collide_circle;
pub mod collide_edge;
pub mod collide_polygon;
pub mod detection;
pub mod distance;
pub mod dynamic_tree;
pub mod manifold;
pub mod ray;
pub mod separation;
pub mod time_of_impact;

pub use aabb::AABB;
pub use broad_phase::BroadPhase;
pub use collide_circle::{collide_circles, collide_polygon_and_circle};
pub use collide_edge::{collide_edge_and_circle, collide_edge_and_polygon};
pub use collide_polygon::collide_polygons;
pub use detection::{evaluate, is_supported_pair, takes_role_a};
pub use distance::{distance, test_overlap, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};
pub use dynamic_tree::{DynamicTree, NULL_NODE};
pub use manifold::{
    ContactFeature, ContactId, FeatureType, Manifold, ManifoldKind, ManifoldPoint, WorldManifold,
};
pub use ray::{RayCastInput, RayCastOutput};
pub use separation::find_max_separation;
pub use time_of_impact::{time_of_impact, ToiInput, ToiOutput, ToiState};
