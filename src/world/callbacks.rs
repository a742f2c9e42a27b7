//! User hooks into contact creation and solving.

use crate::collision::Manifold;
use crate::dynamics::{Contact, ContactImpulse};
use crate::objects::Fixture;

/// Decides whether two fixtures may collide, after the built-in filter
/// data has accepted the pair.
pub trait ContactFilter: Send {
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool;
}

/// Receives contact events during [`World::step`](super::World::step).
///
/// All methods have empty defaults. Listeners see contacts read-only and
/// cannot reach back into the world.
pub trait ContactListener: Send {
    /// Two fixtures started touching.
    fn begin_contact(&mut self, _contact: &Contact) {}

    /// Two fixtures stopped touching. Also called when a touching contact
    /// is destroyed.
    fn end_contact(&mut self, _contact: &Contact) {}

    /// Called after the manifold update and before solving a touching,
    /// non-sensor contact. Returning `false` disables it for this step.
    fn pre_solve(&mut self, _contact: &Contact, _old_manifold: &Manifold) -> bool {
        true
    }

    /// Impulses the solver applied to a contact.
    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}
