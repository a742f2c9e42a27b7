//! Contacts and the island solver.
pub mod contact;
pub mod contact_solver;
pub(crate) mod island;
pub mod time_step;

pub use contact::{Contact, ContactKey};
pub use contact_solver::{ContactImpulse, SolverBody};
pub use time_step::{Position, SolverData, TimeStep, Velocity};
