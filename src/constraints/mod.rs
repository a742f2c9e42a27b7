//! Joints: constraints between pairs of bodies.
//!
//! Every joint is solved by the island solver in three phases: velocity
//! initialization (effective masses and warm starting), velocity
//! iterations and position iterations. Joints run before contacts in each
//! iteration.

use crate::dynamics::{SolverBody, SolverData};
use crate::error::{PhysicsError, Result};
use crate::math::Vec2;
use crate::objects::{Body, BodyHandle};
use std::f64::consts::PI;

pub mod angle;
pub mod distance;
pub mod mouse;
pub mod revolute;
pub mod rope;
pub mod weld;

pub use angle::AngleJoint;
pub use distance::DistanceJoint;
pub use mouse::MouseJoint;
pub use revolute::RevoluteJoint;
pub use rope::RopeJoint;
pub use weld::WeldJoint;

slotmap::new_key_type! {
    /// Stable handle to a [`Joint`] in a world.
    pub struct JointHandle;
}

/// A trait representing a velocity-level constraint between two bodies.
pub trait Constraint {
    /// Computes effective masses and applies the warm-start impulse.
    fn init_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>);

    fn solve_velocity_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>);

    /// One position correction pass. Returns `true` when the error is
    /// within tolerance.
    fn solve_position_constraints(&mut self, bodies: &JointBodies, data: &mut SolverData<'_>) -> bool;

    /// Reaction force on body B at the anchor, from the last step's impulse.
    fn reaction_force(&self, inv_dt: f64) -> Vec2;

    fn reaction_torque(&self, inv_dt: f64) -> f64;

    /// Current violation of the constraint, compared against breakpoints.
    fn constraint_error(&self, body_a: &Body, body_b: &Body) -> f64;

    fn validate(&self) -> Result<()>;
}

/// Solver view of the two bodies of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointBodies {
    pub a: SolverBody,
    pub b: SolverBody,
}

/// Spring parameters for soft constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Softness {
    /// Natural frequency in Hz. Must be positive.
    pub frequency_hz: f64,
    /// Zero is undamped, one is critically damped.
    pub damping_ratio: f64,
}

impl Softness {
    pub fn new(frequency_hz: f64, damping_ratio: f64) -> Self {
        Self {
            frequency_hz,
            damping_ratio,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(PhysicsError::joint(format!(
                "frequency {} must be positive",
                self.frequency_hz
            )));
        }
        if !(self.damping_ratio.is_finite() && self.damping_ratio >= 0.0) {
            return Err(PhysicsError::joint(format!(
                "damping ratio {} must be non-negative",
                self.damping_ratio
            )));
        }
        Ok(())
    }

    /// Soft constraint coefficients `(gamma, beta)` for an effective mass
    /// over step `h`. The position bias is `beta * C`.
    pub(crate) fn coefficients(&self, mass: f64, h: f64) -> (f64, f64) {
        let omega = 2.0 * PI * self.frequency_hz;
        let d = 2.0 * mass * self.damping_ratio * omega;
        let k = mass * omega * omega;

        let mut gamma = h * (d + h * k);
        if gamma != 0.0 {
            gamma = 1.0 / gamma;
        }
        (gamma, h * k * gamma)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JointState {
    #[default]
    Active,
    /// Switched off by the user.
    Disabled,
    /// Exceeded its breakpoint.
    Broken,
}

/// The joint library.
#[derive(Debug, Clone, PartialEq)]
pub enum JointKind {
    Distance(DistanceJoint),
    Rope(RopeJoint),
    Revolute(RevoluteJoint),
    Weld(WeldJoint),
    Angle(AngleJoint),
    Mouse(MouseJoint),
}

impl JointKind {
    pub fn constraint(&self) -> &dyn Constraint {
        match self {
            JointKind::Distance(j) => j,
            JointKind::Rope(j) => j,
            JointKind::Revolute(j) => j,
            JointKind::Weld(j) => j,
            JointKind::Angle(j) => j,
            JointKind::Mouse(j) => j,
        }
    }

    pub fn constraint_mut(&mut self) -> &mut dyn Constraint {
        match self {
            JointKind::Distance(j) => j,
            JointKind::Rope(j) => j,
            JointKind::Revolute(j) => j,
            JointKind::Weld(j) => j,
            JointKind::Angle(j) => j,
            JointKind::Mouse(j) => j,
        }
    }
}

macro_rules! impl_joint_kind_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for JointKind {
                fn from(joint: $ty) -> Self {
                    JointKind::$variant(joint)
                }
            }
        )*
    };
}

impl_joint_kind_from! {
    Distance => DistanceJoint,
    Rope => RopeJoint,
    Revolute => RevoluteJoint,
    Weld => WeldJoint,
    Angle => AngleJoint,
    Mouse => MouseJoint,
}

/// Everything needed to create a [`Joint`].
#[derive(Debug, Clone, PartialEq)]
pub struct JointDef {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Whether the connected bodies still collide with each other.
    pub collide_connected: bool,
    /// Constraint error above which the joint breaks.
    pub breakpoint: Option<f64>,
    pub kind: JointKind,
}

impl JointDef {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, kind: impl Into<JointKind>) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            breakpoint: None,
            kind: kind.into(),
        }
    }

    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    pub fn with_breakpoint(mut self, breakpoint: f64) -> Self {
        self.breakpoint = Some(breakpoint);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.body_a == self.body_b {
            return Err(PhysicsError::joint("cannot connect a body to itself"));
        }
        if let Some(breakpoint) = self.breakpoint {
            if !(breakpoint.is_finite() && breakpoint > 0.0) {
                return Err(PhysicsError::joint(format!(
                    "breakpoint {breakpoint} must be positive"
                )));
            }
        }
        self.kind.constraint().validate()
    }
}

/// A joint owned by the world.
#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) breakpoint: Option<f64>,
    pub(crate) state: JointState,
    pub(crate) island_flag: bool,
    pub(crate) kind: JointKind,
}

impl Joint {
    pub(crate) fn new(def: JointDef) -> Self {
        Self {
            body_a: def.body_a,
            body_b: def.body_b,
            collide_connected: def.collide_connected,
            breakpoint: def.breakpoint,
            state: JointState::Active,
            island_flag: false,
            kind: def.kind,
        }
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// The body at the other end of the joint.
    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if body == self.body_a {
            self.body_b
        } else {
            self.body_a
        }
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn breakpoint(&self) -> Option<f64> {
        self.breakpoint
    }

    pub fn state(&self) -> JointState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == JointState::Active
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// Tuning access to the joint parameters (motor speed, limits, ...).
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    pub fn reaction_force(&self, inv_dt: f64) -> Vec2 {
        self.kind.constraint().reaction_force(inv_dt)
    }

    pub fn reaction_torque(&self, inv_dt: f64) -> f64 {
        self.kind.constraint().reaction_torque(inv_dt)
    }

    /// Breaks the joint if its error exceeds the breakpoint. Returns
    /// `true` only on the transition to [`JointState::Broken`].
    ///
    /// The world checks this while building islands, on the poses left by
    /// the previous step. A joint that breaks is left out of that step's
    /// solve entirely, so it applies no impulse on the breaking step. The
    /// impulse it applied on the step before is kept.
    pub(crate) fn check_breakpoint(&mut self, body_a: &Body, body_b: &Body) -> bool {
        let Some(breakpoint) = self.breakpoint else {
            return false;
        };
        if self.state != JointState::Active {
            return false;
        }
        let error = self.kind.constraint().constraint_error(body_a, body_b);
        if error > breakpoint {
            self.state = JointState::Broken;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::BodyDef;
    use slotmap::SlotMap;

    fn handles() -> (BodyHandle, BodyHandle) {
        let mut bodies: SlotMap<BodyHandle, ()> = SlotMap::with_key();
        (bodies.insert(()), bodies.insert(()))
    }

    #[test]
    fn test_def_rejects_same_body() {
        let (a, _) = handles();
        let def = JointDef::new(a, a, DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0));
        assert!(matches!(
            def.validate(),
            Err(PhysicsError::InvalidJoint { .. })
        ));
    }

    #[test]
    fn test_def_rejects_bad_breakpoint() {
        let (a, b) = handles();
        let def = JointDef::new(a, b, RopeJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0))
            .with_breakpoint(-1.0);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_softness_validation() {
        assert!(Softness::new(0.0, 0.5).validate().is_err());
        assert!(Softness::new(4.0, -0.1).validate().is_err());
        assert!(Softness::new(4.0, 0.7).validate().is_ok());
    }

    #[test]
    fn test_breakpoint_transition_reported_once() {
        let (a, b) = handles();
        let body_a = Body::new(&BodyDef::default());
        let body_b = Body::new(&BodyDef::dynamic().at(Vec2::new(3.0, 0.0)));
        let mut joint = Joint::new(
            JointDef::new(a, b, DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0))
                .with_breakpoint(0.5),
        );
        assert!(joint.check_breakpoint(&body_a, &body_b));
        assert_eq!(joint.state(), JointState::Broken);
        assert!(!joint.check_breakpoint(&body_a, &body_b));
    }

    #[test]
    fn test_other_body() {
        let (a, b) = handles();
        let joint = Joint::new(JointDef::new(a, b, AngleJoint::new(0.0)));
        assert_eq!(joint.other_body(a), b);
        assert_eq!(joint.other_body(b), a);
    }
}
