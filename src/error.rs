//! Error taxonomy for the public API.
//!
//! Numerical degeneracy inside the pipeline is never reported here: those
//! paths fall back to safe defaults. These errors cover invalid input at the
//! API boundary and stale handles.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("invalid density {0}: must be finite and positive for solid fixtures")]
    InvalidDensity(f64),

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("invalid time step {0}: must be finite and positive for solid fixtures")]
    InvalidTimeStep(f64),

    #[error("body handle does not refer to a live body")]
    InvalidBodyHandle,

    #[error("fixture handle does not refer to a live fixture")]
    InvalidFixtureHandle,

    #[error("joint handle does not refer to a live joint")]
    InvalidJointHandle,

    #[error("invalid joint: {reason}")]
    InvalidJoint { reason: String },
}

impl PhysicsError {
    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        PhysicsError::InvalidGeometry {
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        PhysicsError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn joint(reason: impl Into<String>) -> Self {
        PhysicsError::InvalidJoint {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = core::result::Result<T, PhysicsError>;
