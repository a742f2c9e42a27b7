//! Global tunables and per-world solver configuration.
//!
//! Lengths are in meters and the constants are sized for moving objects
//! between roughly 0.1 and 10 meters.

use std::f64::consts::PI;

use crate::error::{PhysicsError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision and constraint tolerance.
pub const LINEAR_SLOP: f64 = 0.005;

/// Angular tolerance in radians.
pub const ANGULAR_SLOP: f64 = 2.0 / 180.0 * PI;

/// Skin radius of polygons and edges. Keeps cores apart so GJK stays valid.
pub const POLYGON_RADIUS: f64 = 2.0 * LINEAR_SLOP;

pub const MAX_POLYGON_VERTICES: usize = 8;

/// Contact points per manifold.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Margin added to broad-phase proxies so small motions do not touch the tree.
pub const AABB_EXTENSION: f64 = 0.1;

/// Scale of the predictive displacement added to moved proxies.
pub const AABB_MULTIPLIER: f64 = 4.0;

/// Relative speed below which collisions are treated as inelastic.
pub const VELOCITY_THRESHOLD: f64 = 1.0;

/// Largest position correction per position iteration.
pub const MAX_LINEAR_CORRECTION: f64 = 0.2;

pub const MAX_ANGULAR_CORRECTION: f64 = 8.0 / 180.0 * PI;

/// Largest translation of a body per step.
pub const MAX_TRANSLATION: f64 = 2.0;

/// Largest rotation of a body per step.
pub const MAX_ROTATION: f64 = 0.5 * PI;

/// Fraction of overlap resolved per position iteration.
pub const BAUMGARTE: f64 = 0.2;

pub const TOI_BAUMGARTE: f64 = 0.75;

/// Seconds a body must be still before it may sleep.
pub const TIME_TO_SLEEP: f64 = 0.5;

pub const LINEAR_SLEEP_TOLERANCE: f64 = 0.01;

pub const ANGULAR_SLEEP_TOLERANCE: f64 = 2.0 / 180.0 * PI;

pub const MAX_TOI_ITERATIONS: usize = 20;

pub const MAX_GJK_ITERATIONS: usize = 20;

/// Root finder budget inside one time-of-impact iteration.
pub const MAX_ROOT_ITERATIONS: usize = 50;

/// Condition number bound for the two-point block solver.
pub const MAX_CONDITION_NUMBER: f64 = 1000.0;

/// Runtime solver configuration for a [`World`](crate::world::World).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldSettings {
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Fraction of penetration removed per position iteration.
    pub baumgarte: f64,
    /// Penetration tolerated before position correction kicks in.
    pub allowed_penetration: f64,
    /// Approach speed above which restitution applies.
    pub velocity_threshold: f64,
    pub warm_starting: bool,
    pub continuous_physics: bool,
    pub allow_sleep: bool,
    pub auto_clear_forces: bool,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            velocity_iterations: 8,
            position_iterations: 3,
            baumgarte: BAUMGARTE,
            allowed_penetration: LINEAR_SLOP,
            velocity_threshold: VELOCITY_THRESHOLD,
            warm_starting: true,
            continuous_physics: true,
            allow_sleep: true,
            auto_clear_forces: true,
        }
    }
}

impl WorldSettings {
    /// Rejects settings the solver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.velocity_iterations == 0 {
            return Err(PhysicsError::configuration(
                "velocity_iterations must be at least 1",
            ));
        }
        if !(self.baumgarte > 0.0 && self.baumgarte <= 1.0) {
            return Err(PhysicsError::configuration(format!(
                "baumgarte must be in (0, 1], got {}",
                self.baumgarte
            )));
        }
        if !self.allowed_penetration.is_finite() || self.allowed_penetration < 0.0 {
            return Err(PhysicsError::configuration(format!(
                "allowed_penetration must be finite and non-negative, got {}",
                self.allowed_penetration
            )));
        }
        if !self.velocity_threshold.is_finite() || self.velocity_threshold < 0.0 {
            return Err(PhysicsError::configuration(format!(
                "velocity_threshold must be finite and non-negative, got {}",
                self.velocity_threshold
            )));
        }
        Ok(())
    }
}
