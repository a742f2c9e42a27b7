use crate::constraints::JointHandle;
use crate::dynamics::ContactKey;
use crate::error::{PhysicsError, Result};
use crate::math::{Rot, Sweep, Transform, Vec2};
use crate::shapes::MassData;

use super::FixtureHandle;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, moved only by the user.
    #[default]
    Static,
    /// Zero mass, velocity set by the user, moved by the solver.
    Kinematic,
    /// Positive mass, velocity determined by forces and contacts.
    Dynamic,
}

/// Everything needed to create a [`Body`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyDef {
    pub body_type: BodyType,
    /// World position of the body origin.
    pub position: Vec2,
    /// World angle in radians.
    pub angle: f64,
    /// Velocity of the body origin.
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Bullets get continuous collision against dynamic bodies too.
    pub bullet: bool,
    pub enabled: bool,
    pub gravity_scale: f64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Default::default()
        }
    }

    pub fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, omega: f64) -> Self {
        self.angular_velocity = omega;
        self
    }

    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f64) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_sleep(mut self, allow_sleep: bool) -> Self {
        self.allow_sleep = allow_sleep;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.position.is_finite() && self.angle.is_finite()) {
            return Err(PhysicsError::configuration(
                "body position and angle must be finite",
            ));
        }
        if !(self.linear_velocity.is_finite() && self.angular_velocity.is_finite()) {
            return Err(PhysicsError::configuration(
                "body velocity must be finite",
            ));
        }
        let damping_ok = |d: f64| d.is_finite() && d >= 0.0;
        if !(damping_ok(self.linear_damping) && damping_ok(self.angular_damping)) {
            return Err(PhysicsError::configuration(
                "body damping must be finite and non-negative",
            ));
        }
        if !self.gravity_scale.is_finite() {
            return Err(PhysicsError::configuration(
                "gravity scale must be finite",
            ));
        }
        Ok(())
    }
}

/// A rigid body: a frame carrying fixtures, mass and velocity.
///
/// Bodies are owned by the [`World`](crate::world::World) and reached
/// through a [`BodyHandle`](super::BodyHandle). Mass properties follow
/// from the attached fixtures.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) body_type: BodyType,

    /// Body origin transform.
    pub(crate) xf: Transform,
    /// Swept motion of the center of mass for continuous collision.
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f64,

    pub(crate) force: Vec2,
    pub(crate) torque: f64,

    pub(crate) mass: f64,
    pub(crate) inv_mass: f64,
    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f64,
    pub(crate) inv_inertia: f64,

    pub(crate) linear_damping: f64,
    pub(crate) angular_damping: f64,
    pub(crate) gravity_scale: f64,

    pub(crate) sleep_time: f64,
    pub(crate) awake: bool,
    pub(crate) allow_sleep: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) enabled: bool,

    pub(crate) island_flag: bool,
    pub(crate) island_index: usize,

    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joints: Vec<JointHandle>,
    pub(crate) contacts: Vec<ContactKey>,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.position,
            c: xf.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = match def.body_type {
            BodyType::Dynamic => (1.0, 1.0),
            _ => (0.0, 0.0),
        };

        let mut body = Self {
            body_type: def.body_type,
            xf,
            sweep,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake,
            allow_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            island_flag: false,
            island_index: 0,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
        };

        if body.body_type == BodyType::Static {
            body.awake = false;
        } else {
            body.linear_velocity = def.linear_velocity;
            body.angular_velocity = def.angular_velocity;
            if !body.allow_sleep {
                body.awake = true;
            }
        }
        body
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// World position of the body origin.
    pub fn position(&self) -> Vec2 {
        self.xf.position
    }

    pub fn angle(&self) -> f64 {
        self.sweep.a
    }

    /// World position of the center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// Center of mass relative to the body origin.
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    pub fn force(&self) -> Vec2 {
        self.force
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> f64 {
        self.inertia
            + self.mass
                * self
                    .sweep
                    .local_center
                    .dot(self.sweep.local_center)
    }

    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    pub fn linear_damping(&self) -> f64 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f64 {
        self.angular_damping
    }

    pub fn gravity_scale(&self) -> f64 {
        self.gravity_scale
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.allow_sleep
    }

    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures
    }

    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// Keys of the contacts this body takes part in.
    pub fn contact_keys(&self) -> &[ContactKey] {
        &self.contacts
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.apply(local_point)
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.rotation.mul_vec(local_vector)
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.apply_inverse(world_point)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.rotation.mul_t_vec(world_vector)
    }

    /// Velocity of a world point attached to this body.
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity
            + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    /// Sets the velocity of the center of mass. Ignored for static bodies.
    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    pub fn set_angular_velocity(&mut self, w: f64) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    /// Applies a world force at a world point, waking the body if asked.
    ///
    /// Only dynamic bodies respond. A sleeping body that is not woken
    /// ignores the force.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
            self.torque += (point - self.sweep.c).cross(force);
        }
    }

    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.force += force;
        }
    }

    pub fn apply_torque(&mut self, torque: f64, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.torque += torque;
        }
    }

    /// Applies an impulse at a world point, changing velocity immediately.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
            self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(impulse);
        }
    }

    pub fn apply_linear_impulse_to_center(&mut self, impulse: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.linear_velocity += impulse * self.inv_mass;
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: f64, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.awake {
            self.set_awake(true);
        }
        if self.awake {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    /// Wakes the body or puts it to sleep. A sleeping body has zero
    /// velocity and no pending forces.
    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn set_sleeping_allowed(&mut self, allowed: bool) {
        self.allow_sleep = allowed;
        if !allowed {
            self.set_awake(true);
        }
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    pub fn set_gravity_scale(&mut self, scale: f64) {
        self.gravity_scale = scale;
    }

    pub fn set_linear_damping(&mut self, damping: f64) {
        self.linear_damping = damping.max(0.0);
    }

    pub fn set_angular_damping(&mut self, damping: f64) {
        self.angular_damping = damping.max(0.0);
    }

    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    /// Recomputes mass, center of mass and inertia from fixture mass data.
    ///
    /// Static and kinematic bodies have zero mass. A dynamic body whose
    /// fixtures carry no mass gets unit mass so it still responds to forces.
    pub(crate) fn reset_mass_data<I>(&mut self, fixture_masses: I)
    where
        I: IntoIterator<Item = MassData>,
    {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.position;
            self.sweep.c = self.xf.position;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures.
        let mut local_center = Vec2::ZERO;
        for md in fixture_masses {
            self.mass += md.mass;
            local_center += md.center * md.mass;
            self.inertia += md.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Force all dynamic bodies to have positive mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            // Center the inertia about the center of mass.
            self.inertia -= self.mass * local_center.dot(local_center);
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Move center of mass.
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.xf.apply(local_center);
        self.sweep.c0 = self.sweep.c;

        // Update center of mass velocity.
        self.linear_velocity += Vec2::scalar_cross(self.angular_velocity, self.sweep.c - old_center);
    }

    /// Teleports the body origin. Contacts are refreshed on the next step.
    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f64) {
        self.xf = Transform::new(position, angle);
        self.sweep.c = self.xf.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Rebuilds the origin transform from the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.rotation = Rot::from_angle(self.sweep.a);
        self.xf.position = self.sweep.c - self.xf.rotation.mul_vec(self.sweep.local_center);
    }

    /// Rewinds the body to time `alpha` of the current step.
    pub(crate) fn advance(&mut self, alpha: f64) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Transform at the start of the step, used to sweep broad-phase proxies.
    pub(crate) fn start_transform(&self) -> Transform {
        self.sweep.transform_at(0.0)
    }
}
