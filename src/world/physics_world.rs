use std::collections::BTreeMap;

use slotmap::SlotMap;
use tracing::{debug, instrument, trace, warn};

use crate::collision::{
    is_supported_pair, takes_role_a, time_of_impact, BroadPhase, DistanceProxy, ToiInput,
    ToiState,
};
use crate::constraints::{Joint, JointDef, JointHandle, JointKind, JointState};
use crate::dynamics::island::{Island, IslandContext};
use crate::dynamics::{Contact, ContactKey, TimeStep};
use crate::error::{PhysicsError, Result};
use crate::math::Vec2;
use crate::objects::{
    Body, BodyDef, BodyHandle, BodyType, Filter, Fixture, FixtureDef, FixtureHandle,
    FixtureProxyKey,
};
use crate::settings::WorldSettings;

use super::callbacks::{ContactFilter, ContactListener};

/// Something that happened during a step, drained with
/// [`World::drain_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    BeginContact(ContactKey),
    EndContact(ContactKey),
    /// The joint exceeded its breakpoint and stopped acting.
    JointBroken(JointHandle),
}

/// Owns all bodies, fixtures, joints and contacts, and advances them in
/// time.
pub struct World {
    gravity: Vec2,
    settings: WorldSettings,

    pub(crate) bodies: SlotMap<BodyHandle, Body>,
    pub(crate) fixtures: SlotMap<FixtureHandle, Fixture>,
    pub(crate) joints: SlotMap<JointHandle, Joint>,
    pub(crate) contacts: BTreeMap<ContactKey, Contact>,
    pub(crate) broad_phase: BroadPhase<FixtureProxyKey>,

    ground: BodyHandle,
    contact_filter: Option<Box<dyn ContactFilter>>,
    contact_listener: Option<Box<dyn ContactListener>>,
    events: Vec<WorldEvent>,
    island: Island,

    inv_dt0: f64,
    step_count: u64,
}

impl World {
    /// Creates an empty world with default settings.
    pub fn new(gravity: Vec2) -> Result<Self> {
        Self::with_settings(gravity, WorldSettings::default())
    }

    pub fn with_settings(gravity: Vec2, settings: WorldSettings) -> Result<Self> {
        if !gravity.is_finite() {
            return Err(PhysicsError::configuration("gravity must be finite"));
        }
        settings.validate()?;

        let mut bodies = SlotMap::with_key();
        let ground = bodies.insert(Body::new(&BodyDef::default()));

        Ok(Self {
            gravity,
            settings,
            bodies,
            fixtures: SlotMap::with_key(),
            joints: SlotMap::with_key(),
            contacts: BTreeMap::new(),
            broad_phase: BroadPhase::new(),
            ground,
            contact_filter: None,
            contact_listener: None,
            events: Vec::new(),
            island: Island::default(),
            inv_dt0: 0.0,
            step_count: 0,
        })
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) -> Result<()> {
        if !gravity.is_finite() {
            return Err(PhysicsError::configuration("gravity must be finite"));
        }
        self.gravity = gravity;
        Ok(())
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: WorldSettings) -> Result<()> {
        settings.validate()?;
        if !settings.allow_sleep {
            for body in self.bodies.values_mut() {
                body.set_awake(true);
            }
        }
        self.settings = settings;
        Ok(())
    }

    /// A static body without fixtures, created with the world. Useful as
    /// the fixed end of joints.
    pub fn ground_body(&self) -> BodyHandle {
        self.ground
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_filter = Some(filter);
    }

    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_listener = Some(listener);
    }

    /// Events recorded since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    // Bodies

    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        def.validate()?;
        let handle = self.bodies.insert(Body::new(def));
        debug!(?handle, body_type = ?def.body_type, "body created");
        Ok(handle)
    }

    /// Removes a body with its fixtures, joints and contacts.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Result<()> {
        let body = self
            .bodies
            .get(handle)
            .ok_or(PhysicsError::InvalidBodyHandle)?;
        let joints = body.joints.clone();
        let contacts = body.contacts.clone();
        let fixtures = body.fixtures.clone();

        for joint in joints {
            self.remove_joint(joint)?;
        }
        for key in contacts {
            self.destroy_contact(key);
        }
        for fixture in fixtures {
            if let Some(mut fixture) = self.fixtures.remove(fixture) {
                fixture.destroy_proxies(&mut self.broad_phase);
            }
        }
        self.bodies.remove(handle);
        debug!(?handle, "body removed");
        Ok(())
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn body_entry(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        self.bodies
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidBodyHandle)
    }

    /// Teleports a body. Its proxies follow immediately; contacts are
    /// refreshed on the next step.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f64) -> Result<()> {
        if !position.is_finite() || !angle.is_finite() {
            return Err(PhysicsError::configuration("transform must be finite"));
        }
        let body = self
            .bodies
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidBodyHandle)?;
        body.set_transform(position, angle);

        let xf = body.xf;
        for &fixture in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(fixture) {
                fixture.synchronize(&mut self.broad_phase, &xf, &xf);
            }
        }
        Ok(())
    }

    /// Applies a force at a world point, waking the body.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec2, point: Vec2) -> Result<()> {
        self.body_entry(handle)?.apply_force(force, point, true);
        Ok(())
    }

    pub fn apply_force_to_center(&mut self, handle: BodyHandle, force: Vec2) -> Result<()> {
        self.body_entry(handle)?.apply_force_to_center(force, true);
        Ok(())
    }

    pub fn apply_torque(&mut self, handle: BodyHandle, torque: f64) -> Result<()> {
        self.body_entry(handle)?.apply_torque(torque, true);
        Ok(())
    }

    /// Applies an impulse at a world point, waking the body.
    pub fn apply_linear_impulse(
        &mut self,
        handle: BodyHandle,
        impulse: Vec2,
        point: Vec2,
    ) -> Result<()> {
        self.body_entry(handle)?
            .apply_linear_impulse(impulse, point, true);
        Ok(())
    }

    pub fn apply_angular_impulse(&mut self, handle: BodyHandle, impulse: f64) -> Result<()> {
        self.body_entry(handle)?.apply_angular_impulse(impulse, true);
        Ok(())
    }

    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> Result<()> {
        self.body_entry(handle)?.set_linear_velocity(velocity);
        Ok(())
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, omega: f64) -> Result<()> {
        self.body_entry(handle)?.set_angular_velocity(omega);
        Ok(())
    }

    pub fn set_awake(&mut self, handle: BodyHandle, awake: bool) -> Result<()> {
        self.body_entry(handle)?.set_awake(awake);
        Ok(())
    }

    /// Disabled bodies keep their state but leave the broad phase, so they
    /// neither collide nor move.
    pub fn set_enabled(&mut self, handle: BodyHandle, enabled: bool) -> Result<()> {
        let body = self.body_entry(handle)?;
        if body.enabled == enabled {
            return Ok(());
        }
        body.enabled = enabled;
        let xf = body.xf;
        let fixtures = body.fixtures.clone();
        let contacts = body.contacts.clone();

        if enabled {
            for handle in fixtures {
                if let Some(fixture) = self.fixtures.get_mut(handle) {
                    fixture.create_proxies(&mut self.broad_phase, handle, &xf);
                }
            }
        } else {
            for handle in fixtures {
                if let Some(fixture) = self.fixtures.get_mut(handle) {
                    fixture.destroy_proxies(&mut self.broad_phase);
                }
            }
            for key in contacts {
                self.destroy_contact(key);
            }
        }
        Ok(())
    }

    // Fixtures

    /// Attaches a shape to a body and updates the body's mass.
    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> Result<FixtureHandle> {
        let density = def.material.density;
        let solid = !def.is_sensor;
        if !(density.is_finite() && density >= 0.0) || (solid && density == 0.0) {
            return Err(PhysicsError::InvalidDensity(density));
        }
        let owner = self
            .bodies
            .get(body)
            .ok_or(PhysicsError::InvalidBodyHandle)?;
        let xf = owner.xf;
        let enabled = owner.enabled;

        let handle = self.fixtures.insert(Fixture::new(body, def));
        if enabled {
            if let Some(fixture) = self.fixtures.get_mut(handle) {
                fixture.create_proxies(&mut self.broad_phase, handle, &xf);
            }
        }
        if let Some(owner) = self.bodies.get_mut(body) {
            owner.fixtures.push(handle);
        }
        self.reset_mass_data(body);
        debug!(?handle, ?body, kind = ?def.shape.kind(), "fixture created");
        Ok(handle)
    }

    /// Detaches a fixture, destroying its contacts.
    pub fn remove_fixture(&mut self, handle: FixtureHandle) -> Result<()> {
        let body = self
            .fixtures
            .get(handle)
            .ok_or(PhysicsError::InvalidFixtureHandle)?
            .body;

        let keys: Vec<ContactKey> = self
            .bodies
            .get(body)
            .map(|b| {
                b.contacts
                    .iter()
                    .copied()
                    .filter(|k| k.fixture_a == handle || k.fixture_b == handle)
                    .collect()
            })
            .unwrap_or_default();
        for key in keys {
            self.destroy_contact(key);
        }

        if let Some(mut fixture) = self.fixtures.remove(handle) {
            fixture.destroy_proxies(&mut self.broad_phase);
        }
        if let Some(owner) = self.bodies.get_mut(body) {
            owner.fixtures.retain(|&f| f != handle);
            owner.set_awake(true);
        }
        self.reset_mass_data(body);
        Ok(())
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Replaces a fixture's filter data. Existing contacts are re-filtered
    /// on the next step.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> Result<()> {
        let fixture = self
            .fixtures
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidFixtureHandle)?;
        fixture.filter = filter;
        fixture.touch_proxies(&mut self.broad_phase);

        let body = fixture.body;
        if let Some(body) = self.bodies.get(body) {
            for key in &body.contacts {
                if key.fixture_a == handle || key.fixture_b == handle {
                    if let Some(contact) = self.contacts.get_mut(key) {
                        contact.flag_for_filtering();
                    }
                }
            }
        }
        Ok(())
    }

    fn reset_mass_data(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let fixtures = &self.fixtures;
        body.reset_mass_data(
            body.fixtures
                .clone()
                .into_iter()
                .filter_map(|f| fixtures.get(f))
                .filter(|f| f.density() > 0.0)
                .map(Fixture::mass_data),
        );
    }

    // Joints

    pub fn create_joint(&mut self, def: JointDef) -> Result<JointHandle> {
        def.validate()?;
        if !self.bodies.contains_key(def.body_a) || !self.bodies.contains_key(def.body_b) {
            return Err(PhysicsError::InvalidBodyHandle);
        }
        let (body_a, body_b) = (def.body_a, def.body_b);
        let collide_connected = def.collide_connected;

        let handle = self.joints.insert(Joint::new(def));
        for body in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.push(handle);
            }
        }

        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }
        debug!(?handle, "joint created");
        Ok(handle)
    }

    pub fn remove_joint(&mut self, handle: JointHandle) -> Result<()> {
        let joint = self
            .joints
            .remove(handle)
            .ok_or(PhysicsError::InvalidJointHandle)?;

        for body in [joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joints.retain(|&j| j != handle);
                body.set_awake(true);
            }
        }

        // Pairs the joint filtered out may now collide.
        if !joint.collide_connected {
            self.touch_body_proxies(joint.body_a);
        }
        debug!(?handle, "joint removed");
        Ok(())
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_state(&self, handle: JointHandle) -> Result<JointState> {
        self.joints
            .get(handle)
            .map(Joint::state)
            .ok_or(PhysicsError::InvalidJointHandle)
    }

    /// Switches a joint on or off. Enabling also revives a broken joint.
    pub fn enable_joint(&mut self, handle: JointHandle, enabled: bool) -> Result<()> {
        let joint = self
            .joints
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidJointHandle)?;
        joint.state = if enabled {
            JointState::Active
        } else {
            JointState::Disabled
        };
        let (body_a, body_b) = (joint.body_a, joint.body_b);
        for body in [body_a, body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.set_awake(true);
            }
        }
        if joint.collide_connected {
            return Ok(());
        }
        if enabled {
            self.flag_contacts_between(body_a, body_b);
        } else {
            self.touch_body_proxies(body_a);
        }
        Ok(())
    }

    /// Moves the target of a mouse joint and wakes the dragged body.
    pub fn set_mouse_target(&mut self, handle: JointHandle, target: Vec2) -> Result<()> {
        let joint = self
            .joints
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidJointHandle)?;
        let JointKind::Mouse(mouse) = &mut joint.kind else {
            return Err(PhysicsError::joint("not a mouse joint"));
        };
        if !target.is_finite() {
            return Err(PhysicsError::joint("mouse joint target must be finite"));
        }
        mouse.target = target;
        let body_b = joint.body_b;
        if let Some(body) = self.bodies.get_mut(body_b) {
            body.set_awake(true);
        }
        Ok(())
    }

    fn flag_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let Some(body) = self.bodies.get(body_b) else {
            return;
        };
        for key in &body.contacts {
            if let Some(contact) = self.contacts.get_mut(key) {
                if contact.body_a == body_a || contact.body_b == body_a {
                    contact.flag_for_filtering();
                }
            }
        }
    }

    fn touch_body_proxies(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get(handle) else {
            return;
        };
        for &fixture in &body.fixtures {
            if let Some(fixture) = self.fixtures.get(fixture) {
                fixture.touch_proxies(&mut self.broad_phase);
            }
        }
    }

    // Contacts

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn contact(&self, key: &ContactKey) -> Option<&Contact> {
        self.contacts.get(key)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn proxy_count(&self) -> usize {
        self.broad_phase.proxy_count()
    }

    /// Clears the force and torque accumulators of every body.
    pub fn clear_forces(&mut self) {
        for body in self.bodies.values_mut() {
            body.clear_forces();
        }
    }

    /// Canonical contact key for two proxies, or `None` for unsupported
    /// shape pairs.
    fn contact_key(&self, a: FixtureProxyKey, b: FixtureProxyKey) -> Option<ContactKey> {
        let kind_a = self.fixtures.get(a.fixture)?.shape.kind();
        let kind_b = self.fixtures.get(b.fixture)?.shape.kind();
        if !is_supported_pair(kind_a, kind_b) {
            return None;
        }
        let swap = if kind_a == kind_b {
            b < a
        } else {
            !takes_role_a(kind_a, kind_b)
        };
        let (a, b) = if swap { (b, a) } else { (a, b) };
        Some(ContactKey {
            fixture_a: a.fixture,
            child_a: a.child,
            fixture_b: b.fixture,
            child_b: b.child,
        })
    }

    /// Whether two fixtures may generate a contact: different bodies, at
    /// least one dynamic, no joint forbidding it, filters accept.
    fn should_collide(&self, fixture_a: FixtureHandle, fixture_b: FixtureHandle) -> bool {
        let (Some(fa), Some(fb)) = (self.fixtures.get(fixture_a), self.fixtures.get(fixture_b))
        else {
            return false;
        };
        if fa.body == fb.body {
            return false;
        }
        let (Some(body_a), Some(body_b)) = (self.bodies.get(fa.body), self.bodies.get(fb.body))
        else {
            return false;
        };
        if body_a.body_type != BodyType::Dynamic && body_b.body_type != BodyType::Dynamic {
            return false;
        }

        let jointed = body_b.joints.iter().any(|&j| {
            self.joints.get(j).is_some_and(|joint| {
                joint.is_active()
                    && !joint.collide_connected
                    && joint.other_body(fb.body) == fa.body
            })
        });
        if jointed {
            return false;
        }

        if !fa.filter.should_collide(&fb.filter) {
            return false;
        }
        self.contact_filter
            .as_ref()
            .map_or(true, |filter| filter.should_collide(fa, fb))
    }

    fn find_new_contacts(&mut self) {
        let mut pairs = Vec::new();
        self.broad_phase.update_pairs(|a, b| pairs.push((a, b)));
        for (a, b) in pairs {
            self.add_pair(a, b);
        }
    }

    fn add_pair(&mut self, proxy_a: FixtureProxyKey, proxy_b: FixtureProxyKey) {
        let Some(key) = self.contact_key(proxy_a, proxy_b) else {
            return;
        };
        if self.contacts.contains_key(&key) {
            return;
        }
        if !self.should_collide(key.fixture_a, key.fixture_b) {
            return;
        }
        let (Some(fa), Some(fb)) = (self.fixtures.get(key.fixture_a), self.fixtures.get(key.fixture_b))
        else {
            return;
        };
        let contact = Contact::new(key, fa, fb);
        for body in [contact.body_a, contact.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.contacts.push(key);
            }
        }
        self.contacts.insert(key, contact);
    }

    fn destroy_contact(&mut self, key: ContactKey) {
        let Some(contact) = self.contacts.remove(&key) else {
            return;
        };
        if contact.touching {
            if let Some(listener) = self.contact_listener.as_mut() {
                listener.end_contact(&contact);
            }
            self.events.push(WorldEvent::EndContact(key));
            trace!(?key, "contact ended");
        }
        for body in [contact.body_a, contact.body_b] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.contacts.retain(|&k| k != key);
            }
        }
    }

    /// Updates every contact: re-filtering, fat AABB overlap and the
    /// narrow phase.
    fn collide(&mut self) {
        let keys: Vec<ContactKey> = self.contacts.keys().copied().collect();
        for key in keys {
            let Some(contact) = self.contacts.get(&key) else {
                continue;
            };

            if contact.filter_flag {
                if !self.should_collide(key.fixture_a, key.fixture_b) {
                    self.destroy_contact(key);
                    continue;
                }
                if let Some(contact) = self.contacts.get_mut(&key) {
                    contact.filter_flag = false;
                }
            }

            let Some(contact) = self.contacts.get(&key) else {
                continue;
            };
            let active = |handle: BodyHandle| {
                self.bodies
                    .get(handle)
                    .is_some_and(|b| b.awake && b.body_type != BodyType::Static)
            };
            // Sleeping and static bodies keep their contacts unchanged.
            if !active(contact.body_a) && !active(contact.body_b) {
                continue;
            }

            let proxy_id = |handle: FixtureHandle, child: usize| {
                self.fixtures
                    .get(handle)
                    .and_then(|f| f.proxies.get(child))
                    .map(|p| p.proxy_id)
            };
            let overlap = match (proxy_id(key.fixture_a, key.child_a), proxy_id(key.fixture_b, key.child_b)) {
                (Some(a), Some(b)) => self.broad_phase.test_overlap(a, b),
                _ => false,
            };
            if !overlap {
                self.destroy_contact(key);
                continue;
            }

            self.update_contact(key);
        }
    }

    fn update_contact(&mut self, key: ContactKey) {
        let (Some(contact), Some(fa), Some(fb)) = (
            self.contacts.get_mut(&key),
            self.fixtures.get(key.fixture_a),
            self.fixtures.get(key.fixture_b),
        ) else {
            return;
        };
        let (Some(xf_a), Some(xf_b)) = (
            self.bodies.get(contact.body_a).map(|b| b.xf),
            self.bodies.get(contact.body_b).map(|b| b.xf),
        ) else {
            return;
        };

        let (old_manifold, was_touching) = contact.update(&fa.shape, &xf_a, &fb.shape, &xf_b);
        let touching = contact.touching;

        if touching != was_touching {
            for body in [contact.body_a, contact.body_b] {
                if let Some(body) = self.bodies.get_mut(body) {
                    body.set_awake(true);
                }
            }
        }

        if !was_touching && touching {
            self.events.push(WorldEvent::BeginContact(key));
            trace!(?key, "contact began");
        } else if was_touching && !touching {
            self.events.push(WorldEvent::EndContact(key));
            trace!(?key, "contact ended");
        }

        if let Some(listener) = self.contact_listener.as_mut() {
            if !was_touching && touching {
                listener.begin_contact(contact);
            } else if was_touching && !touching {
                listener.end_contact(contact);
            }
            if !contact.sensor && touching && !listener.pre_solve(contact, &old_manifold) {
                contact.enabled = false;
            }
        }
    }

    // Stepping

    /// Advances the world by `dt` seconds.
    ///
    /// A zero step does nothing. Negative or non-finite steps are rejected.
    #[instrument(level = "trace", skip_all, fields(dt = dt))]
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }

        let step = TimeStep::new(dt, self.inv_dt0, &self.settings);

        // Removals take effect immediately, so nothing is pending here.
        self.find_new_contacts();
        self.collide();
        self.solve(&step);
        if self.settings.continuous_physics {
            self.solve_toi();
        }
        if self.settings.auto_clear_forces {
            self.clear_forces();
        }

        self.inv_dt0 = step.inv_dt;
        self.step_count += 1;
        trace!(
            step = self.step_count,
            bodies = self.bodies.len(),
            contacts = self.contacts.len(),
            "step finished"
        );
        Ok(())
    }

    fn solve(&mut self, step: &TimeStep) {
        for body in self.bodies.values_mut() {
            body.island_flag = false;
        }
        for contact in self.contacts.values_mut() {
            contact.island_flag = false;
        }
        for joint in self.joints.values_mut() {
            joint.island_flag = false;
        }

        let seeds: Vec<BodyHandle> = self.bodies.keys().collect();
        let mut stack: Vec<BodyHandle> = Vec::with_capacity(self.bodies.len());
        let mut island = std::mem::take(&mut self.island);
        let mut unfiltered: Vec<BodyHandle> = Vec::new();

        for seed in seeds {
            let Some(body) = self.bodies.get_mut(seed) else {
                continue;
            };
            if body.island_flag
                || !body.awake
                || !body.enabled
                || body.body_type == BodyType::Static
            {
                continue;
            }

            island.clear();
            stack.clear();
            body.island_flag = true;
            stack.push(seed);

            // Depth first search over the constraint graph.
            while let Some(handle) = stack.pop() {
                island.bodies.push(handle);
                let Some(body) = self.bodies.get_mut(handle) else {
                    continue;
                };
                body.set_awake(true);

                // Static bodies end the search so islands stay small.
                if body.body_type == BodyType::Static {
                    continue;
                }
                let contact_keys = body.contacts.clone();
                let joint_handles = body.joints.clone();

                for key in contact_keys {
                    let Some(contact) = self.contacts.get_mut(&key) else {
                        continue;
                    };
                    if contact.island_flag || !contact.enabled || !contact.touching || contact.sensor {
                        continue;
                    }
                    contact.island_flag = true;
                    island.contacts.push(key);

                    let other = if contact.body_a == handle {
                        contact.body_b
                    } else {
                        contact.body_a
                    };
                    if let Some(other_body) = self.bodies.get_mut(other) {
                        if !other_body.island_flag {
                            other_body.island_flag = true;
                            stack.push(other);
                        }
                    }
                }

                for joint_handle in joint_handles {
                    let Some(joint) = self.joints.get_mut(joint_handle) else {
                        continue;
                    };
                    if joint.island_flag || !joint.is_active() {
                        continue;
                    }
                    let other = joint.other_body(handle);
                    if !self.bodies.get(other).is_some_and(|b| b.enabled) {
                        continue;
                    }

                    let (Some(body_a), Some(body_b)) =
                        (self.bodies.get(joint.body_a), self.bodies.get(joint.body_b))
                    else {
                        continue;
                    };
                    if joint.check_breakpoint(body_a, body_b) {
                        warn!(joint = ?joint_handle, "joint broke");
                        self.events.push(WorldEvent::JointBroken(joint_handle));
                        if !joint.collide_connected {
                            unfiltered.push(joint.body_a);
                        }
                        continue;
                    }

                    joint.island_flag = true;
                    island.joints.push(joint_handle);

                    if let Some(other_body) = self.bodies.get_mut(other) {
                        if !other_body.island_flag {
                            other_body.island_flag = true;
                            stack.push(other);
                        }
                    }
                }
            }

            let report = island.solve(IslandContext {
                step: *step,
                gravity: self.gravity,
                allow_sleep: self.settings.allow_sleep,
                bodies: &mut self.bodies,
                contacts: &mut self.contacts,
                joints: &mut self.joints,
            });

            if let Some(listener) = self.contact_listener.as_mut() {
                for (key, impulse) in &report.impulses {
                    if let Some(contact) = self.contacts.get(key) {
                        listener.post_solve(contact, impulse);
                    }
                }
            }
            if report.slept {
                trace!(bodies = island.bodies.len(), "island fell asleep");
            }

            // Static bodies may take part in other islands.
            for &handle in &island.bodies {
                if let Some(body) = self.bodies.get_mut(handle) {
                    if body.body_type == BodyType::Static {
                        body.island_flag = false;
                    }
                }
            }
        }
        self.island = island;

        // Pairs a broken joint filtered out may now collide.
        for handle in unfiltered {
            self.touch_body_proxies(handle);
        }

        // Move proxies of every body that was simulated.
        for body in self.bodies.values() {
            if !body.island_flag || body.body_type == BodyType::Static {
                continue;
            }
            let xf1 = body.start_transform();
            let xf2 = body.xf;
            for &fixture in &body.fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture) {
                    fixture.synchronize(&mut self.broad_phase, &xf1, &xf2);
                }
            }
        }
    }

    /// Continuous collision as a position clamp: a dynamic body whose
    /// motion this step would carry it through static, kinematic or (for
    /// bullets) other dynamic geometry is moved back to the first time of
    /// impact. Its velocity is kept for the contact solver to resolve next
    /// step.
    fn solve_toi(&mut self) {
        let candidates: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.is_dynamic() && b.awake && b.enabled && b.island_flag)
            .map(|(h, _)| h)
            .collect();

        for handle in candidates {
            let Some(alpha) = self.first_impact(handle) else {
                continue;
            };
            let Some(body) = self.bodies.get_mut(handle) else {
                continue;
            };
            body.advance(alpha);
            body.sweep.alpha0 = 0.0;
            debug!(body = ?handle, alpha, "continuous collision clamp");

            let xf = body.xf;
            for &fixture in &body.fixtures {
                if let Some(fixture) = self.fixtures.get_mut(fixture) {
                    fixture.synchronize(&mut self.broad_phase, &xf, &xf);
                    fixture.touch_proxies(&mut self.broad_phase);
                }
            }
        }
    }

    /// Earliest time of impact in `(0, 1)` of a body's sweep against the
    /// geometry its swept proxies overlap.
    fn first_impact(&self, handle: BodyHandle) -> Option<f64> {
        let body = self.bodies.get(handle)?;
        let sweep = body.sweep;
        if sweep.c0 == sweep.c && sweep.a0 == sweep.a {
            return None;
        }

        let mut min_alpha = 1.0;
        for &fixture_handle in &body.fixtures {
            let Some(fixture) = self.fixtures.get(fixture_handle) else {
                continue;
            };
            if fixture.is_sensor {
                continue;
            }

            for proxy in &fixture.proxies {
                let mut hits = Vec::new();
                self.broad_phase.query(&proxy.aabb, |id| {
                    hits.push(id);
                    true
                });

                for id in hits {
                    let Some(other_key) = self.broad_phase.user_data(id) else {
                        continue;
                    };
                    let Some(other_fixture) = self.fixtures.get(other_key.fixture) else {
                        continue;
                    };
                    if other_fixture.body == handle || other_fixture.is_sensor {
                        continue;
                    }
                    let Some(other) = self.bodies.get(other_fixture.body) else {
                        continue;
                    };
                    if other.body_type == BodyType::Dynamic && (!body.bullet || other.bullet) {
                        continue;
                    }
                    if !self.should_collide(fixture_handle, other_key.fixture) {
                        continue;
                    }

                    let own_key = FixtureProxyKey {
                        fixture: fixture_handle,
                        child: proxy.child_index,
                    };
                    // Touching pairs belong to the contact solver.
                    let touching = self
                        .contact_key(own_key, other_key)
                        .and_then(|key| self.contacts.get(&key))
                        .is_some_and(|c| c.touching);
                    if touching {
                        continue;
                    }

                    let mut other_sweep = other.sweep;
                    if !other.awake || other.body_type == BodyType::Static {
                        other_sweep.c0 = other_sweep.c;
                        other_sweep.a0 = other_sweep.a;
                    }

                    let output = time_of_impact(&ToiInput {
                        proxy_a: DistanceProxy::new(&fixture.shape, proxy.child_index),
                        proxy_b: DistanceProxy::new(&other_fixture.shape, other_key.child),
                        sweep_a: sweep,
                        sweep_b: other_sweep,
                        t_max: 1.0,
                    });
                    if output.state == ToiState::Touching && output.t > 0.0 && output.t < min_alpha {
                        min_alpha = output.t;
                    }
                }
            }
        }

        (min_alpha < 1.0).then_some(min_alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{DistanceJoint, RevoluteJoint};
    use crate::shapes::{Circle, Polygon};
    const EPSILON: f64 = 1e-9;

    fn world() -> World {
        World::new(Vec2::new(0.0, -10.0)).unwrap()
    }

    fn ground(world: &mut World) -> BodyHandle {
        let ground = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(ground, &FixtureDef::new(Polygon::new_box(20.0, 0.5).unwrap()))
            .unwrap();
        ground
    }

    fn ball(world: &mut World, position: Vec2) -> BodyHandle {
        let body = world.create_body(&BodyDef::dynamic().at(position)).unwrap();
        world
            .create_fixture(body, &FixtureDef::new(Circle::new(0.5).unwrap()))
            .unwrap();
        body
    }

    #[test]
    fn test_world_new() {
        let world = world();
        assert_eq!(world.gravity(), Vec2::new(0.0, -10.0));
        assert_eq!(world.body_count(), 1);
        assert!(world.body(world.ground_body()).is_some());
        assert!(World::new(Vec2::new(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_step_rejects_bad_dt() {
        let mut world = world();
        assert_eq!(
            world.step(-1.0),
            Err(PhysicsError::InvalidTimeStep(-1.0))
        );
        assert!(world.step(f64::INFINITY).is_err());
        assert!(world.step(0.0).is_ok());
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_step_gravity() {
        let mut world = world();
        let body = ball(&mut world, Vec2::new(0.0, 10.0));
        let dt = 1.0 / 60.0;
        world.step(dt).unwrap();

        let b = world.body(body).unwrap();
        assert!((b.linear_velocity().y + 10.0 * dt).abs() < EPSILON);
        assert!(b.position().y < 10.0);
    }

    #[test]
    fn test_step_no_gravity_on_static() {
        let mut world = world();
        let ground = ground(&mut world);
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.body(ground).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn test_fixture_sets_mass() {
        let mut world = world();
        let body = ball(&mut world, Vec2::ZERO);
        let mass = world.body(body).unwrap().mass();
        assert!((mass - std::f64::consts::PI * 0.25).abs() < EPSILON);

        let bad = FixtureDef::new(Circle::new(1.0).unwrap()).with_density(-1.0);
        assert_eq!(
            world.create_fixture(body, &bad),
            Err(PhysicsError::InvalidDensity(-1.0))
        );
    }

    #[test]
    fn test_fixture_rejects_zero_density() {
        let mut world = world();
        let body = world.create_body(&BodyDef::dynamic()).unwrap();
        let weightless = FixtureDef::new(Polygon::new_box(0.5, 0.5).unwrap()).with_density(0.0);
        assert_eq!(
            world.create_fixture(body, &weightless),
            Err(PhysicsError::InvalidDensity(0.0))
        );
        assert!(matches!(
            world.create_fixture(body, &weightless.clone().with_density(f64::NAN)),
            Err(PhysicsError::InvalidDensity(_))
        ));
        assert_eq!(world.fixture_count(), 0);

        // Sensors carry no mass.
        let sensor = weightless.sensor();
        assert!(world.create_fixture(body, &sensor).is_ok());
    }

    #[test]
    fn test_contact_created_and_destroyed() {
        let mut world = world();
        ground(&mut world);
        let body = ball(&mut world, Vec2::new(0.0, 0.99));
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.contact_count(), 1);
        assert!(world.contacts().all(|c| c.is_touching()));
        let events = world.drain_events();
        assert!(matches!(events.as_slice(), [WorldEvent::BeginContact(_)]));

        world.set_transform(body, Vec2::new(0.0, 30.0), 0.0).unwrap();
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.contact_count(), 0);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, WorldEvent::EndContact(_))));
    }

    #[test]
    fn test_remove_body_cleans_up() {
        let mut world = world();
        let ground = ground(&mut world);
        let body = ball(&mut world, Vec2::new(0.0, 0.99));
        let joint = world
            .create_joint(JointDef::new(
                ground,
                body,
                DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0),
            ))
            .unwrap();
        world.step(1.0 / 60.0).unwrap();

        world.remove_body(body).unwrap();
        assert!(world.body(body).is_none());
        assert!(world.joint(joint).is_none());
        assert_eq!(world.contact_count(), 0);
        assert_eq!(world.fixture_count(), 1);
        assert_eq!(world.proxy_count(), 1);
        assert_eq!(world.remove_body(body), Err(PhysicsError::InvalidBodyHandle));
        assert!(world.body(ground).unwrap().joints().is_empty());
    }

    #[test]
    fn test_joint_prevents_collision_unless_connected() {
        let mut world = world();
        let a = ball(&mut world, Vec2::new(0.0, 5.0));
        let b = ball(&mut world, Vec2::new(0.5, 5.0));
        let anchor = Vec2::new(0.25, 5.0);
        let def = RevoluteJoint::at_world_anchor(
            world.body(a).unwrap(),
            world.body(b).unwrap(),
            anchor,
        );
        world.create_joint(JointDef::new(a, b, def)).unwrap();
        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn test_broken_joint_restores_collision() {
        let mut world = World::new(Vec2::ZERO).unwrap();
        let post = world.create_body(&BodyDef::default()).unwrap();
        world
            .create_fixture(post, &FixtureDef::new(Circle::new(0.5).unwrap()))
            .unwrap();
        let b = ball(&mut world, Vec2::new(0.5, 0.0));
        let joint = world
            .create_joint(
                JointDef::new(post, b, DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 3.0))
                    .with_breakpoint(0.5),
            )
            .unwrap();

        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.joint_state(joint), Ok(JointState::Broken));
        assert_eq!(world.contact_count(), 0);

        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.contact_count(), 1);
        assert!(world.contacts().all(|c| c.is_touching()));
    }

    #[test]
    fn test_joint_errors() {
        let mut world = world();
        let a = ball(&mut world, Vec2::ZERO);
        let same = JointDef::new(a, a, DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0));
        assert!(matches!(
            world.create_joint(same),
            Err(PhysicsError::InvalidJoint { .. })
        ));

        let b = ball(&mut world, Vec2::new(3.0, 0.0));
        world.remove_body(b).unwrap();
        let stale = JointDef::new(a, b, DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0));
        assert_eq!(world.create_joint(stale), Err(PhysicsError::InvalidBodyHandle));
    }

    #[test]
    fn test_set_mouse_target_requires_mouse_joint() {
        let mut world = world();
        let ground = world.ground_body();
        let a = ball(&mut world, Vec2::ZERO);
        let joint = world
            .create_joint(JointDef::new(
                ground,
                a,
                DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 1.0),
            ))
            .unwrap();
        assert!(world.set_mouse_target(joint, Vec2::ZERO).is_err());
    }

    #[test]
    fn test_body_falls_asleep_on_ground() {
        let mut world = world();
        ground(&mut world);
        let body = ball(&mut world, Vec2::new(0.0, 1.0));
        for _ in 0..240 {
            world.step(1.0 / 60.0).unwrap();
        }
        assert!(!world.body(body).unwrap().is_awake());

        world.apply_linear_impulse(body, Vec2::new(0.0, 1.0), Vec2::new(0.0, 1.0)).unwrap();
        assert!(world.body(body).unwrap().is_awake());
    }
}
