use crate::collision::{BroadPhase, RayCastInput, RayCastOutput, AABB};
use crate::common::Material;
use crate::math::{Transform, Vec2};
use crate::shapes::{MassData, Shape};

use super::{BodyHandle, FixtureHandle};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collision filtering data.
///
/// Fixtures sharing a non-zero `group_index` never collide with each other.
/// Otherwise each fixture's mask must accept the other's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Filter {
    /// Category bits this fixture belongs to.
    pub category_bits: u16,
    /// Categories this fixture accepts collisions with.
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index != 0 && self.group_index == other.group_index {
            return false;
        }
        (self.mask_bits & other.category_bits) != 0 && (other.mask_bits & self.category_bits) != 0
    }
}

/// Everything needed to attach a [`Fixture`] to a body.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    pub shape: Shape,
    pub material: Material,
    /// Sensors report overlap but produce no collision response.
    pub is_sensor: bool,
    pub filter: Filter,
}

impl FixtureDef {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            material: Material::default(),
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.material.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.material.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Broad-phase user data: one entry per shape child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixtureProxyKey {
    pub fixture: FixtureHandle,
    pub child: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FixtureProxy {
    pub aabb: AABB,
    pub child_index: usize,
    pub proxy_id: usize,
}

/// A shape attached to a body, with material and filtering.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub(crate) body: BodyHandle,
    pub(crate) shape: Shape,
    pub(crate) material: Material,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub(crate) fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            material: def.material,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn density(&self) -> f64 {
        self.material.density
    }

    pub fn friction(&self) -> f64 {
        self.material.friction
    }

    pub fn restitution(&self) -> f64 {
        self.material.restitution
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.material.density)
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        self.shape.test_point(xf, point)
    }

    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf, child_index)
    }

    /// Fat broad-phase AABB of a child, as last synchronized.
    pub fn aabb(&self, child_index: usize) -> Option<AABB> {
        self.proxies
            .iter()
            .find(|p| p.child_index == child_index)
            .map(|p| p.aabb)
    }

    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        handle: FixtureHandle,
        xf: &Transform,
    ) {
        debug_assert!(self.proxies.is_empty());
        for child in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child);
            let proxy_id = broad_phase.create_proxy(
                aabb,
                FixtureProxyKey {
                    fixture: handle,
                    child,
                },
            );
            self.proxies.push(FixtureProxy {
                aabb,
                child_index: child,
                proxy_id,
            });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Moves the proxies to cover the motion from `xf1` to `xf2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<FixtureProxyKey>,
        xf1: &Transform,
        xf2: &Transform,
    ) {
        for proxy in &mut self.proxies {
            // Cover the swept area so nothing is missed between the two poses.
            let aabb1 = self.shape.compute_aabb(xf1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(xf2, proxy.child_index);
            proxy.aabb = AABB::combine(&aabb1, &aabb2);

            let displacement = aabb2.center() - aabb1.center();
            broad_phase.move_proxy(proxy.proxy_id, proxy.aabb, displacement);
        }
    }

    /// Forces the broad phase to re-check this fixture's pairs.
    pub(crate) fn touch_proxies(&self, broad_phase: &mut BroadPhase<FixtureProxyKey>) {
        for proxy in &self.proxies {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}
