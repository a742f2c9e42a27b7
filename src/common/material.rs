//! Surface and bulk properties of a fixture.

/// Physical material of a fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// Coulomb friction coefficient, usually in `[0, 1]`.
    pub friction: f64,
    /// Bounciness. 0 = perfectly inelastic, 1 = perfectly elastic.
    pub restitution: f64,
    /// Mass per unit area. Segments carry no mass regardless of density.
    pub density: f64,
}

impl Material {
    /// Creates a material. Friction and restitution are clamped to be non-negative,
    /// density is validated when the fixture is created.
    pub fn new(friction: f64, restitution: f64, density: f64) -> Self {
        Material {
            friction: friction.max(0.0),
            restitution: restitution.max(0.0),
            density,
        }
    }
}

impl Default for Material {
    /// Moderate friction, no bounce, unit density.
    fn default() -> Self {
        Material {
            friction: 0.2,
            restitution: 0.0,
            density: 1.0,
        }
    }
}

/// Friction of a contact: the geometric mean, so a frictionless surface
/// makes the pair frictionless.
pub fn mix_friction(friction_a: f64, friction_b: f64) -> f64 {
    (friction_a * friction_b).sqrt()
}

/// Restitution of a contact: the bouncier surface wins.
pub fn mix_restitution(restitution_a: f64, restitution_b: f64) -> f64 {
    restitution_a.max(restitution_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_material_new_clamps() {
        let m = Material::new(-1.0, -0.5, 2.0);
        assert_eq!(m.friction, 0.0);
        assert_eq!(m.restitution, 0.0);
        assert_eq!(m.density, 2.0);
    }

    #[test]
    fn test_mixing_rules() {
        assert!((mix_friction(0.4, 0.9) - 0.6).abs() < EPSILON);
        assert_eq!(mix_friction(0.0, 0.9), 0.0);
        assert_eq!(mix_restitution(0.1, 0.8), 0.8);
    }
}
