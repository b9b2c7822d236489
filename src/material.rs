//! Surface and bulk properties of a rigid body.

// ComplexField provides powf() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Smallest mass a body with non-zero density and area can have.
pub const MIN_MASS: f32 = 0.001;

/// Material a body is made of.
///
/// Mass is derived from `density` and the collider area, so a material with
/// zero density produces an immovable body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsMaterial {
    /// Mass per unit area.
    pub density: f32,
    /// Exponent applied to `density * area` when deriving mass.
    pub mass_exponent: f32,
    /// Bounciness (0.0 = no bounce, 1.0 = fully elastic).
    pub restitution: f32,
    /// Coulomb friction coefficient.
    pub friction: f32,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            density: 1.0,
            mass_exponent: 1.0,
            restitution: 0.0,
            friction: 0.7,
        }
    }
}

impl PhysicsMaterial {
    /// Zero density: bodies made of this never move.
    pub const STATIC: Self = Self {
        density: 0.0,
        mass_exponent: 1.0,
        restitution: 0.0,
        friction: 0.7,
    };

    pub const RUBBER: Self = Self {
        density: 1.1,
        mass_exponent: 1.0,
        restitution: 0.8,
        friction: 0.9,
    };

    pub const ICE: Self = Self {
        density: 0.9,
        mass_exponent: 1.0,
        restitution: 0.05,
        friction: 0.02,
    };

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_mass_exponent(mut self, mass_exponent: f32) -> Self {
        self.mass_exponent = mass_exponent;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Mass of a body of this material covering `area`.
    ///
    /// `(density * area) ^ mass_exponent`, clamped to at least [`MIN_MASS`].
    /// Zero (or negative) density or area gives 0, the static mass.
    pub fn mass_for_area(&self, area: f32) -> f32 {
        if self.density <= 0.0 || area <= 0.0 || !area.is_finite() {
            return 0.0;
        }
        let mass = (self.density * area).powf(self.mass_exponent);
        if mass.is_finite() {
            mass.max(MIN_MASS)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    #[test]
    fn test_mass_is_density_times_area() {
        let material = PhysicsMaterial::default().with_density(2.0);
        assert!((material.mass_for_area(3.0) - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_mass_exponent() {
        let material = PhysicsMaterial::default()
            .with_density(1.0)
            .with_mass_exponent(2.0);
        assert!((material.mass_for_area(3.0) - 9.0).abs() < 1e-4);
    }

    #[test]
    fn test_mass_clamped_to_minimum() {
        let material = PhysicsMaterial::default().with_density(1e-6);
        assert_eq!(material.mass_for_area(1.0), MIN_MASS);
    }

    #[test]
    fn test_zero_density_or_area_is_static() {
        assert_eq!(PhysicsMaterial::STATIC.mass_for_area(10.0), 0.0);
        assert_eq!(PhysicsMaterial::default().mass_for_area(0.0), 0.0);
    }
}
