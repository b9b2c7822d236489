//! Force generators: sources that push every attached body once per step.
//!
//! A generator does not own its bodies. It keeps a set of [`BodyId`]s and
//! resolves them against the [`BodySet`] each time it is notified, so a body
//! removed from the world simply stops resolving.

use alloc::collections::BTreeSet;

use crate::body_set::{BodyId, BodySet};
use crate::math::{self, Vec2};
use crate::rigid_body::RigidBody;
use crate::FPSeconds;

/// What a generator computes for each attached body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceKind {
    /// Constant acceleration, applied as `acceleration * mass`.
    Gravity { acceleration: Vec2 },
    /// `-v̂ (k1 |v| + k2 |v|²)`.
    Drag { k1: f32, k2: f32 },
    /// Dynamic pressure `0.5 ρ s²` of a wind blowing at `speed` along
    /// `direction`, scaled by the collider area.
    Wind {
        direction: Vec2,
        speed: f32,
        air_density: f32,
    },
}

/// Density of air at sea level, kg/m³.
pub const AIR_DENSITY: f32 = 1.225;

#[derive(Debug, Clone)]
pub struct ForceGenerator {
    kind: ForceKind,
    observers: BTreeSet<BodyId>,
    enabled: bool,
}

impl ForceGenerator {
    pub fn new(kind: ForceKind) -> Self {
        Self {
            kind,
            observers: BTreeSet::new(),
            enabled: true,
        }
    }

    pub fn gravity(acceleration: Vec2) -> Self {
        Self::new(ForceKind::Gravity { acceleration })
    }

    pub fn drag(k1: f32, k2: f32) -> Self {
        Self::new(ForceKind::Drag { k1, k2 })
    }

    pub fn wind(direction: Vec2, speed: f32) -> Self {
        Self::new(ForceKind::Wind {
            direction,
            speed,
            air_density: AIR_DENSITY,
        })
    }

    pub fn kind(&self) -> &ForceKind {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: ForceKind) {
        self.kind = kind;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns `true` if `id` was not attached yet.
    pub fn attach(&mut self, id: BodyId) -> bool {
        self.observers.insert(id)
    }

    /// Returns `true` if `id` was attached.
    pub fn detach(&mut self, id: BodyId) -> bool {
        self.observers.remove(&id)
    }

    pub fn detach_all(&mut self) {
        self.observers.clear();
    }

    pub fn is_attached(&self, id: BodyId) -> bool {
        self.observers.contains(&id)
    }

    pub fn observers(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.observers.iter().copied()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The force this generator would apply to `body` right now.
    pub fn force_on(&self, body: &RigidBody) -> Vec2 {
        match self.kind {
            ForceKind::Gravity { acceleration } => acceleration * body.mass(),
            ForceKind::Drag { k1, k2 } => {
                let velocity = body.velocity();
                let speed = velocity.norm();
                match math::try_normalize(&velocity) {
                    Some(dir) => -dir * (k1 * speed + k2 * speed * speed),
                    None => Vec2::zeros(),
                }
            }
            ForceKind::Wind {
                direction,
                speed,
                air_density,
            } => {
                let area = body.collider().map_or(0.0, |c| c.calc_area());
                match math::try_normalize(&direction) {
                    Some(dir) => dir * (0.5 * air_density * speed * speed * area),
                    None => Vec2::zeros(),
                }
            }
        }
    }

    /// Queue this generator's force as an impulse on every attached body that
    /// is awake and has physics enabled.
    pub fn notify(&self, bodies: &mut BodySet, _dt: FPSeconds) {
        if !self.enabled {
            return;
        }
        for id in self.observers.iter() {
            let Some(body) = bodies.get_mut(*id) else {
                continue;
            };
            if !body.is_awake() || !body.is_physics_enabled() {
                continue;
            }
            let force = self.force_on(body);
            if force.norm_squared() > math::NEAR_ZERO_SQ {
                body.apply_impulse(force);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::collider::Collider;
    use crate::material::PhysicsMaterial;
    use crate::rigid_body::RigidBodyDesc;

    const EPSILON: f32 = 1e-4;

    fn approx_vec_eq(a: &Vec2, b: &Vec2) -> bool {
        (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON
    }

    fn box_body(velocity: Vec2) -> RigidBody {
        RigidBody::new(
            RigidBodyDesc::default()
                .with_collider(Collider::aabb(Vec2::new(1.0, 0.5)))
                .with_material(PhysicsMaterial::default().with_density(0.5))
                .with_velocity(velocity),
        )
    }

    #[test]
    fn test_attach_detach_idempotent() {
        let mut bodies = BodySet::new();
        let id = bodies.insert(box_body(Vec2::zeros()));
        let mut generator = ForceGenerator::gravity(Vec2::new(0.0, -9.81));

        assert!(generator.attach(id));
        assert!(!generator.attach(id));
        assert_eq!(generator.observer_count(), 1);
        assert!(generator.detach(id));
        assert!(!generator.detach(id));
        assert_eq!(generator.observer_count(), 0);
    }

    #[test]
    fn test_gravity_scales_with_mass() {
        let body = box_body(Vec2::zeros());
        // area 2, density 0.5
        assert!((body.mass() - 1.0).abs() < EPSILON);
        let generator = ForceGenerator::gravity(Vec2::new(0.0, -9.81));
        assert!(approx_vec_eq(&generator.force_on(&body), &Vec2::new(0.0, -9.81)));
    }

    #[test]
    fn test_drag_opposes_velocity() {
        let body = box_body(Vec2::new(2.0, 0.0));
        let generator = ForceGenerator::drag(0.5, 0.25);
        // -(0.5 * 2 + 0.25 * 4) along +x
        assert!(approx_vec_eq(&generator.force_on(&body), &Vec2::new(-2.0, 0.0)));

        let resting = box_body(Vec2::zeros());
        assert_eq!(generator.force_on(&resting), Vec2::zeros());
    }

    #[test]
    fn test_wind_uses_area() {
        let body = box_body(Vec2::zeros());
        let generator = ForceGenerator::new(ForceKind::Wind {
            direction: Vec2::new(3.0, 0.0),
            speed: 2.0,
            air_density: 1.0,
        });
        // 0.5 * 1 * 4 * area 2
        assert!(approx_vec_eq(&generator.force_on(&body), &Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn test_notify_accelerates_attached_bodies_only() {
        let mut bodies = BodySet::new();
        let attached = bodies.insert(box_body(Vec2::zeros()));
        let free = bodies.insert(box_body(Vec2::zeros()));
        let mut generator = ForceGenerator::gravity(Vec2::new(0.0, -10.0));
        generator.attach(attached);

        generator.notify(&mut bodies, 0.1);
        for (_, body) in bodies.iter_mut() {
            body.update(0.1);
        }
        assert!(bodies.get(attached).unwrap().acceleration().y < -9.0);
        assert_eq!(bodies.get(free).unwrap().acceleration(), Vec2::zeros());
    }

    #[test]
    fn test_notify_skips_sleeping_and_stale() {
        let mut bodies = BodySet::new();
        let sleeping = bodies.insert(box_body(Vec2::zeros()));
        bodies.get_mut(sleeping).unwrap().sleep();
        let stale = bodies.insert(box_body(Vec2::zeros()));
        bodies.release(stale);

        let mut generator = ForceGenerator::gravity(Vec2::new(0.0, -10.0));
        generator.attach(sleeping);
        generator.attach(stale);
        generator.notify(&mut bodies, 0.1);

        assert!(!bodies.get(sleeping).unwrap().is_awake());
        assert_eq!(bodies.get(sleeping).unwrap().pending_force(), Vec2::zeros());
    }
}
