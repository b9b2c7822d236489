//! Rigid bodies: kinematic state, queued forces and per-step integration.
//!
//! Forces and impulses are not applied immediately. They are queued on the
//! body and summed by [`RigidBody::update`]:
//! - impulses count for exactly one step and are consumed,
//! - forces count while their remaining duration is positive; the duration is
//!   decremented at the end of each step and expired entries are pruned by the
//!   next [`RigidBody::begin_frame`].
//!
//! Integration is velocity Verlet. After every step position, velocity and
//! acceleration that came out NaN, infinite or near zero are clamped to zero.

use alloc::vec::Vec;

use nalgebra::Matrix3;

// ComplexField provides abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::body_set::BodyId;
use crate::collider::Collider;
use crate::material::PhysicsMaterial;
use crate::math::{self, Vec2};
use crate::FPSeconds;

/// Per-step movement below which a body counts as resting.
pub const SLEEP_EPSILON: f32 = 1e-4;
/// Seconds a body must rest before it falls asleep.
pub const TIME_TO_SLEEP: FPSeconds = 1.0;
/// Default cap on angular speed, in degrees per second.
pub const DEFAULT_MAX_ANGULAR_SPEED: f32 = 1440.0;

/// A queued value that stays active for `remaining` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub remaining: FPSeconds,
}

/// Everything needed to construct a [`RigidBody`].
///
/// # Example
/// ```
/// use embedded_physics2d::collider::Collider;
/// use embedded_physics2d::math::Vec2;
/// use embedded_physics2d::rigid_body::RigidBodyDesc;
///
/// let desc = RigidBodyDesc::default()
///     .with_position(Vec2::new(0.0, 10.0))
///     .with_collider(Collider::circle(0.5));
/// assert!(desc.collider.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct RigidBodyDesc {
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Orientation in degrees.
    pub orientation: f32,
    /// Degrees per second.
    pub angular_velocity: f32,
    pub collider: Option<Collider>,
    pub material: PhysicsMaterial,
    /// Fraction of linear velocity removed each step (0.0 = none).
    pub linear_damping: f32,
    /// Fraction of angular velocity removed each step (0.0 = none).
    pub angular_damping: f32,
    pub max_angular_speed: f32,
    pub physics_enabled: bool,
    pub gravity_enabled: bool,
    pub drag_enabled: bool,
    pub rotation_locked: bool,
    pub awake: bool,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            position: Vec2::zeros(),
            velocity: Vec2::zeros(),
            acceleration: Vec2::zeros(),
            orientation: 0.0,
            angular_velocity: 0.0,
            collider: None,
            material: PhysicsMaterial::default(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_angular_speed: DEFAULT_MAX_ANGULAR_SPEED,
            physics_enabled: true,
            gravity_enabled: true,
            drag_enabled: true,
            rotation_locked: false,
            awake: true,
        }
    }
}

impl RigidBodyDesc {
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_acceleration(mut self, acceleration: Vec2) -> Self {
        self.acceleration = acceleration;
        self
    }

    pub fn with_orientation(mut self, degrees: f32) -> Self {
        self.orientation = degrees;
        self
    }

    pub fn with_angular_velocity(mut self, degrees_per_second: f32) -> Self {
        self.angular_velocity = degrees_per_second;
        self
    }

    pub fn with_collider(mut self, collider: Collider) -> Self {
        self.collider = Some(collider);
        self
    }

    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping;
        self
    }

    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping;
        self
    }

    pub fn with_max_angular_speed(mut self, degrees_per_second: f32) -> Self {
        self.max_angular_speed = degrees_per_second;
        self
    }

    pub fn with_physics(mut self, enabled: bool) -> Self {
        self.physics_enabled = enabled;
        self
    }

    pub fn with_gravity(mut self, enabled: bool) -> Self {
        self.gravity_enabled = enabled;
        self
    }

    pub fn with_drag(mut self, enabled: bool) -> Self {
        self.drag_enabled = enabled;
        self
    }

    pub fn with_rotation_locked(mut self, locked: bool) -> Self {
        self.rotation_locked = locked;
        self
    }

    pub fn with_awake(mut self, awake: bool) -> Self {
        self.awake = awake;
        self
    }
}

/// A 2D rigid body.
///
/// Mass comes from the collider area and the material density; a body
/// without a collider, or with zero density, has mass 0 and never moves.
#[derive(Debug, Clone)]
pub struct RigidBody {
    // -- Linear state --
    position: Vec2,
    prev_position: Vec2,
    velocity: Vec2,
    acceleration: Vec2,

    // -- Angular state (degrees) --
    orientation: f32,
    prev_orientation: f32,
    angular_velocity: f32,
    angular_acceleration: f32,
    max_angular_speed: f32,

    collider: Option<Collider>,
    material: PhysicsMaterial,
    mass: f32,
    inv_mass: f32,
    inv_inertia: f32,
    linear_damping: f32,
    angular_damping: f32,

    awake: bool,
    physics_enabled: bool,
    gravity_enabled: bool,
    drag_enabled: bool,
    rotation_locked: bool,
    should_kill: bool,
    time_since_last_move: FPSeconds,
    /// Pose at the end of the last integrated step.
    rest_position: Vec2,
    rest_orientation: f32,

    linear_forces: Vec<Timed<Vec2>>,
    angular_forces: Vec<Timed<f32>>,
    linear_impulses: Vec<Vec2>,
    angular_impulses: Vec<f32>,

    parent: Option<BodyId>,
    transform: Matrix3<f32>,
    sanitized_count: u32,
}

impl RigidBody {
    pub fn new(desc: RigidBodyDesc) -> Self {
        let mut body = Self {
            position: desc.position,
            prev_position: desc.position,
            velocity: desc.velocity,
            acceleration: desc.acceleration,
            orientation: math::wrap_degrees(desc.orientation),
            prev_orientation: math::wrap_degrees(desc.orientation),
            angular_velocity: desc.angular_velocity,
            angular_acceleration: 0.0,
            max_angular_speed: desc.max_angular_speed.abs(),
            collider: desc.collider,
            material: desc.material,
            mass: 0.0,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            linear_damping: desc.linear_damping.clamp(0.0, 1.0),
            angular_damping: desc.angular_damping.clamp(0.0, 1.0),
            awake: desc.awake,
            physics_enabled: desc.physics_enabled,
            gravity_enabled: desc.gravity_enabled,
            drag_enabled: desc.drag_enabled,
            rotation_locked: desc.rotation_locked,
            should_kill: false,
            time_since_last_move: 0.0,
            rest_position: desc.position,
            rest_orientation: math::wrap_degrees(desc.orientation),
            linear_forces: Vec::new(),
            angular_forces: Vec::new(),
            linear_impulses: Vec::new(),
            angular_impulses: Vec::new(),
            parent: None,
            transform: Matrix3::identity(),
            sanitized_count: 0,
        };
        if body.rotation_locked {
            body.angular_velocity = 0.0;
        }
        body.recalculate_mass();
        body.sync_collider();
        body
    }

    // -- Accessors --

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn previous_position(&self) -> Vec2 {
        self.prev_position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    /// Orientation in degrees, in `[0, 360)`.
    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    pub fn previous_orientation(&self) -> f32 {
        self.prev_orientation
    }

    /// Degrees per second.
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn angular_acceleration(&self) -> f32 {
        self.angular_acceleration
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    pub fn material(&self) -> &PhysicsMaterial {
        &self.material
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    pub fn inverse_inertia(&self) -> f32 {
        self.inv_inertia
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn max_angular_speed(&self) -> f32 {
        self.max_angular_speed
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn is_gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    pub fn is_drag_enabled(&self) -> bool {
        self.drag_enabled
    }

    pub fn is_rotation_locked(&self) -> bool {
        self.rotation_locked
    }

    pub fn should_kill(&self) -> bool {
        self.should_kill
    }

    /// Bodies without a collider take no part in the simulation.
    pub fn is_dynamic(&self) -> bool {
        self.collider.is_some()
    }

    /// Zero inverse mass: never moved by forces, impulses or contacts.
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    pub fn time_since_last_move(&self) -> FPSeconds {
        self.time_since_last_move
    }

    /// How many times integration produced NaN or infinite values that were
    /// clamped to zero.
    pub fn sanitized_count(&self) -> u32 {
        self.sanitized_count
    }

    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    /// Local transform: collider half-extents, then orientation, then position.
    pub fn transform(&self) -> &Matrix3<f32> {
        &self.transform
    }

    pub fn speed(&self) -> f32 {
        self.velocity.norm()
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    // -- Mutators --

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.sync_collider();
    }

    /// Move by `delta` without touching velocity.
    pub fn translate(&mut self, delta: &Vec2) {
        self.position += delta;
        self.sync_collider();
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn set_acceleration(&mut self, acceleration: Vec2) {
        self.acceleration = acceleration;
    }

    pub fn set_orientation(&mut self, degrees: f32) {
        if self.rotation_locked {
            return;
        }
        self.orientation = math::wrap_degrees(degrees);
        self.sync_collider();
    }

    pub fn set_angular_velocity(&mut self, degrees_per_second: f32) {
        if self.rotation_locked {
            return;
        }
        self.angular_velocity =
            degrees_per_second.clamp(-self.max_angular_speed, self.max_angular_speed);
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping.clamp(0.0, 1.0);
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping.clamp(0.0, 1.0);
    }

    pub fn set_max_angular_speed(&mut self, degrees_per_second: f32) {
        self.max_angular_speed = degrees_per_second.abs();
    }

    pub fn set_material(&mut self, material: PhysicsMaterial) {
        self.material = material;
        self.recalculate_mass();
    }

    pub fn set_collider(&mut self, collider: Option<Collider>) {
        self.collider = collider;
        self.recalculate_mass();
        self.sync_collider();
    }

    pub fn enable_physics(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
    }

    pub fn enable_gravity(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    pub fn enable_drag(&mut self, enabled: bool) {
        self.drag_enabled = enabled;
    }

    /// Locking rotation also stops any current spin.
    pub fn lock_rotation(&mut self, locked: bool) {
        self.rotation_locked = locked;
        if locked {
            self.angular_velocity = 0.0;
            self.angular_acceleration = 0.0;
            self.angular_forces.clear();
            self.angular_impulses.clear();
        }
    }

    /// Flag the body for removal at the end of the frame.
    pub fn kill(&mut self) {
        self.should_kill = true;
    }

    /// The rest timer restarts only when the body was asleep.
    pub fn wake(&mut self) {
        if !self.awake {
            self.awake = true;
            self.time_since_last_move = 0.0;
        }
    }

    pub fn sleep(&mut self) {
        self.awake = false;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<BodyId>) {
        self.parent = parent;
    }

    // -- Forces --

    /// Queue `force` for `duration` seconds.
    pub fn apply_force(&mut self, force: Vec2, duration: FPSeconds) {
        self.linear_forces.push(Timed {
            value: force,
            remaining: duration,
        });
        self.wake();
    }

    /// Queue an impulse for the next step only.
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.linear_impulses.push(impulse);
        self.wake();
    }

    /// Queue `torque` for `duration` seconds. No-op when rotation is locked.
    pub fn apply_torque(&mut self, torque: f32, duration: FPSeconds) {
        if self.rotation_locked {
            return;
        }
        self.angular_forces.push(Timed {
            value: torque,
            remaining: duration,
        });
        self.wake();
    }

    /// Queue an angular impulse for the next step only. No-op when rotation
    /// is locked.
    pub fn apply_angular_impulse(&mut self, torque: f32) {
        if self.rotation_locked {
            return;
        }
        self.angular_impulses.push(torque);
        self.wake();
    }

    /// Force applied at a world point: the part along the lever arm moves
    /// the body, the rest turns it.
    pub fn apply_force_at(&mut self, point: &Vec2, force: Vec2, duration: FPSeconds) {
        let (linear, torque) = self.decompose_at(point, &force);
        self.apply_force(linear, duration);
        if torque != 0.0 {
            self.apply_torque(torque, duration);
        }
    }

    pub fn apply_impulse_at(&mut self, point: &Vec2, impulse: Vec2) {
        let (linear, torque) = self.decompose_at(point, &impulse);
        self.apply_impulse(linear);
        if torque != 0.0 {
            self.apply_angular_impulse(torque);
        }
    }

    /// Only the rotational part of a force applied at a world point.
    pub fn apply_torque_at(&mut self, point: &Vec2, force: Vec2, duration: FPSeconds) {
        let (_, torque) = self.decompose_at(point, &force);
        self.apply_torque(torque, duration);
    }

    /// Split `force` at `point` into (linear force, torque).
    ///
    /// The lever arm runs from the body position to the closest point of the
    /// collider; the linear part is the projection of `force` onto that arm.
    pub fn decompose_at(&self, point: &Vec2, force: &Vec2) -> (Vec2, f32) {
        let contact = match &self.collider {
            Some(collider) => collider.closest_point(point),
            None => *point,
        };
        let lever_arm = contact - self.position;
        if lever_arm.norm_squared() <= math::NEAR_ZERO_SQ {
            return (*force, 0.0);
        }
        (math::project(force, &lever_arm), math::cross(&lever_arm, force))
    }

    /// Sum of the linear forces that will act during the next step.
    pub fn pending_force(&self) -> Vec2 {
        let forces = self
            .linear_forces
            .iter()
            .filter(|f| f.remaining > 0.0)
            .fold(Vec2::zeros(), |acc, f| acc + f.value);
        self.linear_impulses.iter().fold(forces, |acc, i| acc + i)
    }

    // -- Frame lifecycle --

    /// Drop forces whose duration ran out during the previous frame.
    pub fn begin_frame(&mut self) {
        self.linear_forces.retain(|f| f.remaining > 0.0);
        self.angular_forces.retain(|f| f.remaining > 0.0);
    }

    /// Whether [`update`](Self::update) will move this body.
    pub fn can_integrate(&self) -> bool {
        self.physics_enabled && self.is_dynamic() && self.awake && self.inv_mass != 0.0
    }

    /// Advance the body by `dt` seconds.
    pub fn update(&mut self, dt: FPSeconds) {
        if !self.can_integrate() {
            self.clear_queues();
            return;
        }
        if dt <= 0.0 {
            return;
        }

        let old_position = self.position;
        let old_orientation = self.orientation;

        // --- Linear ---
        let impulses = self
            .linear_impulses
            .drain(..)
            .fold(Vec2::zeros(), |acc, i| acc + i);
        let forces = self
            .linear_forces
            .iter()
            .filter(|f| f.remaining > 0.0)
            .fold(Vec2::zeros(), |acc, f| acc + f.value);

        let new_position =
            self.position + self.velocity * dt + self.acceleration * (0.5 * dt * dt);
        let new_acceleration = (impulses + forces) * self.inv_mass;
        let new_velocity = (self.velocity + (self.acceleration + new_acceleration) * (0.5 * dt))
            * (1.0 - self.linear_damping);

        self.position = self.sanitized(new_position);
        self.velocity = self.sanitized(new_velocity);
        self.acceleration = self.sanitized(new_acceleration);

        // --- Angular ---
        if self.rotation_locked {
            self.angular_velocity = 0.0;
            self.angular_acceleration = 0.0;
            self.angular_forces.clear();
            self.angular_impulses.clear();
        } else {
            let torque = self.angular_impulses.drain(..).sum::<f32>()
                + self
                    .angular_forces
                    .iter()
                    .filter(|f| f.remaining > 0.0)
                    .map(|f| f.value)
                    .sum::<f32>();

            let new_orientation = self.orientation
                + self.angular_velocity * dt
                + self.angular_acceleration * (0.5 * dt * dt);
            let new_angular_acceleration = (torque * self.inv_inertia).to_degrees();

            // Finite difference of orientation plus the new acceleration's half step
            let delta = new_orientation - old_orientation;
            let angular_velocity = (delta / dt + 0.5 * new_angular_acceleration * dt)
                .clamp(-self.max_angular_speed, self.max_angular_speed)
                * (1.0 - self.angular_damping);

            self.angular_velocity = self.sanitized_scalar(angular_velocity);
            self.angular_acceleration = self.sanitized_scalar(new_angular_acceleration);
            let (orientation, _) = math::sanitize_scalar(new_orientation);
            self.orientation = math::wrap_degrees(orientation);
        }

        for force in self.linear_forces.iter_mut() {
            force.remaining -= dt;
        }
        for torque in self.angular_forces.iter_mut() {
            torque.remaining -= dt;
        }

        // --- Sleep ---
        // Measured step to step: a resting contact pushes the body back by
        // as much as gravity pulls it in.
        let moved = (self.position - self.rest_position).norm_squared()
            > SLEEP_EPSILON * SLEEP_EPSILON
            || (self.orientation - self.rest_orientation).abs() > SLEEP_EPSILON;
        self.rest_position = self.position;
        self.rest_orientation = self.orientation;
        if moved {
            self.time_since_last_move = 0.0;
        } else {
            self.time_since_last_move += dt;
            if self.time_since_last_move > TIME_TO_SLEEP {
                log::debug!("body fell asleep at {:?}", self.position);
                self.awake = false;
                self.velocity = Vec2::zeros();
                self.acceleration = Vec2::zeros();
                self.angular_velocity = 0.0;
                self.angular_acceleration = 0.0;
            }
        }

        self.prev_position = old_position;
        self.prev_orientation = old_orientation;
        self.sync_collider();
    }

    fn clear_queues(&mut self) {
        self.linear_impulses.clear();
        self.angular_impulses.clear();
        self.linear_forces.clear();
        self.angular_forces.clear();
    }

    fn sanitized(&mut self, value: Vec2) -> Vec2 {
        let (value, discarded) = math::sanitize(value);
        if discarded {
            self.sanitized_count = self.sanitized_count.saturating_add(1);
            log::debug!("non-finite kinematics clamped to zero");
        }
        value
    }

    fn sanitized_scalar(&mut self, value: f32) -> f32 {
        let (value, discarded) = math::sanitize_scalar(value);
        if discarded {
            self.sanitized_count = self.sanitized_count.saturating_add(1);
            log::debug!("non-finite angular kinematics clamped to zero");
        }
        value
    }

    fn recalculate_mass(&mut self) {
        self.mass = match &self.collider {
            Some(collider) => self.material.mass_for_area(collider.calc_area()),
            None => 0.0,
        };
        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
        self.inv_inertia = match &self.collider {
            Some(collider) if self.mass > 0.0 => {
                let inertia = collider.moment_of_inertia(self.mass);
                if inertia > 0.0 {
                    1.0 / inertia
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
    }

    /// Push position and orientation into the collider and rebuild the
    /// transform.
    fn sync_collider(&mut self) {
        let scale = match &mut self.collider {
            Some(collider) => {
                collider.set_position(self.position);
                collider.set_orientation(self.orientation);
                collider.calc_dimensions()
            }
            None => Vec2::new(1.0, 1.0),
        };
        self.transform = math::transform_matrix(&scale, self.orientation, &self.position);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;

    const EPSILON: f32 = 1e-4;
    const DT: f32 = 1.0 / 60.0;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vec2, b: &Vec2) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
    }

    /// Unit-mass box: area 1, density 1.
    fn unit_box() -> RigidBody {
        RigidBody::new(
            RigidBodyDesc::default().with_collider(Collider::aabb(Vec2::new(0.5, 0.5))),
        )
    }

    #[test]
    fn test_mass_from_area_and_density() {
        let body = RigidBody::new(
            RigidBodyDesc::default()
                .with_collider(Collider::obb(Vec2::new(1.0, 1.0)))
                .with_material(PhysicsMaterial::default().with_density(2.0)),
        );
        assert!(approx_eq(body.mass(), 8.0));
        assert!(approx_eq(body.inverse_mass(), 0.125));
        assert!(body.inverse_inertia() > 0.0);
    }

    #[test]
    fn test_body_without_collider_is_static() {
        let mut body = RigidBody::new(RigidBodyDesc::default().with_velocity(Vec2::new(1.0, 0.0)));
        assert_eq!(body.mass(), 0.0);
        assert!(!body.is_dynamic());
        body.update(DT);
        assert!(approx_vec_eq(&body.position(), &Vec2::zeros()));
    }

    #[test]
    fn test_zero_mass_body_never_moves() {
        let mut body = RigidBody::new(
            RigidBodyDesc::default()
                .with_position(Vec2::new(3.0, 4.0))
                .with_velocity(Vec2::new(1.0, 1.0))
                .with_acceleration(Vec2::new(0.0, -2.0))
                .with_collider(Collider::circle(1.0))
                .with_material(PhysicsMaterial::STATIC),
        );
        body.apply_force(Vec2::new(100.0, 0.0), 10.0);
        body.apply_impulse(Vec2::new(0.0, 100.0));
        for _ in 0..10 {
            body.update(DT);
        }
        assert_eq!(body.position(), Vec2::new(3.0, 4.0));
        assert_eq!(body.velocity(), Vec2::new(1.0, 1.0));
        assert_eq!(body.acceleration(), Vec2::new(0.0, -2.0));
        assert!(body.linear_forces.is_empty());
        assert!(body.linear_impulses.is_empty());
    }

    #[test]
    fn test_velocity_verlet_with_impulse() {
        let mut body = unit_box();
        assert!(approx_eq(body.mass(), 1.0));
        body.apply_impulse(Vec2::new(10.0, 0.0));

        body.update(1.0);
        // x = 0, a = 10, v = 0.5 * (0 + 10)
        assert!(approx_eq(body.position().x, 0.0));
        assert!(approx_eq(body.acceleration().x, 10.0));
        assert!(approx_eq(body.velocity().x, 5.0));

        body.update(1.0);
        // x = 5 + 0.5 * 10, impulse consumed so a = 0, v = 5 + 0.5 * 10
        assert!(approx_eq(body.position().x, 10.0));
        assert!(approx_eq(body.acceleration().x, 0.0));
        assert!(approx_eq(body.velocity().x, 10.0));
    }

    #[test]
    fn test_timed_force_expires() {
        let mut body = unit_box();
        body.apply_force(Vec2::new(2.0, 0.0), 0.5);

        body.update(0.25);
        assert!(approx_eq(body.acceleration().x, 2.0));
        body.update(0.25);
        assert!(approx_eq(body.acceleration().x, 2.0));

        // Duration used up: no longer contributes, pruned on the next frame
        body.update(0.25);
        assert!(approx_eq(body.acceleration().x, 0.0));
        assert_eq!(body.linear_forces.len(), 1);
        body.begin_frame();
        assert!(body.linear_forces.is_empty());
    }

    #[test]
    fn test_non_finite_values_are_clamped() {
        let mut body = unit_box();
        body.set_velocity(Vec2::new(f32::NAN, 1.0));
        body.update(DT);
        assert_eq!(body.position(), Vec2::zeros());
        assert_eq!(body.velocity(), Vec2::zeros());
        assert!(body.sanitized_count() > 0);
    }

    #[test]
    fn test_falls_asleep_after_one_second_of_rest() {
        let mut body = unit_box();
        for _ in 0..55 {
            body.update(DT);
        }
        assert!(body.is_awake());
        for _ in 0..10 {
            body.update(DT);
        }
        assert!(!body.is_awake());

        body.apply_impulse(Vec2::new(1.0, 0.0));
        assert!(body.is_awake());
        assert_eq!(body.time_since_last_move(), 0.0);
    }

    #[test]
    fn test_wake_keeps_rest_timer_of_awake_body() {
        let mut body = unit_box();
        for _ in 0..30 {
            body.update(DT);
        }
        let rested = body.time_since_last_move();
        assert!(rested > 0.0);
        body.wake();
        body.apply_impulse(Vec2::zeros());
        assert_eq!(body.time_since_last_move(), rested);
    }

    #[test]
    fn test_resting_contact_falls_asleep() {
        let mut body = unit_box();
        let weight = Vec2::new(0.0, -9.81) * body.mass();
        for _ in 0..120 {
            if body.is_awake() {
                body.apply_impulse(weight);
            }
            body.update(DT);
            // A floor pushing the body back where it was
            body.set_position(Vec2::zeros());
            body.set_velocity(Vec2::zeros());
        }
        assert!(!body.is_awake());
        assert_eq!(body.acceleration(), Vec2::zeros());
    }

    #[test]
    fn test_moving_body_stays_awake() {
        let mut body = unit_box();
        body.set_velocity(Vec2::new(1.0, 0.0));
        for _ in 0..120 {
            body.update(DT);
        }
        assert!(body.is_awake());
        assert!(approx_eq(body.position().x, 2.0));
    }

    #[test]
    fn test_torque_on_locked_rotation_is_noop() {
        let mut body = RigidBody::new(
            RigidBodyDesc::default()
                .with_collider(Collider::obb(Vec2::new(1.0, 1.0)))
                .with_rotation_locked(true),
        );
        body.apply_torque(5.0, 1.0);
        body.apply_angular_impulse(5.0);
        assert!(body.angular_forces.is_empty());
        assert!(body.angular_impulses.is_empty());
        body.update(DT);
        assert_eq!(body.orientation(), 0.0);
    }

    #[test]
    fn test_torque_spins_body() {
        let mut body = unit_box_obb();
        body.apply_torque(1.0, 1.0);
        for _ in 0..10 {
            body.update(DT);
        }
        assert!(body.angular_velocity() > 0.0);
        assert!(body.orientation() > 0.0);
    }

    fn unit_box_obb() -> RigidBody {
        RigidBody::new(RigidBodyDesc::default().with_collider(Collider::obb(Vec2::new(0.5, 0.5))))
    }

    #[test]
    fn test_angular_speed_is_clamped() {
        let mut body = RigidBody::new(
            RigidBodyDesc::default()
                .with_collider(Collider::obb(Vec2::new(0.5, 0.5)))
                .with_max_angular_speed(90.0),
        );
        body.apply_angular_impulse(1.0e6);
        body.update(DT);
        assert!(approx_eq(body.angular_velocity(), 90.0));
    }

    #[test]
    fn test_force_at_center_line_has_no_torque() {
        let body = unit_box_obb();
        // Point straight to the right of the center, force along the same line
        let (linear, torque) = body.decompose_at(&Vec2::new(2.0, 0.0), &Vec2::new(-3.0, 0.0));
        assert!(approx_vec_eq(&linear, &Vec2::new(-3.0, 0.0)));
        assert!(approx_eq(torque, 0.0));
    }

    #[test]
    fn test_force_at_edge_produces_torque() {
        let body = unit_box_obb();
        // Push upward on the right edge: counter-clockwise torque
        let (linear, torque) = body.decompose_at(&Vec2::new(0.5, 0.0), &Vec2::new(0.0, 1.0));
        assert!(approx_vec_eq(&linear, &Vec2::zeros()));
        assert!(approx_eq(torque, 0.5));
    }

    #[test]
    fn test_damping_reduces_velocity() {
        let mut body = RigidBody::new(
            RigidBodyDesc::default()
                .with_collider(Collider::aabb(Vec2::new(0.5, 0.5)))
                .with_velocity(Vec2::new(10.0, 0.0))
                .with_linear_damping(0.1),
        );
        body.update(DT);
        assert!(approx_eq(body.velocity().x, 9.0));
    }

    #[test]
    fn test_collider_follows_body() {
        let mut body = unit_box_obb();
        body.set_velocity(Vec2::new(60.0, 0.0));
        body.update(DT);
        let collider = body.collider().unwrap();
        assert!(approx_vec_eq(&collider.position(), &body.position()));
        assert!(approx_eq(body.transform()[(0, 2)], body.position().x));
    }

    #[test]
    fn test_disabled_physics_discards_queue() {
        let mut body = unit_box();
        body.enable_physics(false);
        body.apply_impulse(Vec2::new(5.0, 0.0));
        body.update(DT);
        assert!(body.linear_impulses.is_empty());
        assert_eq!(body.velocity(), Vec2::zeros());
    }

    #[test]
    fn test_kinetic_energy() {
        let mut body = unit_box();
        body.set_velocity(Vec2::new(3.0, 4.0));
        assert!(approx_eq(body.speed(), 5.0));
        assert!(approx_eq(body.kinetic_energy(), 12.5));
    }
}
