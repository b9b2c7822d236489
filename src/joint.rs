//! Two-body constraints.
//!
//! A joint binds an anchor on each of two bodies. Either endpoint may be
//! `None`, in which case that anchor is a fixed point in the world. A joint
//! whose endpoints are both `None` is no longer attached and gets pruned by
//! the world at the end of the frame.
//!
//! Corrections are weighted by inverse mass, so a static endpoint never moves
//! and the shares of the two endpoints always add up to the full correction.

use crate::body_set::{BodyId, BodySet};
use crate::math::{self, Vec2};
use crate::FPSeconds;

/// Distance deviation a rod or cable tolerates before it counts as violated.
pub const JOINT_TOLERANCE: f32 = 1e-3;
/// Corrective acceleration per unit of length error used by rods and cables.
pub const NUDGE_RATE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Keeps the anchors exactly `rest_length` apart.
    Rod,
    /// Hookean spring pulling the anchors toward `rest_length`.
    Spring { stiffness: f32 },
    /// Keeps the anchors at most `rest_length` apart.
    Cable,
}

/// Description of a joint to create.
///
/// When `length` is `None` the rest length is the distance between the two
/// anchors at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct JointDef {
    pub kind: JointKind,
    pub body_a: Option<BodyId>,
    pub body_b: Option<BodyId>,
    /// Anchor relative to body A, in its local frame.
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Anchor used when `body_a` is `None`.
    pub world_anchor_a: Vec2,
    pub world_anchor_b: Vec2,
    pub length: Option<f32>,
    pub damping: f32,
    /// Not enforced.
    pub break_force: f32,
    /// Not enforced.
    pub break_torque: f32,
}

impl JointDef {
    pub fn new(kind: JointKind, body_a: Option<BodyId>, body_b: Option<BodyId>) -> Self {
        Self {
            kind,
            body_a,
            body_b,
            local_anchor_a: Vec2::zeros(),
            local_anchor_b: Vec2::zeros(),
            world_anchor_a: Vec2::zeros(),
            world_anchor_b: Vec2::zeros(),
            length: None,
            damping: 0.0,
            break_force: f32::INFINITY,
            break_torque: f32::INFINITY,
        }
    }

    pub fn rod(body_a: Option<BodyId>, body_b: Option<BodyId>) -> Self {
        Self::new(JointKind::Rod, body_a, body_b)
    }

    pub fn spring(body_a: Option<BodyId>, body_b: Option<BodyId>, stiffness: f32) -> Self {
        Self::new(JointKind::Spring { stiffness }, body_a, body_b)
    }

    pub fn cable(body_a: Option<BodyId>, body_b: Option<BodyId>) -> Self {
        Self::new(JointKind::Cable, body_a, body_b)
    }

    pub fn with_local_anchors(mut self, a: Vec2, b: Vec2) -> Self {
        self.local_anchor_a = a;
        self.local_anchor_b = b;
        self
    }

    pub fn with_world_anchors(mut self, a: Vec2, b: Vec2) -> Self {
        self.world_anchor_a = a;
        self.world_anchor_b = b;
        self
    }

    pub fn with_length(mut self, length: f32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_break_force(mut self, force: f32) -> Self {
        self.break_force = force;
        self
    }

    pub fn with_break_torque(mut self, torque: f32) -> Self {
        self.break_torque = torque;
        self
    }
}

/// Position and orientation (degrees) of a body, used to place anchors.
pub type Pose = (Vec2, f32);

/// Resolved state of one joint endpoint for a solver pass.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    anchor: Vec2,
    velocity: Vec2,
    inv_mass: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    kind: JointKind,
    body_a: Option<BodyId>,
    body_b: Option<BodyId>,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    /// Last known world anchors; the fixed points for detached endpoints.
    world_anchor_a: Vec2,
    world_anchor_b: Vec2,
    rest_length: f32,
    damping: f32,
    break_force: f32,
    break_torque: f32,
}

impl Joint {
    /// Build a joint from `def`, placing attached anchors with the given body
    /// poses. An endpoint with a body but no pose falls back to its world
    /// anchor.
    pub fn new(def: &JointDef, pose_a: Option<Pose>, pose_b: Option<Pose>) -> Self {
        let world_anchor_a = pose_a
            .map(|pose| anchor_in_world(&pose, &def.local_anchor_a))
            .unwrap_or(def.world_anchor_a);
        let world_anchor_b = pose_b
            .map(|pose| anchor_in_world(&pose, &def.local_anchor_b))
            .unwrap_or(def.world_anchor_b);
        let rest_length = def
            .length
            .unwrap_or_else(|| (world_anchor_b - world_anchor_a).norm())
            .max(0.0);

        Self {
            kind: def.kind,
            body_a: def.body_a,
            body_b: def.body_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            world_anchor_a,
            world_anchor_b,
            rest_length,
            damping: def.damping,
            break_force: def.break_force,
            break_torque: def.break_torque,
        }
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    pub fn body_a(&self) -> Option<BodyId> {
        self.body_a
    }

    pub fn body_b(&self) -> Option<BodyId> {
        self.body_b
    }

    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    pub fn set_rest_length(&mut self, length: f32) {
        self.rest_length = length.max(0.0);
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn break_force(&self) -> f32 {
        self.break_force
    }

    pub fn break_torque(&self) -> f32 {
        self.break_torque
    }

    /// World anchors as of the last solver pass or [`refresh`](Self::refresh).
    pub fn anchors(&self) -> (Vec2, Vec2) {
        (self.world_anchor_a, self.world_anchor_b)
    }

    pub fn is_attached(&self) -> bool {
        self.body_a.is_some() || self.body_b.is_some()
    }

    pub fn involves(&self, id: BodyId) -> bool {
        self.body_a == Some(id) || self.body_b == Some(id)
    }

    /// Detach `id` from whichever endpoints it occupies. The endpoint keeps
    /// its last world anchor as a fixed point.
    pub fn detach(&mut self, id: BodyId) -> bool {
        let mut detached = false;
        if self.body_a == Some(id) {
            self.body_a = None;
            detached = true;
        }
        if self.body_b == Some(id) {
            self.body_b = None;
            detached = true;
        }
        detached
    }

    /// Recompute the cached world anchors from the current body poses.
    pub fn refresh(&mut self, bodies: &BodySet) {
        self.world_anchor_a = self.endpoint_a(bodies).anchor;
        self.world_anchor_b = self.endpoint_b(bodies).anchor;
    }

    pub fn current_length(&self, bodies: &BodySet) -> f32 {
        (self.endpoint_b(bodies).anchor - self.endpoint_a(bodies).anchor).norm()
    }

    /// Rod: any deviation from the rest length. Cable: only stretching past
    /// it. Springs are never violated.
    pub fn constraint_violated(&self, bodies: &BodySet) -> bool {
        let error = self.current_length(bodies) - self.rest_length;
        match self.kind {
            JointKind::Rod => error.abs() > JOINT_TOLERANCE,
            JointKind::Cable => error > JOINT_TOLERANCE,
            JointKind::Spring { .. } => false,
        }
    }

    /// Move the endpoints directly until the length error is gone.
    pub fn solve_position_constraint(&mut self, bodies: &mut BodySet) {
        let a = self.endpoint_a(bodies);
        let b = self.endpoint_b(bodies);
        let Some((dir, length)) = axis(&a.anchor, &b.anchor) else {
            return;
        };
        let error = match self.kind {
            JointKind::Rod => length - self.rest_length,
            JointKind::Cable => (length - self.rest_length).max(0.0),
            JointKind::Spring { .. } => return,
        };
        let Some((share_a, share_b)) = shares(a.inv_mass, b.inv_mass) else {
            return;
        };

        // Too long: A moves toward B and B toward A.
        let correction = dir * error;
        if let Some(body) = self.body_a.and_then(|id| bodies.get_mut(id)) {
            body.translate(&(correction * share_a));
            body.wake();
        }
        if let Some(body) = self.body_b.and_then(|id| bodies.get_mut(id)) {
            body.translate(&(-correction * share_b));
            body.wake();
        }
        self.refresh(bodies);
    }

    /// Remove the relative velocity along the joint axis. Cables only resist
    /// separation.
    pub fn solve_velocity_constraint(&mut self, bodies: &mut BodySet) {
        let a = self.endpoint_a(bodies);
        let b = self.endpoint_b(bodies);
        let Some((dir, _)) = axis(&a.anchor, &b.anchor) else {
            return;
        };
        let separating = (b.velocity - a.velocity).dot(&dir);
        let closing = match self.kind {
            JointKind::Rod => separating,
            JointKind::Cable if separating > 0.0 => separating,
            _ => return,
        };
        let Some((share_a, share_b)) = shares(a.inv_mass, b.inv_mass) else {
            return;
        };

        let change = dir * closing;
        if let Some(body) = self.body_a.and_then(|id| bodies.get_mut(id)) {
            body.set_velocity(a.velocity + change * share_a);
        }
        if let Some(body) = self.body_b.and_then(|id| bodies.get_mut(id)) {
            body.set_velocity(b.velocity - change * share_b);
        }
    }

    /// Continuous per-step force: the spring force for springs, a small
    /// corrective pull for violated rods and cables.
    pub fn notify(&mut self, bodies: &mut BodySet, _dt: FPSeconds) {
        let a = self.endpoint_a(bodies);
        let b = self.endpoint_b(bodies);
        self.world_anchor_a = a.anchor;
        self.world_anchor_b = b.anchor;
        let Some((dir, length)) = axis(&a.anchor, &b.anchor) else {
            return;
        };
        let error = length - self.rest_length;
        let separating = (b.velocity - a.velocity).dot(&dir);

        let (force_a, force_b) = match self.kind {
            JointKind::Spring { stiffness } => {
                let magnitude = stiffness * error + self.damping * separating;
                let force = dir * magnitude;
                (force, -force)
            }
            JointKind::Rod | JointKind::Cable => {
                if !self.constraint_violated(bodies) {
                    return;
                }
                let nudge = dir * (error * NUDGE_RATE);
                (nudge * mass_of(a.inv_mass), -nudge * mass_of(b.inv_mass))
            }
        };

        if force_a.norm_squared() > math::NEAR_ZERO_SQ {
            if let Some(body) = self.body_a.and_then(|id| bodies.get_mut(id)) {
                body.apply_impulse(force_a);
            }
        }
        if force_b.norm_squared() > math::NEAR_ZERO_SQ {
            if let Some(body) = self.body_b.and_then(|id| bodies.get_mut(id)) {
                body.apply_impulse(force_b);
            }
        }
    }

    fn endpoint_a(&self, bodies: &BodySet) -> Endpoint {
        endpoint(bodies, self.body_a, &self.local_anchor_a, &self.world_anchor_a)
    }

    fn endpoint_b(&self, bodies: &BodySet) -> Endpoint {
        endpoint(bodies, self.body_b, &self.local_anchor_b, &self.world_anchor_b)
    }
}

fn anchor_in_world(pose: &Pose, local: &Vec2) -> Vec2 {
    pose.0 + math::rotate_degrees(local, pose.1)
}

fn endpoint(bodies: &BodySet, id: Option<BodyId>, local: &Vec2, cached: &Vec2) -> Endpoint {
    match id.and_then(|id| bodies.get(id)) {
        Some(body) => Endpoint {
            anchor: anchor_in_world(&(body.position(), body.orientation()), local),
            velocity: body.velocity(),
            inv_mass: if body.is_physics_enabled() {
                body.inverse_mass()
            } else {
                0.0
            },
        },
        None => Endpoint {
            anchor: *cached,
            velocity: Vec2::zeros(),
            inv_mass: 0.0,
        },
    }
}

/// Unit direction from `a` to `b` and the distance between them.
fn axis(a: &Vec2, b: &Vec2) -> Option<(Vec2, f32)> {
    let delta = b - a;
    let length = delta.norm();
    if length * length <= math::NEAR_ZERO_SQ {
        return None;
    }
    Some((delta / length, length))
}

/// Inverse-mass shares of a correction; `None` when both ends are static.
fn shares(inv_a: f32, inv_b: f32) -> Option<(f32, f32)> {
    let sum = inv_a + inv_b;
    if sum <= 0.0 {
        return None;
    }
    Some((inv_a / sum, inv_b / sum))
}

fn mass_of(inv_mass: f32) -> f32 {
    if inv_mass > 0.0 {
        1.0 / inv_mass
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::collider::Collider;
    use crate::material::PhysicsMaterial;
    use crate::rigid_body::{RigidBody, RigidBodyDesc};

    const EPSILON: f32 = 1e-3;

    fn ball(position: Vec2) -> RigidBody {
        RigidBody::new(
            RigidBodyDesc::default()
                .with_position(position)
                .with_collider(Collider::circle(0.25)),
        )
    }

    fn anchor(position: Vec2) -> RigidBody {
        RigidBody::new(
            RigidBodyDesc::default()
                .with_position(position)
                .with_collider(Collider::circle(0.25))
                .with_material(PhysicsMaterial::STATIC),
        )
    }

    fn joint_between(bodies: &BodySet, def: &JointDef) -> Joint {
        let pose = |id: Option<BodyId>| {
            id.and_then(|id| bodies.get(id))
                .map(|b| (b.position(), b.orientation()))
        };
        Joint::new(def, pose(def.body_a), pose(def.body_b))
    }

    #[test]
    fn test_rest_length_defaults_to_initial_distance() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(0.0, 0.0)));
        let b = bodies.insert(ball(Vec2::new(3.0, 4.0)));
        let joint = joint_between(&bodies, &JointDef::rod(Some(a), Some(b)));
        assert!((joint.rest_length() - 5.0).abs() < EPSILON);
        assert!(!joint.constraint_violated(&bodies));
    }

    #[test]
    fn test_rod_position_solve_converges() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(0.0, 0.0)));
        let b = bodies.insert(ball(Vec2::new(2.5, 0.0)));
        let mut joint = joint_between(&bodies, &JointDef::rod(Some(a), Some(b)).with_length(2.0));
        assert!(joint.constraint_violated(&bodies));

        for _ in 0..4 {
            if joint.constraint_violated(&bodies) {
                joint.solve_position_constraint(&mut bodies);
            }
        }
        assert!((joint.current_length(&bodies) - 2.0).abs() < EPSILON);
        // Equal masses share the correction evenly
        assert!((bodies.get(a).unwrap().position().x - 0.25).abs() < EPSILON);
        assert!((bodies.get(b).unwrap().position().x - 2.25).abs() < EPSILON);
    }

    #[test]
    fn test_static_endpoint_does_not_move() {
        let mut bodies = BodySet::new();
        let fixed = bodies.insert(anchor(Vec2::new(0.0, 0.0)));
        let free = bodies.insert(ball(Vec2::new(0.0, -3.0)));
        let mut joint =
            joint_between(&bodies, &JointDef::rod(Some(fixed), Some(free)).with_length(2.0));

        joint.solve_position_constraint(&mut bodies);
        assert_eq!(bodies.get(fixed).unwrap().position(), Vec2::zeros());
        assert!((bodies.get(free).unwrap().position().y + 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_cable_only_resists_stretching() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(0.0, 0.0)));
        let b = bodies.insert(ball(Vec2::new(1.0, 0.0)));
        let mut joint = joint_between(&bodies, &JointDef::cable(Some(a), Some(b)).with_length(2.0));
        assert!(!joint.constraint_violated(&bodies));

        joint.solve_position_constraint(&mut bodies);
        assert!((joint.current_length(&bodies) - 1.0).abs() < EPSILON);

        bodies.get_mut(b).unwrap().set_position(Vec2::new(3.0, 0.0));
        assert!(joint.constraint_violated(&bodies));
        joint.solve_position_constraint(&mut bodies);
        assert!((joint.current_length(&bodies) - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_rod_velocity_solve_removes_axial_motion() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(0.0, 0.0)));
        let b = bodies.insert(ball(Vec2::new(2.0, 0.0)));
        bodies.get_mut(b).unwrap().set_velocity(Vec2::new(4.0, 1.0));
        let mut joint = joint_between(&bodies, &JointDef::rod(Some(a), Some(b)));

        joint.solve_velocity_constraint(&mut bodies);
        let va = bodies.get(a).unwrap().velocity();
        let vb = bodies.get(b).unwrap().velocity();
        assert!(((vb - va).x).abs() < EPSILON);
        // Tangential motion is untouched
        assert!((vb.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_spring_pulls_stretched_bodies_together() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(0.0, 0.0)));
        let b = bodies.insert(ball(Vec2::new(3.0, 0.0)));
        let mut joint = joint_between(
            &bodies,
            &JointDef::spring(Some(a), Some(b), 2.0).with_length(1.0),
        );
        assert!(!joint.constraint_violated(&bodies));

        joint.notify(&mut bodies, 0.1);
        assert!(bodies.get(a).unwrap().pending_force().x > 0.0);
        assert!(bodies.get(b).unwrap().pending_force().x < 0.0);
    }

    #[test]
    fn test_detach_keeps_world_anchor() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(ball(Vec2::new(1.0, 1.0)));
        let b = bodies.insert(ball(Vec2::new(4.0, 1.0)));
        let mut joint = joint_between(&bodies, &JointDef::rod(Some(a), Some(b)));

        assert!(joint.detach(a));
        assert!(!joint.detach(a));
        assert!(joint.is_attached());
        assert_eq!(joint.anchors().0, Vec2::new(1.0, 1.0));

        assert!(joint.detach(b));
        assert!(!joint.is_attached());
    }

    #[test]
    fn test_world_anchor_endpoint() {
        let mut bodies = BodySet::new();
        let b = bodies.insert(ball(Vec2::new(0.0, -5.0)));
        let def = JointDef::rod(None, Some(b))
            .with_world_anchors(Vec2::new(0.0, 0.0), Vec2::zeros())
            .with_length(3.0);
        let mut joint = joint_between(&bodies, &def);

        joint.solve_position_constraint(&mut bodies);
        assert!((bodies.get(b).unwrap().position().y + 3.0).abs() < EPSILON);
    }
}
