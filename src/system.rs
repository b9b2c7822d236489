//! The physics world and its frame state machine.
//!
//! A frame runs strictly in this order:
//!
//! 1. [`begin_frame`](PhysicsSystem::begin_frame): commit bodies added since
//!    the last frame, re-sync the built-in gravity and drag generators with
//!    each body's flags, prune expired timed forces.
//! 2. [`update`](PhysicsSystem::update): zero or more fixed steps, as many as
//!    the time accumulator allows.
//! 3. [`render`](PhysicsSystem::render): optional debug overlays.
//! 4. [`end_frame`](PhysicsSystem::end_frame): remove killed bodies and
//!    bodies whose removal was requested, detach them from joints and
//!    generators, drop joints with no body left.
//!
//! Adding or removing bodies only stages the change; the live body table is
//! never modified while a step is iterating it.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use nalgebra::Matrix3;

// ComplexField provides sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::body_set::{BodyId, BodySet};
use crate::collision::{self, Aabb2, CollisionData};
use crate::debug_draw::{self, DebugRenderer};
use crate::force_generator::{ForceGenerator, ForceKind};
use crate::joint::{Joint, JointDef, Pose};
use crate::math::{self, Vec2};
use crate::partition::UniformGrid;
use crate::rigid_body::{RigidBody, RigidBodyDesc};
use crate::FPSeconds;

/// Number of recent contacts kept for the contact overlay.
pub const DEBUG_CONTACT_CAPACITY: usize = 10;
/// Longest parent chain followed when composing world transforms.
pub const MAX_PARENT_DEPTH: usize = 32;

/// World descriptor.
///
/// # Example
/// ```
/// use embedded_physics2d::math::Vec2;
/// use embedded_physics2d::system::PhysicsSystemDesc;
///
/// let desc = PhysicsSystemDesc::default()
///     .with_gravity(Vec2::new(0.0, -20.0))
///     .with_solver_iterations(4, 4);
/// assert_eq!(desc.position_solver_iterations, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsSystemDesc {
    pub gravity: Vec2,
    /// Linear drag coefficient.
    pub drag_k1: f32,
    /// Quadratic drag coefficient.
    pub drag_k2: f32,
    pub position_solver_iterations: u32,
    pub velocity_solver_iterations: u32,
    pub fixed_time_step: FPSeconds,
    /// Most fixed steps a single `update` may run; extra time is dropped.
    pub max_substeps: u32,
    pub partition_cell_size: f32,
}

impl Default for PhysicsSystemDesc {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            drag_k1: 0.1,
            drag_k2: 0.01,
            position_solver_iterations: 6,
            velocity_solver_iterations: 6,
            fixed_time_step: 1.0 / 60.0,
            max_substeps: 5,
            partition_cell_size: 2.0,
        }
    }
}

impl PhysicsSystemDesc {
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_drag(mut self, k1: f32, k2: f32) -> Self {
        self.drag_k1 = k1;
        self.drag_k2 = k2;
        self
    }

    pub fn with_solver_iterations(mut self, position: u32, velocity: u32) -> Self {
        self.position_solver_iterations = position;
        self.velocity_solver_iterations = velocity;
        self
    }

    pub fn with_fixed_time_step(mut self, dt: FPSeconds) -> Self {
        self.fixed_time_step = dt;
        self
    }

    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    pub fn with_partition_cell_size(mut self, cell_size: f32) -> Self {
        self.partition_cell_size = cell_size;
        self
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            log::warn!("invalid fixed time step {}, using default", self.fixed_time_step);
            self.fixed_time_step = defaults.fixed_time_step;
        }
        if self.max_substeps == 0 {
            self.max_substeps = 1;
        }
        if !math::is_finite(&self.gravity) {
            log::warn!("non-finite gravity ignored");
            self.gravity = defaults.gravity;
        }
        self
    }
}

/// Debug overlays drawn by [`PhysicsSystem::render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
    pub show_colliders: bool,
    pub show_partition: bool,
    pub show_contacts: bool,
    pub show_joints: bool,
}

impl DebugFlags {
    pub fn all() -> Self {
        Self {
            show_colliders: true,
            show_partition: true,
            show_contacts: true,
            show_joints: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForceGeneratorId(u32);

/// Where the world is in its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Begin,
    Update,
    Render,
    End,
}

pub struct PhysicsSystem {
    desc: PhysicsSystemDesc,
    bodies: BodySet,
    pending_add: Vec<(BodyId, RigidBody)>,
    pending_remove: BTreeSet<BodyId>,
    joints: BTreeMap<JointId, Joint>,
    next_joint_id: u32,
    generators: BTreeMap<ForceGeneratorId, ForceGenerator>,
    next_generator_id: u32,
    gravity: ForceGenerator,
    drag: ForceGenerator,
    accumulator: FPSeconds,
    physics_enabled: bool,
    gravity_enabled: bool,
    drag_enabled: bool,
    debug_flags: DebugFlags,
    collisions: BTreeSet<CollisionData>,
    contacts: heapless::Deque<CollisionData, DEBUG_CONTACT_CAPACITY>,
    partition: UniformGrid,
    phase: FramePhase,
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self::new(PhysicsSystemDesc::default())
    }
}

impl PhysicsSystem {
    pub fn new(desc: PhysicsSystemDesc) -> Self {
        let desc = desc.sanitized();
        Self {
            bodies: BodySet::new(),
            pending_add: Vec::new(),
            pending_remove: BTreeSet::new(),
            joints: BTreeMap::new(),
            next_joint_id: 0,
            generators: BTreeMap::new(),
            next_generator_id: 0,
            gravity: ForceGenerator::gravity(desc.gravity),
            drag: ForceGenerator::drag(desc.drag_k1, desc.drag_k2),
            accumulator: 0.0,
            physics_enabled: true,
            gravity_enabled: true,
            drag_enabled: true,
            debug_flags: DebugFlags::default(),
            collisions: BTreeSet::new(),
            contacts: heapless::Deque::new(),
            partition: UniformGrid::new(desc.partition_cell_size),
            phase: FramePhase::Idle,
            desc,
        }
    }

    // -- World tuning --

    pub fn desc(&self) -> &PhysicsSystemDesc {
        &self.desc
    }

    pub fn set_desc(&mut self, desc: PhysicsSystemDesc) {
        let desc = desc.sanitized();
        self.gravity.set_kind(ForceKind::Gravity {
            acceleration: desc.gravity,
        });
        self.drag.set_kind(ForceKind::Drag {
            k1: desc.drag_k1,
            k2: desc.drag_k2,
        });
        if desc.partition_cell_size != self.desc.partition_cell_size {
            self.partition = UniformGrid::new(desc.partition_cell_size);
        }
        self.desc = desc;
    }

    pub fn gravity(&self) -> Vec2 {
        self.desc.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        let desc = self.desc.clone().with_gravity(gravity);
        self.set_desc(desc);
    }

    pub fn drag_coefficients(&self) -> (f32, f32) {
        (self.desc.drag_k1, self.desc.drag_k2)
    }

    pub fn set_drag_coefficients(&mut self, k1: f32, k2: f32) {
        let desc = self.desc.clone().with_drag(k1, k2);
        self.set_desc(desc);
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    /// Globally pause or resume stepping.
    pub fn enable_physics(&mut self, enabled: bool) {
        self.physics_enabled = enabled;
    }

    pub fn is_gravity_enabled(&self) -> bool {
        self.gravity_enabled
    }

    pub fn enable_gravity(&mut self, enabled: bool) {
        self.gravity_enabled = enabled;
    }

    pub fn is_drag_enabled(&self) -> bool {
        self.drag_enabled
    }

    pub fn enable_drag(&mut self, enabled: bool) {
        self.drag_enabled = enabled;
    }

    pub fn enable_body_physics(&mut self, id: BodyId, enabled: bool) -> bool {
        self.body_mut(id).map(|b| b.enable_physics(enabled)).is_some()
    }

    pub fn enable_body_gravity(&mut self, id: BodyId, enabled: bool) -> bool {
        self.body_mut(id).map(|b| b.enable_gravity(enabled)).is_some()
    }

    pub fn enable_body_drag(&mut self, id: BodyId, enabled: bool) -> bool {
        self.body_mut(id).map(|b| b.enable_drag(enabled)).is_some()
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug_flags
    }

    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug_flags = flags;
        if !flags.show_partition {
            self.partition.clear();
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Simulated time not yet consumed by a fixed step.
    pub fn accumulator(&self) -> FPSeconds {
        self.accumulator
    }

    // -- Body lifecycle --

    /// Stage a body for insertion at the next [`begin_frame`](Self::begin_frame).
    ///
    /// The returned id is valid right away for joints, generators and
    /// parenting, but the body is not simulated until committed.
    pub fn add_object(&mut self, desc: RigidBodyDesc) -> BodyId {
        let id = self.bodies.reserve();
        self.pending_add.push((id, RigidBody::new(desc)));
        log::debug!("body {:?} staged for insertion", id);
        id
    }

    pub fn add_objects(&mut self, descs: impl IntoIterator<Item = RigidBodyDesc>) -> Vec<BodyId> {
        descs.into_iter().map(|desc| self.add_object(desc)).collect()
    }

    /// Request removal of `id` at the end of the frame. A body that was never
    /// committed is dropped immediately.
    pub fn remove_object(&mut self, id: BodyId) -> bool {
        if let Some(index) = self.pending_index(id) {
            self.pending_add.remove(index);
            self.bodies.release(id);
            self.detach_everywhere(id);
            log::debug!("staged body {:?} dropped", id);
            return true;
        }
        if self.bodies.contains(id) {
            return self.pending_remove.insert(id);
        }
        log::warn!("remove_object: unknown body {:?}", id);
        false
    }

    /// Returns how many removals were accepted.
    pub fn remove_objects(&mut self, ids: impl IntoIterator<Item = BodyId>) -> usize {
        ids.into_iter().filter(|id| self.remove_object(*id)).count()
    }

    /// Request removal of every body at the end of the frame.
    pub fn remove_all_objects(&mut self) {
        for (id, _) in core::mem::take(&mut self.pending_add) {
            self.bodies.release(id);
            self.detach_everywhere(id);
        }
        self.pending_remove.extend(self.bodies.ids());
    }

    /// Drop every body, pending or live, and every joint right now.
    pub fn remove_all_objects_immediately(&mut self) {
        self.pending_add.clear();
        self.pending_remove.clear();
        self.bodies.clear();
        self.joints.clear();
        self.gravity.detach_all();
        self.drag.detach_all();
        for generator in self.generators.values_mut() {
            generator.detach_all();
        }
        self.collisions.clear();
        self.contacts.clear();
        self.partition.clear();
        log::debug!("all bodies removed");
    }

    /// Live or staged body.
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id).or_else(|| {
            self.pending_add
                .iter()
                .find(|(pending, _)| *pending == id)
                .map(|(_, body)| body)
        })
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        if self.bodies.contains(id) {
            return self.bodies.get_mut(id);
        }
        self.pending_add
            .iter_mut()
            .find(|(pending, _)| *pending == id)
            .map(|(_, body)| body)
    }

    pub fn is_pending(&self, id: BodyId) -> bool {
        self.pending_index(id).is_some()
    }

    /// Number of live (committed) bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_add.len()
    }

    // -- Parenting --

    /// Make `parent` the parent of `child`, or clear it with `None`.
    ///
    /// Rejected if either body is unknown or the link would close a cycle.
    pub fn set_parent(&mut self, child: BodyId, parent: Option<BodyId>) -> bool {
        if self.body(child).is_none() {
            return false;
        }
        if let Some(parent) = parent {
            if self.body(parent).is_none() {
                return false;
            }
            let mut cursor = Some(parent);
            let mut depth = 0;
            while let Some(id) = cursor {
                if id == child || depth >= MAX_PARENT_DEPTH {
                    log::warn!("set_parent: {:?} -> {:?} would form a cycle", child, parent);
                    return false;
                }
                cursor = self.body(id).and_then(|b| b.parent());
                depth += 1;
            }
        }
        match self.body_mut(child) {
            Some(body) => {
                body.set_parent(parent);
                true
            }
            None => false,
        }
    }

    /// Body transform composed with every ancestor's transform.
    pub fn world_transform(&self, id: BodyId) -> Option<Matrix3<f32>> {
        let body = self.body(id)?;
        let mut transform = *body.transform();
        let mut cursor = body.parent();
        let mut depth = 0;
        while let Some(parent_id) = cursor {
            if depth >= MAX_PARENT_DEPTH {
                log::warn!("world_transform: parent chain of {:?} too deep", id);
                break;
            }
            let Some(parent) = self.body(parent_id) else {
                break;
            };
            transform = parent.transform() * transform;
            cursor = parent.parent();
            depth += 1;
        }
        Some(transform)
    }

    // -- Joints --

    /// Create a joint. Fails if an endpoint id is unknown or both endpoints
    /// are the same body.
    pub fn create_joint(&mut self, def: JointDef) -> Option<JointId> {
        if def.body_a.is_some() && def.body_a == def.body_b {
            log::warn!("create_joint: both endpoints are {:?}", def.body_a);
            return None;
        }
        let pose_a = self.endpoint_pose(def.body_a)?;
        let pose_b = self.endpoint_pose(def.body_b)?;

        let id = JointId(self.next_joint_id);
        self.next_joint_id = self.next_joint_id.wrapping_add(1);
        self.joints.insert(id, Joint::new(&def, pose_a, pose_b));
        log::debug!("joint {:?} created ({:?})", id, def.kind);
        Some(id)
    }

    pub fn remove_joint(&mut self, id: JointId) -> bool {
        self.joints.remove(&id).is_some()
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(&id)
    }

    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joints.get_mut(&id)
    }

    // -- Force generators --

    pub fn create_force_generator(&mut self, kind: ForceKind) -> ForceGeneratorId {
        let id = ForceGeneratorId(self.next_generator_id);
        self.next_generator_id = self.next_generator_id.wrapping_add(1);
        self.generators.insert(id, ForceGenerator::new(kind));
        id
    }

    pub fn remove_force_generator(&mut self, id: ForceGeneratorId) -> bool {
        self.generators.remove(&id).is_some()
    }

    pub fn force_generator(&self, id: ForceGeneratorId) -> Option<&ForceGenerator> {
        self.generators.get(&id)
    }

    pub fn force_generator_mut(&mut self, id: ForceGeneratorId) -> Option<&mut ForceGenerator> {
        self.generators.get_mut(&id)
    }

    /// Attach a live or staged body to a custom generator.
    pub fn attach_to_force_generator(&mut self, generator: ForceGeneratorId, body: BodyId) -> bool {
        if self.body(body).is_none() {
            return false;
        }
        match self.generators.get_mut(&generator) {
            Some(g) => {
                g.attach(body);
                true
            }
            None => false,
        }
    }

    pub fn detach_from_force_generator(
        &mut self,
        generator: ForceGeneratorId,
        body: BodyId,
    ) -> bool {
        self.generators
            .get_mut(&generator)
            .map_or(false, |g| g.detach(body))
    }

    // -- Frame --

    pub fn begin_frame(&mut self) {
        self.phase = FramePhase::Begin;

        for (id, body) in core::mem::take(&mut self.pending_add) {
            if self.bodies.commit(id, body) {
                log::debug!("body {:?} committed", id);
            }
        }

        self.gravity.detach_all();
        self.drag.detach_all();
        for (id, body) in self.bodies.iter() {
            if !body.is_physics_enabled() || !body.is_dynamic() {
                continue;
            }
            if self.gravity_enabled && body.is_gravity_enabled() {
                self.gravity.attach(id);
            }
            if self.drag_enabled && body.is_drag_enabled() {
                self.drag.attach(id);
            }
        }

        for (_, body) in self.bodies.iter_mut() {
            body.begin_frame();
        }
    }

    /// Advance the simulation by `dt` seconds of frame time, in fixed steps.
    /// Returns the number of steps taken.
    pub fn update(&mut self, dt: FPSeconds) -> u32 {
        self.phase = FramePhase::Update;
        if !self.physics_enabled {
            return 0;
        }
        if !(dt.is_finite() && dt > 0.0) {
            if !dt.is_finite() {
                log::warn!("update: non-finite dt ignored");
            }
            return 0;
        }

        let step = self.desc.fixed_time_step;
        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= step && steps < self.desc.max_substeps {
            self.step(step);
            self.accumulator -= step;
            steps += 1;
        }
        if self.accumulator >= step {
            log::warn!(
                "update: {} substeps not enough, dropping {}s",
                self.desc.max_substeps,
                self.accumulator
            );
            self.accumulator %= step;
        }
        steps
    }

    /// One fixed step of `dt` seconds.
    pub fn step(&mut self, dt: FPSeconds) {
        log::trace!("step dt={}", dt);

        if self.gravity_enabled {
            self.gravity.notify(&mut self.bodies, dt);
        }
        if self.drag_enabled {
            self.drag.notify(&mut self.bodies, dt);
        }
        for generator in self.generators.values() {
            generator.notify(&mut self.bodies, dt);
        }
        for joint in self.joints.values_mut() {
            joint.notify(&mut self.bodies, dt);
        }

        let pairs = self.broad_phase();
        self.collisions = self.narrow_phase(&pairs);
        let collisions: Vec<CollisionData> = self.collisions.iter().copied().collect();
        for collision in &collisions {
            self.solve_collision(collision);
        }

        self.solve_constraints();
        for (_, body) in self.bodies.iter_mut() {
            body.update(dt);
        }
        self.solve_constraints();

        for joint in self.joints.values_mut() {
            joint.refresh(&self.bodies);
        }
    }

    /// Candidate pairs whose bounds overlap, smaller id first.
    ///
    /// Pairs are skipped unless at least one body is dynamic and awake.
    pub fn broad_phase(&self) -> Vec<(BodyId, BodyId)> {
        let candidates: Vec<(BodyId, Aabb2, bool)> = self
            .bodies
            .iter()
            .filter(|(_, body)| body.is_physics_enabled())
            .filter_map(|(id, body)| {
                let bounds = Aabb2::from_obb(&body.collider()?.bounds());
                Some((id, bounds, !body.is_static() && body.is_awake()))
            })
            .collect();

        let mut pairs = Vec::new();
        for (i, (id_a, bounds_a, active_a)) in candidates.iter().enumerate() {
            for (id_b, bounds_b, active_b) in &candidates[i + 1..] {
                if !(*active_a || *active_b) {
                    continue;
                }
                if bounds_a.overlaps(bounds_b) {
                    pairs.push((*id_a, *id_b));
                }
            }
        }
        pairs
    }

    /// Run GJK/EPA on broad-phase pairs and record the resulting contacts.
    pub fn narrow_phase(&mut self, pairs: &[(BodyId, BodyId)]) -> BTreeSet<CollisionData> {
        let mut collisions = BTreeSet::new();
        for (a, b) in pairs {
            let (Some(body_a), Some(body_b)) = (self.bodies.get(*a), self.bodies.get(*b)) else {
                continue;
            };
            let (Some(collider_a), Some(collider_b)) = (body_a.collider(), body_b.collider()) else {
                continue;
            };
            let Some(result) = collision::collide(collider_a, collider_b) else {
                continue;
            };
            let data = CollisionData {
                a: *a,
                b: *b,
                distance: result.distance,
                normal: result.normal,
            };
            if collisions.insert(data) {
                self.record_contact(data);
            }
        }
        collisions
    }

    /// Separate two bodies and exchange momentum at the contact point.
    ///
    /// The penetration is split by inverse mass: a static body takes no
    /// share, and the two shares always add up to the full distance. The
    /// restitution and friction impulses act at the contact point, so an
    /// off-center hit also changes angular velocity.
    /// Returns `false` when nothing could move.
    pub fn solve_collision(&mut self, collision: &CollisionData) -> bool {
        let (Some(a), Some(b)) = (self.bodies.get(collision.a), self.bodies.get(collision.b)) else {
            return false;
        };
        let inv_a = a.inverse_mass();
        let inv_b = b.inverse_mass();
        let inv_sum = inv_a + inv_b;
        if inv_sum <= 0.0 {
            return false;
        }
        let share_a = inv_a / inv_sum;
        let share_b = inv_b / inv_sum;
        let normal = collision.normal;
        let restitution = a.material().restitution.min(b.material().restitution);
        let friction = (a.material().friction * b.material().friction).max(0.0).sqrt();

        let contact = match (a.collider(), b.collider()) {
            (Some(collider_a), Some(collider_b)) => {
                collision::contact_point(collider_a, collider_b, &normal)
            }
            _ => (a.position() + b.position()) * 0.5,
        };
        let ra = contact - a.position();
        let rb = contact - b.position();
        let inv_inertia_a = rotational_inverse_inertia(a);
        let inv_inertia_b = rotational_inverse_inertia(b);
        let (velocity_a, velocity_b) = (a.velocity(), b.velocity());
        let (spin_a, spin_b) = (a.angular_velocity(), b.angular_velocity());

        // Velocity of each body at the contact point: v + w x r
        let point_a = velocity_a + math::perpendicular(&ra) * spin_a.to_radians();
        let point_b = velocity_b + math::perpendicular(&rb) * spin_b.to_radians();
        let relative = point_b - point_a;
        let approach = relative.dot(&normal);

        // Inverse effective mass along `direction`, angular terms included
        let inverse_mass_along = |direction: &Vec2| {
            let arm_a = math::cross(&ra, direction);
            let arm_b = math::cross(&rb, direction);
            inv_sum + inv_inertia_a * arm_a * arm_a + inv_inertia_b * arm_b * arm_b
        };

        let mut impulse = Vec2::zeros();
        if approach < 0.0 {
            let j = -(1.0 + restitution) * approach / inverse_mass_along(&normal);
            impulse += normal * j;

            let tangential = relative - normal * approach;
            if let Some(tangent) = math::try_normalize(&tangential) {
                let jt = (-relative.dot(&tangent) / inverse_mass_along(&tangent))
                    .clamp(-j * friction, j * friction);
                impulse += tangent * jt;
            }
        }

        let correction = normal * collision.distance;
        if let Some(body) = self.bodies.get_mut(collision.a) {
            body.translate(&(-correction * share_a));
            if share_a > 0.0 {
                body.set_velocity(velocity_a - impulse * inv_a);
                let turn = inv_inertia_a * math::cross(&ra, &impulse);
                body.set_angular_velocity(spin_a - turn.to_degrees());
                body.wake();
            }
        }
        if let Some(body) = self.bodies.get_mut(collision.b) {
            body.translate(&(correction * share_b));
            if share_b > 0.0 {
                body.set_velocity(velocity_b + impulse * inv_b);
                let turn = inv_inertia_b * math::cross(&rb, &impulse);
                body.set_angular_velocity(spin_b + turn.to_degrees());
                body.wake();
            }
        }
        true
    }

    /// Position iterations, then velocity iterations, each on the joints
    /// violated at that moment.
    pub fn solve_constraints(&mut self) {
        for _ in 0..self.desc.position_solver_iterations {
            for joint in self.joints.values_mut() {
                if joint.constraint_violated(&self.bodies) {
                    joint.solve_position_constraint(&mut self.bodies);
                }
            }
        }
        for _ in 0..self.desc.velocity_solver_iterations {
            for joint in self.joints.values_mut() {
                if joint.constraint_violated(&self.bodies) {
                    joint.solve_velocity_constraint(&mut self.bodies);
                }
            }
        }
    }

    /// Draw the enabled debug overlays.
    pub fn render(&mut self, renderer: &mut impl DebugRenderer) {
        self.phase = FramePhase::Render;
        let flags = self.debug_flags;

        if flags.show_partition {
            let entries: Vec<(BodyId, Aabb2)> = self
                .bodies
                .iter()
                .filter_map(|(id, body)| Some((id, Aabb2::from_obb(&body.collider()?.bounds()))))
                .collect();
            self.partition.rebuild(entries);
            for (cell, _) in self.partition.cells() {
                renderer.draw_aabb(&self.partition.cell_bounds(cell), debug_draw::PARTITION_COLOR);
            }
        }

        if flags.show_colliders {
            for (_, body) in self.bodies.iter() {
                let Some(collider) = body.collider() else {
                    continue;
                };
                let color = if body.is_static() {
                    debug_draw::STATIC_COLOR
                } else if body.is_awake() {
                    debug_draw::AWAKE_COLOR
                } else {
                    debug_draw::ASLEEP_COLOR
                };
                renderer.draw_collider(collider, color);
            }
        }

        if flags.show_joints {
            for joint in self.joints.values() {
                let (a, b) = joint.anchors();
                renderer.draw_line(&a, &b, debug_draw::JOINT_COLOR);
            }
        }

        if flags.show_contacts {
            for contact in self.contacts.iter() {
                let Some(collider) = self.bodies.get(contact.b).and_then(|b| b.collider()) else {
                    continue;
                };
                let point = collider.support(&-contact.normal);
                renderer.draw_cross(&point, 0.1, debug_draw::CONTACT_COLOR);
                renderer.draw_line(
                    &point,
                    &(point + contact.normal * contact.distance.max(0.1)),
                    debug_draw::CONTACT_COLOR,
                );
            }
        }
    }

    pub fn end_frame(&mut self) {
        self.phase = FramePhase::End;

        for (id, body) in self.bodies.iter() {
            if body.should_kill() {
                self.pending_remove.insert(id);
            }
        }

        for id in core::mem::take(&mut self.pending_remove) {
            if self.bodies.release(id).is_some() {
                log::debug!("body {:?} removed", id);
            }
            self.detach_everywhere(id);
        }

        let before = self.joints.len();
        self.joints.retain(|_, joint| joint.is_attached());
        let pruned = before - self.joints.len();
        if pruned > 0 {
            log::debug!("{} detached joints pruned", pruned);
        }

        self.phase = FramePhase::Idle;
    }

    /// `begin_frame`, `update(dt)` and `end_frame` in one call.
    pub fn run_frame(&mut self, dt: FPSeconds) -> u32 {
        self.begin_frame();
        let steps = self.update(dt);
        self.end_frame();
        steps
    }

    // -- Debug queries --

    pub fn debug_bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.bodies.iter()
    }

    pub fn debug_joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints.iter().map(|(id, joint)| (*id, joint))
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// The most recent contacts, oldest first.
    pub fn debug_contacts(&self) -> impl Iterator<Item = &CollisionData> {
        self.contacts.iter()
    }

    /// Contacts found by the last step.
    pub fn debug_collisions(&self) -> &BTreeSet<CollisionData> {
        &self.collisions
    }

    pub fn partition(&self) -> &UniformGrid {
        &self.partition
    }

    pub fn gravity_generator(&self) -> &ForceGenerator {
        &self.gravity
    }

    pub fn drag_generator(&self) -> &ForceGenerator {
        &self.drag
    }

    fn record_contact(&mut self, contact: CollisionData) {
        if self.contacts.is_full() {
            self.contacts.pop_front();
        }
        let _ = self.contacts.push_back(contact);
    }

    fn pending_index(&self, id: BodyId) -> Option<usize> {
        self.pending_add.iter().position(|(pending, _)| *pending == id)
    }

    /// Pose for a joint endpoint. `Some(None)` for a world anchor, `None`
    /// for an unknown body.
    fn endpoint_pose(&self, id: Option<BodyId>) -> Option<Option<Pose>> {
        match id {
            None => Some(None),
            Some(id) => match self.body(id) {
                Some(body) => Some(Some((body.position(), body.orientation()))),
                None => {
                    log::warn!("create_joint: unknown body {:?}", id);
                    None
                }
            },
        }
    }

    fn detach_everywhere(&mut self, id: BodyId) {
        self.gravity.detach(id);
        self.drag.detach(id);
        for generator in self.generators.values_mut() {
            generator.detach(id);
        }
        for joint in self.joints.values_mut() {
            joint.detach(id);
        }
        self.collisions.retain(|c| !c.involves(id));
        for (_, body) in self.bodies.iter_mut() {
            if body.parent() == Some(id) {
                body.set_parent(None);
            }
        }
        for (_, body) in self.pending_add.iter_mut() {
            if body.parent() == Some(id) {
                body.set_parent(None);
            }
        }
    }
}

/// Inverse moment of inertia, or zero when the body cannot turn.
fn rotational_inverse_inertia(body: &RigidBody) -> f32 {
    if body.is_rotation_locked() {
        0.0
    } else {
        body.inverse_inertia()
    }
}
