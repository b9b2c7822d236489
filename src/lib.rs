//! 2D rigid-body physics for `no_std` targets.
//!
//! ```
//! use embedded_physics2d::collider::Collider;
//! use embedded_physics2d::material::PhysicsMaterial;
//! use embedded_physics2d::math::Vec2;
//! use embedded_physics2d::rigid_body::RigidBodyDesc;
//! use embedded_physics2d::system::PhysicsSystem;
//!
//! let mut world = PhysicsSystem::default();
//! world.add_object(
//!     RigidBodyDesc::default()
//!         .with_position(Vec2::new(0.0, -1.0))
//!         .with_collider(Collider::aabb(Vec2::new(10.0, 0.5)))
//!         .with_material(PhysicsMaterial::STATIC),
//! );
//! let ball = world.add_object(
//!     RigidBodyDesc::default()
//!         .with_position(Vec2::new(0.0, 3.0))
//!         .with_collider(Collider::circle(0.5)),
//! );
//!
//! for _ in 0..60 {
//!     world.run_frame(1.0 / 60.0);
//! }
//! assert!(world.body(ball).unwrap().position().y < 3.0);
//! ```
#![no_std]

extern crate alloc;

pub mod body_set;
pub mod collider;
pub mod collision;
pub mod debug_draw;
pub mod force_generator;
pub mod joint;
pub mod material;
pub mod math;
pub mod partition;
pub mod rigid_body;
pub mod system;
pub mod viewport;

/// Time in seconds.
pub type FPSeconds = f32;

pub use body_set::BodyId;
pub use collider::Collider;
pub use collision::{CollisionData, EpaResult, GjkResult};
pub use debug_draw::{DebugRenderer, FramebufferRenderer};
pub use force_generator::{ForceGenerator, ForceKind};
pub use joint::{Joint, JointDef, JointKind};
pub use material::PhysicsMaterial;
pub use rigid_body::{RigidBody, RigidBodyDesc};
pub use system::{DebugFlags, ForceGeneratorId, JointId, PhysicsSystem, PhysicsSystemDesc};
pub use viewport::Viewport;
