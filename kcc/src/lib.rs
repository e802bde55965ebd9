/*!
Kinematic character locomotion on top of a pluggable collision world.

Given a character's desired walk direction or velocity, the surrounding
geometry and a time step, the controller computes the character's new
position, grounded state and velocity with the classic three-phase step
(step-up, sweep-and-slide, step-down), bounded penetration recovery and
moving-platform velocity inheritance.

The collision engine is an injected dependency: everything the controller
needs is captured by [`world::CollisionWorld`], and [`world::QueryWorld`]
provides a self-contained parry3d-backed implementation for embeddings and
tests that do not bring their own engine.
*/

pub mod character;
pub mod settings;
pub mod types;
pub mod world;

pub use character::{CharacterConfig, CharacterController, WorldAction};
pub use types::{ConvexShape, Quat, Transform, Vec3};
pub use world::{
    BodyDesc, BodyHandle, BodyInfo, BodyShape, CollisionFilter, CollisionWorld, ContactPair,
    ContactPoint, QueryWorld, SweepFilter, SweepHit,
};
