/*!
Kinematic character locomotion.

The controller moves a convex proxy through a [`CollisionWorld`] with the
classic three-phase step:

1. step-up: climb steps and slopes up to the configured step height;
2. step-forward-and-strafe: iterative sweep-and-slide along obstacles;
3. step-down: settle onto ground or fall, with stair-vs-fall disambiguation.

A velocity model (walk/air acceleration, friction, drag, gravity, platform
inheritance) feeds the phases, and a bounded discrete-contact recovery loop
resolves any residual penetration. All state mutation is local to the
controller and to the externally owned proxy transform; each tick runs to
completion on the caller's thread.

The code is split for clarity:

- config:     plain tunables ([`CharacterConfig`])
- controller: state, public API, velocity integration, tick pipeline
- step:       the three sweep phases and the slide deflection math
- contact:    penetration recovery, platform inheritance, reaction forces
*/

pub mod config;
pub mod controller;

mod contact;
mod step;

pub use config::CharacterConfig;
pub use controller::CharacterController;

use crate::world::CollisionWorld;

/// A per-tick action driven by the simulation loop.
///
/// The single capability the host needs from a character: advance it through
/// the world by one time step.
pub trait WorldAction {
    fn advance(&mut self, world: &mut dyn CollisionWorld, dt: f32);
}

impl WorldAction for CharacterController {
    fn advance(&mut self, world: &mut dyn CollisionWorld, dt: f32) {
        self.pre_step(world);
        self.player_step(world, dt);
    }
}
