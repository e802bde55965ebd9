use log::trace;
use nalgebra as na;

use super::config::CharacterConfig;
use crate::types::{ConvexShape, Quat, Transform, Vec3, normalized_or_zero};
use crate::world::{BodyHandle, CollisionWorld};

/// Kinematic character controller.
///
/// Owns a reference to its collision proxy (a world-tracked body) and the
/// proxy's convex shape; both are externally owned, the controller only
/// reads and mutates the proxy transform and overlap data. Drive it once per
/// tick with [`CharacterController::pre_step`] followed by
/// [`CharacterController::player_step`], or through
/// [`crate::character::WorldAction`].
pub struct CharacterController {
    pub(super) proxy: BodyHandle,
    pub(super) shape: ConvexShape,
    pub(super) config: CharacterConfig,

    /// Unit up axis, or zero when explicitly cleared. Kept coupled with the
    /// gravity direction.
    pub(super) up: Vec3,
    /// Gravity magnitude along `-up`.
    pub(super) gravity: f32,
    /// Maximum walkable slope, stored with its cosine so per-sweep filters
    /// don't recompute it. Only settable together via
    /// [`CharacterController::set_max_slope`].
    pub(super) max_slope_radians: f32,
    pub(super) max_slope_cosine: f32,

    pub(super) walk_direction: Vec3,
    pub(super) normalized_direction: Vec3,
    pub(super) use_walk_direction: bool,
    pub(super) velocity_time_interval: f32,

    pub(super) angular_velocity: Vec3,
    /// Character-driven velocity (input, friction, drag, gravity).
    pub(super) local_velocity: Vec3,
    /// Velocity inherited from the standing surface; folded into local
    /// velocity when airborne.
    pub(super) external_velocity: Vec3,
    /// Per-tick force accumulator, applied to local velocity once and then
    /// cleared.
    pub(super) acceleration: Vec3,
    pub(super) move_offset: Vec3,
    pub(super) current_speed: f32,

    pub(super) vertical_velocity: f32,
    pub(super) vertical_offset: f32,
    /// Vertical distance actually climbed by step-up; bounds the step-down
    /// search.
    pub(super) current_step_offset: f32,

    pub(super) current_position: Vec3,
    pub(super) target_position: Vec3,
    pub(super) current_orientation: Quat,
    pub(super) target_orientation: Quat,

    pub(super) on_ground: bool,
    pub(super) was_on_ground: bool,
    pub(super) was_jumping: bool,
    /// Step-down took the full drop last tick; selects the fraction source in
    /// bounce-fix mode.
    pub(super) full_drop: bool,
}

impl CharacterController {
    /// Create a controller for an externally owned proxy and shape.
    ///
    /// The proxy transform is not touched here; call
    /// [`CharacterController::warp`] or position the proxy before the first
    /// tick.
    pub fn new(proxy: BodyHandle, shape: ConvexShape, step_height: f32, up: Vec3) -> Self {
        let mut config = CharacterConfig::default();
        config.step_height = step_height;

        let max_slope = crate::settings::DEFAULT_MAX_SLOPE;
        Self {
            proxy,
            shape,
            config,
            up: normalized_or_zero(up),
            gravity: crate::settings::DEFAULT_GRAVITY,
            max_slope_radians: max_slope,
            max_slope_cosine: max_slope.cos(),
            walk_direction: Vec3::zeros(),
            normalized_direction: Vec3::zeros(),
            use_walk_direction: true,
            velocity_time_interval: 0.0,
            angular_velocity: Vec3::zeros(),
            local_velocity: Vec3::zeros(),
            external_velocity: Vec3::zeros(),
            acceleration: Vec3::zeros(),
            move_offset: Vec3::zeros(),
            current_speed: 0.0,
            vertical_velocity: 0.0,
            vertical_offset: 0.0,
            current_step_offset: 0.0,
            current_position: Vec3::zeros(),
            target_position: Vec3::zeros(),
            current_orientation: Quat::identity(),
            target_orientation: Quat::identity(),
            on_ground: false,
            was_on_ground: false,
            was_jumping: false,
            full_drop: false,
        }
    }

    #[inline]
    pub fn proxy(&self) -> BodyHandle {
        self.proxy
    }

    #[inline]
    pub fn shape(&self) -> &ConvexShape {
        &self.shape
    }

    #[inline]
    pub fn config(&self) -> &CharacterConfig {
        &self.config
    }

    #[inline]
    pub fn config_mut(&mut self) -> &mut CharacterConfig {
        &mut self.config
    }

    #[inline]
    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Gravity as a vector along `-up`.
    #[inline]
    pub fn gravity(&self) -> Vec3 {
        -self.gravity * self.up
    }

    /// Position as of the last completed stage sequence.
    #[inline]
    pub fn current_position(&self) -> Vec3 {
        self.current_position
    }

    /// Maximum walkable slope angle in radians.
    #[inline]
    pub fn max_slope(&self) -> f32 {
        self.max_slope_radians
    }

    /// Set the maximum walkable slope angle. The cosine used by sweep
    /// filtering is recomputed here and nowhere else.
    pub fn set_max_slope(&mut self, slope_radians: f32) {
        self.max_slope_radians = slope_radians;
        self.max_slope_cosine = slope_radians.cos();
    }

    /// Set the per-step positional increment direction. This is neither a
    /// direction scale nor a velocity: the integrator accelerates along it up
    /// to the active regime's max speed. Cancels any timed-velocity mode.
    pub fn set_walk_direction(&mut self, walk_direction: Vec3) {
        self.use_walk_direction = true;
        self.velocity_time_interval = 0.0;
        self.walk_direction = walk_direction;
        self.normalized_direction = normalized_or_zero(walk_direction);
    }

    /// Move with `velocity` for `time_interval` seconds, after which the
    /// direction resets to zero. Negative intervals are a no-op. Cancels walk
    /// mode.
    pub fn set_velocity_for_time_interval(&mut self, velocity: Vec3, time_interval: f32) {
        if time_interval < 0.0 {
            return;
        }
        self.use_walk_direction = false;
        self.walk_direction = velocity;
        self.normalized_direction = normalized_or_zero(velocity);
        self.velocity_time_interval += time_interval;
    }

    #[inline]
    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        self.angular_velocity = velocity;
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Replace the character-driven velocity.
    #[inline]
    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        self.local_velocity = velocity;
    }

    /// Combined character-driven and inherited velocity.
    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.local_velocity + self.external_velocity
    }

    #[inline]
    pub fn local_linear_velocity(&self) -> Vec3 {
        self.local_velocity
    }

    #[inline]
    pub fn can_jump(&self) -> bool {
        self.on_ground
    }

    /// Jump along `up` at the configured jump speed, or along `impulse` at
    /// its magnitude when non-zero.
    ///
    /// Clears any downward local vertical velocity first and raises a
    /// downward inherited vertical velocity to zero before folding it in.
    pub fn jump(&mut self, impulse: Vec3) {
        let default_jump = impulse.norm_squared() == 0.0;
        let magnitude = if default_jump {
            self.config.jump_speed
        } else {
            impulse.norm()
        };
        let jump_axis = if default_jump {
            self.up
        } else {
            normalized_or_zero(impulse)
        };

        self.vertical_velocity = magnitude;
        self.was_jumping = true;

        let local_up = self.local_velocity.dot(&self.up);
        if local_up < 0.0 {
            self.local_velocity -= self.up * local_up;
        }
        let external_up = self.external_velocity.dot(&self.up);
        if external_up < 0.0 {
            self.external_velocity -= self.up * external_up;
        }

        self.local_velocity +=
            jump_axis * (magnitude * self.config.speed_modifier) + self.external_velocity;
    }

    /// `jump` with an explicit direction and magnitude.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        self.jump(impulse);
    }

    /// Add directly to the character-driven velocity.
    #[inline]
    pub fn apply_central_impulse(&mut self, impulse: Vec3) {
        self.local_velocity += impulse;
    }

    /// Accumulate into the per-tick acceleration; folded into local velocity
    /// once on the next step and then cleared.
    #[inline]
    pub fn apply_central_force(&mut self, force: Vec3) {
        self.acceleration += force;
    }

    /// Set gravity as a vector; a non-zero vector also re-derives the up
    /// axis.
    pub fn set_gravity(&mut self, world: &mut dyn CollisionWorld, gravity: Vec3) {
        if gravity.norm_squared() > 0.0 {
            self.set_up_vector(world, -gravity);
        }
        self.gravity = gravity.norm();
    }

    /// Set the up axis. With gravity present this re-points gravity along
    /// `-up`; the proxy is re-oriented by the shortest arc between the old
    /// and new axes.
    pub fn set_up(&mut self, world: &mut dyn CollisionWorld, up: Vec3) {
        if up.norm_squared() > 0.0 && self.gravity > 0.0 {
            let gravity = -self.gravity * normalized_or_zero(up);
            self.set_gravity(world, gravity);
            return;
        }
        self.set_up_vector(world, up);
    }

    fn set_up_vector(&mut self, world: &mut dyn CollisionWorld, up: Vec3) {
        let new_up = normalized_or_zero(up);
        if self.up == new_up {
            return;
        }

        let old_up = self.up;
        self.up = new_up;

        let rot = shortest_arc(self.up, old_up);
        let t = world.transform(self.proxy);
        world.set_transform(
            self.proxy,
            Transform::new(t.translation, rot.inverse() * t.rotation),
        );
    }

    /// Zero all velocities and ground flags and drain the proxy's
    /// overlap-pair cache.
    pub fn reset(&mut self, world: &mut dyn CollisionWorld) {
        self.vertical_velocity = 0.0;
        self.vertical_offset = 0.0;
        self.on_ground = false;
        self.was_on_ground = false;
        self.was_jumping = false;
        self.local_velocity = Vec3::zeros();
        self.external_velocity = Vec3::zeros();
        self.angular_velocity = Vec3::zeros();
        self.acceleration = Vec3::zeros();
        self.walk_direction = Vec3::zeros();
        self.normalized_direction = Vec3::zeros();
        self.velocity_time_interval = 0.0;
        world.clear_overlaps(self.proxy);
        trace!("character reset");
    }

    /// Teleport the proxy, bypassing all stepping. The proxy orientation is
    /// reset to identity.
    pub fn warp(&mut self, world: &mut dyn CollisionWorld, origin: Vec3) {
        world.set_transform(self.proxy, Transform::from_translation(origin));
        trace!("character warped to {origin:?}");
    }

    /// Resync the working transform from the proxy, guarding against external
    /// code having moved it since the last tick.
    pub fn pre_step(&mut self, world: &mut dyn CollisionWorld) {
        let t = world.transform(self.proxy);
        self.current_position = t.translation;
        self.target_position = t.translation;
        self.current_orientation = t.rotation;
        self.target_orientation = t.rotation;
    }

    /// Run the full locomotion pipeline for one tick.
    pub fn player_step(&mut self, world: &mut dyn CollisionWorld, dt: f32) {
        // Timed-velocity mode expires here; walk mode never does.
        if !self.use_walk_direction {
            if self.velocity_time_interval <= 0.0 {
                self.walk_direction = Vec3::zeros();
                self.normalized_direction = Vec3::zeros();
            } else {
                self.velocity_time_interval -= dt;
            }
        }

        self.integrate_angular_velocity(world, dt);

        self.was_on_ground = self.on_ground;
        self.on_ground = false;

        self.inherit_platform_velocity(world, dt);

        // Airborne with inherited velocity: accelerate up to the carrier's
        // speed along its direction instead of fighting it, then fold it in.
        if !self.on_ground && self.external_velocity.norm_squared() > 0.0 {
            if self.was_jumping {
                let external_up = self.external_velocity.dot(&self.up);
                if external_up < 0.0 {
                    self.external_velocity -= self.up * external_up;
                }
            }

            let max_velocity = self.external_velocity.norm();
            if max_velocity > 0.0 {
                let external_dir = self.external_velocity / max_velocity;
                let proj_vel = self.local_velocity.dot(&external_dir);
                let accel_vel = (max_velocity - proj_vel).max(0.0);
                self.local_velocity += external_dir * accel_vel;
                self.external_velocity = Vec3::zeros();
            }
        }

        self.local_velocity *= (1.0 - self.config.linear_damping.clamp(0.0, 1.0)).powf(dt);

        // Resistance: ground friction acts horizontally and only when
        // grounded on consecutive ticks; air drag acts on everything else.
        if self.was_on_ground && self.on_ground {
            let mut ground_friction = -self.config.friction * self.local_velocity;
            ground_friction -= self.up * ground_friction.dot(&self.up);
            self.local_velocity += ground_friction;
        } else {
            self.local_velocity += -self.config.drag * self.local_velocity;
        }

        // Accelerate along the walk direction, clamped so the projected
        // speed never exceeds the active regime's max.
        let accelerate = self.config.speed_modifier
            * if self.on_ground {
                self.config.walk_acceleration
            } else {
                self.config.air_acceleration
            };
        let max_velocity = self.config.speed_modifier
            * if self.on_ground {
                self.config.walk_max_speed
            } else {
                self.config.air_max_speed
            };

        let proj_vel = self.local_velocity.dot(&self.walk_direction);
        let mut accel_vel = accelerate * dt;
        if proj_vel + accel_vel > max_velocity {
            accel_vel = (max_velocity - proj_vel).max(0.0);
        }

        // Gravity joins the accumulator so it applies exactly once per tick
        // no matter how many stages run.
        self.acceleration += self.walk_direction * accel_vel - self.gravity * self.up * dt;
        self.local_velocity += self.acceleration;

        self.move_offset = self.local_velocity * dt + self.external_velocity * dt;
        self.vertical_velocity = self.local_velocity.dot(&self.up);
        self.vertical_offset = self.move_offset.dot(&self.up);

        self.current_speed = self.local_velocity.norm();

        self.step_up(world);

        let before_forward = self.current_position;
        let walk_move = self.move_offset;
        self.step_forward_and_strafe(world, walk_move);

        // Local velocity becomes what the slide actually allowed, minus the
        // inherited part.
        if dt > 0.0 {
            let delta = self.current_position - before_forward;
            self.local_velocity = delta / dt - self.external_velocity;
        }

        if !self.on_ground && self.vertical_velocity < 0.0 {
            let local_up = self.local_velocity.dot(&self.up);
            self.local_velocity += self.up * (self.vertical_velocity - local_up);
        } else {
            self.vertical_velocity = self.local_velocity.dot(&self.up);
        }

        self.step_down(world, dt);

        if self.on_ground {
            let local_up = self.local_velocity.dot(&self.up);
            if local_up < 0.0 {
                self.local_velocity -= self.up * local_up;
            }
        }

        self.acceleration = Vec3::zeros();

        let t = world.transform(self.proxy);
        world.set_transform(self.proxy, Transform::new(self.current_position, t.rotation));

        self.resolve_penetrations(world);

        self.push_dynamic_contacts(world);
    }

    /// Decay angular velocity and integrate it into the proxy orientation;
    /// the working transform resyncs from the proxy afterwards.
    fn integrate_angular_velocity(&mut self, world: &mut dyn CollisionWorld, dt: f32) {
        if self.angular_velocity.norm_squared() == 0.0 {
            return;
        }
        self.angular_velocity *= (1.0 - self.config.angular_damping.clamp(0.0, 1.0)).powf(dt);

        if self.angular_velocity.norm_squared() == 0.0 {
            return;
        }
        let t = world.transform(self.proxy);
        let axis = na::Unit::new_normalize(self.angular_velocity);
        let rot = Quat::from_axis_angle(&axis, self.angular_velocity.norm() * dt);
        world.set_transform(self.proxy, Transform::new(t.translation, rot * t.rotation));

        self.pre_step(world);
    }
}

/// Shortest-arc rotation taking `from` onto `to`; identity for degenerate
/// inputs, a half turn around any orthogonal axis for opposite vectors.
fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    if from.norm_squared() == 0.0 || to.norm_squared() == 0.0 {
        return Quat::identity();
    }
    Quat::rotation_between(&from, &to).unwrap_or_else(|| {
        let reference = if from.x.abs() < 0.9 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        let axis = na::Unit::new_normalize(from.cross(&reference));
        Quat::from_axis_angle(&axis, std::f32::consts::PI)
    })
}
