use super::controller::CharacterController;
use crate::settings::{DIST_EPS, MAX_SLIDE_ITERATIONS, MIN_MOVE_SQ, MIN_SLIDE_FRACTION};
use crate::types::{Transform, Vec3};
use crate::world::{CollisionWorld, SweepHit};

impl CharacterController {
    /// Phase 1: climb steps and slopes up to the step height.
    ///
    /// The step assist only engages while falling; a rising character gets a
    /// zero-length climb. The sweep accepts only surfaces within the slope
    /// limit, so walls and ceilings do not grant a step-up.
    pub(super) fn step_up(&mut self, world: &mut dyn CollisionWorld) {
        let step_height = if self.vertical_velocity < 0.0 {
            self.config.step_height
        } else {
            0.0
        };

        self.target_position = self.current_position + self.up * step_height;

        let start = Transform::new(self.current_position, self.current_orientation);
        let end = Transform::new(self.target_position, self.target_orientation);
        let filter = self
            .sweep_filter(world)
            .with_slope(self.up, self.max_slope_cosine);

        let hit = if world.body_info(self.proxy).has_response {
            self.sweep_checked(world, &self.shape, &start, &end, &filter)
        } else {
            None
        };

        if let Some(hit) = hit {
            // We moved up only a fraction of the step height.
            self.current_step_offset = step_height * hit.fraction;
            if self.config.interpolate_up {
                self.current_position +=
                    (self.target_position - self.current_position) * hit.fraction;
            } else {
                self.current_position = self.target_position;
            }

            let t = world.transform(self.proxy);
            world.set_transform(self.proxy, Transform::new(self.current_position, t.rotation));

            // Stepping up can embed the proxy in a ceiling corner.
            self.resolve_penetrations(world);

            let settled = world.transform(self.proxy).translation;
            self.target_position = settled;
            self.current_position = settled;

            // Landed on something while the intended move was still upward:
            // treat the climb as already on the stair.
            if self.vertical_offset > 0.0 {
                self.vertical_offset = 0.0;
                self.vertical_velocity = 0.0;
                let local_up = self.local_velocity.dot(&self.up);
                self.local_velocity -= self.up * local_up;
                self.current_step_offset = self.config.step_height;
            }
        } else {
            self.current_step_offset = step_height;
            self.current_position = self.target_position;
        }
    }

    /// Phase 2: move toward `current + walk_move`, sliding along obstacle
    /// surfaces, for at most [`MAX_SLIDE_ITERATIONS`] iterations or until the
    /// remaining fraction is consumed.
    pub(super) fn step_forward_and_strafe(&mut self, world: &mut dyn CollisionWorld, walk_move: Vec3) {
        self.target_position = self.current_position + walk_move;

        // The proxy is swept with an enlarged margin to reduce tunneling at
        // glancing angles.
        let inflated = self.shape.inflated(self.config.added_margin);
        let filter = self.sweep_filter(world);

        let mut fraction = 1.0_f32;
        let mut iterations = 0;
        while fraction > MIN_SLIDE_FRACTION && iterations < MAX_SLIDE_ITERATIONS {
            iterations += 1;

            let start = Transform::new(self.current_position, self.current_orientation);
            let end = Transform::new(self.target_position, self.target_orientation);

            match self.sweep_checked(world, &inflated, &start, &end, &filter) {
                Some(hit) => {
                    fraction -= hit.fraction;

                    self.deflect_target_along_surface(hit.normal, 0.0, 1.0);

                    let current_dir = self.target_position - self.current_position;
                    if current_dir.norm_squared() <= MIN_MOVE_SQ {
                        break;
                    }
                    let current_dir = current_dir / current_dir.norm();
                    // See Quake2: "If velocity is against original velocity,
                    // stop dead to avoid tiny oscillations in sloping
                    // corners."
                    if current_dir.dot(&self.normalized_direction) <= 0.0 {
                        break;
                    }
                }
                None => {
                    self.current_position = self.target_position;
                    break;
                }
            }
        }
    }

    /// Redirect the remaining movement along the surface with `hit_normal`.
    ///
    /// The reflection of the movement direction is decomposed into components
    /// parallel and perpendicular to the normal; the perpendicular part
    /// produces the slide. The tangential term is kept in the contract but
    /// contributes zero with the default coefficient.
    pub(super) fn deflect_target_along_surface(
        &mut self,
        hit_normal: Vec3,
        tangent_mag: f32,
        normal_mag: f32,
    ) {
        let movement = self.target_position - self.current_position;
        let movement_length = movement.norm();
        if movement_length <= DIST_EPS {
            return;
        }
        let movement_direction = movement / movement_length;

        let reflect_dir = crate::types::normalized_or_zero(reflection_direction(
            movement_direction,
            hit_normal,
        ));
        let parallel_dir = parallel_component(reflect_dir, hit_normal);
        let perpendicular_dir = perpendicular_component(reflect_dir, hit_normal);

        self.target_position = self.current_position;
        if tangent_mag != 0.0 {
            self.target_position += parallel_dir * (tangent_mag * movement_length);
        }
        if normal_mag != 0.0 {
            self.target_position += perpendicular_dir * (normal_mag * movement_length);
        }
    }

    /// Phase 3: settle onto ground or fall. No-op while rising.
    pub(super) fn step_down(&mut self, world: &mut dyn CollisionWorld, dt: f32) {
        if self.vertical_velocity > 0.0 {
            return;
        }

        let original_target = self.target_position;

        let mut down_velocity = (-self.vertical_velocity).max(0.0) * dt;
        if down_velocity > 0.0
            && down_velocity > self.config.fall_speed
            && (self.was_on_ground || !self.was_jumping)
        {
            down_velocity = self.config.fall_speed;
        }

        let mut step_drop = self.up * (self.current_step_offset + down_velocity);
        self.target_position -= step_drop;

        let filter = self
            .sweep_filter(world)
            .with_slope(self.up, self.max_slope_cosine);
        let proxy_responds = world.body_info(self.proxy).has_response;

        let mut ran_once = false;
        let primary: Option<SweepHit> = loop {
            let start = Transform::new(self.current_position, self.current_orientation);
            let end = Transform::new(self.target_position, self.target_orientation);
            // Probe twice the drop to tell a small stair drop (snap to it)
            // from a genuine fall (interpolate smoothly).
            let end_double =
                Transform::new(self.target_position - step_drop, self.target_orientation);

            let primary = self.sweep_checked(world, &self.shape, &start, &end, &filter);
            let secondary = if primary.is_none() && proxy_responds {
                self.sweep_checked(world, &self.shape, &start, &end_double, &filter)
            } else {
                None
            };

            let down_velocity2 = (-self.vertical_velocity).max(0.0) * dt;
            let has_hit = if self.config.bounce_fix {
                proxy_responds && (primary.is_some() || secondary.is_some())
            } else {
                proxy_responds && secondary.is_some()
            };

            let step_height = if self.vertical_velocity < 0.0 {
                self.config.step_height
            } else {
                0.0
            };

            if down_velocity2 > 0.0
                && down_velocity2 < step_height
                && has_hit
                && !ran_once
                && (self.was_on_ground || !self.was_jumping)
            {
                // Redo the drop with the full step height: crisp stepping
                // down stairs instead of a floaty partial fall. One retry
                // only.
                self.target_position = original_target;
                down_velocity = step_height;
                step_drop = self.up * (self.current_step_offset + down_velocity);
                self.target_position -= step_drop;
                ran_once = true;
                continue;
            }
            break primary;
        };

        if (proxy_responds && primary.is_some()) || ran_once {
            // We dropped a fraction of the height: hit floor.
            let geometric_fraction = primary.map_or(1.0, |h| h.fraction);
            let fraction = if self.config.bounce_fix && !self.full_drop {
                // The hit fraction is inaccurate on large polygons; derive it
                // from the vertical gap to the hit point instead.
                primary.map_or(geometric_fraction, |h| {
                    (self.current_position - h.point).dot(&self.up) / 2.0
                })
            } else {
                geometric_fraction
            };
            self.current_position += (self.target_position - self.current_position) * fraction;

            self.full_drop = false;
            self.vertical_velocity = 0.0;
            self.vertical_offset = 0.0;
            self.was_jumping = false;
            self.on_ground = true;
        } else {
            // We dropped the full height.
            self.full_drop = true;

            if self.config.bounce_fix {
                down_velocity = (-self.vertical_velocity).max(0.0) * dt;
                if down_velocity > self.config.fall_speed
                    && (self.was_on_ground || !self.was_jumping)
                {
                    // Undo the previous target change and re-clamp to the
                    // terminal fall speed.
                    self.target_position += step_drop;
                    down_velocity = self.config.fall_speed;
                    step_drop = self.up * (self.current_step_offset + down_velocity);
                    self.target_position -= step_drop;
                }
            }

            self.current_position = self.target_position;
        }
    }
}

/// Reflection of a ray going `direction` hitting a surface with `normal`.
pub(super) fn reflection_direction(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - normal * (2.0 * direction.dot(&normal))
}

/// The portion of `direction` that is parallel to `normal`.
pub(super) fn parallel_component(direction: Vec3, normal: Vec3) -> Vec3 {
    normal * direction.dot(&normal)
}

/// The portion of `direction` that is perpendicular to `normal`.
pub(super) fn perpendicular_component(direction: Vec3, normal: Vec3) -> Vec3 {
    direction - parallel_component(direction, normal)
}
