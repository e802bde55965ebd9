use log::debug;

use super::controller::CharacterController;
use crate::settings::{MAX_RECOVERY_ITERATIONS, MIN_MOVE_SQ, REACTION_FORCE_SCALE, RECOVERY_FRACTION};
use crate::types::{ConvexShape, Transform};
use crate::world::{CollisionWorld, SweepFilter, SweepHit};

impl CharacterController {
    /// Sweep filter for the proxy: self-exclusion plus the proxy's collision
    /// filter. Slope acceptance is added per call site.
    pub(super) fn sweep_filter(&self, world: &dyn CollisionWorld) -> SweepFilter {
        SweepFilter::new(Some(self.proxy), world.body_info(self.proxy).filter)
    }

    /// Sweep wrapper that skips degenerate zero-length queries, which are
    /// meaningless to the collision engine.
    pub(super) fn sweep_checked(
        &self,
        world: &dyn CollisionWorld,
        shape: &ConvexShape,
        start: &Transform,
        end: &Transform,
        filter: &SweepFilter,
    ) -> Option<SweepHit> {
        if (end.translation - start.translation).norm_squared() <= MIN_MOVE_SQ
            && start.rotation == end.rotation
        {
            return None;
        }
        world.sweep(shape, start, end, filter)
    }

    /// Detect the standing surface and adopt its velocity at the contact
    /// point, which is what lets the character ride moving and rotating
    /// platforms.
    pub(super) fn inherit_platform_velocity(&mut self, world: &mut dyn CollisionWorld, dt: f32) {
        let start_vec = self.current_position + self.external_velocity * dt * 0.5;

        let start = Transform::new(start_vec, self.current_orientation);
        let end = Transform::new(
            start_vec - self.up * self.config.step_height,
            self.current_orientation,
        );
        let filter = self
            .sweep_filter(world)
            .with_slope(self.up, self.max_slope_cosine);

        let Some(hit) = self.sweep_checked(world, &self.shape, &start, &end, &filter) else {
            return;
        };
        if hit.normal.dot(&self.up) <= 0.0 {
            return;
        }

        let info = world.body_info(hit.body);
        let local_position = hit.point - info.origin;

        // Rigid-body point velocity: v + ω × r.
        self.external_velocity = info.angular_velocity.cross(&local_position) + info.linear_velocity;
        self.on_ground = true;
    }

    /// One discrete push-out pass. Returns whether any correction was made.
    pub(super) fn recover_from_penetration(&mut self, world: &mut dyn CollisionWorld) -> bool {
        // The stepping stages move the proxy with bare transform writes, so
        // its pair cache is stale. Refresh it first or contact generation
        // operates on the pairs of the previous tick and the next sweep gets
        // stuck.
        world.refresh_bounds(self.proxy);

        self.current_position = world.transform(self.proxy).translation;

        let proxy_info = world.body_info(self.proxy);
        let mut penetration = false;

        for pair in world.overlap_pairs(self.proxy) {
            let info = world.body_info(pair.body);
            if !proxy_info.has_response || !info.has_response {
                continue;
            }
            if !proxy_info.filter.compatible(info.filter) {
                continue;
            }

            for point in &pair.points {
                if point.dist < -self.config.max_penetration_depth {
                    self.current_position +=
                        point.normal * (-point.dist) * RECOVERY_FRACTION;
                    penetration = true;
                }
            }
        }

        let t = world.transform(self.proxy);
        world.set_transform(self.proxy, Transform::new(self.current_position, t.rotation));

        penetration
    }

    /// Run recovery passes until clean or the iteration cap is reached.
    /// Residual penetration past the cap is accepted, not retried.
    pub(super) fn resolve_penetrations(&mut self, world: &mut dyn CollisionWorld) {
        let mut passes = 0;
        while self.recover_from_penetration(world) {
            passes += 1;
            if passes > MAX_RECOVERY_ITERATIONS {
                debug!("character could not recover from penetration after {passes} passes");
                break;
            }
        }
    }

    /// Push dynamic bodies the character is walking into. This is an ad-hoc
    /// contact force, not a derived friction model.
    pub(super) fn push_dynamic_contacts(&mut self, world: &mut dyn CollisionWorld) {
        for pair in world.overlap_pairs(self.proxy) {
            let info = world.body_info(pair.body);
            if !info.is_dynamic {
                continue;
            }

            for point in &pair.points {
                if point.dist < 0.0 {
                    let force = self.walk_direction.component_mul(&point.normal)
                        * (-REACTION_FORCE_SCALE * self.current_speed);
                    world.apply_force(pair.body, force, point.local_point);
                }
            }
        }
    }
}
