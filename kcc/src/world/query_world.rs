/*!
Self-contained collision world for character locomotion.

[`QueryWorld`] implements the [`CollisionWorld`] contract over an insert-only
body set:

- Deterministic: given the same insertion order, queries behave identically.
- Query-focused: supports sweeps, discrete contacts and force accumulation;
  it does not integrate dynamics (body velocities are data, consumed by the
  controller's platform inheritance).
- Lazy broad-phase updates: `set_transform` moves a body without touching
  its cached bounds or overlap pairs; only `refresh_bounds` recomputes them.
  Sweeps prune candidates through a BVH over the cached bounds, with
  infinite planes always tested.
*/

use parry3d::bounding_volume::Aabb;

use super::{
    BodyHandle, BodyInfo, CollisionFilter, CollisionWorld, ContactPair, ContactPoint, SweepFilter,
    SweepHit, broad, narrow,
};
use crate::settings::{BROAD_PHASE_MARGIN, CONTACT_PREDICTION, MIN_MOVE_SQ};
use crate::types::{ConvexShape, Transform, Vec3};

/// Shapes a world body can carry.
///
/// Planes are infinite half-space boundaries described directly in world
/// space by `normal ⋅ x = dist`; their body transform is ignored.
#[derive(Clone, Copy, Debug)]
pub enum BodyShape {
    Plane {
        /// World-space unit normal of the plane.
        normal: Vec3,
        /// Plane offset along the normal.
        dist: f32,
    },
    Convex(ConvexShape),
}

/// Everything needed to insert a body into a [`QueryWorld`].
#[derive(Clone, Copy, Debug)]
pub struct BodyDesc {
    pub shape: BodyShape,
    pub transform: Transform,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub filter: CollisionFilter,
    pub has_response: bool,
    pub is_dynamic: bool,
}

impl BodyDesc {
    /// A fixed (static, non-dynamic) body with identity pose and the default
    /// filter.
    pub fn fixed(shape: BodyShape) -> Self {
        Self {
            shape,
            transform: Transform::default(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            filter: CollisionFilter::default(),
            has_response: true,
            is_dynamic: false,
        }
    }

    pub fn at(mut self, translation: Vec3) -> Self {
        self.transform.translation = translation;
        self
    }

    pub fn with_velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn without_response(mut self) -> Self {
        self.has_response = false;
        self
    }
}

/// A body tracked by a [`QueryWorld`].
#[derive(Clone, Debug)]
pub struct Body {
    shape: BodyShape,
    transform: Transform,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    filter: CollisionFilter,
    has_response: bool,
    is_dynamic: bool,
    /// World AABB as of the last bounds refresh; `None` for planes.
    cached_aabb: Option<Aabb>,
    /// Overlap-pair cache as of the last bounds refresh.
    overlaps: Vec<BodyHandle>,
    force: Vec3,
    torque: Vec3,
}

impl Body {
    fn new(desc: BodyDesc) -> Self {
        let cached_aabb = body_aabb(&desc.shape, &desc.transform);
        Self {
            shape: desc.shape,
            transform: desc.transform,
            linear_velocity: desc.linear_velocity,
            angular_velocity: desc.angular_velocity,
            filter: desc.filter,
            has_response: desc.has_response,
            is_dynamic: desc.is_dynamic,
            cached_aabb,
            overlaps: Vec::new(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
        }
    }

    #[inline]
    pub fn shape(&self) -> &BodyShape {
        &self.shape
    }

    #[inline]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Net force accumulated through [`CollisionWorld::apply_force`].
    #[inline]
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    /// Net torque (about the body origin) accumulated through
    /// [`CollisionWorld::apply_force`].
    #[inline]
    pub fn accumulated_torque(&self) -> Vec3 {
        self.torque
    }
}

fn body_aabb(shape: &BodyShape, transform: &Transform) -> Option<Aabb> {
    match shape {
        BodyShape::Plane { .. } => None,
        BodyShape::Convex(convex) => Some(broad::shape_aabb(convex, &transform.iso())),
    }
}

/// Does `aabb` reach the solid side of the plane `normal ⋅ x = dist`?
fn aabb_touches_plane(aabb: &Aabb, normal: Vec3, dist: f32, margin: f32) -> bool {
    // Lowest corner projection along the plane normal.
    let mut lowest = 0.0;
    for i in 0..3 {
        lowest += (normal[i] * aabb.mins[i]).min(normal[i] * aabb.maxs[i]);
    }
    lowest <= dist + margin
}

pub struct QueryWorld {
    bodies: Vec<Body>,
    accel: broad::WorldAccel,
}

impl Default for QueryWorld {
    fn default() -> Self {
        Self {
            bodies: Vec::new(),
            accel: broad::WorldAccel::build(&[]),
        }
    }
}

impl QueryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a body and return its handle. Bounds are cached immediately.
    pub fn insert(&mut self, desc: BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Body::new(desc));
        self.rebuild_accel();
        handle
    }

    #[inline]
    pub fn body(&self, handle: BodyHandle) -> &Body {
        &self.bodies[handle.index()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    fn rebuild_accel(&mut self) {
        let entries: Vec<(BodyHandle, Option<Aabb>)> = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, b)| (BodyHandle(i as u32), b.cached_aabb))
            .collect();
        self.accel = broad::WorldAccel::build(&entries);
    }
}

impl CollisionWorld for QueryWorld {
    fn sweep(
        &self,
        shape: &ConvexShape,
        start: &Transform,
        end: &Transform,
        filter: &SweepFilter,
    ) -> Option<SweepHit> {
        if self.bodies.is_empty() {
            return None;
        }

        let vel = end.translation - start.translation;
        if vel.norm_squared() <= MIN_MOVE_SQ {
            return None;
        }

        let start_iso = start.iso();
        let swept = broad::swept_shape_aabb(shape, &start_iso, &end.iso(), BROAD_PHASE_MARGIN);

        let mut best: Option<SweepHit> = None;

        // Planes are infinite and always candidates; finite bodies come from
        // the BVH.
        let candidates = self
            .accel
            .planes()
            .iter()
            .copied()
            .chain(self.accel.candidates(&swept));

        for handle in candidates {
            if filter.exclude == Some(handle) {
                continue;
            }
            let body = &self.bodies[handle.index()];
            if !body.has_response {
                continue;
            }
            if !filter.filter.compatible(body.filter) {
                continue;
            }

            let Some(hit) = narrow::cast_convex_against_body(
                shape,
                &start_iso,
                vel,
                1.0,
                &body.shape,
                &body.transform.iso(),
            ) else {
                continue;
            };

            // Slope acceptance: rejecting a hit does not terminate the scan.
            if let Some(slope) = filter.slope {
                if hit.normal.dot(&slope.up) < slope.min_dot {
                    continue;
                }
            }

            if best.map_or(true, |b| hit.fraction < b.fraction) {
                best = Some(SweepHit {
                    body: handle,
                    normal: hit.normal,
                    point: hit.point,
                    fraction: hit.fraction,
                });
            }
        }

        best
    }

    fn overlap_pairs(&self, proxy: BodyHandle) -> Vec<ContactPair> {
        let proxy_body = &self.bodies[proxy.index()];
        let BodyShape::Convex(proxy_shape) = proxy_body.shape else {
            return Vec::new();
        };
        let proxy_iso = proxy_body.transform.iso();

        let mut pairs = Vec::new();
        for &other in &proxy_body.overlaps {
            let body = &self.bodies[other.index()];
            let Some(contact) = narrow::contact_convex_vs_body(
                &proxy_shape,
                &proxy_iso,
                &body.shape,
                &body.transform.iso(),
                CONTACT_PREDICTION,
            ) else {
                continue;
            };

            let local_point = body
                .transform
                .iso()
                .inverse_transform_point(&contact.point.into())
                .coords;

            pairs.push(ContactPair {
                body: other,
                points: vec![ContactPoint {
                    normal: contact.normal,
                    point: contact.point,
                    local_point,
                    dist: contact.dist,
                }],
            });
        }
        pairs
    }

    fn transform(&self, body: BodyHandle) -> Transform {
        self.bodies[body.index()].transform
    }

    fn set_transform(&mut self, body: BodyHandle, transform: Transform) {
        self.bodies[body.index()].transform = transform;
    }

    fn refresh_bounds(&mut self, body: BodyHandle) {
        let idx = body.index();
        self.bodies[idx].cached_aabb =
            body_aabb(&self.bodies[idx].shape, &self.bodies[idx].transform);
        self.rebuild_accel();

        // Recompute the overlap-pair cache against the other bodies' cached
        // bounds (which may themselves be stale; that is the contract).
        let Some(own) = self.bodies[idx].cached_aabb else {
            self.bodies[idx].overlaps.clear();
            return;
        };
        let mut inflated = own;
        inflated.mins = inflated.mins - Vec3::repeat(BROAD_PHASE_MARGIN);
        inflated.maxs = inflated.maxs + Vec3::repeat(BROAD_PHASE_MARGIN);

        let mut overlaps = Vec::new();
        for (i, other) in self.bodies.iter().enumerate() {
            if i == idx {
                continue;
            }
            let touching = match (&other.shape, other.cached_aabb) {
                (BodyShape::Plane { normal, dist }, _) => {
                    aabb_touches_plane(&inflated, *normal, *dist, 0.0)
                }
                (_, Some(aabb)) => broad::aabb_intersects(&inflated, &aabb),
                (_, None) => false,
            };
            if touching {
                overlaps.push(BodyHandle(i as u32));
            }
        }
        self.bodies[idx].overlaps = overlaps;
    }

    fn clear_overlaps(&mut self, body: BodyHandle) {
        self.bodies[body.index()].overlaps.clear();
    }

    fn body_info(&self, body: BodyHandle) -> BodyInfo {
        let b = &self.bodies[body.index()];
        BodyInfo {
            origin: b.transform.translation,
            linear_velocity: b.linear_velocity,
            angular_velocity: b.angular_velocity,
            filter: b.filter,
            has_response: b.has_response,
            is_dynamic: b.is_dynamic,
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3, local_point: Vec3) {
        let b = &mut self.bodies[body.index()];
        if !b.is_dynamic {
            return;
        }
        b.force += force;
        let r = b.transform.rotation * local_point;
        b.torque += r.cross(&force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quat;

    fn capsule() -> ConvexShape {
        ConvexShape::Capsule {
            radius: 0.3,
            half_height: 0.6,
        }
    }

    fn floor() -> BodyDesc {
        BodyDesc::fixed(BodyShape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            dist: 0.0,
        })
    }

    fn sweep_down(world: &QueryWorld, filter: &SweepFilter, from: Vec3, dist: f32) -> Option<SweepHit> {
        world.sweep(
            &capsule(),
            &Transform::from_translation(from),
            &Transform::from_translation(from - Vec3::new(0.0, dist, 0.0)),
            filter,
        )
    }

    #[test]
    fn earliest_hit_wins_across_bodies() {
        let mut world = QueryWorld::new();
        let near = world.insert(
            BodyDesc::fixed(BodyShape::Convex(ConvexShape::Cuboid {
                half_extents: Vec3::new(0.5, 0.5, 0.5),
            }))
            .at(Vec3::new(2.0, 0.0, 0.0)),
        );
        let _far = world.insert(
            BodyDesc::fixed(BodyShape::Convex(ConvexShape::Cuboid {
                half_extents: Vec3::new(0.5, 0.5, 0.5),
            }))
            .at(Vec3::new(5.0, 0.0, 0.0)),
        );

        let filter = SweepFilter::new(None, CollisionFilter::default());
        let hit = world
            .sweep(
                &ConvexShape::Ball { radius: 0.3 },
                &Transform::from_translation(Vec3::zeros()),
                &Transform::from_translation(Vec3::new(6.0, 0.0, 0.0)),
                &filter,
            )
            .expect("a body lies on the path");
        assert_eq!(hit.body, near);
        // Contact at x = 1.5 - 0.3, i.e. fraction 0.2 of the 6m sweep.
        assert!((hit.fraction - 0.2).abs() < 1.0e-2);
        assert!(hit.normal.x < -0.99);
    }

    #[test]
    fn slope_threshold_separates_floors_from_walls() {
        // Plane tilted by the given angle around Z: normal = rot * +Y.
        let tilted = |angle: f32| {
            let rot = Quat::from_axis_angle(&nalgebra::Vector3::z_axis(), angle);
            BodyDesc::fixed(BodyShape::Plane {
                normal: rot * Vec3::new(0.0, 1.0, 0.0),
                dist: 0.0,
            })
        };
        let min_dot = std::f32::consts::FRAC_PI_4.cos();
        let up = Vec3::new(0.0, 1.0, 0.0);

        let mut gentle = QueryWorld::new();
        gentle.insert(tilted(30.0_f32.to_radians()));
        let filter = SweepFilter::new(None, CollisionFilter::default()).with_slope(up, min_dot);
        assert!(sweep_down(&gentle, &filter, Vec3::new(0.0, 3.0, 0.0), 3.0).is_some());

        let mut steep = QueryWorld::new();
        steep.insert(tilted(60.0_f32.to_radians()));
        assert!(sweep_down(&steep, &filter, Vec3::new(0.0, 3.0, 0.0), 3.0).is_none());

        // Without the slope threshold the steep surface is still a hit.
        let plain = SweepFilter::new(None, CollisionFilter::default());
        assert!(sweep_down(&steep, &plain, Vec3::new(0.0, 3.0, 0.0), 3.0).is_some());
    }

    #[test]
    fn sweeps_skip_excluded_and_unresponsive_bodies() {
        let mut world = QueryWorld::new();
        let ghost = world.insert(floor().without_response());
        let filter = SweepFilter::new(None, CollisionFilter::default());
        assert!(sweep_down(&world, &filter, Vec3::new(0.0, 2.0, 0.0), 3.0).is_none());

        let solid = world.insert(floor());
        assert!(sweep_down(&world, &filter, Vec3::new(0.0, 2.0, 0.0), 3.0).is_some());

        let excluding = SweepFilter::new(Some(solid), CollisionFilter::default());
        assert!(sweep_down(&world, &excluding, Vec3::new(0.0, 2.0, 0.0), 3.0).is_none());
        let _ = ghost;
    }

    #[test]
    fn overlap_pairs_follow_bounds_refresh_not_set_transform() {
        let mut world = QueryWorld::new();
        let wall = world.insert(
            BodyDesc::fixed(BodyShape::Convex(ConvexShape::Cuboid {
                half_extents: Vec3::new(0.5, 1.0, 1.0),
            }))
            .at(Vec3::new(5.0, 0.0, 0.0)),
        );
        let proxy = world.insert(BodyDesc::fixed(BodyShape::Convex(capsule())));
        world.refresh_bounds(proxy);
        assert!(world.overlap_pairs(proxy).is_empty());

        // Teleport into the wall without refreshing: the pair cache is stale
        // and reports nothing.
        world.set_transform(proxy, Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert!(world.overlap_pairs(proxy).is_empty());

        // After a refresh the penetrating contact appears, with the normal
        // pointing from the wall toward the proxy.
        world.refresh_bounds(proxy);
        let pairs = world.overlap_pairs(proxy);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].body, wall);
        assert!(pairs[0].points[0].dist < 0.0);

        world.clear_overlaps(proxy);
        assert!(world.overlap_pairs(proxy).is_empty());
    }

    #[test]
    fn forces_accumulate_on_dynamic_bodies_only() {
        let mut world = QueryWorld::new();
        let crate_body = world.insert(
            BodyDesc::fixed(BodyShape::Convex(ConvexShape::Cuboid {
                half_extents: Vec3::new(0.5, 0.5, 0.5),
            }))
            .dynamic(),
        );
        let rock = world.insert(BodyDesc::fixed(BodyShape::Convex(ConvexShape::Ball {
            radius: 1.0,
        })));

        world.apply_force(crate_body, Vec3::new(1.0, 0.0, 0.0), Vec3::zeros());
        world.apply_force(crate_body, Vec3::new(1.0, 0.0, 0.0), Vec3::zeros());
        world.apply_force(rock, Vec3::new(7.0, 0.0, 0.0), Vec3::zeros());

        assert!((world.body(crate_body).accumulated_force().x - 2.0).abs() < 1.0e-6);
        assert_eq!(world.body(rock).accumulated_force(), Vec3::zeros());
    }
}
