/*!
Collision world contract and query data types.

The character controller never talks to a physics engine directly. It
consumes the [`CollisionWorld`] trait, which captures the four primitives the
locomotion pipeline needs from whatever engine hosts it:

- swept-shape queries along a path, returning the earliest accepted hit;
- discrete overlap/contact data for a tracked proxy;
- read/write access to the proxy's world transform (broad-phase state is
  updated lazily: `set_transform` alone does not refresh bounds);
- force application on dynamic bodies.

The world reference is passed explicitly into every stage call; nothing in
this crate holds a global or a singleton. [`QueryWorld`] is a self-contained
implementation of the trait used by the test suite and by embeddings that do
not bring their own engine.
*/

pub mod broad;
pub mod narrow;
pub mod query_world;

pub use query_world::{Body, BodyDesc, BodyShape, QueryWorld};

use crate::types::{ConvexShape, Transform, Vec3};

/// Copyable identifier of a body (or the character proxy) inside a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub u32);

impl BodyHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bitmask collision filter. Two bodies need collision handling iff their
/// group/mask pairs are mutually compatible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionFilter {
    pub group: u32,
    pub mask: u32,
}

impl CollisionFilter {
    /// Bidirectional group/mask test: both directions must overlap.
    #[inline]
    pub fn compatible(self, other: CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}

impl Default for CollisionFilter {
    #[inline]
    fn default() -> Self {
        Self {
            group: 1,
            mask: u32::MAX,
        }
    }
}

/// Optional slope acceptance for sweep queries: hits whose surface normal
/// satisfies `normal · up < min_dot` are rejected (walls and ceilings, for a
/// positive threshold) without terminating the scan.
#[derive(Clone, Copy, Debug)]
pub struct SlopeFilter {
    pub up: Vec3,
    pub min_dot: f32,
}

/// The single sweep filter configuration used by every query in the
/// locomotion pipeline: self-exclusion, the proxy's collision filter, and an
/// optional slope threshold.
#[derive(Clone, Copy, Debug)]
pub struct SweepFilter {
    /// Body to ignore (the querying proxy itself).
    pub exclude: Option<BodyHandle>,
    /// Filter of the querying proxy; candidates failing the bidirectional
    /// group/mask test are skipped.
    pub filter: CollisionFilter,
    /// Optional surface-slope acceptance threshold.
    pub slope: Option<SlopeFilter>,
}

impl SweepFilter {
    #[inline]
    pub fn new(exclude: Option<BodyHandle>, filter: CollisionFilter) -> Self {
        Self {
            exclude,
            filter,
            slope: None,
        }
    }

    /// Reject hits whose normal is not within the slope limit of `up`.
    #[inline]
    pub fn with_slope(mut self, up: Vec3, min_dot: f32) -> Self {
        self.slope = Some(SlopeFilter { up, min_dot });
        self
    }
}

/// Earliest blocking contact returned by a sweep query.
#[derive(Clone, Copy, Debug)]
pub struct SweepHit {
    /// The body that was hit.
    pub body: BodyHandle,
    /// World-space surface normal on the hit body, pointing back toward the
    /// swept shape.
    pub normal: Vec3,
    /// World-space hit point on the hit body.
    pub point: Vec3,
    /// Fraction (0..1) of the swept translation where the hit occurred.
    pub fraction: f32,
}

/// One discrete contact point between the proxy and another body.
#[derive(Clone, Copy, Debug)]
pub struct ContactPoint {
    /// World-space contact normal, pointing from the other body toward the
    /// proxy.
    pub normal: Vec3,
    /// World-space contact point on the other body.
    pub point: Vec3,
    /// Contact point in the other body's local frame.
    pub local_point: Vec3,
    /// Signed separation distance; negative means penetration.
    pub dist: f32,
}

/// Contact manifold between the proxy and one overlap partner.
///
/// Pairs are reported unfiltered; callers apply the needs-collision
/// predicate ([`CollisionFilter::compatible`] plus contact-response checks).
#[derive(Clone, Debug)]
pub struct ContactPair {
    pub body: BodyHandle,
    pub points: Vec<ContactPoint>,
}

/// Per-body data the locomotion pipeline reads for filtering, platform
/// inheritance and reaction forces.
#[derive(Clone, Copy, Debug)]
pub struct BodyInfo {
    /// World-space origin of the body's transform.
    pub origin: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub filter: CollisionFilter,
    /// Whether the body participates in collision response. Bodies without
    /// response are invisible to sweeps.
    pub has_response: bool,
    /// Dynamic bodies can receive reaction forces; static/kinematic ones
    /// cannot.
    pub is_dynamic: bool,
}

/// The collision/physics engine contract consumed by the controller.
pub trait CollisionWorld {
    /// Continuous sweep of `shape` from `start` to `end`, returning the
    /// earliest hit accepted by `filter`, if any.
    fn sweep(
        &self,
        shape: &ConvexShape,
        start: &Transform,
        end: &Transform,
        filter: &SweepFilter,
    ) -> Option<SweepHit>;

    /// Discrete contact manifolds for every cached overlap partner of
    /// `proxy`, evaluated against live transforms.
    fn overlap_pairs(&self, proxy: BodyHandle) -> Vec<ContactPair>;

    fn transform(&self, body: BodyHandle) -> Transform;

    /// Move a body without refreshing its broad-phase bounds. Overlap pairs
    /// stay stale until [`CollisionWorld::refresh_bounds`] runs.
    fn set_transform(&mut self, body: BodyHandle, transform: Transform);

    /// Recompute the body's bounding volume and overlap-pair cache from its
    /// current transform.
    fn refresh_bounds(&mut self, body: BodyHandle);

    /// Drain the body's overlap-pair cache.
    fn clear_overlaps(&mut self, body: BodyHandle);

    fn body_info(&self, body: BodyHandle) -> BodyInfo;

    /// Accumulate `force` on a dynamic body at a point given in the body's
    /// local frame.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3, local_point: Vec3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_compatibility_requires_both_directions() {
        let a = CollisionFilter {
            group: 0b01,
            mask: 0b10,
        };
        let b = CollisionFilter {
            group: 0b10,
            mask: 0b01,
        };
        assert!(a.compatible(b));
        assert!(b.compatible(a));

        // One-way visibility is not enough.
        let c = CollisionFilter {
            group: 0b10,
            mask: 0b100,
        };
        assert!(!a.compatible(c));

        let d = CollisionFilter {
            group: 0b100,
            mask: 0b01,
        };
        assert!(!a.compatible(d));
    }

    #[test]
    fn default_filter_collides_with_itself() {
        let f = CollisionFilter::default();
        assert!(f.compatible(f));
    }
}
