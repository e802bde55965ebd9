use nalgebra as na;
use parry3d::{
    bounding_volume::Aabb,
    partitioning::{Bvh, BvhBuildStrategy},
};

use super::{BodyHandle, narrow};
use crate::types::{ConvexShape, Iso};

/// Acceleration structure for broad-phase queries over a body set.
///
/// Notes:
/// - Finite bodies are stored as cached world-space AABBs in a BVH. Infinite
///   planes are kept in a separate index list because they have no usable
///   AABB and must always be tested.
/// - `leaf_bodies` maps each BVH leaf back to the owning [`BodyHandle`].
pub struct WorldAccel {
    /// BVH over finite-body AABBs.
    bvh: Bvh,
    /// Handle for each leaf in the BVH above.
    leaf_bodies: Vec<BodyHandle>,
    /// Handles of infinite planes, tested outside the BVH.
    plane_bodies: Vec<BodyHandle>,
}

impl WorldAccel {
    /// Build an accelerator from `(handle, aabb)` entries. An entry with no
    /// AABB is an infinite shape and lands in the plane list.
    pub fn build(entries: &[(BodyHandle, Option<Aabb>)]) -> Self {
        let mut aabbs: Vec<Aabb> = Vec::new();
        let mut leaf_bodies: Vec<BodyHandle> = Vec::new();
        let mut plane_bodies: Vec<BodyHandle> = Vec::new();

        for &(handle, aabb) in entries {
            match aabb {
                Some(aabb) => {
                    aabbs.push(aabb);
                    leaf_bodies.push(handle);
                }
                None => plane_bodies.push(handle),
            }
        }

        Self {
            bvh: Bvh::from_leaves(BvhBuildStrategy::Binned, &aabbs),
            leaf_bodies,
            plane_bodies,
        }
    }

    /// Return true if this accelerator has no finite entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaf_bodies.is_empty()
    }

    /// Number of finite entries (AABBs) in this accelerator.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaf_bodies.len()
    }

    /// Handles of infinite planes; always candidates for any query volume.
    #[inline]
    pub fn planes(&self) -> &[BodyHandle] {
        &self.plane_bodies
    }

    /// Query candidate bodies whose cached AABB intersects `aabb`.
    pub fn candidates(&self, aabb: &Aabb) -> Vec<BodyHandle> {
        self.bvh
            .intersect_aabb(aabb)
            .map(|leaf_idx| self.leaf_bodies[leaf_idx as usize])
            .collect()
    }
}

/// Compute the world-space AABB of a convex shape at `iso`.
#[inline]
pub fn shape_aabb(shape: &ConvexShape, iso: &Iso) -> Aabb {
    narrow::to_parry(shape).as_shape().compute_aabb(iso)
}

/// Compute a swept AABB for a convex shape moving from `start` to `end`.
///
/// The resulting AABB is inflated by `margin` to conservatively include near
/// misses.
pub fn swept_shape_aabb(shape: &ConvexShape, start: &Iso, end: &Iso, margin: f32) -> Aabb {
    let aabb_start = shape_aabb(shape, start);
    let aabb_end = shape_aabb(shape, end);

    let mut swept = aabb_union(&aabb_start, &aabb_end);
    if margin > 0.0 {
        swept = aabb_inflate(&swept, margin);
    }
    swept
}

/// Compute the union of two AABBs.
fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    let min = na::Point3::new(
        a.mins.x.min(b.mins.x),
        a.mins.y.min(b.mins.y),
        a.mins.z.min(b.mins.z),
    );
    let max = na::Point3::new(
        a.maxs.x.max(b.maxs.x),
        a.maxs.y.max(b.maxs.y),
        a.maxs.z.max(b.maxs.z),
    );
    Aabb {
        mins: min,
        maxs: max,
    }
}

/// Test two AABBs for intersection.
pub(crate) fn aabb_intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

/// Inflate an AABB by `margin` on all sides.
fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = na::Vector3::new(margin, margin, margin);
    Aabb {
        mins: a.mins - delta,
        maxs: a.maxs + delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso_at(x: f32, y: f32, z: f32) -> Iso {
        Iso::translation(x, y, z)
    }

    #[test]
    fn candidates_include_only_overlapping_aabbs() {
        let ball = ConvexShape::Ball { radius: 0.5 };
        let near = shape_aabb(&ball, &iso_at(1.0, 0.0, 0.0));
        let far = shape_aabb(&ball, &iso_at(50.0, 0.0, 0.0));

        let accel = WorldAccel::build(&[
            (BodyHandle(0), Some(near)),
            (BodyHandle(1), Some(far)),
            (BodyHandle(2), None),
        ]);
        assert_eq!(accel.len(), 2);
        assert_eq!(accel.planes(), &[BodyHandle(2)]);

        let query = swept_shape_aabb(
            &ConvexShape::Capsule {
                radius: 0.3,
                half_height: 0.6,
            },
            &iso_at(0.0, 0.0, 0.0),
            &iso_at(2.0, 0.0, 0.0),
            0.1,
        );
        let hits = accel.candidates(&query);
        assert!(hits.contains(&BodyHandle(0)));
        assert!(!hits.contains(&BodyHandle(1)));
    }

    #[test]
    fn swept_aabb_covers_both_endpoints() {
        let shape = ConvexShape::Ball { radius: 0.25 };
        let swept = swept_shape_aabb(&shape, &iso_at(0.0, 0.0, 0.0), &iso_at(0.0, -3.0, 0.0), 0.0);

        // Start top and end bottom are both inside.
        assert!(swept.maxs.y >= 0.25 - 1.0e-6);
        assert!(swept.mins.y <= -3.25 + 1.0e-6);
        assert!((swept.maxs.x - 0.25).abs() < 1.0e-5);
    }

    #[test]
    fn empty_accel_yields_no_candidates() {
        let accel = WorldAccel::build(&[]);
        assert!(accel.is_empty());

        let probe = shape_aabb(&ConvexShape::Ball { radius: 1.0 }, &iso_at(0.0, 0.0, 0.0));
        assert!(accel.candidates(&probe).is_empty());
    }
}
