/*!
Core math types shared by the world and character submodules.

This module intentionally contains no algorithms. It defines the data types
exchanged between:
- world (collision world contract, broad/narrow phase, reference world)
- character (velocity integration, stepping stages, penetration recovery)

Conventions
- Units are meters, time in seconds.
- Rotations are unit quaternions.
- The character proxy shape is convex; infinite planes exist only as world
  bodies.
*/

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Transform with the given translation and identity rotation.
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::identity(),
        }
    }

    /// Convert to nalgebra `Isometry3` for use with parry3d queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(
            na::Translation3::new(self.translation.x, self.translation.y, self.translation.z),
            self.rotation,
        )
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Self {
        Self::from_translation(Vec3::zeros())
    }
}

/// Convex shapes usable as a character proxy and sweep volume.
///
/// Capsules and cylinders of revolution are Y-aligned in local space, so the
/// total capsule height is `2 * half_height + 2 * radius`.
#[derive(Clone, Copy, Debug)]
pub enum ConvexShape {
    Capsule {
        /// Radius of the spherical caps and cylinder (meters).
        radius: f32,
        /// Half of the cylinder length along the local +Y axis.
        half_height: f32,
    },
    Ball {
        radius: f32,
    },
    Cuboid {
        /// Local-space half-extents (hx, hy, hz).
        half_extents: Vec3,
    },
}

impl ConvexShape {
    /// Grow the shape uniformly by a collision margin.
    ///
    /// Used to temporarily enlarge the proxy during the forward sweep, which
    /// reduces tunneling at glancing angles. A non-positive margin returns
    /// the shape unchanged.
    #[inline]
    pub fn inflated(&self, margin: f32) -> Self {
        if margin <= 0.0 {
            return *self;
        }
        match *self {
            Self::Capsule {
                radius,
                half_height,
            } => Self::Capsule {
                radius: radius + margin,
                half_height,
            },
            Self::Ball { radius } => Self::Ball {
                radius: radius + margin,
            },
            Self::Cuboid { half_extents } => Self::Cuboid {
                half_extents: half_extents.add_scalar(margin),
            },
        }
    }
}

/// Normalize `v`, substituting zero for degenerate inputs instead of
/// propagating a division by (near) zero.
#[inline]
pub fn normalized_or_zero(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > f32::EPSILON * f32::EPSILON {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_or_zero_guards_degenerate_vectors() {
        assert_eq!(normalized_or_zero(Vec3::zeros()), Vec3::zeros());

        let n = normalized_or_zero(Vec3::new(3.0, 0.0, 4.0));
        assert!((n.norm() - 1.0).abs() < 1.0e-6);
        assert!((n.x - 0.6).abs() < 1.0e-6);
    }

    #[test]
    fn inflation_grows_every_variant() {
        let c = ConvexShape::Capsule {
            radius: 0.3,
            half_height: 0.6,
        };
        match c.inflated(0.02) {
            ConvexShape::Capsule {
                radius,
                half_height,
            } => {
                assert!((radius - 0.32).abs() < 1.0e-6);
                assert!((half_height - 0.6).abs() < 1.0e-6);
            }
            _ => panic!("variant changed by inflation"),
        }

        // Zero and negative margins are no-ops.
        match c.inflated(-1.0) {
            ConvexShape::Capsule { radius, .. } => assert!((radius - 0.3).abs() < 1.0e-6),
            _ => panic!("variant changed by inflation"),
        }
    }

    #[test]
    fn transform_iso_round_trips_translation() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let iso = t.iso();
        let p = iso.transform_point(&na::Point3::origin());
        assert!((p.coords - t.translation).norm() < 1.0e-6);
    }
}
