use nalgebra as na;
use parry3d::{
    query::{self, ShapeCastOptions},
    shape as pshape,
};

use super::query_world::BodyShape;
use crate::types::{ConvexShape, Iso, Vec3};

/// Concrete parry3d shape for a [`ConvexShape`], kept on the stack so casts
/// don't allocate.
pub(crate) enum ParryConvex {
    Capsule(pshape::Capsule),
    Ball(pshape::Ball),
    Cuboid(pshape::Cuboid),
}

impl ParryConvex {
    #[inline]
    pub fn as_shape(&self) -> &dyn pshape::Shape {
        match self {
            Self::Capsule(s) => s,
            Self::Ball(s) => s,
            Self::Cuboid(s) => s,
        }
    }
}

/// Convert a [`ConvexShape`] into its parry3d equivalent (capsules are
/// Y-aligned).
#[inline]
pub(crate) fn to_parry(shape: &ConvexShape) -> ParryConvex {
    match *shape {
        ConvexShape::Capsule {
            radius,
            half_height,
        } => ParryConvex::Capsule(pshape::Capsule::new_y(half_height, radius)),
        ConvexShape::Ball { radius } => ParryConvex::Ball(pshape::Ball::new(radius)),
        ConvexShape::Cuboid { half_extents } => {
            ParryConvex::Cuboid(pshape::Cuboid::new(half_extents))
        }
    }
}

/// A single time-of-impact result from casting a moving convex shape.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CastHit {
    /// World-space surface normal on the hit body, opposing the motion.
    pub normal: Vec3,
    /// World-space hit point at the time of impact.
    pub point: Vec3,
    /// Fraction (0..1) of the tested translation where the hit occurs.
    pub fraction: f32,
}

/// A single discrete contact between a convex shape and a body shape.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BodyContact {
    /// World-space contact normal pointing from the body toward the convex
    /// shape.
    pub normal: Vec3,
    /// World-space contact point on the body.
    pub point: Vec3,
    /// Signed separation distance; negative means penetration.
    pub dist: f32,
}

/// Cast a moving convex shape against one body shape and return the earliest
/// hit, if any.
///
/// - `start`: the moving shape's starting isometry in world space.
/// - `vel`: the world-space translation vector for this cast (meters).
/// - `max_toi`: the maximum fraction of `vel` to consider (typically 1.0).
pub(crate) fn cast_convex_against_body(
    shape: &ConvexShape,
    start: &Iso,
    vel: Vec3,
    max_toi: f32,
    body_shape: &BodyShape,
    body_iso: &Iso,
) -> Option<CastHit> {
    let moving = to_parry(shape);

    match *body_shape {
        BodyShape::Plane { normal, dist } => {
            // Plane: represent as a parry HalfSpace with world normal,
            // positioned at normal * dist. Plane equation: normal ⋅ x = dist.
            let unit_n = na::Unit::new_normalize(normal);
            let plane = pshape::HalfSpace { normal: unit_n };
            let plane_iso = Iso::from_parts(
                na::Translation3::new((normal * dist).x, (normal * dist).y, (normal * dist).z),
                na::UnitQuaternion::identity(),
            );
            cast(start, moving.as_shape(), vel, max_toi, &plane_iso, &plane)
        }
        BodyShape::Convex(convex) => {
            let target = to_parry(&convex);
            cast(start, moving.as_shape(), vel, max_toi, body_iso, target.as_shape())
        }
    }
}

fn cast(
    moving_iso: &Iso,
    moving: &dyn pshape::Shape,
    vel: Vec3,
    max_toi: f32,
    target_iso: &Iso,
    target: &dyn pshape::Shape,
) -> Option<CastHit> {
    let mut opts = ShapeCastOptions::with_max_time_of_impact(max_toi);
    opts.stop_at_penetration = true;

    if let Ok(Some(hit)) = query::cast_shapes(
        moving_iso,
        &vel,
        moving,
        target_iso,
        &na::Vector3::zeros(),
        target,
        opts,
    ) {
        // Witness/normal are reported for the moving shape; bring them into
        // world space at the time of impact.
        let at_impact = Iso::from_parts(
            na::Translation3::from(moving_iso.translation.vector + vel * hit.time_of_impact),
            moving_iso.rotation,
        );

        let outward = at_impact.rotation * hit.normal1.into_inner();

        // A zero-time hit on a surface the motion is leaving (or grazing) is
        // a resting contact, not a blocker.
        if hit.time_of_impact <= 1.0e-6 && vel.dot(&outward) <= 0.0 {
            return None;
        }

        let mut n = outward;
        if n.dot(&vel) > 0.0 {
            n = -n;
        }
        let point = at_impact.transform_point(&hit.witness1);

        return Some(CastHit {
            normal: n,
            point: point.coords,
            fraction: hit.time_of_impact,
        });
    }
    None
}

/// Discrete contact between a convex shape and a body shape.
///
/// Contacts separated by more than `prediction` are not reported.
pub(crate) fn contact_convex_vs_body(
    shape: &ConvexShape,
    iso: &Iso,
    body_shape: &BodyShape,
    body_iso: &Iso,
    prediction: f32,
) -> Option<BodyContact> {
    let convex = to_parry(shape);

    let contact = match *body_shape {
        BodyShape::Plane { normal, dist } => {
            let unit_n = na::Unit::new_normalize(normal);
            let plane = pshape::HalfSpace { normal: unit_n };
            let plane_iso = Iso::from_parts(
                na::Translation3::new((normal * dist).x, (normal * dist).y, (normal * dist).z),
                na::UnitQuaternion::identity(),
            );
            query::contact(iso, convex.as_shape(), &plane_iso, &plane, prediction)
        }
        BodyShape::Convex(other) => {
            let target = to_parry(&other);
            query::contact(iso, convex.as_shape(), body_iso, target.as_shape(), prediction)
        }
    };

    match contact {
        Ok(Some(c)) => Some(BodyContact {
            // normal1 points out of the convex shape toward the body; flip it
            // so the reported normal pushes the convex shape out of the body.
            normal: -c.normal1.into_inner(),
            point: c.point2.coords,
            dist: c.dist,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capsule() -> ConvexShape {
        ConvexShape::Capsule {
            radius: 0.3,
            half_height: 0.6,
        }
    }

    #[test]
    fn downward_cast_onto_floor_reports_upward_normal() {
        // Capsule center 2m above a Y-up floor plane; lowest point at y=1.1.
        let floor = BodyShape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            dist: 0.0,
        };
        let start = Iso::translation(0.0, 2.0, 0.0);
        let vel = Vec3::new(0.0, -2.0, 0.0);

        let hit = cast_convex_against_body(&capsule(), &start, vel, 1.0, &floor, &Iso::identity())
            .expect("floor should be hit");

        // Touchdown after falling 1.1m of the 2m cast.
        assert!((hit.fraction - 0.55).abs() < 1.0e-3);
        assert!(hit.normal.y > 0.99);
        assert!(hit.point.y.abs() < 1.0e-2);
    }

    #[test]
    fn cast_misses_shapes_outside_the_path() {
        let wall = BodyShape::Convex(ConvexShape::Cuboid {
            half_extents: Vec3::new(0.5, 0.5, 0.5),
        });
        let wall_iso = Iso::translation(10.0, 0.0, 0.0);
        let start = Iso::translation(0.0, 0.0, 0.0);
        let vel = Vec3::new(1.0, 0.0, 0.0);

        assert!(cast_convex_against_body(&capsule(), &start, vel, 1.0, &wall, &wall_iso).is_none());
    }

    #[test]
    fn contact_reports_negative_distance_under_penetration() {
        // Ball of radius 0.5 with center 0.3 above the floor: 0.2 penetration.
        let ball = ConvexShape::Ball { radius: 0.5 };
        let floor = BodyShape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            dist: 0.0,
        };
        let iso = Iso::translation(0.0, 0.3, 0.0);

        let c = contact_convex_vs_body(&ball, &iso, &floor, &Iso::identity(), 0.05)
            .expect("penetrating contact expected");
        assert!((c.dist + 0.2).abs() < 1.0e-3);
        // The normal pushes the ball out of the floor (upward).
        assert!(c.normal.y > 0.99);
    }

    #[test]
    fn separated_contact_beyond_prediction_is_none() {
        let ball = ConvexShape::Ball { radius: 0.5 };
        let floor = BodyShape::Plane {
            normal: Vec3::new(0.0, 1.0, 0.0),
            dist: 0.0,
        };
        let iso = Iso::translation(0.0, 1.0, 0.0);

        assert!(contact_convex_vs_body(&ball, &iso, &floor, &Iso::identity(), 0.05).is_none());
    }
}
