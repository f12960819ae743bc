//! Math aliases and small primitives shared by every KCC submodule.
//!
//! Mirrors the alias style of the collision module this crate grew out of:
//! a thin, explicit layer over `nalgebra` so call sites read in world units
//! (meters, unit normals) rather than raw matrix/vector types.

use nalgebra as na;

pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Practical epsilon for world-space comparisons (meters, or unitless dot products).
///
/// Machine epsilon is too tight for world-space distances; see §4.4 of the spec.
pub const EPS: f32 = 1.0e-5;

/// A half-space `{ p : dot(normal, p) >= d }`, i.e. "inside" is the side the
/// normal points to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Builds a plane through `point` with the given (assumed unit) `normal`.
    #[inline]
    pub fn through_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            d: normal.dot(&point),
        }
    }

    /// Signed distance from `p` to the plane surface. Positive means inside.
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(&p) - self.d
    }

    /// True if `self` and `other` represent (numerically) the same plane:
    /// parallel normals and matching offset within `eps`.
    #[inline]
    pub fn nearly_equal(&self, other: &Plane, eps: f32) -> bool {
        self.normal.dot(&other.normal) > 1.0 - eps && (self.d - other.d).abs() < eps
    }
}

/// Normalizes `v`, returning `None` for a (numerically) zero vector.
///
/// `Vector3::try_normalize` already expresses this; this wrapper exists so
/// call sites read like the spec's "Normalize (returns failure on zero
/// length)" wording rather than needing to know the nalgebra idiom.
#[inline]
pub fn try_normalize(v: Vec3, eps: f32) -> Option<Vec3> {
    v.try_normalize(eps)
}

/// Componentwise minimum, matching the spec's Vector3 data model.
#[inline]
pub fn min(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
}

/// Componentwise maximum, matching the spec's Vector3 data model.
#[inline]
pub fn max(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
}

/// Projects `v` onto the direction `axis` (assumed unit).
#[inline]
pub fn project_onto(v: Vec3, axis: Vec3) -> Vec3 {
    axis * v.dot(&axis)
}

/// Removes the component of `v` along `axis` (assumed unit), leaving the
/// perpendicular remainder.
#[inline]
pub fn reject_from(v: Vec3, axis: Vec3) -> Vec3 {
    v - project_onto(v, axis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_signed_distance_sign() {
        let p = Plane::through_point(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        assert!((p.signed_distance(Vec3::new(0.0, 3.0, 0.0)) - 1.0).abs() < EPS);
        assert!((p.signed_distance(Vec3::new(0.0, 1.0, 0.0)) - -1.0).abs() < EPS);
    }

    #[test]
    fn nearly_equal_planes() {
        let a = Plane::through_point(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let b = Plane::through_point(Vec3::new(0.0, 1.0, 0.0), Vec3::new(5.0, 1.0, -3.0));
        assert!(a.nearly_equal(&b, 1.0e-4));
    }

    #[test]
    fn reject_from_removes_axis_component() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let up = Vec3::new(0.0, 1.0, 0.0);
        let r = reject_from(v, up);
        assert!((r.y).abs() < EPS);
        assert!((r.x - 1.0).abs() < EPS);
        assert!((r.z - 3.0).abs() < EPS);
    }
}
