//! Core data types shared by the collision cache, bounds builder, solver and
//! slide phases. Intentionally free of algorithms — see §3 of the spec.

use crate::math::{Plane, Quat, Vec3};

/// A capsule collision shape whose axis is always the KCC's `up_vector`.
///
/// `height` includes both hemispherical caps; `height >= 2.0 * radius` is an
/// invariant enforced by the controller's setters, not by this type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    pub height: f32,
}

impl Capsule {
    #[inline]
    pub fn new(radius: f32, height: f32) -> Self {
        Self { radius, height }
    }

    /// Half of the cylindrical section's length (the capsule minus its two caps).
    #[inline]
    pub fn half_height_cylinder(&self) -> f32 {
        (self.height * 0.5 - self.radius).max(0.0)
    }
}

/// A rigid-body pose. Rotation is constrained by the external simulator to
/// keep the capsule axis collinear with `up_vector`; this type carries the
/// full orientation anyway since `Body::pose` is the simulator's own notion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    #[inline]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    #[inline]
    pub fn identity_at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::identity(),
        }
    }
}

/// A single contact as reported by the external collision world between two
/// bodies A and B (A is conventionally the CC body in this crate's usage).
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    pub position_world: Vec3,
    pub position_a_local: Vec3,
    pub position_b_local: Vec3,
    /// Points from A to B.
    pub normal: Vec3,
    pub penetration_depth: f32,
    pub feature_a: u32,
    pub feature_b: u32,
}

/// A contact flattened into the CC's own local reference frame, as stored in
/// the `ContactCache` for one movement step.
#[derive(Clone, Copy, Debug)]
pub struct CcContact {
    pub position_local: Vec3,
    /// Points away from the obstacle, toward the CC.
    pub normal_toward_cc: Vec3,
    pub penetration_depth: f32,
}

/// A bounding half-space derived from a contact. Stored in a flat,
/// priority-ordered list by `BoundsBuilder` (blocking planes first).
pub type Bound = Plane;
