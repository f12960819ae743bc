//! External collaborator interfaces (§6 of the spec).
//!
//! The KCC algorithm (`contact_cache`, `ground_classifier`, `bounds`,
//! `simplex_solver`, `slide_phases`, `orchestrator`, `force_effect`) is
//! generic over these traits and never depends on a concrete physics engine.
//! `rapier_backend` is the one concrete implementation shipped in this crate;
//! a host could swap in another collision/rigid-body backend by implementing
//! `CollisionWorld` and `Simulation` themselves.

use crate::math::Vec3;
use crate::types::{Capsule, Contact, Pose};

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    #[inline]
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// Expands this AABB by `radius` on every side, as used by
    /// `ContactCache::collect_obstacles`.
    #[inline]
    pub fn expanded(&self, radius: f32) -> Self {
        let r = Vec3::new(radius, radius, radius);
        Self {
            mins: self.mins - r,
            maxs: self.maxs + r,
        }
    }
}

/// The collision-detection collaborator: broad-phase overlap queries and
/// narrow-phase contact refresh for a set of obstacle pairs.
///
/// `ObjectHandle` identifies a collidable object in the world (the CC body
/// included); `ContactSetHandle` identifies one pooled CC-vs-obstacle pair
/// and its current contact list.
pub trait CollisionWorld {
    type ObjectHandle: Copy + Eq;
    type ContactSetHandle: Copy + Eq;

    /// Objects whose AABB overlaps `aabb`, excluding nothing — callers
    /// (`ContactCache::collect_obstacles`) are responsible for excluding the
    /// CC body itself.
    fn broad_phase_overlaps(&self, aabb: Aabb) -> Vec<Self::ObjectHandle>;

    /// Creates a new pooled contact-set handle for the ordered pair `(a, b)`.
    fn create_contact_set(&mut self, a: Self::ObjectHandle, b: Self::ObjectHandle)
    -> Self::ContactSetHandle;

    /// Returns a contact set to the pool. `keep_list` preserves the last
    /// computed contact list so a caller can still read it after recycling
    /// (used when a contact set is kept across one more frame).
    fn recycle_contact_set(&mut self, cs: Self::ContactSetHandle, keep_list: bool);

    /// Refreshes the contact list for `cs` at the pair's current poses.
    /// `dt` is usually `0` for a pure re-query at the current pose.
    fn update_contacts(&mut self, cs: Self::ContactSetHandle, dt: f32);

    /// The contact list as of the last `update_contacts` call.
    fn contacts(&self, cs: Self::ContactSetHandle) -> &[Contact];

    /// World-space AABB of `obj` at its current pose.
    fn object_aabb(&self, obj: Self::ObjectHandle) -> Aabb;

    /// Moves `obj` to `pose` for contact-refresh purposes. `SlidePhases`
    /// calls this to test trial positions before a movement step is
    /// committed to the external simulator's own rigid body.
    fn set_object_pose(&mut self, obj: Self::ObjectHandle, pose: Pose);

    /// Tolerance used when comparing planes/positions (see `BoundsBuilder`).
    fn collision_epsilon(&self) -> f32;
}

/// A rigid body as exposed by the external simulator.
pub trait RigidBody {
    fn pose(&self) -> crate::types::Pose;
    fn set_pose(&mut self, pose: crate::types::Pose);

    fn linear_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, v: Vec3);

    fn mass(&self) -> f32;

    fn is_dynamic(&self) -> bool;

    /// Velocity of the body's material point coincident with `world_point`,
    /// including angular contribution for rotating bodies.
    fn velocity_at_world_point(&self, world_point: Vec3) -> Vec3;

    fn apply_impulse(&mut self, impulse: Vec3, world_point: Vec3);

    /// The body's material-advertised surface-motion vector (e.g. a
    /// conveyor belt), if any, expressed in world space.
    fn surface_motion(&self) -> Option<Vec3>;
}

/// The collision-object facet of a body (enable/disable, filtering).
pub trait CollisionObject {
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    fn collision_group(&self) -> u32;
    fn set_collision_group(&mut self, group: u32);
}

/// One active contact constraint the rigid-body solver is tracking this
/// step, as consumed by `CharacterForceEffect::on_apply`.
#[derive(Clone, Copy, Debug)]
pub struct ContactConstraint<H> {
    pub body_a: H,
    pub body_b: H,
    pub contact: Contact,
    /// Effective-mass (K) matrix at the contact point, mapping a relative
    /// velocity correction to the impulse that produces it.
    pub k_matrix: na::Matrix3<f32>,
}

use nalgebra as na;

/// A per-step callback the simulator invokes once registered. Object-safe:
/// concrete simulators box these (`Box<dyn ForceEffect<ConcreteSim>>`).
pub trait ForceEffect<S: Simulation> {
    fn on_apply(&mut self, sim: &mut S, dt: f32);
}

/// The rigid-body simulation collaborator: body/force-effect lifecycle and
/// the per-step contact constraint list.
///
/// `Simulation: CollisionWorld` because every body this crate cares about
/// (the CC's own capsule, and the obstacles it collects contacts against)
/// needs both a rigid-body identity and a collidable identity in the same
/// world; a host implements both facets on one concrete type (see
/// `rapier_backend`).
pub trait Simulation: CollisionWorld + Sized {
    type Body: RigidBody + CollisionObject;
    type BodyHandle: Copy + Eq;
    type ForceEffectHandle: Copy + Eq;

    fn add_rigid_body(&mut self, body: Self::Body) -> Self::BodyHandle;
    fn remove_rigid_body(&mut self, handle: Self::BodyHandle);

    /// Builds and registers the CC's own capsule body per §3's lifecycle: a
    /// capsule shape aligned with `up_vector`, a frictionless zero-
    /// restitution material, a fixed `mass=100` mass frame, rotation locked
    /// on all axes, sleep disabled, CCD enabled.
    fn spawn_capsule_body(&mut self, capsule: Capsule, up_vector: Vec3, position: Vec3) -> Self::BodyHandle;

    /// The collision-world object identity backing `body`, for the CC's own
    /// body (used to move it during `SlidePhases` trial positions).
    fn object_handle_for_body(&self, body: Self::BodyHandle) -> Self::ObjectHandle;

    fn body(&self, handle: Self::BodyHandle) -> &Self::Body;
    fn body_mut(&mut self, handle: Self::BodyHandle) -> &mut Self::Body;

    fn add_force_effect<E>(&mut self, effect: E) -> Self::ForceEffectHandle
    where
        E: ForceEffect<Self> + 'static;
    fn remove_force_effect(&mut self, handle: Self::ForceEffectHandle);

    /// All contact constraints active this step, across every body pair the
    /// solver is tracking (not just the CC's).
    fn contact_constraints(&self) -> &[ContactConstraint<Self::BodyHandle>];

    fn allowed_penetration(&self) -> f32;
    fn fixed_time_step(&self) -> f32;
}
