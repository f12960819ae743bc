//! A concrete `CollisionWorld` + `Simulation` adapter over `rapier3d` and
//! `parry3d`, grounded in `rapier_world.rs` (collider construction from a
//! shape description) and `collision/narrow_phase.rs` (ad-hoc `parry3d`
//! shape queries rather than a persistent `rapier3d` `ColliderSet`).
//!
//! Bodies are plain data (`RapierBody`) kept in a simple slotted pool rather
//! than a live `rapier3d::dynamics::RigidBodySet`: this crate's KCC moves
//! its own body directly (it is kinematic, not solved), and the contacts it
//! needs against obstacles are per-pair narrow-phase queries, exactly the
//! shape `parry3d::query::contact` answers. `rapier3d`'s own dynamics
//! pipeline is not run; `rapier3d` is used here for its collider-builder
//! conventions (`collider_builder_for`) so a host embedding this adapter in
//! a full `rapier3d` scene (e.g. for rendering-side debug colliders) can
//! reuse the same shape description.

use nalgebra as na;
use parry3d::shape as pshape;

use crate::math::{Iso, Vec3, EPS};
use crate::sim::{
    Aabb, CollisionObject, CollisionWorld, ContactConstraint, ForceEffect,
    RigidBody as RigidBodyTrait, Simulation,
};
use crate::types::{Capsule, Contact, Pose};

/// A plain-data rigid body. `Simulation::Body` for `RapierWorld`.
#[derive(Clone, Debug)]
pub struct RapierBody {
    pose: Pose,
    linear_velocity: Vec3,
    mass: f32,
    is_dynamic: bool,
    enabled: bool,
    collision_group: u32,
    surface_motion: Option<Vec3>,
    shape: RapierShape,
}

#[derive(Clone, Copy, Debug)]
pub enum RapierShape {
    Capsule { radius: f32, half_height: f32 },
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
    HalfSpace { normal: Vec3 },
}

impl RigidBodyTrait for RapierBody {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn set_linear_velocity(&mut self, v: Vec3) {
        self.linear_velocity = v;
    }

    fn mass(&self) -> f32 {
        self.mass
    }

    fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    fn velocity_at_world_point(&self, _world_point: Vec3) -> Vec3 {
        // Rotation is locked on every body this adapter drives through the
        // KCC's force effect, so the angular contribution is zero; bodies
        // with genuine angular velocity would need that term added here.
        self.linear_velocity
    }

    fn apply_impulse(&mut self, impulse: Vec3, _world_point: Vec3) {
        if self.is_dynamic && self.mass > EPS {
            self.linear_velocity += impulse / self.mass;
        }
    }

    fn surface_motion(&self) -> Option<Vec3> {
        self.surface_motion
    }
}

impl CollisionObject for RapierBody {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn collision_group(&self) -> u32 {
        self.collision_group
    }

    fn set_collision_group(&mut self, group: u32) {
        self.collision_group = group;
    }
}

fn iso_of(pose: Pose) -> Iso {
    Iso::from_parts(na::Translation3::from(pose.position), pose.orientation)
}

fn shape_dyn(shape: &RapierShape) -> Box<dyn pshape::Shape> {
    match *shape {
        RapierShape::Capsule { radius, half_height } => {
            Box::new(pshape::Capsule::new_y(half_height, radius))
        }
        RapierShape::Cuboid { half_extents } => Box::new(pshape::Cuboid::new(half_extents)),
        RapierShape::Ball { radius } => Box::new(pshape::Ball::new(radius)),
        RapierShape::HalfSpace { normal } => {
            Box::new(pshape::HalfSpace::new(na::Unit::new_normalize(normal)))
        }
    }
}

fn aabb_of(pose: Pose, shape: &RapierShape) -> Aabb {
    if let RapierShape::HalfSpace { .. } = shape {
        let huge = Vec3::new(1.0e6, 1.0e6, 1.0e6);
        return Aabb::new(-huge, huge);
    }
    let iso = iso_of(pose);
    let bb = shape_dyn(shape).compute_aabb(&iso);
    Aabb::new(
        Vec3::new(bb.mins.x, bb.mins.y, bb.mins.z),
        Vec3::new(bb.maxs.x, bb.maxs.y, bb.maxs.z),
    )
}

fn contact_pair(
    pose_a: Pose,
    shape_a: &RapierShape,
    pose_b: Pose,
    shape_b: &RapierShape,
    prediction: f32,
) -> Option<parry3d::query::Contact> {
    let iso_a = iso_of(pose_a);
    let iso_b = iso_of(pose_b);
    let sa = shape_dyn(shape_a);
    let sb = shape_dyn(shape_b);
    parry3d::query::contact(&iso_a, sa.as_ref(), &iso_b, sb.as_ref(), prediction)
        .ok()
        .flatten()
}

/// A `rapier3d`-flavored collider shape description for `shape`, usable if a
/// host also wants this body represented in a live `rapier3d` scene (e.g.
/// for rendering-side debug colliders built the same way `rapier_world.rs`
/// builds its static world).
pub fn collider_builder_for(shape: &RapierShape) -> rapier3d::geometry::ColliderBuilder {
    use rapier3d::geometry::ColliderBuilder;
    match *shape {
        RapierShape::Capsule { radius, half_height } => {
            ColliderBuilder::capsule_y(half_height, radius)
        }
        RapierShape::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }
        RapierShape::Ball { radius } => ColliderBuilder::ball(radius),
        RapierShape::HalfSpace { normal } => {
            let unit_n = na::Unit::new_normalize(normal);
            ColliderBuilder::new(rapier3d::geometry::SharedShape::new(pshape::HalfSpace::new(
                unit_n,
            )))
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BodyHandle(usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContactSetHandle(usize);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ForceEffectHandle(usize);

struct ContactSetEntry {
    a: BodyHandle,
    b: BodyHandle,
    contacts: Vec<Contact>,
}

/// A small collision+simulation world driven entirely by `parry3d` narrow-
/// phase queries; see the module doc for why it doesn't run `rapier3d`'s own
/// dynamics pipeline.
pub struct RapierWorld {
    bodies: Vec<Option<RapierBody>>,
    free_bodies: Vec<usize>,
    contact_sets: Vec<Option<ContactSetEntry>>,
    free_contact_sets: Vec<usize>,
    force_effects: Vec<Option<Box<dyn ForceEffect<RapierWorld>>>>,
    free_force_effects: Vec<usize>,
    cached_contact_constraints: Vec<ContactConstraint<BodyHandle>>,
    allowed_penetration: f32,
    fixed_time_step: f32,
    collision_epsilon: f32,
}

impl RapierWorld {
    pub fn new(allowed_penetration: f32, fixed_time_step: f32) -> Self {
        Self {
            bodies: Vec::new(),
            free_bodies: Vec::new(),
            contact_sets: Vec::new(),
            free_contact_sets: Vec::new(),
            force_effects: Vec::new(),
            free_force_effects: Vec::new(),
            cached_contact_constraints: Vec::new(),
            allowed_penetration,
            fixed_time_step,
            collision_epsilon: 1.0e-5,
        }
    }

    /// Adds a non-KCC obstacle body (static, kinematic, or dynamic) with an
    /// explicit shape, returning its handle.
    pub fn add_body(
        &mut self,
        shape: RapierShape,
        pose: Pose,
        mass: f32,
        is_dynamic: bool,
    ) -> BodyHandle {
        let body = RapierBody {
            pose,
            linear_velocity: Vec3::zeros(),
            mass,
            is_dynamic,
            enabled: true,
            collision_group: 0,
            surface_motion: None,
            shape,
        };
        self.add_rigid_body(body)
    }

    pub fn set_surface_motion(&mut self, handle: BodyHandle, motion: Option<Vec3>) {
        if let Some(body) = self.bodies[handle.0].as_mut() {
            body.surface_motion = motion;
        }
    }

    /// Runs one simulation step: refreshes the contact-constraint list used
    /// by force effects, invokes every registered force effect, then
    /// integrates every enabled body's position from its (possibly just-set)
    /// linear velocity. This is the concrete counterpart of the control
    /// flow's `game -> Simulation.step(dt)` — in particular, a `CcContact`'s
    /// platform-traction velocity (set on the CC's own body by
    /// `CharacterForceEffect::on_apply`) is realized as displacement within
    /// this same step, not deferred to the next `Move` call.
    pub fn step(&mut self, dt: f32) {
        self.refresh_contact_constraints();

        let mut effects = std::mem::take(&mut self.force_effects);
        for slot in effects.iter_mut() {
            if let Some(effect) = slot {
                effect.on_apply(self, dt);
            }
        }
        self.force_effects = effects;

        self.integrate_positions(dt);
    }

    /// Advances every enabled body's pose by `linear_velocity * dt`. Rotation
    /// is untouched — every body this adapter drives has it locked (§3).
    fn integrate_positions(&mut self, dt: f32) {
        for slot in self.bodies.iter_mut() {
            let Some(body) = slot else { continue };
            if !body.enabled {
                continue;
            }
            let v = body.linear_velocity;
            if v.norm() > 0.0 {
                body.pose.position += v * dt;
            }
        }
    }

    fn refresh_contact_constraints(&mut self) {
        self.cached_contact_constraints.clear();

        let handles: Vec<BodyHandle> = self
            .bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|_| BodyHandle(i)))
            .collect();

        for i in 0..handles.len() {
            for j in (i + 1)..handles.len() {
                let a = handles[i];
                let b = handles[j];

                let body_a = self.bodies[a.0].as_ref().unwrap();
                let body_b = self.bodies[b.0].as_ref().unwrap();
                if !body_a.enabled || !body_b.enabled {
                    continue;
                }

                let Some(c) = contact_pair(
                    body_a.pose,
                    &body_a.shape,
                    body_b.pose,
                    &body_b.shape,
                    self.allowed_penetration,
                ) else {
                    continue;
                };
                if c.dist > self.allowed_penetration {
                    continue;
                }

                let normal = Vec3::new(c.normal1.x, c.normal1.y, c.normal1.z);
                let point_a = Vec3::new(c.point1.x, c.point1.y, c.point1.z);
                let position_world = point_a;

                let contact = Contact {
                    position_world,
                    position_a_local: position_world - body_a.pose.position,
                    position_b_local: position_world - body_b.pose.position,
                    normal,
                    penetration_depth: (-c.dist).max(0.0),
                    feature_a: 0,
                    feature_b: 0,
                };

                let inv_mass_a = if body_a.is_dynamic {
                    1.0 / body_a.mass.max(EPS)
                } else {
                    0.0
                };
                let inv_mass_b = if body_b.is_dynamic {
                    1.0 / body_b.mass.max(EPS)
                } else {
                    0.0
                };
                let k_scalar = (inv_mass_a + inv_mass_b).max(EPS);
                let k_matrix = na::Matrix3::identity() * k_scalar;

                self.cached_contact_constraints.push(ContactConstraint {
                    body_a: a,
                    body_b: b,
                    contact,
                    k_matrix,
                });
            }
        }
    }
}

impl CollisionWorld for RapierWorld {
    type ObjectHandle = BodyHandle;
    type ContactSetHandle = ContactSetHandle;

    fn broad_phase_overlaps(&self, aabb: Aabb) -> Vec<Self::ObjectHandle> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let body = slot.as_ref()?;
                if !body.enabled {
                    return None;
                }
                let body_aabb = aabb_of(body.pose, &body.shape);
                let overlap = body_aabb.mins.x <= aabb.maxs.x
                    && body_aabb.maxs.x >= aabb.mins.x
                    && body_aabb.mins.y <= aabb.maxs.y
                    && body_aabb.maxs.y >= aabb.mins.y
                    && body_aabb.mins.z <= aabb.maxs.z
                    && body_aabb.maxs.z >= aabb.mins.z;
                overlap.then_some(BodyHandle(i))
            })
            .collect()
    }

    fn create_contact_set(
        &mut self,
        a: Self::ObjectHandle,
        b: Self::ObjectHandle,
    ) -> Self::ContactSetHandle {
        let entry = ContactSetEntry {
            a,
            b,
            contacts: Vec::new(),
        };
        if let Some(index) = self.free_contact_sets.pop() {
            self.contact_sets[index] = Some(entry);
            ContactSetHandle(index)
        } else {
            self.contact_sets.push(Some(entry));
            ContactSetHandle(self.contact_sets.len() - 1)
        }
    }

    fn recycle_contact_set(&mut self, cs: Self::ContactSetHandle, keep_list: bool) {
        if keep_list {
            return;
        }
        if let Some(entry) = self.contact_sets[cs.0].as_mut() {
            entry.contacts.clear();
        }
        self.free_contact_sets.push(cs.0);
    }

    fn update_contacts(&mut self, cs: Self::ContactSetHandle, _dt: f32) {
        let Some(entry) = self.contact_sets[cs.0].as_ref() else {
            return;
        };
        let (a, b) = (entry.a, entry.b);

        let body_a = self.bodies[a.0].as_ref().unwrap();
        let body_b = self.bodies[b.0].as_ref().unwrap();

        let contact = contact_pair(
            body_a.pose,
            &body_a.shape,
            body_b.pose,
            &body_b.shape,
            self.allowed_penetration,
        );

        let entry = self.contact_sets[cs.0].as_mut().unwrap();
        entry.contacts.clear();

        if let Some(c) = contact {
            if c.dist <= self.allowed_penetration {
                let point_a = Vec3::new(c.point1.x, c.point1.y, c.point1.z);
                let normal = Vec3::new(c.normal1.x, c.normal1.y, c.normal1.z);
                entry.contacts.push(Contact {
                    position_world: point_a,
                    position_a_local: point_a - body_a.pose.position,
                    position_b_local: point_a - body_b.pose.position,
                    normal,
                    penetration_depth: (-c.dist).max(0.0),
                    feature_a: 0,
                    feature_b: 0,
                });
            }
        }
    }

    fn contacts(&self, cs: Self::ContactSetHandle) -> &[Contact] {
        self.contact_sets[cs.0]
            .as_ref()
            .map(|entry| entry.contacts.as_slice())
            .unwrap_or(&[])
    }

    fn object_aabb(&self, obj: Self::ObjectHandle) -> Aabb {
        let body = self.bodies[obj.0].as_ref().unwrap();
        aabb_of(body.pose, &body.shape)
    }

    fn set_object_pose(&mut self, obj: Self::ObjectHandle, pose: Pose) {
        if let Some(body) = self.bodies[obj.0].as_mut() {
            body.pose = pose;
        }
    }

    fn collision_epsilon(&self) -> f32 {
        self.collision_epsilon
    }
}

impl Simulation for RapierWorld {
    type Body = RapierBody;
    type BodyHandle = BodyHandle;
    type ForceEffectHandle = ForceEffectHandle;

    fn add_rigid_body(&mut self, body: Self::Body) -> Self::BodyHandle {
        if let Some(index) = self.free_bodies.pop() {
            self.bodies[index] = Some(body);
            BodyHandle(index)
        } else {
            self.bodies.push(Some(body));
            BodyHandle(self.bodies.len() - 1)
        }
    }

    fn remove_rigid_body(&mut self, handle: Self::BodyHandle) {
        self.bodies[handle.0] = None;
        self.free_bodies.push(handle.0);
    }

    fn spawn_capsule_body(&mut self, capsule: Capsule, up_vector: Vec3, position: Vec3) -> Self::BodyHandle {
        let orientation = na::UnitQuaternion::rotation_between(&Vec3::new(0.0, 1.0, 0.0), &up_vector)
            .unwrap_or_else(na::UnitQuaternion::identity);
        let body = RapierBody {
            pose: Pose::new(position, orientation),
            linear_velocity: Vec3::zeros(),
            mass: 100.0,
            is_dynamic: false,
            enabled: false,
            collision_group: 0,
            surface_motion: None,
            shape: RapierShape::Capsule {
                radius: capsule.radius,
                half_height: capsule.half_height_cylinder(),
            },
        };
        self.add_rigid_body(body)
    }

    fn object_handle_for_body(&self, body: Self::BodyHandle) -> Self::ObjectHandle {
        body
    }

    fn body(&self, handle: Self::BodyHandle) -> &Self::Body {
        self.bodies[handle.0].as_ref().expect("body handle is live")
    }

    fn body_mut(&mut self, handle: Self::BodyHandle) -> &mut Self::Body {
        self.bodies[handle.0].as_mut().expect("body handle is live")
    }

    fn add_force_effect<E>(&mut self, effect: E) -> Self::ForceEffectHandle
    where
        E: ForceEffect<Self> + 'static,
    {
        let boxed: Box<dyn ForceEffect<RapierWorld>> = Box::new(effect);
        if let Some(index) = self.free_force_effects.pop() {
            self.force_effects[index] = Some(boxed);
            ForceEffectHandle(index)
        } else {
            self.force_effects.push(Some(boxed));
            ForceEffectHandle(self.force_effects.len() - 1)
        }
    }

    fn remove_force_effect(&mut self, handle: Self::ForceEffectHandle) {
        self.force_effects[handle.0] = None;
        self.free_force_effects.push(handle.0);
    }

    fn contact_constraints(&self) -> &[ContactConstraint<Self::BodyHandle>] {
        &self.cached_contact_constraints
    }

    fn allowed_penetration(&self) -> f32 {
        self.allowed_penetration
    }

    fn fixed_time_step(&self) -> f32 {
        self.fixed_time_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_plane_contact_is_detected() {
        let mut world = RapierWorld::new(0.01, 1.0 / 60.0);
        let ground = world.add_body(
            RapierShape::HalfSpace {
                normal: Vec3::new(0.0, 1.0, 0.0),
            },
            Pose::identity_at(Vec3::zeros()),
            0.0,
            false,
        );
        let capsule = world.add_body(
            RapierShape::Capsule {
                radius: 0.4,
                half_height: 0.5,
            },
            Pose::identity_at(Vec3::new(0.0, 0.9 - 0.005, 0.0)),
            100.0,
            false,
        );

        let cs = world.create_contact_set(capsule, ground);
        world.update_contacts(cs, 0.0);
        assert!(!world.contacts(cs).is_empty());
    }

    #[test]
    fn broad_phase_excludes_far_bodies() {
        let mut world = RapierWorld::new(0.01, 1.0 / 60.0);
        let _near = world.add_body(
            RapierShape::Ball { radius: 0.5 },
            Pose::identity_at(Vec3::new(0.0, 0.0, 0.0)),
            1.0,
            true,
        );
        let _far = world.add_body(
            RapierShape::Ball { radius: 0.5 },
            Pose::identity_at(Vec3::new(100.0, 0.0, 0.0)),
            1.0,
            true,
        );

        let overlaps = world.broad_phase_overlaps(Aabb::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ));
        assert_eq!(overlaps.len(), 1);
    }
}
