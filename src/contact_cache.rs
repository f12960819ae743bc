//! §4.1 ContactCache — buffers obstacle contact sets, extracted contacts and
//! bounding planes for one movement step, with backup/rollback.
//!
//! Buffers are `clear()`-ed rather than reallocated between frames and
//! between backup/rollback calls, so steady-state operation does no hot-path
//! allocation once the buffers have grown to their working size.

use crate::math::Vec3;
use crate::sim::{Aabb, CollisionWorld};
use crate::types::{Bound, CcContact};

/// One obstacle pair tracked for the current movement step: the CC body
/// against a single candidate obstacle, plus the collision world's pooled
/// contact-set handle for that pair.
struct ObstacleContactSet<W: CollisionWorld> {
    obstacle: W::ObjectHandle,
    set: W::ContactSetHandle,
}

pub struct ContactCache<W: CollisionWorld> {
    contact_sets: Vec<ObstacleContactSet<W>>,
    cc_contacts: Vec<CcContact>,
    cc_contacts_backup: Vec<CcContact>,
    bounds: Vec<Bound>,
    has_ground_contact: Option<bool>,
    has_ground_contact_backup: Option<bool>,
}

impl<W: CollisionWorld> Default for ContactCache<W> {
    fn default() -> Self {
        Self {
            contact_sets: Vec::new(),
            cc_contacts: Vec::new(),
            cc_contacts_backup: Vec::new(),
            bounds: Vec::new(),
            has_ground_contact: None,
            has_ground_contact_backup: None,
        }
    }
}

impl<W: CollisionWorld> ContactCache<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cc_contacts(&self) -> &[CcContact] {
        &self.cc_contacts
    }

    /// Cached `has_ground_contact` result, if one has been computed since
    /// the last `update_contacts` invalidated it. See `GroundClassifier`.
    pub fn cached_ground_contact(&self) -> Option<bool> {
        self.has_ground_contact
    }

    pub fn set_cached_ground_contact(&mut self, value: bool) {
        self.has_ground_contact = Some(value);
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn bounds_mut(&mut self) -> &mut Vec<Bound> {
        &mut self.bounds
    }

    pub fn clear_bounds(&mut self) {
        self.bounds.clear();
    }

    /// Recycles any contact sets from the previous step, then (if `enabled`)
    /// rebuilds the candidate obstacle list via a broad-phase query on the
    /// CC body's AABB expanded by `radius`.
    pub fn collect_obstacles(
        &mut self,
        world: &mut W,
        cc_object: W::ObjectHandle,
        cc_aabb: Aabb,
        enabled: bool,
        radius: f32,
    ) {
        for set in self.contact_sets.drain(..) {
            world.recycle_contact_set(set.set, false);
        }

        if !enabled {
            return;
        }

        let query_aabb = cc_aabb.expanded(radius.max(0.0));
        log::trace!("collect_obstacles: querying broad-phase with radius {radius}");
        for obstacle in world.broad_phase_overlaps(query_aabb) {
            if obstacle == cc_object {
                continue;
            }
            let set = world.create_contact_set(cc_object, obstacle);
            self.contact_sets.push(ObstacleContactSet { obstacle, set });
        }
        log::trace!(
            "collect_obstacles: {} candidate obstacle(s)",
            self.contact_sets.len()
        );
    }

    /// Refreshes every tracked contact set at the CC's current pose and
    /// flattens the results into `cc_contacts`. Invalidates the memoized
    /// ground-contact classification.
    pub fn update_contacts(&mut self, world: &mut W) {
        self.cc_contacts.clear();
        self.has_ground_contact = None;

        for set in &self.contact_sets {
            world.update_contacts(set.set, 0.0);
            for contact in world.contacts(set.set) {
                self.cc_contacts.push(CcContact {
                    position_local: contact.position_a_local,
                    normal_toward_cc: -contact.normal,
                    penetration_depth: contact.penetration_depth,
                });
            }
        }
    }

    /// Snapshots the contact list and ground-contact cache so they can be
    /// restored with `rollback`. Backup/rollback calls must be strictly
    /// LIFO and unnested (§5).
    pub fn backup(&mut self) {
        self.cc_contacts_backup.clear();
        self.cc_contacts_backup.extend_from_slice(&self.cc_contacts);
        self.has_ground_contact_backup = self.has_ground_contact;
    }

    pub fn rollback(&mut self) {
        self.cc_contacts.clear();
        self.cc_contacts.extend_from_slice(&self.cc_contacts_backup);
        self.has_ground_contact = self.has_ground_contact_backup;
    }

    /// Unit vector pointing from the capsule's bottom-cap center toward
    /// `contact`, used by `GroundClassifier`. Exposed here since it only
    /// needs the cached contact positions, not any solver state.
    pub fn contact_directions_from_bottom_center<'a>(
        contacts: impl Iterator<Item = &'a CcContact>,
        bottom_center: Vec3,
        eps: f32,
    ) -> Vec<Vec3> {
        contacts
            .filter_map(|c| (c.position_local - bottom_center).try_normalize(eps))
            .collect()
    }
}
