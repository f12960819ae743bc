//! §4.2 GroundClassifier — derives `has_ground_contact` from the current
//! contact list and capsule geometry.
//!
//! The result is memoized by the caller (`ContactCache::cached_ground_contact`)
//! and invalidated whenever `ContactCache::update_contacts` runs; this module
//! only implements the classification itself.

use crate::math::{Vec3, EPS};
use crate::settings::PINCER_COS_LIMIT;
use crate::types::{CcContact, Capsule};

/// Classifies whether `contacts` give the capsule enough support to be
/// considered grounded. See §4.2 for the algorithm.
pub fn classify(
    contacts: &[CcContact],
    capsule: Capsule,
    up_vector: Vec3,
    cos_slope_limit: f32,
) -> bool {
    let bottom = -capsule.height * 0.5;
    let cap_radius = capsule.radius;
    let bottom_of_cylinder = bottom + cap_radius;

    let allowed_range = cap_radius * (1.0 - cos_slope_limit);
    let ground_contact_limit = bottom + allowed_range;

    for c in contacts {
        let proj = c.position_local.dot(&up_vector);
        if proj <= ground_contact_limit {
            return true;
        }
    }

    let bottom_center = up_vector * bottom;
    let mut directions: Vec<Vec3> = Vec::new();
    for c in contacts {
        let proj = c.position_local.dot(&up_vector);
        if proj <= bottom_of_cylinder {
            if let Some(dir) = (c.position_local - bottom_center).try_normalize(EPS) {
                directions.push(dir);
            }
        }
    }

    if directions.len() < 2 {
        return false;
    }

    for i in 0..directions.len() {
        for j in (i + 1)..directions.len() {
            if directions[i].dot(&directions[j]) <= PINCER_COS_LIMIT {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capsule() -> Capsule {
        Capsule::new(0.4, 1.8)
    }

    #[test]
    fn flat_contact_directly_below_is_grounded() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        let contacts = [CcContact {
            position_local: Vec3::new(0.0, -0.9, 0.0),
            normal_toward_cc: up,
            penetration_depth: 0.0,
        }];
        assert!(classify(&contacts, capsule(), up, (std::f32::consts::FRAC_PI_4).cos()));
    }

    #[test]
    fn no_contacts_is_not_grounded() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        assert!(!classify(&[], capsule(), up, 0.7));
    }

    #[test]
    fn pincer_contacts_on_bottom_cap_are_grounded() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        let cap = capsule();
        let bottom = -cap.height * 0.5;
        let bottom_center = up * bottom;
        // Two contacts near the equator of the bottom hemisphere, roughly
        // opposite each other (> 120 degrees apart), but above the strict
        // ground_contact_limit so only the pincer path can classify them.
        let a = bottom_center + Vec3::new(cap.radius * 0.9, cap.radius * 0.2, 0.0);
        let b = bottom_center + Vec3::new(-cap.radius * 0.9, cap.radius * 0.2, 0.0);
        let contacts = [
            CcContact {
                position_local: a,
                normal_toward_cc: up,
                penetration_depth: 0.0,
            },
            CcContact {
                position_local: b,
                normal_toward_cc: up,
                penetration_depth: 0.0,
            },
        ];
        assert!(classify(&contacts, cap, up, (std::f32::consts::FRAC_PI_4).cos()));
    }

    #[test]
    fn single_bottom_contact_alone_is_not_grounded() {
        let up = Vec3::new(0.0, 1.0, 0.0);
        let cap = capsule();
        let bottom = -cap.height * 0.5;
        let bottom_center = up * bottom;
        let contacts = [CcContact {
            position_local: bottom_center + Vec3::new(cap.radius * 0.9, cap.radius * 0.2, 0.0),
            normal_toward_cc: up,
            penetration_depth: 0.0,
        }];
        assert!(!classify(&contacts, cap, up, (std::f32::consts::FRAC_PI_4).cos()));
    }
}
